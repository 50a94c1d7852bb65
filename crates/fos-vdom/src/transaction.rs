//! Transactional batching
//!
//! A [`TransactionStack`] holds the document and a stack of frames. While a
//! frame is open, every virtual node about to be mutated is collected into
//! it together with a snapshot of its current state; a node collected twice
//! keeps its first snapshot. `commit` pops the frame and diffs/patches the
//! collected nodes in the order they were first collected.
//!
//! Writes caused by the commit itself (unmount hooks, for instance) land in
//! a fresh nested frame, which the commit flushes afterwards.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use fos_dom::Document;

use crate::diff::diff_with;
use crate::{patch, PatchReport, VNode, VSnapshot};

/// Default bound on nested frames flushed by one commit
pub const DEFAULT_MAX_COMMIT_PASSES: usize = 16;

/// Transaction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransactionError {
    /// No frame is open
    #[error("no transaction has been started")]
    NotStarted,
    /// The committed transaction is not the innermost one
    #[error("transaction {found} committed while {expected} is the active frame")]
    OutOfOrder { expected: u64, found: u64 },
    /// Patching kept producing new work
    #[error("commit did not settle after {passes} passes")]
    CommitLoop { passes: usize },
}

struct Frame {
    id: u64,
    entries: Vec<(VNode, VSnapshot)>,
    seen: HashSet<u64>,
}

impl Frame {
    fn new(id: u64) -> Self {
        Self { id, entries: Vec::new(), seen: HashSet::new() }
    }
}

struct StackInner {
    document: Document,
    frames: RefCell<Vec<Frame>>,
    next_id: Cell<u64>,
    max_passes: Cell<usize>,
    commits: Cell<u64>,
}

/// Shared handle onto the active-transaction stack
#[derive(Clone)]
pub struct TransactionStack {
    inner: Rc<StackInner>,
}

impl std::fmt::Debug for TransactionStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionStack")
            .field("depth", &self.depth())
            .field("commits", &self.inner.commits.get())
            .finish()
    }
}

impl TransactionStack {
    pub fn new(document: &Document) -> Self {
        Self {
            inner: Rc::new(StackInner {
                document: document.clone(),
                frames: RefCell::new(Vec::new()),
                next_id: Cell::new(1),
                max_passes: Cell::new(DEFAULT_MAX_COMMIT_PASSES),
                commits: Cell::new(0),
            }),
        }
    }

    /// Handle that does not keep the stack (or its document) alive
    pub fn downgrade(&self) -> WeakTransactionStack {
        WeakTransactionStack { inner: Rc::downgrade(&self.inner) }
    }

    pub fn document(&self) -> &Document {
        &self.inner.document
    }

    pub fn set_max_commit_passes(&self, passes: usize) {
        self.inner.max_passes.set(passes.max(1));
    }

    /// Number of open frames
    pub fn depth(&self) -> usize {
        self.inner.frames.borrow().len()
    }

    pub fn is_active(&self) -> bool {
        self.depth() > 0
    }

    /// Number of successful commits so far
    pub fn commit_count(&self) -> u64 {
        self.inner.commits.get()
    }

    fn push_frame(&self) -> u64 {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.frames.borrow_mut().push(Frame::new(id));
        id
    }

    /// Open a new frame
    pub fn start(&self) -> Transaction {
        let id = self.push_frame();
        tracing::trace!(transaction = id, depth = self.depth(), "transaction started");
        Transaction { stack: self.clone(), id, done: false }
    }

    /// Snapshot `node` into the innermost frame
    ///
    /// Returns `false` when no frame is open or the node was already
    /// collected by this frame.
    pub fn collect(&self, node: &VNode) -> bool {
        let mut frames = self.inner.frames.borrow_mut();
        let Some(frame) = frames.last_mut() else {
            return false;
        };
        if !frame.seen.insert(node.id()) {
            return false;
        }
        frame.entries.push((node.clone(), node.snapshot()));
        true
    }

    /// Number of nodes collected by the innermost frame
    pub fn pending(&self) -> usize {
        self.inner.frames.borrow().last().map(|f| f.entries.len()).unwrap_or(0)
    }

    /// Collect `node`, then let `f` mutate it
    ///
    /// Outside any transaction a frame is opened around the mutation and
    /// committed immediately.
    pub fn with_node<R>(&self, node: &VNode, f: impl FnOnce(&VNode) -> R) -> R {
        if self.is_active() {
            self.collect(node);
            return f(node);
        }
        let tx = self.start();
        self.collect(node);
        let result = f(node);
        if let Err(err) = tx.commit() {
            tracing::warn!(error = %err, "implicit transaction failed to commit");
        }
        result
    }

    /// Run `f` inside a transaction of its own
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Result<(R, PatchReport), TransactionError> {
        let tx = self.start();
        let result = f();
        let report = tx.commit()?;
        Ok((result, report))
    }

    fn take_frame(&self, id: u64) -> Result<Frame, TransactionError> {
        let mut frames = self.inner.frames.borrow_mut();
        match frames.last() {
            None => Err(TransactionError::NotStarted),
            Some(top) if top.id != id => Err(TransactionError::OutOfOrder { expected: top.id, found: id }),
            Some(_) => frames.pop().ok_or(TransactionError::NotStarted),
        }
    }

    fn discard(&self, id: u64) {
        let mut frames = self.inner.frames.borrow_mut();
        if let Some(pos) = frames.iter().rposition(|f| f.id == id) {
            let frame = frames.remove(pos);
            tracing::warn!(transaction = id, dropped = frame.entries.len(), "transaction dropped without commit");
        }
    }

    fn commit_frame(&self, frame: Frame) -> Result<PatchReport, TransactionError> {
        let mut report = PatchReport::default();
        let mut pending = frame;
        let mut passes = 0;
        loop {
            passes += 1;
            let nested = self.push_frame();
            self.flush(pending.entries, &mut report);
            pending = self.take_frame(nested)?;
            if pending.entries.is_empty() {
                break;
            }
            if passes >= self.inner.max_passes.get() {
                tracing::warn!(passes, left = pending.entries.len(), "commit did not settle");
                return Err(TransactionError::CommitLoop { passes });
            }
        }
        self.inner.commits.set(self.inner.commits.get() + 1);
        Ok(report)
    }

    fn flush(&self, entries: Vec<(VNode, VSnapshot)>, report: &mut PatchReport) {
        let ids: HashSet<u64> = entries.iter().map(|(node, _)| node.id()).collect();
        let baselines: HashMap<u64, &VSnapshot> = entries.iter()
            .map(|(node, snap)| (node.id(), snap))
            .collect();

        // Topmost nodes in collection order, then nested ones shallowest
        // first so an ancestor always runs before its descendants
        let (top, mut nested): (Vec<_>, Vec<_>) = entries.iter()
            .partition(|(node, _)| !has_collected_ancestor(node, &ids));
        nested.sort_by_key(|(node, _)| depth(node));

        let mut covered = HashSet::new();
        let mut diffed = 0;
        for (node, snapshot) in top.into_iter().chain(nested) {
            if covered.contains(&node.id()) {
                // Reached by an ancestor's diff
                continue;
            }
            if node.dom().is_none() {
                continue;
            }
            let patches = diff_with(node, snapshot, &baselines, &mut covered);
            diffed += 1;
            if !patches.is_empty() {
                report.merge(patch(&self.inner.document, patches));
            }
        }
        tracing::debug!(
            collected = entries.len(),
            diffed,
            applied = report.applied,
            failed = report.failures.len(),
            "transaction committed"
        );
    }
}

fn has_collected_ancestor(node: &VNode, ids: &HashSet<u64>) -> bool {
    let mut cur = node.parent();
    while let Some(parent) = cur {
        if ids.contains(&parent.id()) {
            return true;
        }
        cur = parent.parent();
    }
    false
}

fn depth(node: &VNode) -> usize {
    let mut depth = 0;
    let mut cur = node.parent();
    while let Some(parent) = cur {
        depth += 1;
        cur = parent.parent();
    }
    depth
}

/// Weak counterpart of [`TransactionStack`]
///
/// DOM event listeners hold one: the document owns its listeners, so a
/// strong handle there would keep the document alive forever.
#[derive(Clone, Default)]
pub struct WeakTransactionStack {
    inner: Weak<StackInner>,
}

impl WeakTransactionStack {
    pub fn upgrade(&self) -> Option<TransactionStack> {
        self.inner.upgrade().map(|inner| TransactionStack { inner })
    }
}

impl std::fmt::Debug for WeakTransactionStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("(WeakTransactionStack)")
    }
}

/// Token for an open frame
///
/// Dropping it without committing discards the frame and its collected
/// nodes.
#[must_use = "a transaction does nothing until committed"]
pub struct Transaction {
    stack: TransactionStack,
    id: u64,
    done: bool,
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction").field("id", &self.id).finish()
    }
}

impl Transaction {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Pop the frame and patch every collected node
    pub fn commit(mut self) -> Result<PatchReport, TransactionError> {
        let frame = self.stack.take_frame(self.id)?;
        self.done = true;
        self.stack.commit_frame(frame)
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if !self.done {
            self.stack.discard(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render;
    use fos_dom::MutationType;

    fn setup() -> (Document, TransactionStack, VNode) {
        let doc = Document::new();
        let stack = TransactionStack::new(&doc);
        let root = VNode::element("div").with_child(VNode::text("a"));
        let dom = render(&doc, &root).unwrap();
        doc.append_child(doc.body(), dom).unwrap();
        doc.take_records();
        (doc, stack, root)
    }

    #[test]
    fn test_collect_dedup() {
        let (doc, stack, root) = setup();
        let tx = stack.start();
        assert!(stack.collect(&root));
        root.set_attr("n", "1");
        assert!(!stack.collect(&root));
        root.set_attr("n", "2");
        let report = tx.commit().unwrap();

        assert_eq!(report.applied, 1);
        assert_eq!(doc.attribute(root.dom().unwrap(), "n").as_deref(), Some("2"));
        assert_eq!(doc.take_records().len(), 1);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_collect_without_frame() {
        let (_, stack, root) = setup();
        assert!(!stack.collect(&root));
        assert_eq!(stack.pending(), 0);
    }

    #[test]
    fn test_commit_out_of_order() {
        let (_, stack, _) = setup();
        let outer = stack.start();
        let inner = stack.start();
        let err = outer.commit().unwrap_err();
        assert_eq!(err, TransactionError::OutOfOrder { expected: inner.id(), found: inner.id() - 1 });
        inner.commit().unwrap();
        // The outer frame was discarded when its token dropped
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn test_child_and_parent_collected() {
        let (doc, stack, root) = setup();
        let text = root.first_child().unwrap();

        let tx = stack.start();
        stack.collect(&text);
        text.set_text("b");
        stack.collect(&root);
        root.append_child(&VNode::text("c"));
        tx.commit().unwrap();

        let dom = root.dom().unwrap();
        assert_eq!(doc.inner_html(dom), "bc");
        let records = doc.take_records();
        assert_eq!(records.iter().filter(|r| r.mutation_type == MutationType::CharacterData).count(), 1);
        assert_eq!(records.iter().filter(|r| r.mutation_type == MutationType::ChildList).count(), 1);
    }

    #[test]
    fn test_with_node_opens_implicit_transaction() {
        let (doc, stack, root) = setup();
        stack.with_node(&root, |n| n.set_attr("id", "x"));
        assert_eq!(doc.attribute(root.dom().unwrap(), "id").as_deref(), Some("x"));
        assert_eq!(stack.commit_count(), 1);
    }

    #[test]
    fn test_weak_handle() {
        let (_, stack, _) = setup();
        let weak = stack.downgrade();
        assert!(weak.upgrade().is_some());
        drop(stack);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_dropped_transaction_discards() {
        let (doc, stack, root) = setup();
        {
            let _tx = stack.start();
            stack.collect(&root);
            root.set_attr("id", "x");
        }
        assert_eq!(stack.depth(), 0);
        assert!(doc.attribute(root.dom().unwrap(), "id").is_none());
    }
}
