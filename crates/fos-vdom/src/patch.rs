//! Patch application
//!
//! The only step that writes to the real DOM. Operations are applied one by
//! one; a failing operation is logged and recorded in the [`PatchReport`]
//! and the remaining operations still run.

use fos_dom::{Document, DomError, NodeId};

use crate::{PatchOp, PatchSet, VKind, VNode};

/// A single failed operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{op} failed: {source}")]
pub struct PatchError {
    pub op: &'static str,
    #[source]
    pub source: DomError,
}

/// Outcome of applying a patch set
#[derive(Debug, Default)]
pub struct PatchReport {
    /// Operations applied successfully
    pub applied: usize,
    /// Operations that failed (and were skipped)
    pub failures: Vec<PatchError>,
}

impl PatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn merge(&mut self, other: PatchReport) {
        self.applied += other.applied;
        self.failures.extend(other.failures);
    }
}

/// Apply every operation of `patches` to `document`
pub fn patch(document: &Document, patches: PatchSet) -> PatchReport {
    let mut report = PatchReport::default();
    for op in patches {
        let name = op.name();
        tracing::trace!(op = name, "apply patch");
        match apply(document, op) {
            Ok(()) => report.applied += 1,
            Err(source) => {
                tracing::warn!(op = name, error = %source, "patch operation failed");
                report.failures.push(PatchError { op: name, source });
            }
        }
    }
    report
}

fn apply(document: &Document, op: PatchOp) -> Result<(), DomError> {
    match op {
        PatchOp::Adopt { node, dom, displaced } => {
            if let Some(displaced) = displaced {
                displaced.unmount();
                document.clear_event_listeners(dom);
            }
            node.set_dom(Some(dom));
            install_listeners(document, &node, dom);
            Ok(())
        }
        PatchOp::Replace { dom, node, displaced } => {
            let fresh = render(document, &node)?;
            if let Some(parent) = document.parent(dom) {
                document.replace_child(parent, fresh, dom)?;
            }
            document.clear_subtree_listeners(dom);
            if let Some(displaced) = displaced {
                displaced.unmount();
            }
            Ok(())
        }
        PatchOp::SetAttribute { dom, name, value } => document.set_attribute(dom, &name, &value),
        PatchOp::RemoveAttribute { dom, name } => document.remove_attribute(dom, &name).map(|_| ()),
        PatchOp::SetText { dom, text } => document.set_text(dom, &text),
        PatchOp::Insert { parent, node, before } => {
            let fresh = render(document, &node)?;
            let reference = before.and_then(|b| b.dom());
            document.insert_before(parent, fresh, reference).map(|_| ())
        }
        PatchOp::Move { parent, node, before } => {
            let dom = node.dom().ok_or(DomError::NotFound(NodeId::NONE))?;
            let reference = before.and_then(|b| b.dom());
            document.insert_before(parent, dom, reference).map(|_| ())
        }
        PatchOp::Remove { dom, origin, unmount } => {
            let result = document.detach(dom);
            // The real subtree is dead; a re-shown node renders fresh
            document.clear_subtree_listeners(dom);
            match origin {
                Some(origin) if unmount => origin.unmount(),
                Some(origin) => origin.clear_dom(),
                None => {}
            }
            result
        }
    }
}

fn install_listeners(document: &Document, node: &VNode, dom: NodeId) {
    for (event_type, listener) in node.listeners() {
        document.add_event_listener(dom, &event_type, listener);
    }
}

/// Create the real subtree for `node` and its present descendants
///
/// Back-references are set on every rendered node. The new root is left
/// detached.
pub fn render(document: &Document, node: &VNode) -> Result<NodeId, DomError> {
    let dom = match node.kind() {
        VKind::Element(tag) => {
            let dom = document.create_element(&tag);
            for (name, value) in node.attrs() {
                document.set_attribute(dom, &name, &value)?;
            }
            dom
        }
        VKind::Text(content) => document.create_text(&content),
        VKind::Fragment => document.create_fragment(),
    };
    node.set_dom(Some(dom));
    install_listeners(document, node, dom);

    for child in node.children() {
        if child.is_present() {
            let child_dom = render(document, &child)?;
            document.append_child(dom, child_dom)?;
        } else {
            child.clear_dom();
        }
    }
    Ok(dom)
}
