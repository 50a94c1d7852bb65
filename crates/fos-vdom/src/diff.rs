//! Virtual tree diffing
//!
//! `diff(live, old)` compares the current state of a virtual subtree with a
//! snapshot taken before it was mutated and returns the DOM operations that
//! bring the real nodes (referenced by the snapshot) up to date. Both trees
//! are only read.
//!
//! Children are matched by node identity first, then by `:for` key, then by
//! position among the remaining unkeyed nodes. Reordering keeps the longest
//! run of nodes that are already in relative order and moves only the rest.

use std::collections::{HashMap, HashSet};

use fos_dom::NodeId;

use crate::{VKind, VNode, VSnapshot};

/// Patch operation
#[derive(Debug, Clone)]
pub enum PatchOp {
    /// Point a live node at an existing real node; `displaced` is the node
    /// that rendered there before and is unmounted
    Adopt {
        node: VNode,
        dom: NodeId,
        displaced: Option<VNode>,
    },
    /// Render `node` and put it in place of `dom`
    Replace {
        dom: NodeId,
        node: VNode,
        displaced: Option<VNode>,
    },
    SetAttribute {
        dom: NodeId,
        name: Box<str>,
        value: String,
    },
    RemoveAttribute {
        dom: NodeId,
        name: Box<str>,
    },
    SetText {
        dom: NodeId,
        text: String,
    },
    /// Render `node` and insert it before the real node of `before`
    /// (append when `None`)
    Insert {
        parent: NodeId,
        node: VNode,
        before: Option<VNode>,
    },
    /// Relocate the real node of `node`, keeping its identity
    Move {
        parent: NodeId,
        node: VNode,
        before: Option<VNode>,
    },
    /// Detach `dom`. `origin` is unmounted when `unmount` is set, otherwise
    /// only its back-references are cleared (hidden by `:if`)
    Remove {
        dom: NodeId,
        origin: Option<VNode>,
        unmount: bool,
    },
}

impl PatchOp {
    pub fn name(&self) -> &'static str {
        match self {
            PatchOp::Adopt { .. } => "adopt",
            PatchOp::Replace { .. } => "replace",
            PatchOp::SetAttribute { .. } => "set-attribute",
            PatchOp::RemoveAttribute { .. } => "remove-attribute",
            PatchOp::SetText { .. } => "set-text",
            PatchOp::Insert { .. } => "insert",
            PatchOp::Move { .. } => "move",
            PatchOp::Remove { .. } => "remove",
        }
    }

    /// Whether the operation changes the shape of the real tree
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            PatchOp::Replace { .. } | PatchOp::Insert { .. } | PatchOp::Move { .. } | PatchOp::Remove { .. }
        )
    }
}

/// Ordered list of patch operations
#[derive(Debug, Clone, Default)]
pub struct PatchSet {
    ops: Vec<PatchOp>,
}

impl PatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: PatchOp) {
        self.ops.push(op);
    }

    pub fn extend(&mut self, other: PatchSet) {
        self.ops.extend(other.ops);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[PatchOp] {
        &self.ops
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PatchOp> {
        self.ops.iter()
    }

    /// Number of operations with the given name
    pub fn count(&self, name: &str) -> usize {
        self.ops.iter().filter(|op| op.name() == name).count()
    }
}

impl IntoIterator for PatchSet {
    type Item = PatchOp;
    type IntoIter = std::vec::IntoIter<PatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

/// Diff the live subtree against a baseline snapshot
///
/// Returns an empty set when the baseline was never rendered.
pub fn diff(live: &VNode, old: &VSnapshot) -> PatchSet {
    diff_with(live, old, &HashMap::new(), &mut HashSet::new())
}

/// Diff with per-node baselines
///
/// When the walk reaches a node whose id is in `baselines`, that snapshot
/// is used for its subtree instead of the one found in the parent's
/// snapshot, so every node is compared with the state it had when it was
/// first collected.
///
/// Ids of the live nodes the walk compared or re-rendered are added to
/// `covered`. A `:cache` cut stops the walk, so collected nodes below it
/// stay uncovered and have to be diffed on their own.
pub(crate) fn diff_with<'a>(
    live: &VNode,
    old: &'a VSnapshot,
    baselines: &HashMap<u64, &'a VSnapshot>,
    covered: &mut HashSet<u64>,
) -> PatchSet {
    let mut differ = Differ { ops: PatchSet::new(), baselines, covered };
    differ.node(live, old);
    differ.ops
}

struct Differ<'a, 'm> {
    ops: PatchSet,
    baselines: &'m HashMap<u64, &'a VSnapshot>,
    covered: &'m mut HashSet<u64>,
}

impl<'a> Differ<'a, '_> {
    fn baseline(&self, live: &VNode, fallback: &'a VSnapshot) -> &'a VSnapshot {
        self.baselines.get(&live.id()).copied().unwrap_or(fallback)
    }

    /// Mark a subtree that is rendered from scratch
    fn cover(&mut self, live: &VNode) {
        live.walk(|node| {
            self.covered.insert(node.id());
        });
    }

    fn node(&mut self, live: &VNode, old: &'a VSnapshot) {
        let old = self.baseline(live, old);
        self.covered.insert(live.id());
        let Some(dom) = old.dom else { return };
        let displaced = || old.origin().filter(|o| !o.ptr_eq(live));

        let data = live.data();
        if !data.kind.same_type(&old.kind) {
            drop(data);
            self.cover(live);
            self.ops.push(PatchOp::Replace { dom, node: live.clone(), displaced: displaced() });
            return;
        }
        if data.dom != Some(dom) {
            self.ops.push(PatchOp::Adopt { node: live.clone(), dom, displaced: displaced() });
        }
        if data.cache && old.cache {
            return;
        }

        match (&data.kind, &old.kind) {
            (VKind::Text(now), VKind::Text(before)) if now != before => {
                self.ops.push(PatchOp::SetText { dom, text: now.clone() });
            }
            (VKind::Element(_), _) => self.attributes(dom, &data.attrs, &old.attrs),
            _ => {}
        }

        let children = data.children.clone();
        drop(data);
        self.children(live, dom, &children, old);
    }

    fn attributes(&mut self, dom: NodeId, live: &[(Box<str>, String)], old: &[(Box<str>, String)]) {
        for (name, value) in live {
            let before = old.iter().find(|(n, _)| n == name).map(|(_, v)| v);
            if before != Some(value) {
                self.ops.push(PatchOp::SetAttribute { dom, name: name.clone(), value: value.clone() });
            }
        }
        for (name, _) in old {
            if !live.iter().any(|(n, _)| n == name) {
                self.ops.push(PatchOp::RemoveAttribute { dom, name: name.clone() });
            }
        }
    }

    fn children(&mut self, owner: &VNode, parent: NodeId, live: &[VNode], old: &'a VSnapshot) {
        let olds = &old.children;
        let pairs = match_children(live, olds);

        let mut used = vec![false; olds.len()];
        for j in pairs.iter().flatten() {
            used[*j] = true;
        }

        // Old children that have no live counterpart
        for (j, o) in olds.iter().enumerate() {
            if used[j] || !o.is_rendered() {
                continue;
            }
            let Some(dom) = o.dom else { continue };
            let origin = o.origin();
            // A node that moved under another parent keeps its bindings
            let unmount = match origin.as_ref().and_then(VNode::parent) {
                None => true,
                Some(p) => !p.ptr_eq(owner) && old.origin().is_some_and(|o| o.ptr_eq(&p)),
            };
            self.ops.push(PatchOp::Remove { dom, origin, unmount });
        }

        // Matched pairs: recurse, hide, or schedule for insertion
        let mut target: Vec<(usize, Option<usize>)> = Vec::new();
        for (i, l) in live.iter().enumerate() {
            let present = l.is_present();
            match pairs[i] {
                Some(j) if self.baseline(l, &olds[j]).is_rendered() => {
                    if present {
                        self.node(l, &olds[j]);
                        target.push((i, Some(j)));
                    } else if let Some(dom) = self.baseline(l, &olds[j]).dom {
                        self.cover(l);
                        self.ops.push(PatchOp::Remove { dom, origin: Some(l.clone()), unmount: false });
                    }
                }
                _ if present => {
                    self.cover(l);
                    target.push((i, None));
                }
                _ => {}
            }
        }

        // Ordering: keep the longest increasing run of old positions
        let seq: Vec<usize> = target.iter().filter_map(|(_, j)| *j).collect();
        let keep: HashSet<usize> = longest_increasing_subsequence(&seq)
            .into_iter()
            .map(|k| seq[k])
            .collect();

        for k in (0..target.len()).rev() {
            let (i, j) = target[k];
            let before = target.get(k + 1).map(|(b, _)| live[*b].clone());
            match j {
                None => self.ops.push(PatchOp::Insert { parent, node: live[i].clone(), before }),
                Some(j) if !keep.contains(&j) => {
                    self.ops.push(PatchOp::Move { parent, node: live[i].clone(), before });
                }
                Some(_) => {}
            }
        }
    }
}

/// Pair each live child with an old child index
fn match_children(live: &[VNode], olds: &[VSnapshot]) -> Vec<Option<usize>> {
    let mut pairs: Vec<Option<usize>> = vec![None; live.len()];
    let mut used = vec![false; olds.len()];

    // Identity
    let by_id: HashMap<u64, usize> = olds.iter().enumerate().map(|(j, o)| (o.id, j)).collect();
    for (i, l) in live.iter().enumerate() {
        if let Some(&j) = by_id.get(&l.id()) {
            if !used[j] {
                pairs[i] = Some(j);
                used[j] = true;
            }
        }
    }

    // Keys
    let mut by_key: HashMap<&str, usize> = HashMap::new();
    for (j, o) in olds.iter().enumerate() {
        if let (false, Some(key)) = (used[j], o.key.as_deref()) {
            by_key.entry(key).or_insert(j);
        }
    }
    for (i, l) in live.iter().enumerate() {
        if pairs[i].is_some() {
            continue;
        }
        let Some(key) = l.key() else { continue };
        if let Some(&j) = by_key.get(key.as_str()) {
            if !used[j] {
                pairs[i] = Some(j);
                used[j] = true;
            }
        }
    }

    // Position among what is left
    let free: Vec<usize> = olds.iter().enumerate()
        .filter(|(j, o)| !used[*j] && o.key.is_none())
        .map(|(j, _)| j)
        .collect();
    let mut free = free.into_iter();
    for (i, l) in live.iter().enumerate() {
        if pairs[i].is_some() || l.key().is_some() {
            continue;
        }
        match free.next() {
            Some(j) => pairs[i] = Some(j),
            None => break,
        }
    }
    pairs
}

/// Indices into `seq` of one longest strictly increasing subsequence
fn longest_increasing_subsequence(seq: &[usize]) -> Vec<usize> {
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];
    for (i, &v) in seq.iter().enumerate() {
        let pos = tails.partition_point(|&t| seq[t] < v);
        if pos > 0 {
            prev[i] = Some(tails[pos - 1]);
        }
        if pos == tails.len() {
            tails.push(i);
        } else {
            tails[pos] = i;
        }
    }
    let mut out = Vec::with_capacity(tails.len());
    let mut cur = tails.last().copied();
    while let Some(i) = cur {
        out.push(i);
        cur = prev[i];
    }
    out.reverse();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lis() {
        assert_eq!(longest_increasing_subsequence(&[2, 0, 1]), vec![1, 2]);
        assert_eq!(longest_increasing_subsequence(&[0, 1, 2]), vec![0, 1, 2]);
        assert_eq!(longest_increasing_subsequence(&[3, 2, 1]).len(), 1);
        assert!(longest_increasing_subsequence(&[]).is_empty());
    }

    #[test]
    fn test_unrendered_baseline_yields_nothing() {
        let p = VNode::element("p").with_attr("a", "1");
        let snap = p.snapshot();
        p.set_attr("a", "2");
        assert!(diff(&p, &snap).is_empty());
    }

    #[test]
    fn test_match_children_by_key_then_position() {
        let a = VNode::element("li");
        a.set_key(Some("a".into()));
        let plain = VNode::element("li");
        let old_parent = VNode::element("ul").with_child(a.clone()).with_child(plain.clone());
        let old = old_parent.snapshot();

        let fresh_a = VNode::element("li");
        fresh_a.set_key(Some("a".into()));
        let fresh_plain = VNode::element("li");
        let pairs = match_children(&[fresh_plain, fresh_a], &old.children);
        assert_eq!(pairs, vec![Some(1), Some(0)]);
    }
}
