//! Reference table
//!
//! Maps `:ref` names to the virtual nodes that declared them. Nodes are held
//! weakly and resolved on every query, so a name whose node was hidden,
//! unmounted or dropped reads as undefined instead of a stale DOM node.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use fos_dom::NodeId;
use fos_reactive::Value;
use fos_vdom::{VNode, WeakVNode};

/// Live handle behind a reference
#[derive(Debug, Clone)]
pub enum RefTarget {
    /// A mounted element
    Node(NodeId),
    /// A component's action object
    Component(Value),
}

impl RefTarget {
    pub fn node(&self) -> Option<NodeId> {
        match self {
            RefTarget::Node(id) => Some(*id),
            RefTarget::Component(_) => None,
        }
    }

    pub fn component(&self) -> Option<&Value> {
        match self {
            RefTarget::Component(value) => Some(value),
            RefTarget::Node(_) => None,
        }
    }
}

impl PartialEq for RefTarget {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RefTarget::Node(a), RefTarget::Node(b)) => a == b,
            (RefTarget::Component(a), RefTarget::Component(b)) => a.same(b),
            _ => false,
        }
    }
}

/// Result of a reference lookup
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Reference {
    #[default]
    Undefined,
    Single(RefTarget),
    List(Vec<RefTarget>),
}

impl Reference {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Reference::Undefined)
    }

    /// Number of live targets
    pub fn len(&self) -> usize {
        match self {
            Reference::Undefined => 0,
            Reference::Single(_) => 1,
            Reference::List(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&RefTarget> {
        match self {
            Reference::Single(target) if index == 0 => Some(target),
            Reference::List(items) => items.get(index),
            _ => None,
        }
    }

    /// The single target's DOM node
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Reference::Single(target) => target.node(),
            _ => None,
        }
    }

    /// DOM nodes of every target, in order
    pub fn nodes(&self) -> Vec<NodeId> {
        match self {
            Reference::Undefined => Vec::new(),
            Reference::Single(target) => target.node().into_iter().collect(),
            Reference::List(items) => items.iter().filter_map(RefTarget::node).collect(),
        }
    }
}

enum Entry {
    Single(WeakVNode),
    List(Vec<WeakVNode>),
}

fn target_of(node: &VNode) -> Option<RefTarget> {
    node.dom()?;
    Some(match node.component() {
        Some(component) => RefTarget::Component(component),
        None => RefTarget::Node(node.dom()?),
    })
}

/// Per-module name to node map
///
/// Cloning yields another handle to the same table.
#[derive(Clone, Default)]
pub struct ReferenceTable {
    entries: Rc<RefCell<HashMap<String, Entry>>>,
}

impl std::fmt::Debug for ReferenceTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceTable").field("names", &self.names()).finish()
    }
}

impl ReferenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` is bound to a node other than `node`
    pub fn is_taken(&self, name: &str, node: &VNode) -> bool {
        match self.entries.borrow().get(name) {
            Some(Entry::Single(weak)) => weak.upgrade().is_some_and(|n| !n.ptr_eq(node)),
            Some(Entry::List(_)) => true,
            None => false,
        }
    }

    /// Bind `name` to a single node
    pub fn set_single(&self, name: &str, node: &VNode) {
        self.entries.borrow_mut().insert(name.to_string(), Entry::Single(node.weak()));
    }

    /// Bind `name` to an ordered list of nodes, replacing any previous list
    pub fn set_list(&self, name: &str, nodes: &[VNode]) {
        let list = nodes.iter().map(VNode::weak).collect();
        self.entries.borrow_mut().insert(name.to_string(), Entry::List(list));
    }

    /// Append `node` to the list bound to `name`
    pub fn push(&self, name: &str, node: &VNode) {
        let mut entries = self.entries.borrow_mut();
        let entry = entries.entry(name.to_string()).or_insert_with(|| Entry::List(Vec::new()));
        match entry {
            Entry::List(list) => list.push(node.weak()),
            Entry::Single(_) => *entry = Entry::List(vec![node.weak()]),
        }
    }

    /// Reorder the list bound to `name` to follow `order`
    ///
    /// A node ranks by the first `order` entry that contains it. Nodes outside
    /// every entry keep their slots.
    pub fn order_list(&self, name: &str, order: &[VNode]) {
        let rank: HashMap<u64, usize> = order.iter().enumerate().map(|(i, n)| (n.id(), i)).collect();
        let mut entries = self.entries.borrow_mut();
        let Some(Entry::List(list)) = entries.get_mut(name) else { return };

        let mut slots = Vec::new();
        let mut inside = Vec::new();
        for (slot, weak) in list.iter().enumerate() {
            let Some(node) = weak.upgrade() else { continue };
            let mut cur = Some(node);
            while let Some(n) = cur {
                if let Some(&r) = rank.get(&n.id()) {
                    slots.push(slot);
                    inside.push((r, weak.clone()));
                    break;
                }
                cur = n.parent();
            }
        }
        inside.sort_by_key(|(r, _)| *r);
        for (slot, (_, weak)) in slots.into_iter().zip(inside) {
            list[slot] = weak;
        }
    }

    /// Drop `node` from every entry
    pub fn prune(&self, node: &VNode) {
        let mut entries = self.entries.borrow_mut();
        entries.retain(|_, entry| match entry {
            Entry::Single(weak) => weak.upgrade().is_some_and(|n| !n.ptr_eq(node)),
            Entry::List(list) => {
                list.retain(|weak| weak.upgrade().is_some_and(|n| !n.ptr_eq(node)));
                true
            }
        });
    }

    pub fn remove(&self, name: &str) -> bool {
        self.entries.borrow_mut().remove(name).is_some()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    /// Declared names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolve `name` against the current mount state
    ///
    /// Lists collapse to a single target when exactly one item is live and
    /// to undefined when none is.
    pub fn get(&self, name: &str) -> Reference {
        let entries = self.entries.borrow();
        match entries.get(name) {
            None => Reference::Undefined,
            Some(Entry::Single(weak)) => weak.upgrade()
                .and_then(|node| target_of(&node))
                .map(Reference::Single)
                .unwrap_or_default(),
            Some(Entry::List(list)) => {
                let mut live: Vec<RefTarget> = list.iter()
                    .filter_map(WeakVNode::upgrade)
                    .filter_map(|node| target_of(&node))
                    .collect();
                match live.len() {
                    0 => Reference::Undefined,
                    1 => live.pop().map(Reference::Single).unwrap_or_default(),
                    _ => Reference::List(live),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fos_dom::Document;
    use fos_vdom::render;

    fn mounted(doc: &Document, tag: &str) -> VNode {
        let node = VNode::element(tag);
        render(doc, &node).unwrap();
        node
    }

    #[test]
    fn test_single_follows_mount_state() {
        let doc = Document::new();
        let refs = ReferenceTable::new();
        let p = VNode::element("p");
        refs.set_single("r", &p);
        assert!(refs.get("r").is_undefined());

        let dom = render(&doc, &p).unwrap();
        assert_eq!(refs.get("r").node(), Some(dom));

        p.unmount();
        assert!(refs.get("r").is_undefined());
        assert!(refs.get("other").is_undefined());
    }

    #[test]
    fn test_list_collapses() {
        let doc = Document::new();
        let refs = ReferenceTable::new();
        let items = vec![mounted(&doc, "li"), mounted(&doc, "li"), mounted(&doc, "li")];
        refs.set_list("items", &items);
        assert_eq!(refs.get("items").len(), 3);
        assert_eq!(refs.get("items").nodes(), items.iter().filter_map(VNode::dom).collect::<Vec<_>>());

        items[0].unmount();
        items[1].unmount();
        assert!(matches!(refs.get("items"), Reference::Single(_)));

        refs.prune(&items[2]);
        assert!(refs.get("items").is_undefined());
    }

    #[test]
    fn test_component_target() {
        let doc = Document::new();
        let refs = ReferenceTable::new();
        let comp = mounted(&doc, "x-comp");
        let action = Value::from("action");
        comp.set_component(Some(action.clone()));
        refs.set_single("c", &comp);

        let Reference::Single(target) = refs.get("c") else { panic!("expected single") };
        assert!(target.component().is_some_and(|v| v.same(&action)));
    }

    #[test]
    fn test_order_list_follows_items() {
        let doc = Document::new();
        let refs = ReferenceTable::new();
        let items: Vec<VNode> = (0..3).map(|_| VNode::element("li").with_child(VNode::element("span"))).collect();
        let outside = mounted(&doc, "span");
        for item in &items {
            render(&doc, item).unwrap();
        }
        let cells: Vec<VNode> = items.iter().filter_map(VNode::first_child).collect();
        refs.push("cell", &cells[1]);
        refs.push("cell", &outside);
        refs.push("cell", &cells[2]);
        refs.push("cell", &cells[0]);

        refs.order_list("cell", &items);
        let expected = vec![cells[0].dom(), outside.dom(), cells[1].dom(), cells[2].dom()];
        assert_eq!(refs.get("cell").nodes(), expected.into_iter().flatten().collect::<Vec<_>>());

        refs.order_list("missing", &items);
        assert!(refs.get("missing").is_undefined());
    }

    #[test]
    fn test_is_taken_and_dropped_nodes() {
        let refs = ReferenceTable::new();
        let a = VNode::element("p");
        refs.set_single("r", &a);
        assert!(!refs.is_taken("r", &a));
        assert!(refs.is_taken("r", &VNode::element("p")));

        drop(a);
        assert!(!refs.is_taken("r", &VNode::element("p")));
        assert_eq!(refs.names(), vec!["r".to_string()]);
    }
}
