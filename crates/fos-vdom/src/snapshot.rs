//! Virtual tree snapshots
//!
//! A snapshot is plain data. It shares no node identity with the live tree
//! apart from a weak link back to the node it was taken from, which patching
//! uses to unmount nodes that disappeared.

use std::cell::RefCell;
use std::rc::Weak;

use fos_dom::NodeId;

use crate::vnode::VNodeData;
use crate::{VKind, VNode};

/// Deep structural clone of a virtual subtree
#[derive(Debug, Clone)]
pub struct VSnapshot {
    pub id: u64,
    pub kind: VKind,
    pub attrs: Vec<(Box<str>, String)>,
    pub children: Vec<VSnapshot>,
    pub dom: Option<NodeId>,
    pub key: Option<String>,
    pub cache: bool,
    pub present: bool,
    origin: Weak<RefCell<VNodeData>>,
}

impl VSnapshot {
    pub(crate) fn capture(node: &VNode) -> Self {
        let data = node.data();
        Self {
            id: data.id,
            kind: data.kind.clone(),
            attrs: data.attrs.clone(),
            children: data.children.iter().map(VSnapshot::capture).collect(),
            dom: data.dom,
            key: data.key.clone(),
            cache: data.cache,
            present: data.present,
            origin: node.downgrade(),
        }
    }

    /// The live node this snapshot was taken from, if it still exists
    pub fn origin(&self) -> Option<VNode> {
        VNode::from_weak(&self.origin)
    }

    /// Whether the node was rendered when the snapshot was taken
    pub fn is_rendered(&self) -> bool {
        self.present && self.dom.is_some()
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(n, _)| &**n == name).map(|(_, v)| v.as_str())
    }

    /// Number of nodes in the snapshot
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(VSnapshot::size).sum::<usize>()
    }
}
