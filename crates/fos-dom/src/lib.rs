//! fOS DOM - Document Object Model
//!
//! Arena-backed DOM tree used as the render target of the view layer.
//!
//! The document owns every real node. Callers (virtual nodes, reference
//! tables) only ever hold [`NodeId`]s, which are plain lookups into the
//! arena and never keep a node alive.

mod node;
mod tree;
mod document;
mod operations;
mod dom_events;

pub use node::{Attribute, ElementData, Node, NodeData, TextData};
pub use tree::{Children, DomTree};
pub use document::Document;
pub use operations::{DomError, DomResult, MutationRecord, MutationType};
pub use dom_events::{DomEvent, EventListener};

/// Node identifier (index into arena)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Root node ID
    pub const ROOT: NodeId = NodeId(0);

    /// Sentinel for "no node"
    pub const NONE: NodeId = NodeId(u32::MAX);

    /// Check that this is not the sentinel
    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::NONE
    }

    /// Raw arena index
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }

    #[inline]
    pub(crate) fn option(self) -> Option<NodeId> {
        if self.is_valid() { Some(self) } else { None }
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
