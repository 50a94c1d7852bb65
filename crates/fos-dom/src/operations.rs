//! DOM Node Operations
//!
//! Error type for node manipulation and the mutation records every write
//! leaves behind.

use crate::NodeId;

/// Result type for DOM operations
pub type DomResult<T> = Result<T, DomError>;

/// DOM operation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// Node not found
    #[error("node {0} not found")]
    NotFound(NodeId),
    /// Hierarchy error (e.g., inserting ancestor)
    #[error("hierarchy request error: {child} cannot be inserted into {parent}")]
    HierarchyRequest { parent: NodeId, child: NodeId },
    /// Invalid node type for the operation
    #[error("invalid node type for {op} on {node}")]
    InvalidNodeType { op: &'static str, node: NodeId },
    /// Node is not a child
    #[error("{child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },
}

/// Mutation type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationType {
    Attributes,
    CharacterData,
    ChildList,
}

/// Mutation record
///
/// A node relocated with `insert_before` while still attached shows up as a
/// single child-list record whose `added_nodes` and `moved` flag are set,
/// never as a separate removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub mutation_type: MutationType,
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
    pub moved: bool,
    pub attribute_name: Option<String>,
    pub old_value: Option<String>,
}

impl MutationRecord {
    pub(crate) fn child_added(parent: NodeId, child: NodeId, moved: bool) -> Self {
        Self {
            mutation_type: MutationType::ChildList,
            target: parent,
            added_nodes: vec![child],
            removed_nodes: Vec::new(),
            moved,
            attribute_name: None,
            old_value: None,
        }
    }

    pub(crate) fn child_removed(parent: NodeId, child: NodeId) -> Self {
        Self {
            mutation_type: MutationType::ChildList,
            target: parent,
            added_nodes: Vec::new(),
            removed_nodes: vec![child],
            moved: false,
            attribute_name: None,
            old_value: None,
        }
    }

    pub(crate) fn attribute(target: NodeId, name: &str, old_value: Option<String>) -> Self {
        Self {
            mutation_type: MutationType::Attributes,
            target,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            moved: false,
            attribute_name: Some(name.to_string()),
            old_value,
        }
    }

    pub(crate) fn character_data(target: NodeId, old_value: String) -> Self {
        Self {
            mutation_type: MutationType::CharacterData,
            target,
            added_nodes: Vec::new(),
            removed_nodes: Vec::new(),
            moved: false,
            attribute_name: None,
            old_value: Some(old_value),
        }
    }

    /// Whether this record describes a pure relocation
    pub fn is_move(&self) -> bool {
        self.moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomError::NotAChild { parent: NodeId(1), child: NodeId(7) };
        assert_eq!(err.to_string(), "#7 is not a child of #1");
    }

    #[test]
    fn test_move_record() {
        let rec = MutationRecord::child_added(NodeId(0), NodeId(3), true);
        assert!(rec.is_move());
        assert_eq!(rec.mutation_type, MutationType::ChildList);
        assert!(rec.removed_nodes.is_empty());
    }
}
