//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::entities::{FieldType, Operation};

/// Tree invariant violations.
///
/// Every variant is raised before the first write of an operation, so a failed
/// operation leaves the store untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("node must be persisted before {operation}")]
    UnsavedNode { operation: Operation },

    #[error("cannot {operation} node #{node} relative to #{target}: target is the node or one of its descendants")]
    Cycle {
        operation: Operation,
        node: String,
        target: String,
    },

    #[error("cannot delete root node #{0}")]
    RootDeletion(String),

    #[error("node #{node} has {children} children and the delete strategy forbids removing it")]
    HasChildren { node: String, children: usize },

    #[error("can not create more than one root, existing root: #{existing}")]
    UniqueRoot { existing: String },

    #[error("unsupported field type for tree id generation: {0}")]
    UnsupportedFieldType(FieldType),

    #[error("multi-tree mode needs a tree id to {operation}")]
    TreeScopeRequired { operation: Operation },

    #[error("soft delete is not enabled, cannot {operation}")]
    SoftDeleteDisabled { operation: Operation },

    #[error("node not found: #{0}")]
    NodeNotFound(String),
}
