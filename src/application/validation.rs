//! Precondition checks shared by the structural services
//!
//! Every check here runs before the first write of an operation.

use tracing::debug;

use crate::application::ApplicationResult;
use crate::config::TreeConfig;
use crate::domain::{NestedNode, Operation, Predicate, Query, TreeError, TreeId};
use crate::infrastructure::traits::RowStore;

/// Key of a persisted node, or `UnsavedNode`.
pub fn persisted_key<N: NestedNode>(node: &N, operation: Operation) -> Result<N::Key, TreeError> {
    node.key().cloned().ok_or_else(|| {
        debug!("rejecting {operation}: node has no key");
        TreeError::UnsavedNode { operation }
    })
}

/// Re-read a persisted node so its bounds are current.
pub fn fresh<S: RowStore>(store: &S, node: &S::Node, operation: Operation) -> ApplicationResult<S::Node> {
    let key = persisted_key(node, operation)?;
    store
        .find(&key)?
        .ok_or_else(|| TreeError::NodeNotFound(key.to_string()).into())
}

/// Tree scope of a node: its tree id in multi-tree mode, the implicit single scope otherwise.
pub fn scope_of<N: NestedNode>(
    config: &TreeConfig,
    node: &N,
    operation: Operation,
) -> Result<Option<TreeId>, TreeError> {
    require_scope(config, node.tree_id(), operation)
}

/// Multi-tree mode needs an explicit tree id; single-tree mode ignores it.
pub fn require_scope(
    config: &TreeConfig,
    tree_id: Option<&TreeId>,
    operation: Operation,
) -> Result<Option<TreeId>, TreeError> {
    if !config.is_multi_tree() {
        return Ok(None);
    }
    match tree_id {
        Some(id) => Ok(Some(id.clone())),
        None => {
            debug!("rejecting {operation}: no tree id in multi-tree mode");
            Err(TreeError::TreeScopeRequired { operation })
        }
    }
}

/// The target must be neither the node nor inside the node's subtree.
pub fn ensure_no_cycle<N: NestedNode>(
    node: &N,
    target: &N,
    operation: Operation,
) -> Result<(), TreeError> {
    let same_node = node.key().is_some() && node.key() == target.key();
    let inside = node.tree_id() == target.tree_id()
        && node.left() <= target.left()
        && target.left() <= node.right();

    if same_node || inside {
        debug!(
            "rejecting {operation}: #{} relative to #{} would create a cycle",
            node.display_key(),
            target.display_key()
        );
        return Err(TreeError::Cycle {
            operation,
            node: node.display_key(),
            target: target.display_key(),
        });
    }
    Ok(())
}

/// A new root may join `scope` only if the scope has none or multiple roots are allowed.
///
/// `moving` is the key of an existing node becoming a root; it does not count
/// against itself.
pub fn ensure_unique_root<S: RowStore>(
    store: &S,
    config: &TreeConfig,
    scope: Option<&TreeId>,
    moving: Option<&<S::Node as NestedNode>::Key>,
) -> ApplicationResult<()> {
    if config.allow_multiple_roots {
        return Ok(());
    }

    let mut filter = Predicate::scope(scope).and(Predicate::ParentIs(None));
    if let Some(key) = moving {
        filter = filter.and(Predicate::Key(key.clone()).negate());
    }
    let existing = store.select(&Query::new(filter).with_trashed().limit(1))?;

    match existing.first() {
        Some(root) => {
            debug!("rejecting new root: #{} already exists", root.display_key());
            Err(TreeError::UniqueRoot {
                existing: root.display_key(),
            }
            .into())
        }
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FieldType, Row};

    fn node(id: u64, left: i64, right: i64) -> Row {
        Row {
            id: Some(id),
            left,
            right,
            ..Row::new(format!("n{id}"))
        }
    }

    #[test]
    fn given_unsaved_node_when_requiring_key_then_validation_error() {
        let err = persisted_key(&Row::new("x"), Operation::MoveTo).unwrap_err();
        assert_eq!(
            err,
            TreeError::UnsavedNode {
                operation: Operation::MoveTo
            }
        );
    }

    #[test]
    fn given_target_inside_subtree_when_checking_cycle_then_rejected() {
        let parent = node(1, 2, 9);
        let grandchild = node(3, 4, 5);
        let outside = node(4, 10, 11);

        assert!(ensure_no_cycle(&parent, &grandchild, Operation::AppendTo).is_err());
        assert!(ensure_no_cycle(&parent, &parent, Operation::AppendTo).is_err());
        assert!(ensure_no_cycle(&parent, &outside, Operation::AppendTo).is_ok());
    }

    #[test]
    fn given_multi_tree_without_tree_id_when_requiring_scope_then_scope_required() {
        let config = TreeConfig::multi_tree(FieldType::UnsignedInteger);
        let err = require_scope(&config, None, Operation::Query).unwrap_err();
        assert_eq!(
            err,
            TreeError::TreeScopeRequired {
                operation: Operation::Query
            }
        );
        let single = TreeConfig::default();
        assert_eq!(require_scope(&single, None, Operation::Query), Ok(None));
    }
}
