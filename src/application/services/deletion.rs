//! Deletion coordinator
//!
//! Validate, locate the subtree, apply the children disposition, compact bounds.
//! Logical deletes leave the interval structure in place; compaction happens when
//! the tombstone is purged.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument};

use crate::application::services::mutator::compact;
use crate::application::validation::{self, persisted_key, require_scope, scope_of};
use crate::application::ApplicationResult;
use crate::config::{DeleteStrategy, RestoreStrategy, TreeConfig};
use crate::domain::{
    BoundRange, BulkUpdate, NestedNode, Operation, OrderBy, Predicate, Query, TreeError, TreeId,
    Trashed,
};
use crate::infrastructure::traits::RowStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Tombstone, bounds kept
    Logical,
    /// Rows removed, bounds compacted
    Physical,
}

/// Outcome of a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteReport {
    pub mode: DeleteMode,
    /// Rows removed or trashed
    pub removed: usize,
    /// Children handed over to the deleted node's parent
    pub reparented: usize,
}

impl DeleteReport {
    fn nothing(mode: DeleteMode) -> Self {
        Self {
            mode,
            removed: 0,
            reparented: 0,
        }
    }
}

/// Node removal, purge and restore.
pub struct DeletionCoordinator {
    config: Arc<TreeConfig>,
}

impl DeletionCoordinator {
    pub fn new(config: Arc<TreeConfig>) -> Self {
        Self { config }
    }

    /// Delete `node` with the configured strategy; logical when soft delete is on.
    #[instrument(level = "debug", skip(self, store))]
    pub fn delete<S: RowStore>(&self, store: &mut S, node: &S::Node) -> ApplicationResult<DeleteReport> {
        let mode = if self.config.soft_delete {
            DeleteMode::Logical
        } else {
            DeleteMode::Physical
        };
        self.remove(store, node, mode, self.config.delete_strategy, Operation::Delete)
    }

    /// Physically delete `node` regardless of the soft delete setting.
    #[instrument(level = "debug", skip(self, store))]
    pub fn force_delete<S: RowStore>(
        &self,
        store: &mut S,
        node: &S::Node,
    ) -> ApplicationResult<DeleteReport> {
        self.remove(
            store,
            node,
            DeleteMode::Physical,
            self.config.delete_strategy,
            Operation::ForceDelete,
        )
    }

    /// Physically remove a trashed node, reclaiming its bounds.
    ///
    /// Live nodes are left alone. With the cascade strategy the trashed rows of the
    /// subtree go too, while live descendants move up to the nearest surviving parent.
    #[instrument(level = "debug", skip(self, store))]
    pub fn purge<S: RowStore>(&self, store: &mut S, node: &S::Node) -> ApplicationResult<DeleteReport> {
        let node = validation::fresh(store, node, Operation::Purge)?;
        if !node.is_trashed() {
            debug!("#{} is not trashed, nothing to purge", node.display_key());
            return Ok(DeleteReport::nothing(DeleteMode::Physical));
        }
        match self.config.delete_strategy {
            DeleteStrategy::Cascade => self.purge_subtree(store, &node),
            strategy => self.remove(
                store,
                &node,
                DeleteMode::Physical,
                strategy,
                Operation::Purge,
            ),
        }
    }

    /// Physically remove every trashed row of a tree, one at a time from the right.
    ///
    /// Live children of a purged row move up to its parent.
    #[instrument(level = "debug", skip(self, store))]
    pub fn purge_trashed<S: RowStore>(
        &self,
        store: &mut S,
        tree_id: Option<&TreeId>,
    ) -> ApplicationResult<usize> {
        let scope = require_scope(&self.config, tree_id, Operation::Purge)?;
        let next = Query::new(Predicate::scope(scope.as_ref()))
            .only_trashed()
            .order_by(OrderBy::LeftDesc)
            .limit(1);

        let mut purged = 0;
        while let Some(node) = store.select(&next)?.into_iter().next() {
            purged += self
                .remove(
                    store,
                    &node,
                    DeleteMode::Physical,
                    DeleteStrategy::Reparent,
                    Operation::Purge,
                )?
                .removed;
        }
        debug!("purged {purged} trashed rows");
        Ok(purged)
    }

    /// Clear the tombstone of `node` (and of its trashed descendants with the cascade
    /// strategy). Returns the number of rows restored.
    #[instrument(level = "debug", skip(self, store))]
    pub fn restore<S: RowStore>(&self, store: &mut S, node: &S::Node) -> ApplicationResult<usize> {
        if !self.config.soft_delete {
            return Err(TreeError::SoftDeleteDisabled {
                operation: Operation::Restore,
            }
            .into());
        }
        let mut node = validation::fresh(store, node, Operation::Restore)?;
        if !node.is_trashed() {
            return Ok(0);
        }

        match self.config.restore_strategy {
            RestoreStrategy::SelfOnly => {
                node.set_deleted_at(None);
                store.update(&node)?;
                Ok(1)
            }
            RestoreStrategy::Cascade => {
                let scope = scope_of(&self.config, &node, Operation::Restore)?;
                let subtree = Predicate::scope(scope.as_ref())
                    .and(Predicate::left_between(node.left(), node.right()));
                Ok(store.restore(&subtree)?)
            }
        }
    }

    /// Purge the trashed rows inside `node` from the right, `node` itself last.
    fn purge_subtree<S: RowStore>(
        &self,
        store: &mut S,
        node: &S::Node,
    ) -> ApplicationResult<DeleteReport> {
        let key = persisted_key(node, Operation::Purge)?;
        let scope = scope_of(&self.config, node, Operation::Purge)?;
        let mut report = DeleteReport::nothing(DeleteMode::Physical);

        while let Some(current) = store.find(&key)? {
            let next = Query::new(
                Predicate::scope(scope.as_ref())
                    .and(Predicate::left_between(current.left(), current.right())),
            )
            .only_trashed()
            .order_by(OrderBy::LeftDesc)
            .limit(1);
            let Some(row) = store.select(&next)?.into_iter().next() else {
                break;
            };
            let step = self.remove(
                store,
                &row,
                DeleteMode::Physical,
                DeleteStrategy::Reparent,
                Operation::Purge,
            )?;
            report.removed += step.removed;
            report.reparented += step.reparented;
        }
        Ok(report)
    }

    fn remove<S: RowStore>(
        &self,
        store: &mut S,
        node: &S::Node,
        mode: DeleteMode,
        strategy: DeleteStrategy,
        operation: Operation,
    ) -> ApplicationResult<DeleteReport> {
        let node = validation::fresh(store, node, operation)?;
        let key = persisted_key(&node, operation)?;
        if node.is_root() {
            debug!("rejecting {operation}: #{key} is a root");
            return Err(TreeError::RootDeletion(key.to_string()).into());
        }
        if mode == DeleteMode::Logical && node.is_trashed() {
            debug!("#{key} is already trashed");
            return Ok(DeleteReport::nothing(mode));
        }
        let scope = scope_of(&self.config, &node, operation)?;

        if strategy == DeleteStrategy::Forbid {
            // logical deletes trash the whole interval
            let blocking = match mode {
                DeleteMode::Logical => Query::new(
                    Predicate::scope(scope.as_ref())
                        .and(Predicate::left_between(node.left() + 1, node.right() - 1)),
                )
                .trashed(Trashed::Exclude),
                DeleteMode::Physical => Query::new(
                    Predicate::scope(scope.as_ref()).and(Predicate::ParentIs(Some(key.clone()))),
                )
                .with_trashed(),
            };
            let children = store.select(&blocking)?;
            if !children.is_empty() {
                debug!("rejecting {operation}: #{key} has {} children", children.len());
                return Err(TreeError::HasChildren {
                    node: key.to_string(),
                    children: children.len(),
                }
                .into());
            }
        }

        let report = match (mode, strategy) {
            (DeleteMode::Physical, DeleteStrategy::Reparent) => {
                self.lift_children_physical(store, &node, scope)?
            }
            (DeleteMode::Logical, DeleteStrategy::Reparent) => {
                self.lift_children_logical(store, node, scope)?
            }
            (DeleteMode::Physical, _) => {
                let subtree = Predicate::scope(scope.as_ref())
                    .and(Predicate::left_between(node.left(), node.right()));
                let removed = store.delete(&subtree)?;
                compact(store, scope, node.right() + 1, node.width())?;
                DeleteReport {
                    mode,
                    removed,
                    reparented: 0,
                }
            }
            (DeleteMode::Logical, _) => {
                let subtree = Predicate::scope(scope.as_ref())
                    .and(Predicate::left_between(node.left(), node.right()));
                DeleteReport {
                    mode,
                    removed: store.trash(&subtree, Utc::now())?,
                    reparented: 0,
                }
            }
        };
        debug!("{operation} #{key}: {report:?}");
        Ok(report)
    }

    /// Remove the node row; its descendants shift one bound left and one level up.
    fn lift_children_physical<S: RowStore>(
        &self,
        store: &mut S,
        node: &S::Node,
        scope: Option<TreeId>,
    ) -> ApplicationResult<DeleteReport> {
        let key = persisted_key(node, Operation::Delete)?;
        let children = self.all_children(store, node, scope.as_ref())?;

        let removed = store.delete(&Predicate::Key(key))?;
        store.apply(&BulkUpdate::Translate {
            scope: scope.clone(),
            range: BoundRange::between(node.left() + 1, node.right() - 1),
            delta: -1,
            level_delta: -1,
            tree: None,
        })?;
        compact(store, scope, node.right() + 1, 2)?;

        let reparented = self.reparent(store, children, node.parent().cloned())?;
        Ok(DeleteReport {
            mode: DeleteMode::Physical,
            removed,
            reparented,
        })
    }

    /// Trash the node as a leaf; its descendants move out right behind it, one level up.
    fn lift_children_logical<S: RowStore>(
        &self,
        store: &mut S,
        mut node: S::Node,
        scope: Option<TreeId>,
    ) -> ApplicationResult<DeleteReport> {
        let children = self.all_children(store, &node, scope.as_ref())?;
        let (left, right) = (node.left(), node.right());

        store.apply(&BulkUpdate::Translate {
            scope,
            range: BoundRange::between(left + 1, right - 1),
            delta: 1,
            level_delta: -1,
            tree: None,
        })?;
        node.set_right(left + 1);
        node.set_deleted_at(Some(Utc::now()));
        store.update(&node)?;

        let reparented = self.reparent(store, children, node.parent().cloned())?;
        Ok(DeleteReport {
            mode: DeleteMode::Logical,
            removed: 1,
            reparented,
        })
    }

    fn all_children<S: RowStore>(
        &self,
        store: &S,
        node: &S::Node,
        scope: Option<&TreeId>,
    ) -> ApplicationResult<Vec<<S::Node as NestedNode>::Key>> {
        let key = persisted_key(node, Operation::Delete)?;
        let children = store.select(
            &Query::new(Predicate::scope(scope).and(Predicate::ParentIs(Some(key)))).with_trashed(),
        )?;
        Ok(children.iter().filter_map(|c| c.key().cloned()).collect())
    }

    fn reparent<S: RowStore>(
        &self,
        store: &mut S,
        children: Vec<<S::Node as NestedNode>::Key>,
        parent: Option<<S::Node as NestedNode>::Key>,
    ) -> ApplicationResult<usize> {
        let mut moved = 0;
        for key in children {
            let mut child = store
                .find(&key)?
                .ok_or_else(|| TreeError::NodeNotFound(key.to_string()))?;
            child.set_parent(parent.clone());
            store.update(&child)?;
            moved += 1;
        }
        Ok(moved)
    }
}
