//! Bounds mutator
//!
//! Computes and applies left/right/level/parent rewrites for insertions and moves.
//! Every structural change is expressed as at most three bulk range updates: open a
//! gap at the target position, translate the moved rows into it, close the gap left
//! behind.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::application::services::tree_id::TreeIdGenerator;
use crate::application::validation::{self, ensure_no_cycle, ensure_unique_root, scope_of};
use crate::application::ApplicationResult;
use crate::config::TreeConfig;
use crate::domain::{
    BoundRange, BulkUpdate, NestedNode, Operation, OrderBy, Placement, Predicate, Query, TreeError,
    TreeId,
};
use crate::infrastructure::traits::RowStore;

/// Landing spot of a node relative to a target.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Anchor<K> {
    position: i64,
    parent: Option<K>,
    level: i64,
}

impl<K: Clone> Anchor<K> {
    fn resolve<N: NestedNode<Key = K>>(target: &N, key: K, placement: Placement) -> Self {
        match placement {
            Placement::Prepend => Self {
                position: target.left() + 1,
                parent: Some(key),
                level: target.level() + 1,
            },
            Placement::Append => Self {
                position: target.right(),
                parent: Some(key),
                level: target.level() + 1,
            },
            Placement::Before => Self {
                position: target.left(),
                parent: target.parent().cloned(),
                level: target.level(),
            },
            Placement::After => Self {
                position: target.right() + 1,
                parent: target.parent().cloned(),
                level: target.level(),
            },
        }
    }
}

/// Insert and move operations.
pub struct BoundsMutator {
    config: Arc<TreeConfig>,
    generator: Option<TreeIdGenerator>,
}

impl BoundsMutator {
    /// Fails when the configured tree id type has no generator.
    pub fn new(config: Arc<TreeConfig>) -> Result<Self, TreeError> {
        let generator = config
            .tree_id
            .map(TreeIdGenerator::for_field)
            .transpose()?;
        Ok(Self { config, generator })
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Turn `node` into a root.
    ///
    /// An unsaved node is inserted as a new root: in multi-tree mode into its own
    /// tree id (generated when missing), otherwise to the right of every existing
    /// node. A persisted non-root node is detached with its subtree; in multi-tree
    /// mode it moves into a freshly generated tree.
    #[instrument(level = "debug", skip(self, store))]
    pub fn make_root<S: RowStore>(&self, store: &mut S, node: S::Node) -> ApplicationResult<S::Node> {
        if !node.is_persisted() {
            return self.insert_root(store, node);
        }

        let node = validation::fresh(store, &node, Operation::MakeRoot)?;
        if node.is_root() {
            debug!("#{} is already a root", node.display_key());
            return Ok(node);
        }

        if self.config.is_multi_tree() {
            let tree_id = self.generate_tree_id(store)?;
            return self.relocate(store, &node, Some(tree_id), 1, 0, None);
        }

        let key = validation::persisted_key(&node, Operation::MakeRoot)?;
        ensure_unique_root(store, &self.config, None, Some(&key))?;
        let position = max_right(store, None)? + 1;
        self.relocate(store, &node, None, position, 0, None)
    }

    /// Insert or move `node` as the first child of `parent`.
    pub fn prepend_to<S: RowStore>(
        &self,
        store: &mut S,
        parent: &S::Node,
        node: S::Node,
    ) -> ApplicationResult<S::Node> {
        self.place(store, parent, node, Placement::Prepend)
    }

    /// Insert or move `node` as the last child of `parent`.
    pub fn append_to<S: RowStore>(
        &self,
        store: &mut S,
        parent: &S::Node,
        node: S::Node,
    ) -> ApplicationResult<S::Node> {
        self.place(store, parent, node, Placement::Append)
    }

    /// Insert or move `node` as the sibling directly left of `sibling`.
    pub fn insert_before<S: RowStore>(
        &self,
        store: &mut S,
        sibling: &S::Node,
        node: S::Node,
    ) -> ApplicationResult<S::Node> {
        self.place(store, sibling, node, Placement::Before)
    }

    /// Insert or move `node` as the sibling directly right of `sibling`.
    pub fn insert_after<S: RowStore>(
        &self,
        store: &mut S,
        sibling: &S::Node,
        node: S::Node,
    ) -> ApplicationResult<S::Node> {
        self.place(store, sibling, node, Placement::After)
    }

    /// Insert `node` relative to `target`, or move it there when already persisted.
    #[instrument(level = "debug", skip(self, store))]
    pub fn place<S: RowStore>(
        &self,
        store: &mut S,
        target: &S::Node,
        node: S::Node,
        placement: Placement,
    ) -> ApplicationResult<S::Node> {
        if node.is_persisted() {
            return self.move_to(store, &node, target, placement);
        }

        let operation = placement.operation();
        let target = validation::fresh(store, target, operation)?;
        let target_key = validation::persisted_key(&target, operation)?;
        let scope = scope_of(&self.config, &target, operation)?;
        if target.is_root() && matches!(placement, Placement::Before | Placement::After) {
            ensure_unique_root(store, &self.config, scope.as_ref(), None)?;
        }

        let anchor = Anchor::resolve(&target, target_key, placement);
        debug!(
            "{operation}: opening gap of 2 at {} next to #{}",
            anchor.position,
            target.display_key()
        );
        store.apply(&BulkUpdate::ShiftBounds {
            scope: scope.clone(),
            range: BoundRange::starting_at(anchor.position),
            delta: 2,
        })?;

        let mut node = node;
        node.set_left(anchor.position);
        node.set_right(anchor.position + 1);
        node.set_level(anchor.level);
        node.set_parent(anchor.parent);
        node.set_tree_id(target.tree_id().cloned());
        Ok(store.insert(node)?)
    }

    /// Move a persisted node with its subtree next to or under `target`.
    ///
    /// Targets inside the node's own subtree are rejected before any write. Moving a
    /// node onto the position it already occupies writes nothing.
    #[instrument(level = "debug", skip(self, store))]
    pub fn move_to<S: RowStore>(
        &self,
        store: &mut S,
        node: &S::Node,
        target: &S::Node,
        placement: Placement,
    ) -> ApplicationResult<S::Node> {
        let operation = placement.operation();
        let node = validation::fresh(store, node, operation)?;
        let target = validation::fresh(store, target, operation)?;
        let key = validation::persisted_key(&node, operation)?;
        let target_key = validation::persisted_key(&target, operation)?;

        ensure_no_cycle(&node, &target, operation)?;
        scope_of(&self.config, &node, operation)?;
        let target_scope = scope_of(&self.config, &target, operation)?;
        if target.is_root() && matches!(placement, Placement::Before | Placement::After) {
            ensure_unique_root(store, &self.config, target_scope.as_ref(), Some(&key))?;
        }

        let anchor = Anchor::resolve(&target, target_key, placement);
        self.relocate(
            store,
            &node,
            target_scope,
            anchor.position,
            anchor.level,
            anchor.parent,
        )
    }

    fn insert_root<S: RowStore>(&self, store: &mut S, mut node: S::Node) -> ApplicationResult<S::Node> {
        let scope = if self.config.is_multi_tree() {
            let tree_id = match node.tree_id() {
                Some(id) => id.clone(),
                None => self.generate_tree_id(store)?,
            };
            Some(tree_id)
        } else {
            None
        };
        ensure_unique_root(store, &self.config, scope.as_ref(), None)?;

        let left = max_right(store, scope.as_ref())? + 1;
        debug!("inserting root at [{left}, {}]", left + 1);
        node.set_left(left);
        node.set_right(left + 1);
        node.set_level(0);
        node.set_parent(None);
        if scope.is_some() {
            node.set_tree_id(scope);
        }
        Ok(store.insert(node)?)
    }

    fn generate_tree_id<S: RowStore>(&self, store: &S) -> ApplicationResult<TreeId> {
        match self.generator {
            Some(generator) => generator.generate(store),
            None => Err(TreeError::TreeScopeRequired {
                operation: Operation::MakeRoot,
            }
            .into()),
        }
    }

    /// Move the subtree of `node` so its left bound lands on `position` in `target_scope`.
    ///
    /// `position` is expressed in the bounds as they are before the move.
    fn relocate<S: RowStore>(
        &self,
        store: &mut S,
        node: &S::Node,
        target_scope: Option<TreeId>,
        position: i64,
        level: i64,
        parent: Option<<S::Node as NestedNode>::Key>,
    ) -> ApplicationResult<S::Node> {
        let key = validation::persisted_key(node, Operation::MoveTo)?;
        let source_scope = node.tree_id().cloned().filter(|_| self.config.is_multi_tree());
        let width = node.width();
        let level_delta = level - node.level();
        let (mut left, mut right) = (node.left(), node.right());

        if source_scope == target_scope {
            if position == left || position == right + 1 {
                debug!("#{key} already sits at {position}, bounds unchanged");
                if level_delta != 0 {
                    store.apply(&BulkUpdate::Translate {
                        scope: source_scope.clone(),
                        range: BoundRange::between(left, right),
                        delta: 0,
                        level_delta,
                        tree: None,
                    })?;
                }
            } else {
                debug!("moving #{key} [{left}, {right}] to {position}, width {width}");
                store.apply(&BulkUpdate::ShiftBounds {
                    scope: target_scope.clone(),
                    range: BoundRange::starting_at(position),
                    delta: width,
                })?;
                if left >= position {
                    left += width;
                    right += width;
                }
                store.apply(&BulkUpdate::Translate {
                    scope: source_scope.clone(),
                    range: BoundRange::between(left, right),
                    delta: position - left,
                    level_delta,
                    tree: None,
                })?;
                compact(store, source_scope.clone(), right + 1, width)?;
            }
        } else {
            debug!(
                "moving #{key} [{left}, {right}] into tree {:?} at {position}",
                target_scope
            );
            store.apply(&BulkUpdate::ShiftBounds {
                scope: target_scope.clone(),
                range: BoundRange::starting_at(position),
                delta: width,
            })?;
            store.apply(&BulkUpdate::Translate {
                scope: source_scope.clone(),
                range: BoundRange::between(left, right),
                delta: position - left,
                level_delta,
                tree: target_scope.clone(),
            })?;
            compact(store, source_scope, right + 1, width)?;
        }

        let mut moved = store
            .find(&key)?
            .ok_or_else(|| TreeError::NodeNotFound(key.to_string()))?;
        if moved.parent() != parent.as_ref() {
            moved.set_parent(parent);
            store.update(&moved)?;
        }
        Ok(moved)
    }
}

/// Close a vacated gap of `width` bound values starting at `from`.
pub(crate) fn compact<S: RowStore>(
    store: &mut S,
    scope: Option<TreeId>,
    from: i64,
    width: i64,
) -> ApplicationResult<usize> {
    let changed = store.apply(&BulkUpdate::ShiftBounds {
        scope,
        range: BoundRange::starting_at(from),
        delta: -width,
    })?;
    debug!("compacted {changed} rows from {from} by {width}");
    Ok(changed)
}

/// Largest right bound in `scope`, `0` when the scope is empty.
pub(crate) fn max_right<S: RowStore>(store: &S, scope: Option<&TreeId>) -> ApplicationResult<i64> {
    let last = store.select(
        &Query::new(Predicate::scope(scope))
            .with_trashed()
            .order_by(OrderBy::RightDesc)
            .limit(1),
    )?;
    Ok(last.first().map_or(0, |n| n.right()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Row;
    use crate::infrastructure::MemoryStore;

    fn mutator() -> BoundsMutator {
        BoundsMutator::new(Arc::new(TreeConfig::default())).unwrap()
    }

    #[test]
    fn given_empty_store_when_making_root_then_bounds_start_at_one() {
        let mut store = MemoryStore::<Row>::new();
        let root = mutator().make_root(&mut store, Row::new("root")).unwrap();
        assert_eq!(root.bounds(), (1, 2));
        assert_eq!(root.level, 0);
    }

    #[test]
    fn given_root_when_prepending_then_child_is_leftmost() {
        let mut store = MemoryStore::<Row>::new();
        let m = mutator();
        let root = m.make_root(&mut store, Row::new("r")).unwrap();
        m.append_to(&mut store, &root, Row::new("a")).unwrap();
        let c = m.prepend_to(&mut store, &root, Row::new("c")).unwrap();

        assert_eq!(c.bounds(), (2, 3));
        let a = store.find(&2).unwrap().unwrap();
        assert_eq!(a.bounds(), (4, 5));
        assert_eq!(store.find(&1).unwrap().unwrap().bounds(), (1, 6));
    }

    #[test]
    fn given_node_at_its_position_when_moving_there_then_no_writes() {
        let mut store = MemoryStore::<Row>::new();
        let m = mutator();
        let root = m.make_root(&mut store, Row::new("r")).unwrap();
        let a = m.append_to(&mut store, &root, Row::new("a")).unwrap();
        let b = m.append_to(&mut store, &root, Row::new("b")).unwrap();

        store.fail_after_writes(0);
        let moved = m.insert_after(&mut store, &a, b.clone()).unwrap();
        assert_eq!(moved, b);
    }

    #[test]
    fn given_unsupported_tree_id_type_when_constructing_then_fails() {
        let config = TreeConfig::multi_tree(crate::domain::FieldType::String);
        assert!(matches!(
            BoundsMutator::new(Arc::new(config)),
            Err(TreeError::UnsupportedFieldType(_))
        ));
    }
}
