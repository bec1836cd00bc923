//! Tree integrity check and rebuild
//!
//! `check` compares the stored bounds with the structure they are supposed to
//! encode; `rebuild` recomputes bounds and levels from parent references, the
//! recovery path for trees damaged outside the engine.

use std::sync::Arc;

use itertools::Itertools;
use tracing::{debug, instrument, warn};

use crate::application::validation::require_scope;
use crate::application::ApplicationResult;
use crate::config::TreeConfig;
use crate::domain::{NestedNode, Operation, Predicate, Query, TreeArena, TreeId};
use crate::infrastructure::traits::{NodeKey, RowStore};

/// Findings of an integrity check over one tree scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport<K> {
    /// Rows with `left >= right`
    pub invalid_bounds: Vec<K>,
    /// Bound values used more than once
    pub duplicate_bounds: Vec<i64>,
    /// Bound values missing from the sequence starting at 1
    pub missing_bounds: Vec<i64>,
    /// Rows whose parent reference disagrees with the nearest enclosing interval
    pub wrong_parent: Vec<K>,
    /// Rows whose level disagrees with their interval depth
    pub wrong_level: Vec<K>,
}

impl<K> Default for IntegrityReport<K> {
    fn default() -> Self {
        Self {
            invalid_bounds: Vec::new(),
            duplicate_bounds: Vec::new(),
            missing_bounds: Vec::new(),
            wrong_parent: Vec::new(),
            wrong_level: Vec::new(),
        }
    }
}

impl<K> IntegrityReport<K> {
    pub fn is_clean(&self) -> bool {
        self.invalid_bounds.is_empty()
            && self.duplicate_bounds.is_empty()
            && self.missing_bounds.is_empty()
            && self.wrong_parent.is_empty()
            && self.wrong_level.is_empty()
    }
}

pub struct IntegrityService {
    config: Arc<TreeConfig>,
}

impl IntegrityService {
    pub fn new(config: Arc<TreeConfig>) -> Self {
        Self { config }
    }

    fn scope_rows<S: RowStore>(
        &self,
        store: &S,
        tree_id: Option<&TreeId>,
        operation: Operation,
    ) -> ApplicationResult<Vec<S::Node>> {
        let scope = require_scope(&self.config, tree_id, operation)?;
        Ok(store.select(&Query::new(Predicate::scope(scope.as_ref())).with_trashed())?)
    }

    /// Inspect every row of a tree scope, trashed rows included.
    #[instrument(level = "debug", skip(self, store))]
    pub fn check<S: RowStore>(
        &self,
        store: &S,
        tree_id: Option<&TreeId>,
    ) -> ApplicationResult<IntegrityReport<NodeKey<S>>> {
        let rows = self.scope_rows(store, tree_id, Operation::Query)?;
        let mut report = IntegrityReport::default();

        report.invalid_bounds = rows
            .iter()
            .filter(|r| r.left() >= r.right())
            .filter_map(|r| r.key().cloned())
            .collect();

        let counts = rows
            .iter()
            .flat_map(|r| [r.left(), r.right()])
            .counts();
        report.duplicate_bounds = counts
            .iter()
            .filter(|(_, &n)| n > 1)
            .map(|(&bound, _)| bound)
            .sorted()
            .collect();
        let max = counts.keys().copied().max().unwrap_or(0);
        report.missing_bounds = (1..=max).filter(|b| !counts.contains_key(b)).collect();

        let arena = TreeArena::from_intervals(rows);
        for (idx, node) in arena.iter() {
            let Some(key) = node.data.key().cloned() else {
                continue;
            };
            let expected_parent = arena.parent_data(idx).and_then(|p| p.key());
            if node.data.parent() != expected_parent {
                report.wrong_parent.push(key.clone());
            }
            if node.data.level() != arena.level_of(idx) {
                report.wrong_level.push(key);
            }
        }

        if report.is_clean() {
            debug!(
                "tree {tree_id:?} is consistent, {} rows, depth {}",
                arena.len(),
                arena.depth()
            );
        } else {
            warn!("tree {tree_id:?} is inconsistent: {report:?}");
        }
        Ok(report)
    }

    /// Recompute left, right and level of a tree scope from parent references.
    ///
    /// Siblings keep the order of their current left bound. Rows referencing a parent
    /// outside the scope become roots. Returns the number of rows rewritten.
    #[instrument(level = "debug", skip(self, store))]
    pub fn rebuild<S: RowStore>(
        &self,
        store: &mut S,
        tree_id: Option<&TreeId>,
    ) -> ApplicationResult<usize> {
        let rows = self.scope_rows(store, tree_id, Operation::Rebuild)?;
        let arena = TreeArena::from_parent_refs(rows);

        let mut rewritten = 0;
        for placed in arena.assign_bounds(1) {
            let Some(node) = arena.get_node(placed.index) else {
                continue;
            };
            let parent = arena.parent_data(placed.index).and_then(|p| p.key()).cloned();
            let row = &node.data;
            if row.left() == placed.left
                && row.right() == placed.right
                && row.level() == placed.level
                && row.parent() == parent.as_ref()
            {
                continue;
            }

            let mut row = row.clone();
            row.set_left(placed.left);
            row.set_right(placed.right);
            row.set_level(placed.level);
            row.set_parent(parent);
            store.update(&row)?;
            rewritten += 1;
        }
        debug!("rebuild rewrote {rewritten} of {} rows", arena.len());
        Ok(rewritten)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Row;
    use crate::infrastructure::MemoryStore;

    fn seed(store: &mut MemoryStore<Row>, id: u64, parent: Option<u64>, bounds: (i64, i64), level: i64) {
        store
            .seed(Row {
                id: Some(id),
                left: bounds.0,
                right: bounds.1,
                level,
                parent_id: parent,
                ..Row::new(format!("n{id}"))
            })
            .unwrap();
    }

    #[test]
    fn given_consistent_tree_when_checking_then_clean() {
        let mut store = MemoryStore::<Row>::new();
        seed(&mut store, 1, None, (1, 6), 0);
        seed(&mut store, 2, Some(1), (2, 3), 1);
        seed(&mut store, 3, Some(1), (4, 5), 1);

        let service = IntegrityService::new(Arc::new(TreeConfig::default()));
        assert!(service.check(&store, None).unwrap().is_clean());
    }

    #[test]
    fn given_gap_and_wrong_level_when_checking_then_reported() {
        let mut store = MemoryStore::<Row>::new();
        seed(&mut store, 1, None, (1, 8), 0);
        seed(&mut store, 2, Some(1), (2, 3), 2);
        seed(&mut store, 3, Some(2), (5, 6), 1);

        let service = IntegrityService::new(Arc::new(TreeConfig::default()));
        let report = service.check(&store, None).unwrap();

        assert_eq!(report.missing_bounds, vec![4, 7]);
        assert_eq!(report.wrong_level, vec![2]);
        assert_eq!(report.wrong_parent, vec![3]);
    }

    #[test]
    fn given_damaged_bounds_when_rebuilding_then_tree_is_clean() {
        let mut store = MemoryStore::<Row>::new();
        seed(&mut store, 1, None, (1, 20), 0);
        seed(&mut store, 2, Some(1), (3, 4), 5);
        seed(&mut store, 3, Some(2), (9, 9), 0);
        seed(&mut store, 4, Some(1), (12, 13), 1);

        let service = IntegrityService::new(Arc::new(TreeConfig::default()));
        let rewritten = service.rebuild(&mut store, None).unwrap();

        assert_eq!(rewritten, 4);
        assert!(service.check(&store, None).unwrap().is_clean());
        assert_eq!(store.find(&2).unwrap().unwrap().bounds(), (2, 5));
        assert_eq!(store.find(&4).unwrap().unwrap().bounds(), (6, 7));
    }
}
