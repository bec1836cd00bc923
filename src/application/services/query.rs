//! Query planner
//!
//! Translates tree relationships into interval and equality predicates. Reference
//! nodes are taken as passed: their bounds must be current, no re-read happens.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::application::validation::{persisted_key, require_scope, scope_of};
use crate::application::ApplicationResult;
use crate::config::TreeConfig;
use crate::domain::{
    Cmp, NestedNode, Operation, OrderBy, Predicate, Query, TreeError, TreeId, Trashed,
};
use crate::infrastructure::traits::{NodeKey, RowStore};

/// Order of an ancestor listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AncestorOrder {
    /// Level ascending
    #[default]
    RootFirst,
    /// Level descending, the parent first
    ClosestFirst,
}

impl AncestorOrder {
    fn order_by(self) -> OrderBy {
        match self {
            Self::RootFirst => OrderBy::LevelAsc,
            Self::ClosestFirst => OrderBy::LevelDesc,
        }
    }
}

/// Read side of the engine.
pub struct QueryPlanner {
    config: Arc<TreeConfig>,
}

impl QueryPlanner {
    pub fn new(config: Arc<TreeConfig>) -> Self {
        Self { config }
    }

    /// Soft-deleted rows are hidden by default when soft delete is enabled.
    pub fn default_trashed(&self) -> Trashed {
        if self.config.soft_delete {
            Trashed::Exclude
        } else {
            Trashed::Include
        }
    }

    fn query<K: Eq>(&self, filter: Predicate<K>) -> Query<K> {
        Query::new(filter).trashed(self.default_trashed())
    }

    fn scoped<N: NestedNode>(&self, node: &N) -> Result<Predicate<N::Key>, TreeError> {
        Ok(Predicate::scope(
            scope_of(&self.config, node, Operation::Query)?.as_ref(),
        ))
    }

    fn ancestor_filter<N: NestedNode>(&self, node: &N) -> Result<Predicate<N::Key>, TreeError> {
        Ok(self
            .scoped(node)?
            .and(Predicate::Left(Cmp::Lt, node.left()))
            .and(Predicate::Right(Cmp::Gt, node.right())))
    }

    fn descendant_filter<N: NestedNode>(&self, node: &N) -> Result<Predicate<N::Key>, TreeError> {
        Ok(self
            .scoped(node)?
            .and(Predicate::Left(Cmp::Gt, node.left()))
            .and(Predicate::Right(Cmp::Lt, node.right())))
    }

    /// Rows whose interval encloses `node`.
    pub fn ancestors_query<N: NestedNode>(
        &self,
        node: &N,
        order: AncestorOrder,
    ) -> Result<Query<N::Key>, TreeError> {
        Ok(self
            .query(self.ancestor_filter(node)?)
            .order_by(order.order_by()))
    }

    /// Rows strictly inside the interval of `node`, in tree order.
    pub fn descendants_query<N: NestedNode>(&self, node: &N) -> Result<Query<N::Key>, TreeError> {
        Ok(self.query(self.descendant_filter(node)?))
    }

    /// Rows referencing `node` as their parent, in sibling order.
    pub fn children_query<N: NestedNode>(&self, node: &N) -> Result<Query<N::Key>, TreeError> {
        let key = persisted_key(node, Operation::Query)?;
        Ok(self.query(self.scoped(node)?.and(Predicate::ParentIs(Some(key)))))
    }

    /// Restrict to one tree; multi-tree mode needs the tree id.
    pub fn by_tree<K: Eq>(&self, tree_id: Option<&TreeId>) -> Result<Query<K>, TreeError> {
        let scope = require_scope(&self.config, tree_id, Operation::Query)?;
        Ok(self.query(Predicate::scope(scope.as_ref())))
    }

    #[instrument(level = "debug", skip(self, store))]
    pub fn ancestors_of<S: RowStore>(
        &self,
        store: &S,
        node: &S::Node,
        order: AncestorOrder,
    ) -> ApplicationResult<Vec<S::Node>> {
        Ok(store.select(&self.ancestors_query(node, order)?)?)
    }

    #[instrument(level = "debug", skip(self, store))]
    pub fn descendants_of<S: RowStore>(
        &self,
        store: &S,
        node: &S::Node,
    ) -> ApplicationResult<Vec<S::Node>> {
        Ok(store.select(&self.descendants_query(node)?)?)
    }

    pub fn children_of<S: RowStore>(
        &self,
        store: &S,
        node: &S::Node,
    ) -> ApplicationResult<Vec<S::Node>> {
        Ok(store.select(&self.children_query(node)?)?)
    }

    /// The row `node` references as parent, if visible.
    pub fn parent_of<S: RowStore>(
        &self,
        store: &S,
        node: &S::Node,
    ) -> ApplicationResult<Option<S::Node>> {
        let Some(parent) = node.parent() else {
            return Ok(None);
        };
        let trashed = self.default_trashed();
        Ok(store
            .find(parent)?
            .filter(|p| trashed.admits(p.is_trashed())))
    }

    /// First root of a tree scope.
    pub fn root<S: RowStore>(
        &self,
        store: &S,
        tree_id: Option<&TreeId>,
    ) -> ApplicationResult<Option<S::Node>> {
        let query = self
            .by_tree(tree_id)?
            .and(Predicate::ParentIs(None))
            .limit(1);
        Ok(store.select(&query)?.into_iter().next())
    }

    /// Root of the tree `node` belongs to.
    pub fn root_of<S: RowStore>(
        &self,
        store: &S,
        node: &S::Node,
    ) -> ApplicationResult<Option<S::Node>> {
        if node.is_root() {
            return Ok(Some(node.clone()));
        }
        let query = self
            .ancestors_query(node, AncestorOrder::RootFirst)?
            .and(Predicate::ParentIs(None))
            .limit(1);
        Ok(store.select(&query)?.into_iter().next())
    }

    /// Roots of every tree, ordered by tree then left bound.
    pub fn roots<S: RowStore>(&self, store: &S) -> ApplicationResult<Vec<S::Node>> {
        let mut roots = store.select(&self.query(Predicate::ParentIs(None)))?;
        roots.sort_by(|a, b| a.tree_id().cmp(&b.tree_id()).then(a.left().cmp(&b.left())));
        Ok(roots)
    }

    /// Every node of one tree in tree order.
    pub fn tree<S: RowStore>(
        &self,
        store: &S,
        tree_id: Option<&TreeId>,
    ) -> ApplicationResult<Vec<S::Node>> {
        Ok(store.select(&self.by_tree(tree_id)?)?)
    }

    /// Ancestor of `node` at exactly `level`.
    pub fn parents_by_level<S: RowStore>(
        &self,
        store: &S,
        node: &S::Node,
        level: i64,
    ) -> ApplicationResult<Option<S::Node>> {
        let query = self
            .ancestors_query(node, AncestorOrder::RootFirst)?
            .and(Predicate::Level(Cmp::Eq, level))
            .limit(1);
        Ok(store.select(&query)?.into_iter().next())
    }

    /// Other children of the same parent, in sibling order.
    pub fn siblings_of<S: RowStore>(
        &self,
        store: &S,
        node: &S::Node,
    ) -> ApplicationResult<Vec<S::Node>> {
        Ok(store.select(&self.siblings_query(node)?)?)
    }

    /// Nearest visible sibling to the left.
    pub fn prev_sibling<S: RowStore>(
        &self,
        store: &S,
        node: &S::Node,
    ) -> ApplicationResult<Option<S::Node>> {
        let query = self
            .siblings_query(node)?
            .and(Predicate::Right(Cmp::Lt, node.left()))
            .order_by(OrderBy::RightDesc)
            .limit(1);
        Ok(store.select(&query)?.into_iter().next())
    }

    /// Nearest visible sibling to the right.
    pub fn next_sibling<S: RowStore>(
        &self,
        store: &S,
        node: &S::Node,
    ) -> ApplicationResult<Option<S::Node>> {
        let query = self
            .siblings_query(node)?
            .and(Predicate::Left(Cmp::Gt, node.right()))
            .limit(1);
        Ok(store.select(&query)?.into_iter().next())
    }

    fn siblings_query<N: NestedNode>(&self, node: &N) -> Result<Query<N::Key>, TreeError> {
        let key = persisted_key(node, Operation::Query)?;
        Ok(self.query(
            self.scoped(node)?
                .and(Predicate::ParentIs(node.parent().cloned()))
                .and(Predicate::Key(key).negate()),
        ))
    }

    /// Interval containment within one tree.
    pub fn is_child_of<N: NestedNode>(&self, node: &N, other: &N) -> bool {
        node.is_child_of(other)
    }

    /// True when `node` has no descendants that count.
    ///
    /// Trashed rows keep their bounds, so with soft delete on and
    /// `count_trashed_children` off the interval alone cannot decide. A live row
    /// below a trashed child still counts.
    pub fn is_leaf<S: RowStore>(&self, store: &S, node: &S::Node) -> ApplicationResult<bool> {
        if node.right() - node.left() == 1 {
            return Ok(true);
        }
        if !self.config.soft_delete || self.config.count_trashed_children {
            return Ok(false);
        }
        let live = self.descendants_query(node)?.trashed(Trashed::Exclude).limit(1);
        Ok(store.select(&live)?.is_empty())
    }

    /// Number of descendants of `node`.
    pub fn descendant_count<S: RowStore>(
        &self,
        store: &S,
        node: &S::Node,
    ) -> ApplicationResult<usize> {
        if !self.config.soft_delete || self.config.count_trashed_children {
            return Ok(((node.right() - node.left() - 1) / 2).max(0) as usize);
        }
        let live = self.descendants_query(node)?.trashed(Trashed::Exclude);
        Ok(store.select(&live)?.len())
    }

    /// Ancestors of several nodes with a single select.
    ///
    /// Each requester gets the rows enclosing it, root first.
    #[instrument(level = "debug", skip(self, store, nodes), fields(nodes = nodes.len()))]
    pub fn ancestors_of_many<S: RowStore>(
        &self,
        store: &S,
        nodes: &[S::Node],
    ) -> ApplicationResult<BTreeMap<NodeKey<S>, Vec<S::Node>>> {
        let filters = nodes
            .iter()
            .map(|n| self.ancestor_filter(n))
            .collect::<Result<Vec<_>, _>>()?;
        self.eager(store, nodes, filters, OrderBy::LevelAsc, |row, node| {
            row.contains(node)
        })
    }

    /// Descendants of several nodes with a single select, each in tree order.
    #[instrument(level = "debug", skip(self, store, nodes), fields(nodes = nodes.len()))]
    pub fn descendants_of_many<S: RowStore>(
        &self,
        store: &S,
        nodes: &[S::Node],
    ) -> ApplicationResult<BTreeMap<NodeKey<S>, Vec<S::Node>>> {
        let filters = nodes
            .iter()
            .map(|n| self.descendant_filter(n))
            .collect::<Result<Vec<_>, _>>()?;
        self.eager(store, nodes, filters, OrderBy::Left, |row, node| {
            node.contains(row)
        })
    }

    fn eager<S, F>(
        &self,
        store: &S,
        nodes: &[S::Node],
        filters: Vec<Predicate<NodeKey<S>>>,
        order: OrderBy,
        belongs: F,
    ) -> ApplicationResult<BTreeMap<NodeKey<S>, Vec<S::Node>>>
    where
        S: RowStore,
        F: Fn(&S::Node, &S::Node) -> bool,
    {
        let mut grouped = BTreeMap::new();
        for node in nodes {
            grouped.insert(persisted_key(node, Operation::Query)?, Vec::new());
        }
        if nodes.is_empty() {
            return Ok(grouped);
        }

        let rows = store.select(&self.query(Predicate::Or(filters)).order_by(order))?;
        debug!("eager select returned {} rows for {} nodes", rows.len(), nodes.len());

        for node in nodes {
            let key = persisted_key(node, Operation::Query)?;
            let matched: Vec<S::Node> = rows
                .iter()
                .filter(|row| belongs(*row, node))
                .cloned()
                .collect();
            grouped.insert(key, matched);
        }
        Ok(grouped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Row;

    fn node(id: u64, left: i64, right: i64) -> Row {
        Row {
            id: Some(id),
            left,
            right,
            ..Row::new(format!("n{id}"))
        }
    }

    #[test]
    fn given_node_when_planning_ancestors_then_interval_predicate_and_level_order() {
        let planner = QueryPlanner::new(Arc::new(TreeConfig::default()));
        let query = planner
            .ancestors_query(&node(3, 4, 5), AncestorOrder::ClosestFirst)
            .unwrap();

        assert_eq!(
            query.filter,
            Predicate::And(vec![Predicate::Left(Cmp::Lt, 4), Predicate::Right(Cmp::Gt, 5)])
        );
        assert_eq!(query.order, OrderBy::LevelDesc);
        assert_eq!(query.trashed, Trashed::Include);
    }

    #[test]
    fn given_soft_delete_when_planning_then_trashed_rows_excluded_by_default() {
        let config = TreeConfig::default().with_soft_delete(true);
        let planner = QueryPlanner::new(Arc::new(config));
        let query = planner.descendants_query(&node(1, 1, 8)).unwrap();
        assert_eq!(query.trashed, Trashed::Exclude);
    }

    #[test]
    fn given_multi_tree_when_planning_without_tree_then_scope_required() {
        let config = TreeConfig::multi_tree(crate::domain::FieldType::UnsignedInteger);
        let planner = QueryPlanner::new(Arc::new(config));

        assert!(matches!(
            planner.by_tree::<u64>(None),
            Err(TreeError::TreeScopeRequired { .. })
        ));
        assert!(planner.descendants_query(&node(1, 1, 8)).is_err());
    }
}
