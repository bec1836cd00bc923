//! Row predicates, queries and bulk bound updates
//!
//! These values are what the query planner and the bounds mutator hand to a row
//! store. They are plain data so a SQL backend can translate them into `WHERE` and
//! `UPDATE ... SET` clauses, while in-memory stores evaluate them directly.

use std::cmp::Ordering;

use crate::domain::entities::{NestedNode, TreeId};

/// Comparison operator against an integer column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Lt,
    Le,
    Eq,
    Ge,
    Gt,
}

impl Cmp {
    pub fn test(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Eq => lhs == rhs,
            Self::Ge => lhs >= rhs,
            Self::Gt => lhs > rhs,
        }
    }
}

/// Boolean row filter over the tree columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate<K> {
    All,
    Key(K),
    /// Parent reference equality; `None` selects roots
    ParentIs(Option<K>),
    Tree(TreeId),
    Left(Cmp, i64),
    Right(Cmp, i64),
    Level(Cmp, i64),
    And(Vec<Predicate<K>>),
    Or(Vec<Predicate<K>>),
    Not(Box<Predicate<K>>),
}

impl<K: Eq> Predicate<K> {
    /// Tree scope filter; single-tree scope (`None`) matches every row.
    pub fn scope(tree_id: Option<&TreeId>) -> Self {
        match tree_id {
            Some(id) => Self::Tree(id.clone()),
            None => Self::All,
        }
    }

    /// Rows whose left bound lies in `[from, to]`.
    pub fn left_between(from: i64, to: i64) -> Self {
        Self::And(vec![Self::Left(Cmp::Ge, from), Self::Left(Cmp::Le, to)])
    }

    /// Conjunction that flattens nested `And` and drops `All`.
    pub fn and(self, other: Self) -> Self {
        let mut parts = Vec::new();
        for p in [self, other] {
            match p {
                Self::All => {}
                Self::And(inner) => parts.extend(inner),
                p => parts.push(p),
            }
        }
        match parts.len() {
            0 => Self::All,
            1 => parts.remove(0),
            _ => Self::And(parts),
        }
    }

    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    pub fn matches<N: NestedNode<Key = K>>(&self, node: &N) -> bool {
        match self {
            Self::All => true,
            Self::Key(k) => node.key() == Some(k),
            Self::ParentIs(p) => node.parent() == p.as_ref(),
            Self::Tree(id) => node.tree_id() == Some(id),
            Self::Left(cmp, v) => cmp.test(node.left(), *v),
            Self::Right(cmp, v) => cmp.test(node.right(), *v),
            Self::Level(cmp, v) => cmp.test(node.level(), *v),
            Self::And(parts) => parts.iter().all(|p| p.matches(node)),
            Self::Or(parts) => parts.iter().any(|p| p.matches(node)),
            Self::Not(inner) => !inner.matches(node),
        }
    }
}

/// Handling of soft-deleted rows in a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trashed {
    #[default]
    Exclude,
    Include,
    Only,
}

impl Trashed {
    pub fn admits(self, trashed: bool) -> bool {
        match self {
            Self::Exclude => !trashed,
            Self::Include => true,
            Self::Only => trashed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderBy {
    #[default]
    Left,
    LeftDesc,
    RightDesc,
    /// Root first
    LevelAsc,
    /// Closest ancestor first
    LevelDesc,
}

impl OrderBy {
    pub fn compare<N: NestedNode>(self, a: &N, b: &N) -> Ordering {
        match self {
            Self::Left => a.left().cmp(&b.left()),
            Self::LeftDesc => b.left().cmp(&a.left()),
            Self::RightDesc => b.right().cmp(&a.right()),
            Self::LevelAsc => a.level().cmp(&b.level()).then(a.left().cmp(&b.left())),
            Self::LevelDesc => b.level().cmp(&a.level()).then(a.left().cmp(&b.left())),
        }
    }
}

/// A select: filter, soft-delete handling, ordering and optional limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query<K> {
    pub filter: Predicate<K>,
    pub trashed: Trashed,
    pub order: OrderBy,
    pub limit: Option<usize>,
}

impl<K: Eq> Query<K> {
    pub fn new(filter: Predicate<K>) -> Self {
        Self {
            filter,
            trashed: Trashed::default(),
            order: OrderBy::default(),
            limit: None,
        }
    }

    pub fn and(mut self, filter: Predicate<K>) -> Self {
        let current = std::mem::replace(&mut self.filter, Predicate::All);
        self.filter = current.and(filter);
        self
    }

    pub fn trashed(mut self, trashed: Trashed) -> Self {
        self.trashed = trashed;
        self
    }

    pub fn with_trashed(self) -> Self {
        self.trashed(Trashed::Include)
    }

    pub fn only_trashed(self) -> Self {
        self.trashed(Trashed::Only)
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches<N: NestedNode<Key = K>>(&self, node: &N) -> bool {
        self.trashed.admits(node.is_trashed()) && self.filter.matches(node)
    }
}

/// Inclusive range of bound values; `to == None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundRange {
    pub from: i64,
    pub to: Option<i64>,
}

impl BoundRange {
    pub fn starting_at(from: i64) -> Self {
        Self { from, to: None }
    }

    pub fn between(from: i64, to: i64) -> Self {
        Self { from, to: Some(to) }
    }

    pub fn contains(&self, value: i64) -> bool {
        value >= self.from && self.to.map_or(true, |to| value <= to)
    }
}

/// Set-based rewrite of tree columns across many rows.
///
/// Both variants touch trashed rows too: soft-deleted nodes keep their slot in the
/// interval structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkUpdate {
    /// Add `delta` to every left and every right bound (independently) inside `range`.
    ShiftBounds {
        scope: Option<TreeId>,
        range: BoundRange,
        delta: i64,
    },
    /// Move whole rows whose left bound lies inside `range`: both bounds by `delta`,
    /// level by `level_delta`, and into tree `tree` when given.
    Translate {
        scope: Option<TreeId>,
        range: BoundRange,
        delta: i64,
        level_delta: i64,
        tree: Option<TreeId>,
    },
}

impl BulkUpdate {
    fn in_scope<N: NestedNode>(scope: &Option<TreeId>, node: &N) -> bool {
        scope.is_none() || node.tree_id() == scope.as_ref()
    }

    /// Apply to one row, returning whether anything changed.
    pub fn apply_to<N: NestedNode>(&self, node: &mut N) -> bool {
        match self {
            Self::ShiftBounds {
                scope,
                range,
                delta,
            } => {
                if !Self::in_scope(scope, node) {
                    return false;
                }
                let mut changed = false;
                if range.contains(node.left()) {
                    node.set_left(node.left() + delta);
                    changed = true;
                }
                if range.contains(node.right()) {
                    node.set_right(node.right() + delta);
                    changed = true;
                }
                changed
            }
            Self::Translate {
                scope,
                range,
                delta,
                level_delta,
                tree,
            } => {
                if !Self::in_scope(scope, node) || !range.contains(node.left()) {
                    return false;
                }
                node.set_left(node.left() + delta);
                node.set_right(node.right() + delta);
                node.set_level(node.level() + level_delta);
                if let Some(tree) = tree {
                    node.set_tree_id(Some(tree.clone()));
                }
                true
            }
        }
    }
}
