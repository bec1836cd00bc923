//! Row store boundary trait
//!
//! Abstracts the relational table holding the tree, allowing services to run
//! against any backend and to be tested with the in-memory store.

use chrono::{DateTime, Utc};

use crate::domain::{BulkUpdate, NestedNode, Predicate, Query};
use crate::infrastructure::error::StoreResult;

/// Key type of the rows held by a store.
pub type NodeKey<S> = <<S as RowStore>::Node as NestedNode>::Key;

/// Transactional row store.
///
/// A value implementing this trait stands for an open transaction (or an
/// equivalent isolation boundary): structural operations issue several calls in a
/// row and rely on no other structural write to the same tree committing in
/// between. Opening, committing and rolling back belong to the caller.
pub trait RowStore {
    type Node: NestedNode;

    /// Fetch one row by key, soft-deleted rows included.
    fn find(&self, key: &<Self::Node as NestedNode>::Key) -> StoreResult<Option<Self::Node>>;

    /// Rows matching the query, in the query's order.
    fn select(
        &self,
        query: &Query<<Self::Node as NestedNode>::Key>,
    ) -> StoreResult<Vec<Self::Node>>;

    /// Apply a set-based bounds update; returns the number of rows changed.
    fn apply(&mut self, update: &BulkUpdate) -> StoreResult<usize>;

    /// Insert an unsaved row; the store assigns its key.
    fn insert(&mut self, node: Self::Node) -> StoreResult<Self::Node>;

    /// Write every column of an existing row.
    fn update(&mut self, node: &Self::Node) -> StoreResult<()>;

    /// Physically remove matching rows, soft-deleted ones included.
    fn delete(&mut self, filter: &Predicate<<Self::Node as NestedNode>::Key>)
        -> StoreResult<usize>;

    /// Soft-delete matching live rows.
    fn trash(
        &mut self,
        filter: &Predicate<<Self::Node as NestedNode>::Key>,
        at: DateTime<Utc>,
    ) -> StoreResult<usize>;

    /// Clear the soft-delete marker of matching trashed rows.
    fn restore(&mut self, filter: &Predicate<<Self::Node as NestedNode>::Key>)
        -> StoreResult<usize>;

    /// Largest integer tree id in use, if any.
    fn max_tree_id(&self) -> StoreResult<Option<u64>>;
}
