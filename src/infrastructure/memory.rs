//! In-memory row store
//!
//! Keeps rows in an ordered map and evaluates predicates directly. Used for tests
//! and for embedding applications that hold small trees in memory.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::domain::{BulkUpdate, NestedNode, Predicate, Query};
use crate::infrastructure::error::{StoreError, StoreResult};
use crate::infrastructure::traits::RowStore;

/// Ordered-map row store with snapshot transactions.
///
/// Keys are assigned sequentially from `1`, so the node key type must convert from
/// `u64`.
#[derive(Debug, Clone)]
pub struct MemoryStore<N: NestedNode> {
    rows: BTreeMap<N::Key, N>,
    last_key: u64,
    /// Remaining successful writes before an injected failure
    write_budget: Option<usize>,
}

impl<N: NestedNode> Default for MemoryStore<N> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_key: 0,
            write_budget: None,
        }
    }
}

impl<N> MemoryStore<N>
where
    N: NestedNode,
    N::Key: From<u64>,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a keyed row in place verbatim, bypassing every check.
    ///
    /// Meant for fixtures, including deliberately damaged trees.
    pub fn seed(&mut self, node: N) -> StoreResult<()> {
        let key = node
            .key()
            .cloned()
            .ok_or_else(|| StoreError::Constraint("seeded rows need a key".into()))?;
        self.rows.insert(key, node);
        Ok(())
    }

    pub fn rows(&self) -> impl Iterator<Item = &N> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Make the write after the next `writes` successful ones fail.
    pub fn fail_after_writes(&mut self, writes: usize) {
        self.write_budget = Some(writes);
    }

    /// Run `f` against the store, restoring the previous state when it fails.
    #[instrument(level = "debug", skip(self, f))]
    pub fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
    {
        let snapshot = (self.rows.clone(), self.last_key);
        let result = f(self);
        if result.is_err() {
            debug!("transaction failed, rolling back {} rows", snapshot.0.len());
            self.rows = snapshot.0;
            self.last_key = snapshot.1;
        }
        result
    }

    fn charge_write(&mut self, operation: &str) -> StoreResult<()> {
        match self.write_budget {
            Some(0) => Err(StoreError::backend(
                format!("{operation} rejected"),
                "injected write failure",
            )),
            Some(n) => {
                self.write_budget = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn next_key(&mut self) -> N::Key {
        loop {
            self.last_key += 1;
            let key = N::Key::from(self.last_key);
            if !self.rows.contains_key(&key) {
                return key;
            }
        }
    }
}

impl<N> RowStore for MemoryStore<N>
where
    N: NestedNode,
    N::Key: From<u64>,
{
    type Node = N;

    fn find(&self, key: &N::Key) -> StoreResult<Option<N>> {
        Ok(self.rows.get(key).cloned())
    }

    fn select(&self, query: &Query<N::Key>) -> StoreResult<Vec<N>> {
        let mut found: Vec<N> = self
            .rows
            .values()
            .filter(|row| query.matches(*row))
            .cloned()
            .collect();
        found.sort_by(|a, b| query.order.compare(a, b));
        if let Some(limit) = query.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    fn apply(&mut self, update: &BulkUpdate) -> StoreResult<usize> {
        self.charge_write("bulk update")?;
        let mut changed = 0;
        for row in self.rows.values_mut() {
            if update.apply_to(row) {
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn insert(&mut self, mut node: N) -> StoreResult<N> {
        self.charge_write("insert")?;
        let key = match node.key() {
            Some(key) if self.rows.contains_key(key) => {
                return Err(StoreError::Constraint(format!("duplicate key #{key}")));
            }
            Some(key) => key.clone(),
            None => self.next_key(),
        };
        node.set_key(key.clone());
        self.rows.insert(key, node.clone());
        Ok(node)
    }

    fn update(&mut self, node: &N) -> StoreResult<()> {
        self.charge_write("update")?;
        let key = node
            .key()
            .ok_or_else(|| StoreError::Constraint("cannot update an unsaved row".into()))?;
        match self.rows.get_mut(key) {
            Some(row) => {
                *row = node.clone();
                Ok(())
            }
            None => Err(StoreError::RowNotFound(key.to_string())),
        }
    }

    fn delete(&mut self, filter: &Predicate<N::Key>) -> StoreResult<usize> {
        self.charge_write("delete")?;
        let before = self.rows.len();
        self.rows.retain(|_, row| !filter.matches(row));
        Ok(before - self.rows.len())
    }

    fn trash(&mut self, filter: &Predicate<N::Key>, at: DateTime<Utc>) -> StoreResult<usize> {
        self.charge_write("trash")?;
        let mut changed = 0;
        for row in self.rows.values_mut() {
            if !row.is_trashed() && filter.matches(row) {
                row.set_deleted_at(Some(at));
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn restore(&mut self, filter: &Predicate<N::Key>) -> StoreResult<usize> {
        self.charge_write("restore")?;
        let mut changed = 0;
        for row in self.rows.values_mut() {
            if row.is_trashed() && filter.matches(row) {
                row.set_deleted_at(None);
                changed += 1;
            }
        }
        Ok(changed)
    }

    fn max_tree_id(&self) -> StoreResult<Option<u64>> {
        Ok(self
            .rows
            .values()
            .filter_map(|row| match row.tree_id() {
                Some(crate::domain::TreeId::Int(id)) => Some(*id),
                _ => None,
            })
            .max())
    }
}
