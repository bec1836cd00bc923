//! Nested-set tree maintenance over a flat row store.
//!
//! Every node carries a `left`/`right` interval; containment of intervals encodes
//! ancestry, so ancestor, descendant and subtree-size queries need no recursion.
//! The engine keeps the intervals consistent across inserts, moves and deletes:
//!
//! - [`BoundsMutator`]: root creation, the four placements and subtree moves
//! - [`QueryPlanner`]: ancestor, descendant, sibling and tree-scope queries
//! - [`DeletionCoordinator`]: cascade, reparent and forbid strategies, soft delete
//! - [`IntegrityService`]: consistency check and rebuild from parent references
//!
//! Rows live behind the [`RowStore`] trait; [`MemoryStore`] is the in-memory
//! implementation.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod tree_traits;
pub mod util;

pub use application::services::{
    AncestorOrder, BoundsMutator, DeleteMode, DeleteReport, DeletionCoordinator,
    IntegrityReport, IntegrityService, QueryPlanner, TreeIdGenerator,
};
pub use application::{ApplicationError, ApplicationResult};
pub use config::{DeleteStrategy, RestoreStrategy, TreeConfig};
pub use domain::{FieldType, NestedNode, Placement, Row, TreeError, TreeId};
pub use infrastructure::{MemoryStore, RowStore, ServiceContainer, StoreError};
