//! Domain layer: entities and business logic
//!
//! This layer is independent of external concerns (no I/O, no store access, no config loading).

pub mod arena;
pub mod entities;
pub mod error;
pub mod predicate;

pub use arena::{Placed, TreeArena, TreeNode};
pub use entities::*;
pub use error::TreeError;
pub use predicate::{BoundRange, BulkUpdate, Cmp, OrderBy, Predicate, Query, Trashed};
