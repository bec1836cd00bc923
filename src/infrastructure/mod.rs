//! Infrastructure layer: row store boundary, in-memory store and DI container
//!
//! This layer defines the store boundary trait and wires up services.

pub mod di;
pub mod error;
pub mod memory;
pub mod traits;

pub use di::ServiceContainer;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use traits::{NodeKey, RowStore};
