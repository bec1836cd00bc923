//! Application services
//!
//! Concrete service implementations over the row store boundary trait. Services
//! hold the shared configuration and are generic over the store per call, so one
//! service value can drive any number of transactions.

mod deletion;
mod integrity;
mod mutator;
mod query;
mod tree_id;

pub use deletion::{DeleteMode, DeleteReport, DeletionCoordinator};
pub use integrity::{IntegrityReport, IntegrityService};
pub use mutator::BoundsMutator;
pub use query::{AncestorOrder, QueryPlanner};
pub use tree_id::TreeIdGenerator;
