//! Application layer: services and use cases
//!
//! This layer orchestrates domain logic and depends on the row store boundary trait.

pub mod error;
pub mod services;
pub mod validation;

pub use error::{ApplicationError, ApplicationResult};
