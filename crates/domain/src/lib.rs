//! Domain layer for pharmacy revenue analytics
//!
//! Contains the query model, report shapes, value objects, and domain errors.
//! This layer performs no I/O.

pub mod entities;
pub mod errors;
pub mod money;
pub mod value_objects;

pub use entities::*;
pub use errors::DomainError;
pub use value_objects::*;
