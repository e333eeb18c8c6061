//! Value Objects - Immutable, identity-less domain primitives

mod detail_level;
mod pharmacy_id;
mod product_code;

pub use detail_level::{DetailLevel, QueryComplexity};
pub use pharmacy_id::PharmacyId;
pub use product_code::ProductCode;
