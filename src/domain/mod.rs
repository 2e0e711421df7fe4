//! Domain layer types and invariants.

pub mod error;
pub mod health;
pub mod product;
pub mod signature;
