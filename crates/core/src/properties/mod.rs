//! Property and lessee domain model.

mod model;

pub use model::{LeaseStatus, Lessee, Property};
