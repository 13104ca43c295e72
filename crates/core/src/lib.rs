//! Data core for a personal rental-property manager.
//!
//! Tracks properties, lessees, rent payments and expenses against a remote
//! per-user hierarchical store, and derives savings (rents minus expenses)
//! per property and in aggregate. The interesting part is the layer between
//! the store and the presentation: live composable queries over push
//! notifications, per-reference listener lifecycles, derived financial
//! aggregates over multiple streams, and multi-step writes without backend
//! transactions.

pub mod errors;
pub mod properties;
pub mod reminders;
pub mod repository;
pub mod savings;
pub mod store;
pub mod transactions;
pub mod utils;
pub mod validation;

pub use errors::{Error, Result};
pub use repository::{CascadeDeleteReport, RentalRepository, Response};
