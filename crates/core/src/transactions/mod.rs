//! Rent and expense transaction model.

mod model;

pub use model::{sort_by_date_desc, Transaction, TransactionKind};
