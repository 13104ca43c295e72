//! Derived savings: pure reductions over transaction collections and the
//! live pairing of two independently-updating totals.

mod calculator;
mod stream;

pub use calculator::{savings, total_of, total_of_in_previous_year};
pub use stream::SavingsStream;
