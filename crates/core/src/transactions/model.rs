use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One rent payment or expense against a property.
///
/// Created by append with a generated id, updated by full overwrite at its
/// id, deleted by removing the id. No soft-delete, no history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Storage key; populated on decode, never written into the value.
    #[serde(skip_serializing, default)]
    pub id: Option<String>,
    pub amount: Decimal,
    /// Free text. Required for rents, optional for expenses.
    #[serde(default)]
    pub comment: String,
    /// Effective date, `yyyy-MM-dd`. Not the creation time.
    pub date: String,
}

/// Which of the two parallel transaction collections a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionKind {
    Rent,
    Expense,
}

impl TransactionKind {
    /// Storage path segment of this kind's collection.
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Rent => "rents",
            Self::Expense => "expenses",
        }
    }
}

/// Orders by effective date, most recent first. This is the emission contract
/// of transaction lists, not an incidental ordering.
pub fn sort_by_date_desc(transactions: &mut [Transaction]) {
    transactions.sort_by(|a, b| b.date.cmp(&a.date));
}
