use rust_decimal::Decimal;

use crate::savings::savings;
use crate::store::Subscription;

/// Live pairing of a rents total and an expenses total into a derived
/// savings value.
///
/// Emits `rents - expenses` once both sides have produced a first value,
/// then again every time either side updates. Neither partial total is ever
/// cached across a recomputation: each emission reflects the latest value
/// seen on both sides, whatever order the underlying notifications arrive
/// in.
pub struct SavingsStream {
    rents: Subscription<Decimal>,
    expenses: Subscription<Decimal>,
    latest_rents: Option<Decimal>,
    latest_expenses: Option<Decimal>,
}

impl SavingsStream {
    pub(crate) fn new(rents: Subscription<Decimal>, expenses: Subscription<Decimal>) -> Self {
        Self {
            rents,
            expenses,
            latest_rents: None,
            latest_expenses: None,
        }
    }

    /// Waits for the next derived savings value. Returns `None` when either
    /// underlying subscription has ended.
    pub async fn recv(&mut self) -> Option<Decimal> {
        loop {
            tokio::select! {
                total = self.rents.recv() => match total {
                    Some(total) => self.latest_rents = Some(total),
                    None => return None,
                },
                total = self.expenses.recv() => match total {
                    Some(total) => self.latest_expenses = Some(total),
                    None => return None,
                },
            }
            if let (Some(rents), Some(expenses)) = (self.latest_rents, self.latest_expenses) {
                return Some(savings(rents, expenses));
            }
        }
    }

    /// Cancels both underlying subscriptions.
    pub fn cancel(&mut self) {
        self.rents.cancel();
        self.expenses.cancel();
    }
}
