use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::transactions::Transaction;
use crate::utils::date::{is_in_previous_year, parse_date_or};

/// Sum of `amount` over the collection. Empty input yields zero.
pub fn total_of(transactions: &[Transaction]) -> Decimal {
    transactions.iter().map(|tx| tx.amount).sum()
}

/// As [`total_of`], restricted to transactions dated in the calendar year
/// before `today`. Malformed dates fall back to `today` and are therefore
/// excluded.
pub fn total_of_in_previous_year(transactions: &[Transaction], today: NaiveDate) -> Decimal {
    transactions
        .iter()
        .filter(|tx| is_in_previous_year(parse_date_or(&tx.date, today), today))
        .map(|tx| tx.amount)
        .sum()
}

/// Derived savings for one pairing of totals.
pub fn savings(rents_total: Decimal, expenses_total: Decimal) -> Decimal {
    rents_total - expenses_total
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tx(amount: Decimal, date: &str) -> Transaction {
        Transaction {
            id: None,
            amount,
            comment: String::new(),
            date: date.to_string(),
        }
    }

    #[test]
    fn empty_collection_totals_zero() {
        assert_eq!(total_of(&[]), Decimal::ZERO);
    }

    #[test]
    fn totals_are_exact_over_many_small_amounts() {
        let transactions: Vec<Transaction> =
            (0..1000).map(|_| tx(dec!(0.10), "2024-01-01")).collect();
        assert_eq!(total_of(&transactions), dec!(100.00));
    }

    #[test]
    fn previous_year_filter_keeps_only_last_years_entries() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let transactions = vec![
            tx(dec!(650), "2024-03-01"),
            tx(dec!(650), "2024-12-31"),
            tx(dec!(700), "2025-01-01"),
            tx(dec!(600), "2023-12-31"),
        ];
        assert_eq!(total_of_in_previous_year(&transactions, today), dec!(1300));
    }

    #[test]
    fn malformed_dates_are_excluded_from_previous_year() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let transactions = vec![tx(dec!(650), "not a date"), tx(dec!(100), "2024-01-01")];
        assert_eq!(total_of_in_previous_year(&transactions, today), dec!(100));
    }

    #[test]
    fn savings_is_rents_minus_expenses() {
        assert_eq!(savings(dec!(1800), dec!(300)), dec!(1500));
        assert_eq!(savings(dec!(100), dec!(250)), dec!(-150));
    }
}
