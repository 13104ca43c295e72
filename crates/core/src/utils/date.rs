//! Calendar-date helpers for the `yyyy-MM-dd` wire format.

use chrono::{Datelike, Months, NaiveDate, Utc};

/// Wire format for all persisted dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Today's date in UTC.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Parses a `yyyy-MM-dd` string, falling back to `fallback` on malformed
/// input. Never fails.
pub fn parse_date_or(input: &str, fallback: NaiveDate) -> NaiveDate {
    NaiveDate::parse_from_str(input, DATE_FORMAT).unwrap_or(fallback)
}

/// True when `date` falls in the calendar year before `today`'s year.
pub fn is_in_previous_year(date: NaiveDate, today: NaiveDate) -> bool {
    date.year() == today.year() - 1
}

/// One calendar month before `date`, clamping to the last day of the target
/// month when the day has no counterpart there. Lead time for lease-end
/// reminders.
pub fn one_month_before(date: NaiveDate) -> NaiveDate {
    date.checked_sub_months(Months::new(1)).unwrap_or(date)
}

/// Last day of the month after `today`'s month. Upper bound of the
/// "lease expiring soon" window.
pub fn last_day_of_next_month(today: NaiveDate) -> NaiveDate {
    let (year, month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    let (after_year, after_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(after_year, after_month, 1)
        .expect("first of month is always a valid date")
        .pred_opt()
        .expect("first of month always has a predecessor")
}
