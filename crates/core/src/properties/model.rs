use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::utils::date::{last_day_of_next_month, parse_date_or};
use crate::validation::{validate_address, validate_lessee_name};
use crate::{Error, Result};

/// A rentable unit.
///
/// The id is the record's storage key: it is populated on decode and never
/// written into the stored value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(skip_serializing, default)]
    pub id: String,
    pub address: String,
    #[serde(default)]
    pub floor: i32,
    #[serde(default)]
    pub name: String,
    /// Present while the unit is let. Owned exclusively by the property.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lessee: Option<Lessee>,
}

/// The current occupant of a property. Embedded, never independently
/// addressable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lessee {
    pub name: String,
    /// Recurring monthly rent charge.
    pub rent: Decimal,
    /// Lease start, `yyyy-MM-dd`.
    pub start: String,
    /// Lease end, `yyyy-MM-dd`.
    pub end: String,
    /// Handle of the calendar reminder mirroring `end`. Created, updated and
    /// deleted in lockstep with the end date.
    #[serde(rename = "eventID", default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

/// Classification of a lease end date against today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseStatus {
    /// End date has passed.
    Expired,
    /// Ends after today but no later than the last day of next month.
    ExpiringSoon,
    Current,
}

impl Lessee {
    /// Classifies the lease end date. Malformed end dates parse as `today`
    /// and classify as `Current`.
    pub fn status(&self, today: NaiveDate) -> LeaseStatus {
        let end = parse_date_or(&self.end, today);
        if end < today {
            return LeaseStatus::Expired;
        }
        if end > today && end <= last_day_of_next_month(today) {
            return LeaseStatus::ExpiringSoon;
        }
        LeaseStatus::Current
    }
}

impl Property {
    /// Applies the required-field rules for non-UI callers: address always,
    /// lessee name and a non-negative rent when a lessee is present.
    pub fn validate(&self) -> Result<()> {
        let check = validate_address(&self.address);
        if check.is_invalid {
            return Err(Error::invalid_request(check.message));
        }
        if let Some(lessee) = &self.lessee {
            let check = validate_lessee_name(&lessee.name);
            if check.is_invalid {
                return Err(Error::invalid_request(check.message));
            }
            if lessee.rent < Decimal::ZERO {
                return Err(Error::invalid_request("lessee rent must not be negative"));
            }
        }
        Ok(())
    }
}
