//! Field-level validation for editable form values.
//!
//! Each editable field maps a current text value to a `FieldCheck`. Numeric
//! fields are additionally gated at the input-acceptance boundary by
//! [`accepts_currency_input`], so malformed amounts never reach submission.

use crate::transactions::TransactionKind;

/// Outcome of validating one text field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCheck {
    pub is_invalid: bool,
    pub message: &'static str,
}

impl FieldCheck {
    fn ok() -> Self {
        Self {
            is_invalid: false,
            message: "",
        }
    }

    fn invalid(message: &'static str) -> Self {
        Self {
            is_invalid: true,
            message,
        }
    }
}

/// Property address is always required.
pub fn validate_address(value: &str) -> FieldCheck {
    if value.trim().is_empty() {
        FieldCheck::invalid("Address must not be empty")
    } else {
        FieldCheck::ok()
    }
}

/// Lessee name is required whenever a lessee is being added.
pub fn validate_lessee_name(value: &str) -> FieldCheck {
    if value.trim().is_empty() {
        FieldCheck::invalid("Lessee name must not be empty")
    } else {
        FieldCheck::ok()
    }
}

/// Lessee rent is required and must be currency-shaped.
pub fn validate_lessee_rent(value: &str) -> FieldCheck {
    if value.trim().is_empty() {
        FieldCheck::invalid("Rent must not be empty")
    } else if !accepts_currency_input(value) {
        FieldCheck::invalid("Rent must be a valid amount")
    } else {
        FieldCheck::ok()
    }
}

/// Transaction amount is always required and must be currency-shaped.
pub fn validate_amount(value: &str) -> FieldCheck {
    if value.trim().is_empty() {
        FieldCheck::invalid("Amount must not be empty")
    } else if !accepts_currency_input(value) {
        FieldCheck::invalid("Amount must be a valid amount")
    } else {
        FieldCheck::ok()
    }
}

/// Transaction comment is required for rents, optional for expenses.
pub fn validate_comment(value: &str, kind: TransactionKind) -> FieldCheck {
    if kind == TransactionKind::Rent && value.trim().is_empty() {
        FieldCheck::invalid("Comment must not be empty")
    } else {
        FieldCheck::ok()
    }
}

/// Accepts text shaped like a currency amount while it is being typed:
/// digits with at most one decimal separator and at most two fraction
/// digits. The empty string is accepted so a field can be cleared.
pub fn accepts_currency_input(value: &str) -> bool {
    let mut fraction_digits: Option<u8> = None;
    for ch in value.chars() {
        match ch {
            '0'..='9' => {
                if let Some(count) = fraction_digits.as_mut() {
                    *count += 1;
                    if *count > 2 {
                        return false;
                    }
                }
            }
            '.' => {
                if fraction_digits.is_some() {
                    return false;
                }
                fraction_digits = Some(0);
            }
            _ => return false,
        }
    }
    true
}
