//! Preview-time normalization and validation of resolved row fields.
//!
//! Validation never fails a call. Problems are returned as human-readable
//! strings and block a row only if the operator still asks to commit it.

use chrono::NaiveDate;
use validator::ValidateEmail;

use crate::contact::{split_circles, CanonicalField, ContactFields, CIRCLE_SEPARATOR};

/// Accepted input layouts for `birthday`, tried in order.
pub const BIRTHDAY_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

/// Normalize resolved fields in place and return every validation problem,
/// in canonical field order.
///
/// - every value is trimmed and empty values are removed;
/// - `birthday` is rewritten to `YYYY-MM-DD`;
/// - `circles` is de-duplicated and re-joined with `;`.
pub fn normalize_and_validate(fields: &mut ContactFields) -> Vec<String> {
    let mut errors = Vec::new();

    fields.retain(|_, value| {
        let trimmed = value.trim();
        if trimmed.len() != value.len() {
            *value = trimmed.to_string();
        }
        !value.is_empty()
    });

    for required in CanonicalField::ALL.iter().filter(|f| f.is_required()) {
        if !fields.contains_key(required) {
            errors.push(format!("Missing required field '{required}'"));
        }
    }

    if let Some(email) = fields.get(&CanonicalField::Email) {
        if !email.validate_email() {
            errors.push(format!("Invalid email address '{email}'"));
        }
    }

    if let Some(raw) = fields.get_mut(&CanonicalField::Birthday) {
        match parse_birthday(raw) {
            Some(date) => *raw = date.format("%Y-%m-%d").to_string(),
            None => errors.push(format!(
                "Unrecognized birthday '{raw}'; expected a date such as 1990-04-21"
            )),
        }
    }

    if let Some(raw) = fields.get(&CanonicalField::Circles) {
        let joined = split_circles(raw).join(&CIRCLE_SEPARATOR.to_string());
        if joined.is_empty() {
            fields.remove(&CanonicalField::Circles);
        } else {
            fields.insert(CanonicalField::Circles, joined);
        }
    }

    errors
}

/// Parse a birthday in any of [`BIRTHDAY_FORMATS`].
pub fn parse_birthday(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    BIRTHDAY_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}
