//! Field-level validation helpers shared by all request inputs.
//!
//! Validation never fails fast: every rule runs and failures are collected
//! into one [`FieldErrors`] set keyed by the wire field name.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use time::macros::format_description;
use time::Date;

pub const MIN_PASSWORD_CHARS: usize = 6;
pub const MAX_PASSWORD_CHARS: usize = 128;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex")
});

/// Field-keyed validation failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set holding exactly one failure.
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.insert(field, message);
        errors
    }

    /// Records a failure. A later failure for the same field replaces the
    /// earlier one, so the most specific rule should run last.
    pub fn insert(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.insert(field, message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Field names in sorted order.
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }

    /// Returns `value` when no failure was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl Display for FieldErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let fields = self.fields().collect::<Vec<_>>().join(", ");
        write!(f, "invalid fields: {fields}")
    }
}

impl Error for FieldErrors {}

/// Trims a required text field and records `message` when it is absent or
/// blank.
pub fn required_text(
    errors: &mut FieldErrors,
    field: &'static str,
    value: Option<&str>,
    message: &str,
) -> Option<String> {
    match value.map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => Some(trimmed.to_string()),
        _ => {
            errors.insert(field, message);
            None
        }
    }
}

/// Validates and normalizes an email address (trimmed, lowercased).
pub fn required_email(errors: &mut FieldErrors, field: &'static str, value: Option<&str>) -> Option<String> {
    let email = required_text(errors, field, value, "email is required")?;
    if !is_valid_email(&email) {
        errors.insert(field, "email is not valid");
        return None;
    }
    Some(email.to_ascii_lowercase())
}

/// Validates a plaintext password against length rules.
///
/// The password is not trimmed; only presence and length are checked.
pub fn required_password(
    errors: &mut FieldErrors,
    field: &'static str,
    value: Option<&str>,
) -> Option<String> {
    let Some(password) = value.filter(|candidate| !candidate.is_empty()) else {
        errors.insert(field, "password is required");
        return None;
    };
    let chars = password.chars().count();
    if chars < MIN_PASSWORD_CHARS {
        errors.insert(field, format!("password must contain at least {MIN_PASSWORD_CHARS} characters"));
        return None;
    }
    if chars > MAX_PASSWORD_CHARS {
        errors.insert(field, format!("password must contain at most {MAX_PASSWORD_CHARS} characters"));
        return None;
    }
    Some(password.to_string())
}

/// Validates a delivery date given as `YYYY-MM-DD` or an RFC 3339 timestamp
/// (only the calendar date is kept).
pub fn required_date(errors: &mut FieldErrors, field: &'static str, value: Option<&str>) -> Option<Date> {
    let text = required_text(errors, field, value, "delivery date is required")?;
    match parse_date(&text) {
        Some(date) => Some(date),
        None => {
            errors.insert(field, "delivery date is not valid");
            None
        }
    }
}

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

/// Parses the calendar date prefix of `value`.
pub fn parse_date(value: &str) -> Option<Date> {
    let prefix = value.get(..10)?;
    if value.len() > 10 && !value[10..].starts_with(['T', 't', ' ']) {
        return None;
    }
    Date::parse(prefix, format_description!("[year]-[month]-[day]")).ok()
}

/// Formats a date as `YYYY-MM-DD`.
pub fn format_date(date: Date) -> String {
    date.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| date.to_string())
}
