use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::ParsedTransaction;

/// Field name -> message. Only failing fields are present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `error` under `field` if there is one.
    pub fn check(&mut self, field: &str, error: Option<String>) {
        if let Some(message) = error {
            self.0.insert(field.to_string(), message);
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Parse a user-typed amount. Accepts `,` or `.` as decimal separator,
/// grouping spaces (including NBSP) and a trailing ruble marker.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let mut s: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .collect();
    for suffix in ["₽", "руб.", "руб"] {
        if let Some(stripped) = s.strip_suffix(suffix) {
            s = stripped.to_string();
            break;
        }
    }
    let s = s.replace(',', ".");
    if s.is_empty() {
        return None;
    }
    Decimal::from_str(&s).ok()
}

pub fn validate_amount(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return Some("Amount is required".to_string());
    }
    match parse_amount(raw) {
        None => Some("Invalid amount".to_string()),
        Some(v) if v <= Decimal::ZERO => Some("Amount must be greater than zero".to_string()),
        Some(_) => None,
    }
}

pub fn validate_required(raw: &str, field_name: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return Some(format!("{field_name} is required"));
    }
    None
}

pub fn validate_date(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return Some("Date is required".to_string());
    }
    match NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d") {
        Ok(_) => None,
        Err(_) => Some("Invalid date".to_string()),
    }
}

pub fn validate_positive_number(raw: &str, field_name: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return Some(format!("{field_name} is required"));
    }
    match parse_amount(raw) {
        None => Some("Invalid value".to_string()),
        Some(v) if v <= Decimal::ZERO => Some(format!("{field_name} must be greater than zero")),
        Some(_) => None,
    }
}

/// Checks a candidate before it may be saved.
pub fn validate_parsed(txn: &ParsedTransaction) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if txn.amount <= Decimal::ZERO {
        errors.check("amount", Some("Amount must be greater than zero".to_string()));
    }
    errors.check("description", validate_required(&txn.description, "Description"));
    errors
}
