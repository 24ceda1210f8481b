//! Record schemas for the society collections
//!
//! Every field is optional. Absent, `null` and empty-string values all fall back
//! to the documented default exposed by the accessor methods, so a sparse record
//! never fails a reaction on its own.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

// ============================================================================
// COLLECTION NAMES
// ============================================================================

pub const NOTICES: &str = "notices";
pub const MAINTENANCE_REQUESTS: &str = "maintenance_requests";
pub const UTILITY_BILLS: &str = "utility_bills";
pub const PAYMENTS: &str = "payments";
pub const MEMBERS: &str = "members";

/// Bill statuses that still expect a payment
pub const OUTSTANDING_BILL_STATUSES: [&str; 2] = ["pending", "overdue"];

/// Placeholder used wherever a flat number or transaction id is unknown
pub const NOT_AVAILABLE: &str = "N/A";

// ============================================================================
// FIELD HELPERS
// ============================================================================

/// Returns the field value unless it is absent or empty.
fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.is_empty())
}

fn text_or<'a>(field: &'a Option<String>, default: &'a str) -> &'a str {
    present(field).unwrap_or(default)
}

/// Accepts strings, numbers and booleans for display fields.
///
/// Flat numbers and names are sometimes stored as numbers by older clients.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(Value::Bool(flag)) => Ok(Some(flag.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected a text value, found {}",
            other
        ))),
    }
}

/// Only a JSON boolean `true` yields `true`; `"true"`, `1` and friends do not.
fn strict_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(matches!(
        Option::<Value>::deserialize(deserializer)?,
        Some(Value::Bool(true))
    ))
}

// ============================================================================
// AMOUNTS
// ============================================================================

/// Monetary amount as stored on bills and payments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    Number(f64),
    Text(String),
}

impl Amount {
    pub fn zero() -> Self {
        Amount::Number(0.0)
    }

    fn is_blank(&self) -> bool {
        match self {
            Amount::Number(value) => *value == 0.0 || value.is_nan(),
            Amount::Text(text) => text.is_empty(),
        }
    }

    fn or_zero(field: &Option<Amount>) -> Amount {
        match field {
            Some(amount) if !amount.is_blank() => amount.clone(),
            _ => Amount::zero(),
        }
    }
}

impl Default for Amount {
    fn default() -> Self {
        Amount::zero()
    }
}

impl fmt::Display for Amount {
    /// Whole numbers render without a fractional part (`500`, not `500.0`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                write!(f, "{:.0}", value)
            }
            Amount::Number(value) => write!(f, "{}", value),
            Amount::Text(text) => f.write_str(text),
        }
    }
}

// ============================================================================
// DUE DATES
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DueDateError {
    #[error("unrecognised date text: {0}")]
    Text(String),

    #[error("timestamp out of range: {0}")]
    OutOfRange(String),

    #[error("unsupported date value: {0}")]
    Unsupported(String),
}

/// Parses a stored due date.
///
/// Accepted shapes: RFC 3339 text, `YYYY-MM-DDTHH:MM:SS` (read as UTC),
/// `YYYY-MM-DD` (midnight UTC), epoch milliseconds, timestamp objects with
/// `_seconds`/`seconds` and optional nanos, and extended JSON `{"$date": ..}`.
pub fn parse_due_date(value: &Value) -> Result<DateTime<Utc>, DueDateError> {
    match value {
        Value::String(text) => parse_date_text(text),
        Value::Number(number) => {
            let millis = number
                .as_i64()
                .or_else(|| number.as_f64().map(|value| value as i64))
                .ok_or_else(|| DueDateError::OutOfRange(number.to_string()))?;
            from_millis(millis)
        }
        Value::Object(map) => {
            if let Some(inner) = map.get("$date") {
                return match inner {
                    Value::Object(long) => long
                        .get("$numberLong")
                        .and_then(Value::as_str)
                        .and_then(|millis| millis.parse::<i64>().ok())
                        .ok_or_else(|| DueDateError::Unsupported(inner.to_string()))
                        .and_then(from_millis),
                    other => parse_due_date(other),
                };
            }

            let seconds = map
                .get("_seconds")
                .or_else(|| map.get("seconds"))
                .and_then(Value::as_i64)
                .ok_or_else(|| DueDateError::Unsupported(value.to_string()))?;
            let nanos = map
                .get("_nanoseconds")
                .or_else(|| map.get("nanoseconds"))
                .or_else(|| map.get("nanos"))
                .and_then(Value::as_u64)
                .unwrap_or(0);

            Utc.timestamp_opt(seconds, nanos as u32)
                .single()
                .ok_or_else(|| DueDateError::OutOfRange(value.to_string()))
        }
        other => Err(DueDateError::Unsupported(other.to_string())),
    }
}

fn parse_date_text(text: &str) -> Result<DateTime<Utc>, DueDateError> {
    let trimmed = text.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&midnight));
        }
    }

    Err(DueDateError::Text(text.to_string()))
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>, DueDateError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| DueDateError::OutOfRange(millis.to_string()))
}

/// Falsy stored values (`null`, `""`, `0`, `false`) mean "no due date".
fn is_unset(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::String(text) => text.is_empty(),
        Value::Number(number) => number.as_f64() == Some(0.0),
        _ => false,
    }
}

// ============================================================================
// NOTICES
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoticeRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub content: Option<String>,
    #[serde(default)]
    pub attachments: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub priority: Option<String>,
}

impl NoticeRecord {
    pub fn title(&self) -> &str {
        text_or(&self.title, "New Notice")
    }

    pub fn content(&self) -> &str {
        text_or(&self.content, "")
    }

    pub fn attachments(&self) -> &[String] {
        self.attachments.as_deref().unwrap_or(&[])
    }

    pub fn category(&self) -> &str {
        text_or(&self.category, "general")
    }

    pub fn priority(&self) -> &str {
        text_or(&self.priority, "medium")
    }
}

// ============================================================================
// MAINTENANCE REQUESTS
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceRequestRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub user_apartment: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub priority: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient_text")]
    pub request_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "strict_true")]
    pub is_public: bool,
}

impl MaintenanceRequestRecord {
    /// Title used by the creation alert
    pub fn title(&self) -> &str {
        text_or(&self.title, "New Maintenance Request")
    }

    /// Title used by status updates sent to the owner
    pub fn status_title(&self) -> &str {
        text_or(&self.title, "Maintenance Request")
    }

    pub fn user_id(&self) -> Option<&str> {
        present(&self.user_id)
    }

    pub fn flat_number(&self) -> &str {
        text_or(&self.user_apartment, NOT_AVAILABLE)
    }

    pub fn priority(&self) -> &str {
        text_or(&self.priority, "medium")
    }

    pub fn request_type(&self) -> &str {
        text_or(&self.request_type, "other")
    }

    pub fn status(&self) -> &str {
        text_or(&self.status, "open")
    }
}

// ============================================================================
// UTILITY BILLS
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtilityBillRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub utility_type: Option<String>,
    #[serde(default)]
    pub total_amount: Option<Amount>,
    #[serde(default)]
    pub due_date: Option<Value>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub status: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl UtilityBillRecord {
    pub fn utility_type(&self) -> &str {
        text_or(&self.utility_type, "Utility")
    }

    pub fn total_amount(&self) -> Amount {
        Amount::or_zero(&self.total_amount)
    }

    /// `None` when no due date is stored, otherwise the parse result.
    pub fn due_date(&self) -> Option<Result<DateTime<Utc>, DueDateError>> {
        self.due_date
            .as_ref()
            .filter(|value| !is_unset(value))
            .map(parse_due_date)
    }
}

// ============================================================================
// PAYMENTS
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub amount: Option<Amount>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub transaction_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: Option<String>,
}

impl PaymentRecord {
    pub fn user_id(&self) -> Option<&str> {
        present(&self.user_id)
    }

    pub fn amount(&self) -> Amount {
        Amount::or_zero(&self.amount)
    }

    /// Transaction id, falling back to the payment id, then `N/A`
    pub fn transaction_reference(&self) -> &str {
        present(&self.transaction_id)
            .or_else(|| present(&self.id))
            .unwrap_or(NOT_AVAILABLE)
    }
}

// ============================================================================
// MEMBERS
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub apartment_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub user_apartment: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub fcm_token: Option<String>,
}

impl MemberRecord {
    pub fn name(&self) -> &str {
        text_or(&self.name, "New Member")
    }

    /// Apartment number as registered, without the payment-side fallback
    pub fn apartment_number(&self) -> &str {
        text_or(&self.apartment_number, NOT_AVAILABLE)
    }

    /// Apartment number, falling back to `userApartment`, then `N/A`
    pub fn flat_number(&self) -> &str {
        present(&self.apartment_number)
            .or_else(|| present(&self.user_apartment))
            .unwrap_or(NOT_AVAILABLE)
    }

    /// Device registration token; empty tokens count as missing
    pub fn device_token(&self) -> Option<&str> {
        present(&self.fcm_token)
    }
}
