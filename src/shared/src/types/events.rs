//! Change events delivered by the trigger runtime
//!
//! A create event carries only `after`; an update event carries both snapshots.
//! Snapshots stay as raw JSON until a reactor decodes them into the schema of
//! its collection.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Snapshot pair for one document change
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Document key within its collection
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Value>,
}

impl ChangeEvent {
    /// Build a create event
    pub fn created(key: impl Into<String>, after: Value) -> Self {
        Self {
            key: key.into(),
            before: None,
            after: Some(after),
        }
    }

    /// Build an update event
    pub fn updated(key: impl Into<String>, before: Value, after: Value) -> Self {
        Self {
            key: key.into(),
            before: Some(before),
            after: Some(after),
        }
    }

    /// Decode the `after` snapshot; `Ok(None)` when it is missing or `null`.
    pub fn decode_after<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        decode_snapshot(self.after.as_ref())
    }

    /// Decode the `before` snapshot; `Ok(None)` when it is missing or `null`.
    pub fn decode_before<T: DeserializeOwned>(&self) -> Result<Option<T>, serde_json::Error> {
        decode_snapshot(self.before.as_ref())
    }
}

fn decode_snapshot<T: DeserializeOwned>(
    snapshot: Option<&Value>,
) -> Result<Option<T>, serde_json::Error> {
    match snapshot {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone()).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::records::PaymentRecord;
    use serde_json::json;

    #[test]
    fn test_decode_created_snapshot() {
        let event = ChangeEvent::created("p1", json!({"userId": "u1", "amount": 500}));
        let payment: PaymentRecord = event.decode_after().unwrap().unwrap();
        assert_eq!(payment.user_id(), Some("u1"));
        assert!(event.decode_before::<PaymentRecord>().unwrap().is_none());
    }

    #[test]
    fn test_null_snapshot_is_missing() {
        let event: ChangeEvent =
            serde_json::from_value(json!({"key": "p1", "after": null})).unwrap();
        assert!(event.decode_after::<PaymentRecord>().unwrap().is_none());
    }

    #[test]
    fn test_wrong_shape_is_an_error() {
        let event = ChangeEvent::created("p1", json!({"userId": {"nested": true}}));
        assert!(event.decode_after::<PaymentRecord>().is_err());
    }
}
