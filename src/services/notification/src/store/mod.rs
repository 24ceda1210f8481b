//! Document store access
//!
//! Reactions only ever need two operations: a point read of a member by key,
//! and the scan of outstanding utility bills used by the daily jobs.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use society_shared::types::{MemberRecord, UtilityBillRecord, OUTSTANDING_BILL_STATUSES};

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// One row of the outstanding-bill scan
#[derive(Debug, Clone)]
pub struct BillEntry {
    /// Document key
    pub key: String,
    /// Decoded bill, or the reason it could not be decoded
    pub record: std::result::Result<UtilityBillRecord, String>,
}

impl BillEntry {
    pub fn decoded(key: impl Into<String>, record: UtilityBillRecord) -> Self {
        Self {
            key: key.into(),
            record: Ok(record),
        }
    }

    pub fn undecodable(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            record: Err(reason.into()),
        }
    }

    /// Decode a raw JSON document into an entry
    pub fn from_json(key: impl Into<String>, raw: Value) -> Self {
        match serde_json::from_value::<UtilityBillRecord>(raw) {
            Ok(record) => Self::decoded(key, record),
            Err(e) => Self::undecodable(key, e.to_string()),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Member record by key; `None` when no such member exists
    async fn get_member(&self, id: &str) -> Result<Option<MemberRecord>>;

    /// Active bills whose status is pending or overdue
    async fn find_due_bills(&self) -> Result<Vec<BillEntry>>;

    async fn health_check(&self) -> Result<bool>;

    fn name(&self) -> &'static str;
}

/// Raw-document form of the outstanding-bill filter
pub(crate) fn is_outstanding_document(raw: &Value) -> bool {
    raw.get("isActive") == Some(&Value::Bool(true))
        && raw
            .get("status")
            .and_then(Value::as_str)
            .map(|status| OUTSTANDING_BILL_STATUSES.contains(&status))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outstanding_document_filter() {
        assert!(is_outstanding_document(
            &json!({"isActive": true, "status": "overdue"})
        ));
        assert!(!is_outstanding_document(
            &json!({"isActive": "true", "status": "pending"})
        ));
        assert!(!is_outstanding_document(&json!({"isActive": true})));
    }

    #[test]
    fn test_bill_entry_keeps_decode_errors() {
        let entry = BillEntry::from_json("b1", json!({"totalAmount": [1, 2]}));
        assert_eq!(entry.key, "b1");
        assert!(entry.record.is_err());
    }
}
