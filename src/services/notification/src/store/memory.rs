//! In-process document store
//!
//! Backs local runs and tests. Documents are kept as raw JSON so that
//! malformed records behave the same way they do against a real database.

use crate::error::{NotificationError, Result};
use crate::store::{is_outstanding_document, BillEntry, DocumentStore};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use society_shared::types::{MemberRecord, MEMBERS};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Fixture file layout: `{"members": {id: doc}, "utility_bills": {id: doc}}`
#[derive(Debug, Default, Deserialize)]
struct Fixture {
    #[serde(default)]
    members: BTreeMap<String, Value>,
    #[serde(default)]
    utility_bills: BTreeMap<String, Value>,
}

#[derive(Default)]
pub struct MemoryStore {
    members: RwLock<BTreeMap<String, Value>>,
    bills: RwLock<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load members and bills from a JSON fixture file
    pub async fn from_fixture(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            NotificationError::config(format!(
                "Failed to read store fixture {}: {}",
                path.display(),
                e
            ))
        })?;
        let fixture: Fixture = serde_json::from_str(&raw)?;

        info!(
            members = fixture.members.len(),
            bills = fixture.utility_bills.len(),
            "Loaded store fixture from {}",
            path.display()
        );

        Ok(Self {
            members: RwLock::new(fixture.members),
            bills: RwLock::new(fixture.utility_bills),
        })
    }

    pub fn insert_member(&self, id: impl Into<String>, document: Value) {
        self.members.write().insert(id.into(), document);
    }

    pub fn insert_bill(&self, id: impl Into<String>, document: Value) {
        self.bills.write().insert(id.into(), document);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_member(&self, id: &str) -> Result<Option<MemberRecord>> {
        let raw = match self.members.read().get(id) {
            Some(raw) => raw.clone(),
            None => return Ok(None),
        };

        serde_json::from_value(raw)
            .map(Some)
            .map_err(|e| NotificationError::invalid_record(MEMBERS, e.to_string()))
    }

    async fn find_due_bills(&self) -> Result<Vec<BillEntry>> {
        let bills = self.bills.read();
        let entries = bills
            .iter()
            .filter(|(_, raw)| is_outstanding_document(raw))
            .map(|(key, raw)| BillEntry::from_json(key.clone(), raw.clone()))
            .collect();
        Ok(entries)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
