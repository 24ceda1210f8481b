//! MongoDB-backed document store

use crate::config::MongoStoreConfig;
use crate::error::{NotificationError, Result};
use crate::store::{BillEntry, DocumentStore};
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Bson, Document},
    options::ClientOptions,
    Client, Collection, Database,
};
use serde_json::Value;
use society_shared::types::{MemberRecord, MEMBERS, OUTSTANDING_BILL_STATUSES};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct MongoStore {
    database: Database,
    members: Collection<Document>,
    bills: Collection<Document>,
}

impl MongoStore {
    /// Connect and verify the connection with a ping
    pub async fn new(config: &MongoStoreConfig) -> Result<Self> {
        info!("Initializing MongoDB store (database {})", config.database);

        let mut options = ClientOptions::parse(&config.url).await.map_err(|e| {
            NotificationError::config(format!("Invalid MongoDB connection string: {}", e))
        })?;
        let timeout = Duration::from_secs(config.connect_timeout_seconds);
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);
        options.app_name = Some("society-notifier".to_string());

        let client = Client::with_options(options)?;
        let database = client.database(&config.database);

        let start_time = Instant::now();
        database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| NotificationError::database(format!("MongoDB ping failed: {}", e)))?;
        info!(
            "MongoDB connection established in {}ms",
            start_time.elapsed().as_millis()
        );

        Ok(Self {
            members: database.collection(&config.members_collection),
            bills: database.collection(&config.bills_collection),
            database,
        })
    }

    /// Member ids may be stored as plain strings or as object ids
    fn member_filter(id: &str) -> Document {
        match ObjectId::parse_str(id) {
            Ok(oid) => doc! { "_id": { "$in": [id, oid] } },
            Err(_) => doc! { "_id": id },
        }
    }

    fn due_bills_filter() -> Document {
        doc! {
            "isActive": true,
            "status": { "$in": OUTSTANDING_BILL_STATUSES.to_vec() },
        }
    }
}

/// Document key as text
fn document_key(document: &Document) -> String {
    match document.get("_id") {
        Some(Bson::String(id)) => id.clone(),
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// BSON documents are decoded through relaxed extended JSON so dates arrive
/// as `{"$date": ...}` and numbers as plain JSON numbers.
fn to_json(document: Document) -> Value {
    Bson::Document(document).into_relaxed_extjson()
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn get_member(&self, id: &str) -> Result<Option<MemberRecord>> {
        debug!(member_id = id, "Fetching member");

        let Some(document) = self.members.find_one(Self::member_filter(id), None).await? else {
            return Ok(None);
        };

        serde_json::from_value(to_json(document))
            .map(Some)
            .map_err(|e| NotificationError::invalid_record(MEMBERS, e.to_string()))
    }

    async fn find_due_bills(&self) -> Result<Vec<BillEntry>> {
        let mut cursor = self.bills.find(Self::due_bills_filter(), None).await?;

        let mut entries = Vec::new();
        while let Some(document) = cursor.try_next().await? {
            let key = document_key(&document);
            entries.push(BillEntry::from_json(key, to_json(document)));
        }

        debug!(count = entries.len(), "Scanned outstanding bills");
        Ok(entries)
    }

    async fn health_check(&self) -> Result<bool> {
        match self.database.run_command(doc! { "ping": 1 }, None).await {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!("MongoDB health check failed: {}", e);
                Ok(false)
            }
        }
    }

    fn name(&self) -> &'static str {
        "mongo"
    }
}
