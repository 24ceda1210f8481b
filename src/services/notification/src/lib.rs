//! # Society Notifier
//!
//! Reactive push notification dispatcher for the society management platform:
//! - Reacts to created notices, maintenance requests, utility bills, payments
//!   and members, and to maintenance request status changes
//! - Runs the daily billing reminder and overdue alert jobs
//! - Delivers through Firebase Cloud Messaging (HTTP v1) or a log-only channel
//! - Looks up members and outstanding bills in MongoDB or an in-memory store
//!
//! Every reaction sends at most once and never fails its caller; what
//! happened is reported as a [`ReactionOutcome`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use society_notifier::{NotifierConfig, NotifierService};
//! use society_shared::types::ChangeEvent;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = NotifierService::new(NotifierConfig::default()).await?;
//!
//!     let event = ChangeEvent::created("m1", json!({"name": "Asha", "apartmentNumber": "D-402"}));
//!     let outcome = service.dispatcher().member_created(&event).await;
//!     println!("sent {} message(s)", outcome.sent_count());
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub mod channels;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod reactors;
pub mod routes;
pub mod scheduler;
pub mod store;

pub use channels::{FcmSender, LogSender, MessageId, PushSender};
pub use config::NotifierConfig;
pub use dispatcher::{Dispatcher, DispatcherHealth};
pub use error::{NotificationError, Result};
pub use metrics::NotifierMetrics;
pub use reactors::{Reaction, ReactionOutcome, ReactorContext, SkipReason};
pub use scheduler::{DailyJob, NotifierScheduler};
pub use store::{DocumentStore, MemoryStore, MongoStore};

use config::{PushProvider, StoreBackend};
use tracing::info;

/// Wires the configured collaborators into a dispatcher and its scheduler
#[derive(Clone)]
pub struct NotifierService {
    config: NotifierConfig,
    dispatcher: Arc<Dispatcher>,
    scheduler: NotifierScheduler,
}

impl NotifierService {
    /// Build the service from configuration, connecting to the push and store backends
    pub async fn new(config: NotifierConfig) -> Result<Self> {
        let sender = Self::build_sender(&config).await?;
        let store = Self::build_store(&config).await?;
        Self::with_components(config, sender, store)
    }

    /// Build the service around already constructed collaborators
    pub fn with_components(
        config: NotifierConfig,
        sender: Arc<dyn PushSender>,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self> {
        let metrics = Arc::new(NotifierMetrics::new(&config.metrics)?);
        let context = ReactorContext::new(&config, sender, store, metrics);
        let dispatcher = Arc::new(Dispatcher::new(context));
        let scheduler = NotifierScheduler::new(&config, Arc::clone(&dispatcher));

        Ok(Self {
            config,
            dispatcher,
            scheduler,
        })
    }

    async fn build_sender(config: &NotifierConfig) -> Result<Arc<dyn PushSender>> {
        let sender: Arc<dyn PushSender> = match config.push.provider {
            PushProvider::Fcm => Arc::new(FcmSender::new(&config.push).await?),
            PushProvider::Log => {
                Arc::new(LogSender::with_capacity(config.push.log_retention))
            }
        };
        info!(provider = sender.name(), "Push channel ready");
        Ok(sender)
    }

    async fn build_store(config: &NotifierConfig) -> Result<Arc<dyn DocumentStore>> {
        let store: Arc<dyn DocumentStore> = match config.store.backend {
            StoreBackend::Mongo => Arc::new(MongoStore::new(&config.store.mongo).await?),
            StoreBackend::Memory => match &config.store.fixture_path {
                Some(path) => Arc::new(MemoryStore::from_fixture(path).await?),
                None => Arc::new(MemoryStore::new()),
            },
        };
        info!(backend = store.name(), "Document store ready");
        Ok(store)
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    pub fn scheduler(&self) -> &NotifierScheduler {
        &self.scheduler
    }

    /// HTTP ingress for triggers, job runs, health and metrics
    pub fn router(&self) -> axum::Router {
        routes::create_router(self.dispatcher(), &self.config)
    }
}
