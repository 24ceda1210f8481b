//! Reactions to document changes and schedule ticks
//!
//! Every reaction follows the same contract: decode the snapshot, decide
//! whether and whom to notify, build a fresh message, send it once. Failures
//! are logged and recorded in the returned [`ReactionOutcome`]; they never
//! propagate to the caller and nothing is retried.

use crate::channels::{MessageId, PushSender};
use crate::config::{NotifierConfig, TopicConfig};
use crate::error::{NotificationError, Result};
use crate::metrics::NotifierMetrics;
use crate::store::DocumentStore;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use society_shared::types::{ChangeEvent, MemberRecord, NotificationMessage};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

pub mod billing_jobs;
pub mod maintenance_request;
pub mod maintenance_status;
pub mod new_member;
pub mod notice;
pub mod payment;
pub mod utility_bill;

/// Name of each reaction, used in logs, metrics and outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reaction {
    Notice,
    MaintenanceStatus,
    UtilityBill,
    BillingReminder,
    OverdueAlert,
    PaymentConfirmation,
    PaymentReceived,
    MaintenanceRequest,
    NewMember,
}

impl Reaction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reaction::Notice => "notice",
            Reaction::MaintenanceStatus => "maintenance_status",
            Reaction::UtilityBill => "utility_bill",
            Reaction::BillingReminder => "billing_reminder",
            Reaction::OverdueAlert => "overdue_alert",
            Reaction::PaymentConfirmation => "payment_confirmation",
            Reaction::PaymentReceived => "payment_received",
            Reaction::MaintenanceRequest => "maintenance_request",
            Reaction::NewMember => "new_member",
        }
    }
}

/// Why a reaction ended without sending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The event carried no snapshot
    MissingData,
    /// The snapshot did not match the collection schema
    InvalidRecord,
    StatusUnchanged,
    UnhandledStatus,
    MissingUserId,
    /// Member missing, lookup failed, or no device token registered
    NoRecipientToken,
    NoQualifyingBills,
    ScanFailed,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::MissingData => "missing_data",
            SkipReason::InvalidRecord => "invalid_record",
            SkipReason::StatusUnchanged => "status_unchanged",
            SkipReason::UnhandledStatus => "unhandled_status",
            SkipReason::MissingUserId => "missing_user_id",
            SkipReason::NoRecipientToken => "no_recipient_token",
            SkipReason::NoQualifyingBills => "no_qualifying_bills",
            SkipReason::ScanFailed => "scan_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent { message_id: MessageId },
    Failed { code: String, error: String },
}

/// Result of one delivery service call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    /// Shortened target description
    pub target: String,
    #[serde(flatten)]
    pub status: DeliveryStatus,
}

/// What a reaction did; informational only
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReactionOutcome {
    pub reaction: Reaction,
    pub deliveries: Vec<Delivery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<SkipReason>,
}

impl ReactionOutcome {
    pub fn new(reaction: Reaction) -> Self {
        Self {
            reaction,
            deliveries: Vec::new(),
            skipped: None,
        }
    }

    pub fn sent_count(&self) -> usize {
        self.deliveries
            .iter()
            .filter(|delivery| matches!(delivery.status, DeliveryStatus::Sent { .. }))
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.deliveries.len() - self.sent_count()
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }
}

/// Display settings for dates inside message bodies
#[derive(Debug, Clone)]
pub struct DateDisplay {
    pub format: String,
    pub offset: FixedOffset,
}

impl DateDisplay {
    pub fn render(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.offset)
            .format(&self.format)
            .to_string()
    }
}

/// Handles shared by every reaction
#[derive(Clone)]
pub struct ReactorContext {
    pub sender: Arc<dyn PushSender>,
    pub store: Arc<dyn DocumentStore>,
    pub metrics: Arc<NotifierMetrics>,
    pub topics: TopicConfig,
    pub dates: DateDisplay,
    pub reminder_window: chrono::Duration,
}

impl ReactorContext {
    pub fn new(
        config: &NotifierConfig,
        sender: Arc<dyn PushSender>,
        store: Arc<dyn DocumentStore>,
        metrics: Arc<NotifierMetrics>,
    ) -> Self {
        Self {
            sender,
            store,
            metrics,
            topics: config.topics.clone(),
            dates: DateDisplay {
                format: config.display.date_format.clone(),
                offset: config.utc_offset().unwrap_or_else(|| Utc.fix()),
            },
            reminder_window: config.reminder_window(),
        }
    }

    /// Start a reaction: count it and return an empty outcome
    pub(crate) fn begin(&self, reaction: Reaction) -> ReactionOutcome {
        self.metrics.record_reaction(reaction.as_str());
        ReactionOutcome::new(reaction)
    }

    /// Send one message, logging and recording the result
    pub(crate) async fn deliver(&self, outcome: &mut ReactionOutcome, message: NotificationMessage) {
        let reaction = outcome.reaction.as_str();
        let recipient = message.target.to_string();
        let target_kind = if message.target.is_topic() {
            "topic"
        } else {
            "token"
        };

        let started = Instant::now();
        let result = self.sender.send(&message).await;
        let elapsed = started.elapsed().as_secs_f64();

        let status = match result {
            Ok(message_id) => {
                info!(
                    reaction,
                    recipient = %recipient,
                    message_id = %message_id,
                    "Notification sent"
                );
                self.metrics.record_sent(reaction, target_kind, elapsed);
                DeliveryStatus::Sent { message_id }
            }
            Err(e) => {
                error!(
                    reaction,
                    recipient = %recipient,
                    error = %e,
                    "Error sending notification"
                );
                self.metrics.record_failed(reaction, e.error_code(), elapsed);
                DeliveryStatus::Failed {
                    code: e.error_code().to_string(),
                    error: e.to_string(),
                }
            }
        };

        outcome.deliveries.push(Delivery {
            target: recipient,
            status,
        });
    }

    /// End the reaction without sending
    pub(crate) fn skip(&self, outcome: &mut ReactionOutcome, reason: SkipReason) {
        self.metrics
            .record_skipped(outcome.reaction.as_str(), reason.as_str());
        outcome.skipped = Some(reason);
    }

    /// Decode the created snapshot, skipping the reaction when it is absent or malformed
    pub(crate) fn created_record<T: DeserializeOwned>(
        &self,
        outcome: &mut ReactionOutcome,
        event: &ChangeEvent,
        collection: &str,
    ) -> Option<T> {
        match event.decode_after::<T>() {
            Ok(Some(record)) => Some(record),
            Ok(None) => {
                let e = NotificationError::missing_data(format!("no {} snapshot", collection));
                error!(reaction = outcome.reaction.as_str(), key = %event.key, "{}", e);
                self.skip(outcome, SkipReason::MissingData);
                None
            }
            Err(err) => {
                let e = NotificationError::invalid_record(collection, err.to_string());
                error!(reaction = outcome.reaction.as_str(), key = %event.key, "{}", e);
                self.skip(outcome, SkipReason::InvalidRecord);
                None
            }
        }
    }

    /// Member lookup; store failures surface as `Lookup` errors
    pub(crate) async fn lookup_member(&self, user_id: &str) -> Result<Option<MemberRecord>> {
        self.store
            .get_member(user_id)
            .await
            .map_err(|e| NotificationError::lookup(format!("member {}: {}", user_id, e)))
    }

    /// Member lookup where a failure only means "unknown member"
    pub(crate) async fn find_member(
        &self,
        reaction: Reaction,
        user_id: &str,
    ) -> Option<MemberRecord> {
        match self.lookup_member(user_id).await {
            Ok(member) => member,
            Err(e) => {
                error!(
                    reaction = reaction.as_str(),
                    user_id,
                    error = %e,
                    "Error fetching member"
                );
                None
            }
        }
    }

    /// Device token of a member; `None` (with a warning) when unavailable
    pub(crate) async fn member_token(&self, reaction: Reaction, user_id: &str) -> Option<String> {
        let token = self
            .find_member(reaction, user_id)
            .await
            .and_then(|member| member.device_token().map(str::to_string));

        if token.is_none() {
            warn!(
                reaction = reaction.as_str(),
                user_id, "No device token found for member"
            );
        }
        token
    }
}
