//! Push delivery channels
//!
//! - FCM channel (HTTP v1 API, service-account or static access token)
//! - Log channel (records and logs messages without delivering them)

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use society_shared::types::NotificationMessage;
use std::fmt;

pub mod fcm;
pub mod log;

pub use fcm::FcmSender;
pub use log::LogSender;

/// Identifier assigned to an accepted message by the delivery service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque `send(message) -> success | failure` over the delivery service.
///
/// Implementations make exactly one delivery attempt per call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PushSender: Send + Sync {
    /// Deliver one message to its topic or token
    async fn send(&self, message: &NotificationMessage) -> Result<MessageId>;

    /// Check if the channel is ready to send
    async fn health_check(&self) -> Result<bool>;

    /// Short name for logs and health output
    fn name(&self) -> &'static str;
}
