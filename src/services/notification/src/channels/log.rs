//! Log-only push channel
//!
//! Used for local runs and dry runs: every message is logged and the most
//! recent ones are kept in memory so they can be inspected. Nothing leaves
//! the process.

use crate::channels::{MessageId, PushSender};
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use society_shared::types::NotificationMessage;
use std::collections::VecDeque;
use tracing::info;
use uuid::Uuid;

/// Messages retained by [`LogSender::new`]
pub const DEFAULT_RETENTION: usize = 100;

pub struct LogSender {
    capacity: usize,
    sent: Mutex<VecDeque<NotificationMessage>>,
}

impl Default for LogSender {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_RETENTION)
    }
}

impl LogSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `capacity` messages; older ones are dropped first
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            sent: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_RETENTION))),
        }
    }

    /// Retained messages, oldest first
    pub fn sent(&self) -> Vec<NotificationMessage> {
        self.sent.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl PushSender for LogSender {
    async fn send(&self, message: &NotificationMessage) -> Result<MessageId> {
        let id = MessageId(format!("log/{}", Uuid::new_v4()));

        info!(
            recipient = %message.target,
            title = %message.title(),
            body = %message.body(),
            data_fields = message.data.len(),
            message_id = %id,
            "Push message recorded (log channel)"
        );

        if self.capacity > 0 {
            let mut sent = self.sent.lock();
            if sent.len() == self.capacity {
                sent.pop_front();
            }
            sent.push_back(message.clone());
        }
        Ok(id)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
