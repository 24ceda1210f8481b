//! Outbound push message description
//!
//! A [`NotificationMessage`] is built fresh for every send and handed to the
//! delivery service as-is. The data channel is a `BTreeMap<String, String>`:
//! the delivery service only accepts string values there, so numbers and flags
//! have to be stringified by whoever builds the message.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Broadcast topic every resident device subscribes to
pub const ALL_USERS_TOPIC: &str = "all_users";

/// Broadcast topic for committee and maintenance staff devices
pub const ADMIN_TOPIC: &str = "maintenance_admins";

/// Click action understood by the mobile client
pub const CLICK_ACTION: &str = "FLUTTER_NOTIFICATION_CLICK";

pub const DEFAULT_SOUND: &str = "default";

/// Android channel registered by the mobile client
pub const HIGH_IMPORTANCE_CHANNEL: &str = "high_importance_channel";

// ============================================================================
// TARGETING
// ============================================================================

/// Where a message is delivered
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Target {
    /// Named broadcast channel
    Topic(String),
    /// Single device registration token
    Token(String),
}

impl Target {
    pub fn topic(name: impl Into<String>) -> Self {
        Target::Topic(name.into())
    }

    pub fn token(value: impl Into<String>) -> Self {
        Target::Token(value.into())
    }

    pub fn is_topic(&self) -> bool {
        matches!(self, Target::Topic(_))
    }
}

/// Label for logs and delivery reports; device tokens are shortened
impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Topic(name) => write!(f, "topic:{}", name),
            Target::Token(token) => {
                let prefix: String = token.chars().take(8).collect();
                if prefix.len() < token.len() {
                    write!(f, "token:{}…", prefix)
                } else {
                    write!(f, "token:{}", prefix)
                }
            }
        }
    }
}

// ============================================================================
// NOTIFICATION CONTENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AndroidPriority {
    Normal,
    High,
    Max,
}

/// Android-specific rendering hints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AndroidNotification {
    pub title: String,
    pub body: String,
    pub priority: AndroidPriority,
    pub sound: String,
    pub channel_id: String,
    pub click_action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Grouping tag; notifications sharing a tag replace each other
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl AndroidNotification {
    pub fn new(title: &str, body: &str, priority: AndroidPriority) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
            priority,
            sound: DEFAULT_SOUND.to_string(),
            channel_id: HIGH_IMPORTANCE_CHANNEL.to_string(),
            click_action: CLICK_ACTION.to_string(),
            image: None,
            tag: None,
        }
    }

    pub fn with_image(mut self, image: Option<&str>) -> Self {
        self.image = image.map(str::to_string);
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }
}

/// Apple-specific rendering hints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApnsConfig {
    pub alert_title: String,
    pub alert_body: String,
    pub sound: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl ApnsConfig {
    /// Alert with the default sound and a badge of one
    pub fn alert(title: &str, body: &str) -> Self {
        Self {
            alert_title: title.to_string(),
            alert_body: body.to_string(),
            sound: DEFAULT_SOUND.to_string(),
            badge: Some(1),
            category: None,
            thread_id: None,
            image: None,
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn with_thread(mut self, thread_id: &str) -> Self {
        self.thread_id = Some(thread_id.to_string());
        self
    }

    pub fn with_image(mut self, image: Option<&str>) -> Self {
        self.image = image.map(str::to_string);
        self
    }
}

// ============================================================================
// MESSAGE
// ============================================================================

/// Fully composed push message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub target: Target,
    pub notification: Notification,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub android: Option<AndroidNotification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apns: Option<ApnsConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
}

impl NotificationMessage {
    pub fn new(target: Target, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            target,
            notification: Notification {
                title: title.into(),
                body: body.into(),
                image: None,
            },
            android: None,
            apns: None,
            data: BTreeMap::new(),
        }
    }

    pub fn with_image(mut self, image: Option<&str>) -> Self {
        self.notification.image = image.map(str::to_string);
        self
    }

    pub fn with_android(mut self, android: AndroidNotification) -> Self {
        self.android = Some(android);
        self
    }

    pub fn with_apns(mut self, apns: ApnsConfig) -> Self {
        self.apns = Some(apns);
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Replace the data channel wholesale
    pub fn with_data_map(mut self, data: BTreeMap<String, String>) -> Self {
        self.data = data;
        self
    }

    pub fn title(&self) -> &str {
        &self.notification.title
    }

    pub fn body(&self) -> &str {
        &self.notification.body
    }
}
