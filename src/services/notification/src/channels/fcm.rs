//! Push channel implementation using the FCM HTTP v1 API

use crate::channels::{MessageId, PushSender};
use crate::config::PushConfig;
use crate::error::{NotificationError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use society_shared::types::{AndroidPriority, NotificationMessage, Target};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Access tokens are refreshed this long before they expire
const TOKEN_REFRESH_MARGIN_SECONDS: i64 = 60;

#[derive(Deserialize)]
struct ServiceAccountKey {
    project_id: Option<String>,
    private_key: String,
    client_email: String,
    token_uri: Option<String>,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
struct SendResponse {
    name: String,
}

enum Credentials {
    ServiceAccount {
        client_email: String,
        token_uri: String,
        key: EncodingKey,
    },
    Static(String),
}

struct CachedToken {
    value: String,
    refresh_after: DateTime<Utc>,
}

/// Push channel delivering through Firebase Cloud Messaging
pub struct FcmSender {
    client: Client,
    send_url: String,
    credentials: Credentials,
    token: RwLock<Option<CachedToken>>,
}

impl FcmSender {
    /// Create a new FCM channel with the given configuration
    pub async fn new(config: &PushConfig) -> Result<Self> {
        info!("Initializing FCM channel");

        let fcm = &config.fcm;
        let (credentials, key_project) = if let Some(token) = &fcm.access_token {
            (Credentials::Static(token.clone()), None)
        } else if let Some(path) = &fcm.credentials_path {
            let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                NotificationError::config(format!(
                    "Failed to read service account key {}: {}",
                    path, e
                ))
            })?;
            Self::parse_service_account(&raw, fcm.token_uri.as_deref())?
        } else {
            return Err(NotificationError::config(
                "FCM channel needs a credentials path or an access token",
            ));
        };

        let project_id = if fcm.project_id.is_empty() {
            key_project.ok_or_else(|| NotificationError::config("FCM project id is not set"))?
        } else {
            fcm.project_id.clone()
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| {
                NotificationError::config(format!("Failed to create HTTP client: {}", e))
            })?;

        let send_url = format!(
            "{}/v1/projects/{}/messages:send",
            fcm.endpoint.trim_end_matches('/'),
            project_id
        );

        info!("FCM channel initialized for project {}", project_id);

        Ok(Self {
            client,
            send_url,
            credentials,
            token: RwLock::new(None),
        })
    }

    fn parse_service_account(
        raw: &str,
        token_uri_override: Option<&str>,
    ) -> Result<(Credentials, Option<String>)> {
        let key: ServiceAccountKey = serde_json::from_str(raw).map_err(|e| {
            NotificationError::config(format!("Invalid service account key: {}", e))
        })?;

        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        let token_uri = token_uri_override
            .map(str::to_string)
            .or(key.token_uri)
            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string());

        Ok((
            Credentials::ServiceAccount {
                client_email: key.client_email,
                token_uri,
                key: encoding_key,
            },
            key.project_id,
        ))
    }

    /// Current access token, minting a new one when the cached one is stale
    async fn access_token(&self) -> Result<String> {
        let (client_email, token_uri, key) = match &self.credentials {
            Credentials::Static(token) => return Ok(token.clone()),
            Credentials::ServiceAccount {
                client_email,
                token_uri,
                key,
            } => (client_email, token_uri, key),
        };

        if let Some(cached) = self.token.read().await.as_ref() {
            if cached.refresh_after > Utc::now() {
                return Ok(cached.value.clone());
            }
        }

        let mut slot = self.token.write().await;
        if let Some(cached) = slot.as_ref() {
            if cached.refresh_after > Utc::now() {
                return Ok(cached.value.clone());
            }
        }

        let fresh = self.mint_token(client_email, token_uri, key).await?;
        let value = fresh.value.clone();
        *slot = Some(fresh);
        Ok(value)
    }

    async fn mint_token(
        &self,
        client_email: &str,
        token_uri: &str,
        key: &EncodingKey,
    ) -> Result<CachedToken> {
        debug!("Requesting FCM access token from {}", token_uri);

        let now = Utc::now();
        let claims = AssertionClaims {
            iss: client_email,
            scope: MESSAGING_SCOPE,
            aud: token_uri,
            iat: now.timestamp(),
            exp: (now + ChronoDuration::hours(1)).timestamp(),
        };
        let assertion = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, key)?;

        let response = self
            .client
            .post(token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotificationError::auth(format!(
                "Token endpoint responded {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response.json().await?;
        Ok(CachedToken {
            value: token.access_token,
            refresh_after: now
                + ChronoDuration::seconds(token.expires_in - TOKEN_REFRESH_MARGIN_SECONDS),
        })
    }

    /// Serialize a message into the v1 `messages:send` request body
    pub(crate) fn request_body(message: &NotificationMessage) -> Value {
        let mut body = Map::new();

        match &message.target {
            Target::Topic(topic) => body.insert("topic".to_string(), json!(topic)),
            Target::Token(token) => body.insert("token".to_string(), json!(token)),
        };

        let mut notification = json!({
            "title": message.notification.title,
            "body": message.notification.body,
        });
        if let Some(image) = &message.notification.image {
            notification["image"] = json!(image);
        }
        body.insert("notification".to_string(), notification);

        if let Some(android) = &message.android {
            let mut rendered = json!({
                "title": android.title,
                "body": android.body,
                "sound": android.sound,
                "channel_id": android.channel_id,
                "click_action": android.click_action,
                "notification_priority": android_priority(android.priority),
            });
            if let Some(image) = &android.image {
                rendered["image"] = json!(image);
            }
            if let Some(tag) = &android.tag {
                rendered["tag"] = json!(tag);
            }
            body.insert("android".to_string(), json!({ "notification": rendered }));
        }

        if let Some(apns) = &message.apns {
            let mut aps = json!({
                "alert": {
                    "title": apns.alert_title,
                    "body": apns.alert_body,
                },
                "sound": apns.sound,
            });
            if let Some(badge) = apns.badge {
                aps["badge"] = json!(badge);
            }
            if let Some(category) = &apns.category {
                aps["category"] = json!(category);
            }
            if let Some(thread_id) = &apns.thread_id {
                aps["thread-id"] = json!(thread_id);
            }

            let mut rendered = json!({ "payload": { "aps": aps } });
            if let Some(image) = &apns.image {
                rendered["fcm_options"] = json!({ "image": image });
            }
            body.insert("apns".to_string(), rendered);
        }

        if !message.data.is_empty() {
            body.insert("data".to_string(), json!(message.data));
        }

        json!({ "message": body })
    }
}

fn android_priority(priority: AndroidPriority) -> &'static str {
    match priority {
        AndroidPriority::Normal => "PRIORITY_DEFAULT",
        AndroidPriority::High => "PRIORITY_HIGH",
        AndroidPriority::Max => "PRIORITY_MAX",
    }
}

#[async_trait]
impl PushSender for FcmSender {
    async fn send(&self, message: &NotificationMessage) -> Result<MessageId> {
        let token = self.access_token().await?;

        let response = self
            .client
            .post(&self.send_url)
            .bearer_auth(&token)
            .json(&Self::request_body(message))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let accepted: SendResponse = response.json().await?;
            return Ok(MessageId(accepted.name));
        }

        if status == StatusCode::UNAUTHORIZED {
            warn!("FCM rejected the access token, dropping cached token");
            self.token.write().await.take();
        }

        let body = response.text().await.unwrap_or_default();
        Err(NotificationError::push(format!(
            "FCM responded {}: {}",
            status, body
        )))
    }

    async fn health_check(&self) -> Result<bool> {
        self.access_token().await.map(|_| true)
    }

    fn name(&self) -> &'static str {
        "fcm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FcmConfig, PushProvider};
    use pretty_assertions::assert_eq;
    use society_shared::types::{AndroidNotification, ApnsConfig};
    use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SERVICE_ACCOUNT: &str = concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/service_account.json"
    );

    fn static_token_config(endpoint: &str) -> PushConfig {
        PushConfig {
            provider: PushProvider::Fcm,
            fcm: FcmConfig {
                project_id: "society-app".to_string(),
                credentials_path: None,
                access_token: Some("static-token".to_string()),
                endpoint: endpoint.to_string(),
                token_uri: None,
            },
            timeout_seconds: 5,
            ..PushConfig::default()
        }
    }

    fn service_account_config(endpoint: &str) -> PushConfig {
        PushConfig {
            provider: PushProvider::Fcm,
            fcm: FcmConfig {
                project_id: String::new(),
                credentials_path: Some(SERVICE_ACCOUNT.to_string()),
                access_token: None,
                endpoint: endpoint.to_string(),
                token_uri: Some(format!("{}/token", endpoint)),
            },
            timeout_seconds: 5,
            ..PushConfig::default()
        }
    }

    #[test]
    fn test_request_body_for_topic_message() {
        let message = NotificationMessage::new(Target::topic("all_users"), "Title", "Body")
            .with_image(Some("https://cdn/hero.jpg"))
            .with_android(
                AndroidNotification::new("Title", "Body", AndroidPriority::Max)
                    .with_image(Some("https://cdn/hero.jpg"))
                    .with_tag("n1"),
            )
            .with_apns(
                ApnsConfig::alert("Title", "Body")
                    .with_category("NOTICE_CATEGORY")
                    .with_thread("notices")
                    .with_image(Some("https://cdn/hero.jpg")),
            )
            .with_data("type", "notice");

        let body = FcmSender::request_body(&message);

        assert_eq!(
            body,
            json!({
                "message": {
                    "topic": "all_users",
                    "notification": {
                        "title": "Title",
                        "body": "Body",
                        "image": "https://cdn/hero.jpg"
                    },
                    "android": {
                        "notification": {
                            "title": "Title",
                            "body": "Body",
                            "sound": "default",
                            "channel_id": "high_importance_channel",
                            "click_action": "FLUTTER_NOTIFICATION_CLICK",
                            "notification_priority": "PRIORITY_MAX",
                            "image": "https://cdn/hero.jpg",
                            "tag": "n1"
                        }
                    },
                    "apns": {
                        "payload": {
                            "aps": {
                                "alert": { "title": "Title", "body": "Body" },
                                "sound": "default",
                                "badge": 1,
                                "category": "NOTICE_CATEGORY",
                                "thread-id": "notices"
                            }
                        },
                        "fcm_options": { "image": "https://cdn/hero.jpg" }
                    },
                    "data": { "type": "notice" }
                }
            })
        );
    }

    #[test]
    fn test_request_body_for_token_message() {
        let message = NotificationMessage::new(Target::token("tok1"), "Payment Successful", "ok");
        let body = FcmSender::request_body(&message);

        assert_eq!(body["message"]["token"], "tok1");
        assert!(body["message"].get("topic").is_none());
        assert!(body["message"].get("data").is_none());
        assert!(body["message"].get("android").is_none());
    }

    #[tokio::test]
    async fn test_send_with_static_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/society-app/messages:send"))
            .and(header("authorization", "Bearer static-token"))
            .and(body_partial_json(json!({"message": {"topic": "all_users"}})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"name": "projects/society-app/messages/1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let sender = FcmSender::new(&static_token_config(&server.uri()))
            .await
            .unwrap();
        let message = NotificationMessage::new(Target::topic("all_users"), "Hi", "There");

        let id = sender.send(&message).await.unwrap();
        assert_eq!(id, MessageId::from("projects/society-app/messages/1"));
    }

    #[tokio::test]
    async fn test_rejected_send_is_a_push_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/society-app/messages:send"))
            .respond_with(ResponseTemplate::new(404).set_body_string("UNREGISTERED"))
            .expect(1)
            .mount(&server)
            .await;

        let sender = FcmSender::new(&static_token_config(&server.uri()))
            .await
            .unwrap();
        let message = NotificationMessage::new(Target::token("stale"), "Hi", "There");

        let error = sender.send(&message).await.unwrap_err();
        assert!(matches!(error, NotificationError::Push { .. }));
        assert!(error.to_string().contains("UNREGISTERED"));
    }

    #[tokio::test]
    async fn test_service_account_token_is_minted_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "minted-token",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/projects/society-test/messages:send"))
            .and(header("authorization", "Bearer minted-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"name": "projects/society-test/messages/2"})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let sender = FcmSender::new(&service_account_config(&server.uri()))
            .await
            .unwrap();
        let message = NotificationMessage::new(Target::topic("maintenance_admins"), "A", "B");

        sender.send(&message).await.unwrap();
        sender.send(&message).await.unwrap();
    }

    #[tokio::test]
    async fn test_token_endpoint_failure_is_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let sender = FcmSender::new(&service_account_config(&server.uri()))
            .await
            .unwrap();

        let error = sender.health_check().await.unwrap_err();
        assert!(matches!(error, NotificationError::Auth { .. }));
    }

    #[tokio::test]
    async fn test_missing_credentials_rejected() {
        let mut config = static_token_config("http://localhost");
        config.fcm.access_token = None;
        assert!(FcmSender::new(&config).await.is_err());
    }
}
