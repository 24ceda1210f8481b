//! Error handling for the notification dispatcher
//!
//! Reactions never propagate these errors past their own boundary: they are
//! logged and recorded in the reaction outcome. The HTTP layer only surfaces
//! errors raised before a reaction starts (bad configuration, bad requests).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Result type alias for dispatcher operations
pub type Result<T> = std::result::Result<T, NotificationError>;

/// Main error type for the notification dispatcher
#[derive(Error, Debug)]
pub enum NotificationError {
    /// The change event carried no snapshot to react to
    #[error("Missing data: {message}")]
    MissingData { message: String },

    /// A snapshot did not match the collection schema
    #[error("Invalid {collection} record: {message}")]
    InvalidRecord { collection: String, message: String },

    /// Recipient lookup failed
    #[error("Lookup error: {message}")]
    Lookup { message: String },

    /// Push delivery errors
    #[error("Push notification error: {message}")]
    Push { message: String },

    /// Credential or access-token errors
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Document store errors
    #[error("Database error: {message}")]
    Database { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Network/connection errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// Timeout errors
    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    /// External service errors
    #[error("External service error: {service}: {message}")]
    ExternalService { service: String, message: String },

    /// Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl NotificationError {
    /// Get the HTTP status code that should be returned for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            NotificationError::MissingData { .. } => StatusCode::BAD_REQUEST,
            NotificationError::InvalidRecord { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            NotificationError::Lookup { .. } => StatusCode::BAD_GATEWAY,
            NotificationError::Push { .. } => StatusCode::BAD_GATEWAY,
            NotificationError::Auth { .. } => StatusCode::BAD_GATEWAY,
            NotificationError::Config { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            NotificationError::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            NotificationError::Serialization { .. } => StatusCode::BAD_REQUEST,
            NotificationError::Network { .. } => StatusCode::BAD_GATEWAY,
            NotificationError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            NotificationError::ExternalService { .. } => StatusCode::BAD_GATEWAY,
            NotificationError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for API responses and metric labels
    pub fn error_code(&self) -> &'static str {
        match self {
            NotificationError::MissingData { .. } => "MISSING_DATA",
            NotificationError::InvalidRecord { .. } => "INVALID_RECORD",
            NotificationError::Lookup { .. } => "LOOKUP_ERROR",
            NotificationError::Push { .. } => "PUSH_ERROR",
            NotificationError::Auth { .. } => "AUTH_ERROR",
            NotificationError::Config { .. } => "CONFIG_ERROR",
            NotificationError::Database { .. } => "DATABASE_ERROR",
            NotificationError::Serialization { .. } => "SERIALIZATION_ERROR",
            NotificationError::Network { .. } => "NETWORK_ERROR",
            NotificationError::Timeout { .. } => "TIMEOUT",
            NotificationError::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            NotificationError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for NotificationError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
                "status": status.as_u16()
            }
        }));

        (status, body).into_response()
    }
}

// Conversion implementations for external error types

impl From<reqwest::Error> for NotificationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NotificationError::Timeout {
                operation: "HTTP request".to_string(),
            }
        } else if err.is_connect() {
            NotificationError::Network {
                message: err.to_string(),
            }
        } else {
            NotificationError::ExternalService {
                service: "HTTP".to_string(),
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for NotificationError {
    fn from(err: serde_json::Error) -> Self {
        NotificationError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<mongodb::error::Error> for NotificationError {
    fn from(err: mongodb::error::Error) -> Self {
        NotificationError::Database {
            message: err.to_string(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for NotificationError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        NotificationError::Auth {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for NotificationError {
    fn from(err: config::ConfigError) -> Self {
        NotificationError::Config {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for NotificationError {
    fn from(err: std::io::Error) -> Self {
        NotificationError::Internal {
            message: err.to_string(),
        }
    }
}

// Utility functions for creating specific error types

impl NotificationError {
    /// Create a missing data error
    pub fn missing_data<S: Into<String>>(message: S) -> Self {
        Self::MissingData {
            message: message.into(),
        }
    }

    /// Create an invalid record error
    pub fn invalid_record<S1: Into<String>, S2: Into<String>>(collection: S1, message: S2) -> Self {
        Self::InvalidRecord {
            collection: collection.into(),
            message: message.into(),
        }
    }

    /// Create a lookup error
    pub fn lookup<S: Into<String>>(message: S) -> Self {
        Self::Lookup {
            message: message.into(),
        }
    }

    /// Create a push notification error
    pub fn push<S: Into<String>>(message: S) -> Self {
        Self::Push {
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth<S: Into<String>>(message: S) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a database error
    pub fn database<S: Into<String>>(message: S) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}
