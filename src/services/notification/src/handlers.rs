//! Request handlers for the trigger ingress
//!
//! Trigger handlers always answer `200` with the reaction outcome; failures
//! inside a reaction are reported in the body, never as an error status.
//! Only an unreadable request body is rejected, by the `Json` extractor.

use crate::dispatcher::Dispatcher;
use crate::error::Result;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

pub mod triggers_handler {
    use super::*;
    use society_shared::types::ChangeEvent;

    /// A notice was created
    pub async fn notice_created(
        State(dispatcher): State<Arc<Dispatcher>>,
        Json(event): Json<ChangeEvent>,
    ) -> impl IntoResponse {
        Json(dispatcher.notice_created(&event).await)
    }

    /// A maintenance request was created
    pub async fn maintenance_request_created(
        State(dispatcher): State<Arc<Dispatcher>>,
        Json(event): Json<ChangeEvent>,
    ) -> impl IntoResponse {
        Json(dispatcher.maintenance_request_created(&event).await)
    }

    /// A maintenance request was updated
    pub async fn maintenance_request_updated(
        State(dispatcher): State<Arc<Dispatcher>>,
        Json(event): Json<ChangeEvent>,
    ) -> impl IntoResponse {
        Json(dispatcher.maintenance_request_updated(&event).await)
    }

    /// A utility bill was created
    pub async fn utility_bill_created(
        State(dispatcher): State<Arc<Dispatcher>>,
        Json(event): Json<ChangeEvent>,
    ) -> impl IntoResponse {
        Json(dispatcher.utility_bill_created(&event).await)
    }

    /// A payment was created; answers with both payment outcomes
    pub async fn payment_created(
        State(dispatcher): State<Arc<Dispatcher>>,
        Json(event): Json<ChangeEvent>,
    ) -> impl IntoResponse {
        Json(dispatcher.payment_created(&event).await)
    }

    /// A member was created
    pub async fn member_created(
        State(dispatcher): State<Arc<Dispatcher>>,
        Json(event): Json<ChangeEvent>,
    ) -> impl IntoResponse {
        Json(dispatcher.member_created(&event).await)
    }
}

pub mod jobs_handler {
    use super::*;
    use chrono::{DateTime, Utc};
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    pub struct RunQuery {
        /// Evaluate the job as of this instant instead of now
        pub now: Option<DateTime<Utc>>,
    }

    /// Run one billing reminder tick
    pub async fn run_billing_reminder(
        State(dispatcher): State<Arc<Dispatcher>>,
        Query(query): Query<RunQuery>,
    ) -> impl IntoResponse {
        let now = query.now.unwrap_or_else(Utc::now);
        info!(job = "billing_reminder", now = %now, "Manual job run requested");
        Json(dispatcher.run_billing_reminder(now).await)
    }

    /// Run one overdue alert tick
    pub async fn run_overdue_alert(
        State(dispatcher): State<Arc<Dispatcher>>,
        Query(query): Query<RunQuery>,
    ) -> impl IntoResponse {
        let now = query.now.unwrap_or_else(Utc::now);
        info!(job = "overdue_alert", now = %now, "Manual job run requested");
        Json(dispatcher.run_overdue_alert(now).await)
    }
}

/// Health check handler
pub async fn health_handler(State(dispatcher): State<Arc<Dispatcher>>) -> impl IntoResponse {
    let health = dispatcher.health().await;
    let healthy = health.is_healthy();

    let status = if healthy {
        StatusCode::OK
    } else {
        error!(
            push = health.push.healthy,
            store = health.store.healthy,
            "Health check failed"
        );
        StatusCode::SERVICE_UNAVAILABLE
    };

    let body = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "components": health,
        "metrics": dispatcher.context().metrics.snapshot(),
    });

    (status, Json(body))
}

/// Prometheus text exposition
pub async fn metrics_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
) -> Result<impl IntoResponse> {
    let body = dispatcher.context().metrics.export_metrics().map_err(|e| {
        error!("Failed to export metrics: {}", e);
        e
    })?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
