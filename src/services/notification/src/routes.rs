//! Routes module for the notification dispatcher
//!
//! - Trigger endpoints, one per watched collection and change kind
//! - Manual runs of the daily jobs
//! - Health and metrics endpoints

use crate::config::NotifierConfig;
use crate::dispatcher::Dispatcher;
use crate::handlers::{health_handler, jobs_handler, metrics_handler, triggers_handler};

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Build the main router for the dispatcher
pub fn create_router(dispatcher: Arc<Dispatcher>, config: &NotifierConfig) -> Router {
    let trigger_router = create_trigger_router(Arc::clone(&dispatcher));
    let job_router = create_job_router(Arc::clone(&dispatcher));
    let health_router = create_health_router(dispatcher, config.metrics.enabled);

    Router::new()
        .merge(trigger_router)
        .merge(job_router)
        .merge(health_router)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(config.get_timeout("server")))
                .into_inner(),
        )
}

/// Change-event endpoints called by the trigger runtime
fn create_trigger_router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route(
            "/v1/triggers/notices/created",
            post(triggers_handler::notice_created),
        )
        .route(
            "/v1/triggers/maintenance_requests/created",
            post(triggers_handler::maintenance_request_created),
        )
        .route(
            "/v1/triggers/maintenance_requests/updated",
            post(triggers_handler::maintenance_request_updated),
        )
        .route(
            "/v1/triggers/utility_bills/created",
            post(triggers_handler::utility_bill_created),
        )
        .route(
            "/v1/triggers/payments/created",
            post(triggers_handler::payment_created),
        )
        .route(
            "/v1/triggers/members/created",
            post(triggers_handler::member_created),
        )
        .with_state(dispatcher)
}

fn create_job_router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route(
            "/v1/jobs/billing_reminder/run",
            post(jobs_handler::run_billing_reminder),
        )
        .route(
            "/v1/jobs/overdue_alert/run",
            post(jobs_handler::run_overdue_alert),
        )
        .with_state(dispatcher)
}

/// Create health and metrics routes
fn create_health_router(dispatcher: Arc<Dispatcher>, metrics_enabled: bool) -> Router {
    let router = Router::new().route("/health", get(health_handler));
    let router = if metrics_enabled {
        router.route("/metrics", get(metrics_handler))
    } else {
        router
    };
    router.with_state(dispatcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::LogSender;
    use crate::metrics::NotifierMetrics;
    use crate::reactors::ReactorContext;
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn create_test_app(config: &NotifierConfig, store: MemoryStore) -> (Router, Arc<LogSender>) {
        let sender = Arc::new(LogSender::new());
        let metrics = Arc::new(NotifierMetrics::new(&config.metrics).unwrap());
        let dispatcher = Arc::new(Dispatcher::new(ReactorContext::new(
            config,
            sender.clone(),
            Arc::new(store),
            metrics,
        )));
        (create_router(dispatcher, config), sender)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _) = create_test_app(&NotifierConfig::default(), MemoryStore::new());

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["components"]["push"]["name"], "log");
        assert_eq!(body["components"]["store"]["name"], "memory");
    }

    #[tokio::test]
    async fn test_metrics_endpoint_toggle() {
        let (app, _) = create_test_app(&NotifierConfig::default(), MemoryStore::new());
        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let mut config = NotifierConfig::default();
        config.metrics.enabled = false;
        let (app, _) = create_test_app(&config, MemoryStore::new());
        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_member_trigger_returns_outcome() {
        let (app, sender) = create_test_app(&NotifierConfig::default(), MemoryStore::new());

        let response = app
            .oneshot(post_json(
                "/v1/triggers/members/created",
                json!({"key": "m1", "after": {"name": "Asha", "apartmentNumber": "D-402"}}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["reaction"], "new_member");
        assert_eq!(body["deliveries"][0]["status"], "sent");
        assert_eq!(
            sender.sent()[0].body(),
            "Asha from Flat D-402 registered."
        );
    }

    #[tokio::test]
    async fn test_payment_trigger_returns_both_outcomes() {
        let (app, _) = create_test_app(&NotifierConfig::default(), MemoryStore::new());

        let response = app
            .oneshot(post_json(
                "/v1/triggers/payments/created",
                json!({"key": "p1", "after": {"amount": 500}}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body[0]["reaction"], "payment_confirmation");
        assert_eq!(body[0]["skipped"], "missing_user_id");
        assert_eq!(body[1]["reaction"], "payment_received");
        assert_eq!(body[1]["deliveries"][0]["status"], "sent");
    }

    #[tokio::test]
    async fn test_skipped_reaction_is_still_ok() {
        let (app, sender) = create_test_app(&NotifierConfig::default(), MemoryStore::new());

        let response = app
            .oneshot(post_json(
                "/v1/triggers/maintenance_requests/updated",
                json!({
                    "key": "r1",
                    "before": {"status": "open", "userId": "u1"},
                    "after": {"status": "open", "userId": "u1"}
                }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["skipped"], "status_unchanged");
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body_is_rejected() {
        let (app, sender) = create_test_app(&NotifierConfig::default(), MemoryStore::new());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/triggers/notices/created")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_overdue_job_run_with_explicit_instant() {
        let store = MemoryStore::new();
        store.insert_bill(
            "b1",
            json!({"isActive": true, "status": "overdue", "dueDate": "2024-02-20"}),
        );
        let (app, sender) = create_test_app(&NotifierConfig::default(), store);

        let response = app
            .oneshot(
                Request::post("/v1/jobs/overdue_alert/run?now=2024-03-01T04:00:00Z")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["reaction"], "overdue_alert");
        assert_eq!(sender.sent().len(), 1);
        assert_eq!(sender.sent()[0].title(), "Overdue Bill");
    }
}
