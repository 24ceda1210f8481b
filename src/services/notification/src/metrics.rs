//! Metrics collection for the notification dispatcher
//!
//! Counters are labelled by reaction name; delivery counters additionally by
//! target kind (`topic` or `token`, never the token itself).

use crate::config::MetricsConfig;
use crate::error::{NotificationError, Result};

use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::sync::Arc;
use tracing::info;

/// Metrics collector for the notification dispatcher
#[derive(Clone)]
pub struct NotifierMetrics {
    registry: Arc<Registry>,

    // Counters
    reactions_total: IntCounterVec,
    notifications_sent: IntCounterVec,
    notifications_failed: IntCounterVec,
    reactions_skipped: IntCounterVec,

    // Histograms
    send_duration: HistogramVec,
}

impl NotifierMetrics {
    /// Create a new metrics collector
    pub fn new(config: &MetricsConfig) -> Result<Self> {
        info!("Initializing notifier metrics");

        let registry = Registry::new();

        let reactions_total = IntCounterVec::new(
            Opts::new("reactions_total", "Total number of reactions started")
                .namespace(&config.namespace),
            &["reaction"],
        )
        .map_err(|e| {
            NotificationError::internal(format!("Failed to create reactions_total counter: {}", e))
        })?;

        let notifications_sent = IntCounterVec::new(
            Opts::new(
                "notifications_sent_total",
                "Total number of messages accepted by the delivery service",
            )
            .namespace(&config.namespace),
            &["reaction", "target"],
        )
        .map_err(|e| {
            NotificationError::internal(format!(
                "Failed to create notifications_sent counter: {}",
                e
            ))
        })?;

        let notifications_failed = IntCounterVec::new(
            Opts::new(
                "notifications_failed_total",
                "Total number of messages rejected by the delivery service",
            )
            .namespace(&config.namespace),
            &["reaction", "error"],
        )
        .map_err(|e| {
            NotificationError::internal(format!(
                "Failed to create notifications_failed counter: {}",
                e
            ))
        })?;

        let reactions_skipped = IntCounterVec::new(
            Opts::new(
                "reactions_skipped_total",
                "Total number of reactions that ended without sending",
            )
            .namespace(&config.namespace),
            &["reaction", "reason"],
        )
        .map_err(|e| {
            NotificationError::internal(format!(
                "Failed to create reactions_skipped counter: {}",
                e
            ))
        })?;

        let send_duration = HistogramVec::new(
            HistogramOpts::new(
                "send_duration_seconds",
                "Time taken by one delivery service call",
            )
            .namespace(&config.namespace)
            .buckets(config.histogram_buckets.clone()),
            &["reaction"],
        )
        .map_err(|e| {
            NotificationError::internal(format!("Failed to create send_duration histogram: {}", e))
        })?;

        registry
            .register(Box::new(reactions_total.clone()))
            .map_err(|e| {
                NotificationError::internal(format!("Failed to register reactions_total: {}", e))
            })?;
        registry
            .register(Box::new(notifications_sent.clone()))
            .map_err(|e| {
                NotificationError::internal(format!("Failed to register notifications_sent: {}", e))
            })?;
        registry
            .register(Box::new(notifications_failed.clone()))
            .map_err(|e| {
                NotificationError::internal(format!(
                    "Failed to register notifications_failed: {}",
                    e
                ))
            })?;
        registry
            .register(Box::new(reactions_skipped.clone()))
            .map_err(|e| {
                NotificationError::internal(format!("Failed to register reactions_skipped: {}", e))
            })?;
        registry
            .register(Box::new(send_duration.clone()))
            .map_err(|e| {
                NotificationError::internal(format!("Failed to register send_duration: {}", e))
            })?;

        Ok(Self {
            registry: Arc::new(registry),
            reactions_total,
            notifications_sent,
            notifications_failed,
            reactions_skipped,
            send_duration,
        })
    }

    pub fn record_reaction(&self, reaction: &str) {
        self.reactions_total.with_label_values(&[reaction]).inc();
    }

    /// Record an accepted message and how long the call took
    pub fn record_sent(&self, reaction: &str, target_kind: &str, seconds: f64) {
        self.notifications_sent
            .with_label_values(&[reaction, target_kind])
            .inc();
        self.send_duration
            .with_label_values(&[reaction])
            .observe(seconds);
    }

    /// Record a rejected message and how long the call took
    pub fn record_failed(&self, reaction: &str, error_code: &str, seconds: f64) {
        self.notifications_failed
            .with_label_values(&[reaction, error_code])
            .inc();
        self.send_duration
            .with_label_values(&[reaction])
            .observe(seconds);
    }

    pub fn record_skipped(&self, reaction: &str, reason: &str) {
        self.reactions_skipped
            .with_label_values(&[reaction, reason])
            .inc();
    }

    /// Export metrics in Prometheus text format
    pub fn export_metrics(&self) -> Result<String> {
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        encoder
            .encode_to_string(&metric_families)
            .map_err(|e| NotificationError::internal(format!("Failed to encode metrics: {}", e)))
    }

    /// Totals per metric family, for the health endpoint
    pub fn snapshot(&self) -> serde_json::Value {
        let mut totals = serde_json::json!({});

        for family in self.registry.gather() {
            let total: f64 = family
                .get_metric()
                .iter()
                .map(|metric| {
                    if metric.has_counter() {
                        metric.get_counter().get_value()
                    } else if metric.has_histogram() {
                        metric.get_histogram().get_sample_count() as f64
                    } else {
                        0.0
                    }
                })
                .sum();
            totals[family.get_name()] = serde_json::json!(total);
        }

        totals
    }
}
