//! Dispatcher
//!
//! Owns the shared reactor context and routes each trigger to its reactions.
//! Every entry point returns an outcome; none of them fail.

use crate::reactors::{
    billing_jobs, maintenance_request, maintenance_status, new_member, notice, payment,
    utility_bill, ReactionOutcome, ReactorContext,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use society_shared::types::ChangeEvent;
use tracing::{instrument, warn};

/// Readiness of the injected collaborators
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: &'static str,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatcherHealth {
    pub push: ComponentHealth,
    pub store: ComponentHealth,
}

impl DispatcherHealth {
    pub fn is_healthy(&self) -> bool {
        self.push.healthy && self.store.healthy
    }
}

fn component_health(name: &'static str, result: crate::error::Result<bool>) -> ComponentHealth {
    match result {
        Ok(healthy) => ComponentHealth {
            name,
            healthy,
            error: None,
        },
        Err(e) => {
            warn!(component = name, error = %e, "Health check failed");
            ComponentHealth {
                name,
                healthy: false,
                error: Some(e.to_string()),
            }
        }
    }
}

pub struct Dispatcher {
    ctx: ReactorContext,
}

impl Dispatcher {
    pub fn new(ctx: ReactorContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ReactorContext {
        &self.ctx
    }

    #[instrument(skip(self, event), fields(key = %event.key))]
    pub async fn notice_created(&self, event: &ChangeEvent) -> ReactionOutcome {
        notice::on_created(&self.ctx, event).await
    }

    #[instrument(skip(self, event), fields(key = %event.key))]
    pub async fn maintenance_request_created(&self, event: &ChangeEvent) -> ReactionOutcome {
        maintenance_request::on_created(&self.ctx, event).await
    }

    #[instrument(skip(self, event), fields(key = %event.key))]
    pub async fn maintenance_request_updated(&self, event: &ChangeEvent) -> ReactionOutcome {
        maintenance_status::on_updated(&self.ctx, event).await
    }

    #[instrument(skip(self, event), fields(key = %event.key))]
    pub async fn utility_bill_created(&self, event: &ChangeEvent) -> ReactionOutcome {
        utility_bill::on_created(&self.ctx, event).await
    }

    /// Confirmation and admin summary, in that order
    #[instrument(skip(self, event), fields(key = %event.key))]
    pub async fn payment_created(&self, event: &ChangeEvent) -> Vec<ReactionOutcome> {
        payment::on_created(&self.ctx, event).await
    }

    #[instrument(skip(self, event), fields(key = %event.key))]
    pub async fn member_created(&self, event: &ChangeEvent) -> ReactionOutcome {
        new_member::on_created(&self.ctx, event).await
    }

    #[instrument(skip(self))]
    pub async fn run_billing_reminder(&self, now: DateTime<Utc>) -> ReactionOutcome {
        billing_jobs::run_billing_reminder(&self.ctx, now).await
    }

    #[instrument(skip(self))]
    pub async fn run_overdue_alert(&self, now: DateTime<Utc>) -> ReactionOutcome {
        billing_jobs::run_overdue_alert(&self.ctx, now).await
    }

    pub async fn health(&self) -> DispatcherHealth {
        DispatcherHealth {
            push: component_health(self.ctx.sender.name(), self.ctx.sender.health_check().await),
            store: component_health(self.ctx.store.name(), self.ctx.store.health_check().await),
        }
    }
}
