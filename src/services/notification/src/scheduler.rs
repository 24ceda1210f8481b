//! Daily job scheduler
//!
//! Runs the billing reminder and the overdue alert on their cron schedules,
//! evaluated in the society's fixed UTC offset.

use crate::config::NotifierConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{NotificationError, Result};

use chrono::{FixedOffset, Offset, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;
use uuid::Uuid;

/// The scheduled jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyJob {
    BillingReminder,
    OverdueAlert,
}

impl DailyJob {
    pub fn as_str(&self) -> &'static str {
        match self {
            DailyJob::BillingReminder => "billing_reminder",
            DailyJob::OverdueAlert => "overdue_alert",
        }
    }

    /// Run one tick of this job against the current time
    pub async fn run(&self, dispatcher: &Dispatcher) {
        let now = Utc::now();
        let outcome = match self {
            DailyJob::BillingReminder => dispatcher.run_billing_reminder(now).await,
            DailyJob::OverdueAlert => dispatcher.run_overdue_alert(now).await,
        };

        info!(
            job = self.as_str(),
            sent = outcome.sent_count(),
            failed = outcome.failed_count(),
            skipped = ?outcome.skipped,
            "Scheduled job finished"
        );
    }
}

/// Cron scheduler for the daily jobs
#[derive(Clone)]
pub struct NotifierScheduler {
    enabled: bool,
    jobs: Vec<(DailyJob, String)>,
    offset: FixedOffset,
    dispatcher: Arc<Dispatcher>,
    scheduler: Arc<RwLock<Option<JobScheduler>>>,
}

impl NotifierScheduler {
    pub fn new(config: &NotifierConfig, dispatcher: Arc<Dispatcher>) -> Self {
        let scheduler = &config.scheduler;
        Self {
            enabled: scheduler.enabled,
            jobs: vec![
                (
                    DailyJob::BillingReminder,
                    scheduler.billing_reminder_cron.clone(),
                ),
                (DailyJob::OverdueAlert, scheduler.overdue_alert_cron.clone()),
            ],
            offset: config.utc_offset().unwrap_or_else(|| Utc.fix()),
            dispatcher,
            scheduler: Arc::new(RwLock::new(None)),
        }
    }

    /// Build the cron job for one daily job
    pub fn build_job(
        kind: DailyJob,
        expression: &str,
        offset: FixedOffset,
        dispatcher: Arc<Dispatcher>,
    ) -> Result<Job> {
        Job::new_async_tz(expression, offset, move |_uuid, _scheduler| {
            let dispatcher = dispatcher.clone();
            Box::pin(async move {
                kind.run(&dispatcher).await;
            })
        })
        .map_err(|e| {
            NotificationError::config(format!(
                "Invalid cron expression '{}' for {}: {}",
                expression,
                kind.as_str(),
                e
            ))
        })
    }

    /// Register the jobs and start ticking
    pub async fn start(&self) -> Result<Vec<Uuid>> {
        if !self.enabled {
            info!("Scheduler disabled, daily jobs will only run on demand");
            return Ok(Vec::new());
        }

        let mut slot = self.scheduler.write().await;
        if slot.is_some() {
            return Ok(Vec::new());
        }

        let scheduler = JobScheduler::new().await.map_err(|e| {
            NotificationError::internal(format!("Failed to create job scheduler: {}", e))
        })?;

        let mut job_ids = Vec::with_capacity(self.jobs.len());
        for (kind, expression) in &self.jobs {
            let job = Self::build_job(*kind, expression, self.offset, self.dispatcher.clone())?;
            let job_id = scheduler.add(job).await.map_err(|e| {
                NotificationError::internal(format!("Failed to add {}: {}", kind.as_str(), e))
            })?;
            info!(
                job = kind.as_str(),
                cron = %expression,
                offset = %self.offset,
                "Scheduled daily job"
            );
            job_ids.push(job_id);
        }

        scheduler.start().await.map_err(|e| {
            NotificationError::internal(format!("Failed to start job scheduler: {}", e))
        })?;

        *slot = Some(scheduler);
        info!("Scheduler started");
        Ok(job_ids)
    }

    pub async fn stop(&self) -> Result<()> {
        if let Some(mut scheduler) = self.scheduler.write().await.take() {
            scheduler.shutdown().await.map_err(|e| {
                NotificationError::internal(format!("Failed to stop job scheduler: {}", e))
            })?;
            info!("Scheduler stopped");
        }
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.scheduler.read().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::LogSender;
    use crate::config::MetricsConfig;
    use crate::metrics::NotifierMetrics;
    use crate::reactors::ReactorContext;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn dispatcher(store: MemoryStore, sender: Arc<LogSender>) -> Arc<Dispatcher> {
        let metrics = Arc::new(NotifierMetrics::new(&MetricsConfig::default()).unwrap());
        Arc::new(Dispatcher::new(ReactorContext::new(
            &NotifierConfig::default(),
            sender,
            Arc::new(store),
            metrics,
        )))
    }

    #[tokio::test]
    async fn test_build_job_validates_cron() {
        let dispatcher = dispatcher(MemoryStore::new(), Arc::new(LogSender::new()));
        let offset = FixedOffset::east_opt(330 * 60).unwrap();

        assert!(NotifierScheduler::build_job(
            DailyJob::BillingReminder,
            "0 0 9 * * *",
            offset,
            dispatcher.clone()
        )
        .is_ok());
        assert!(NotifierScheduler::build_job(
            DailyJob::OverdueAlert,
            "every morning",
            offset,
            dispatcher
        )
        .is_err());
    }

    #[tokio::test]
    async fn test_disabled_scheduler_registers_nothing() {
        let mut config = NotifierConfig::default();
        config.scheduler.enabled = false;
        let scheduler = NotifierScheduler::new(
            &config,
            dispatcher(MemoryStore::new(), Arc::new(LogSender::new())),
        );

        assert!(scheduler.start().await.unwrap().is_empty());
        assert!(!scheduler.is_running().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_and_stop() {
        let scheduler = NotifierScheduler::new(
            &NotifierConfig::default(),
            dispatcher(MemoryStore::new(), Arc::new(LogSender::new())),
        );

        assert_eq!(scheduler.start().await.unwrap().len(), 2);
        assert!(scheduler.is_running().await);

        scheduler.stop().await.unwrap();
        assert!(!scheduler.is_running().await);
    }

    #[tokio::test]
    async fn test_job_tick_runs_against_store() {
        let store = MemoryStore::new();
        store.insert_bill(
            "b1",
            json!({"isActive": true, "status": "overdue", "dueDate": "2020-01-01"}),
        );
        let sender = Arc::new(LogSender::new());
        let dispatcher = dispatcher(store, sender.clone());

        DailyJob::OverdueAlert.run(&dispatcher).await;
        DailyJob::BillingReminder.run(&dispatcher).await;

        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title(), "Overdue Bill");
    }
}
