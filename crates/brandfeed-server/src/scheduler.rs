//! Background refresh scheduler.
//!
//! Pulls the latest Apify run once at startup and then on the configured
//! cron expression.

use std::sync::Arc;

use brandfeed_core::RunSource;
use brandfeed_pipeline::{IngestOptions, Ingestor};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

/// Builds and starts the job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive for
/// the lifetime of the process. Without a data source no job is registered.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// `cron` is not a valid expression, or the scheduler fails to start.
pub async fn build_scheduler(
    ingestor: Ingestor,
    source: Option<Arc<dyn RunSource>>,
    cron: &str,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    if let Some(source) = source {
        register_refresh_job(&scheduler, ingestor.clone(), Arc::clone(&source), cron).await?;

        tokio::spawn(async move {
            tracing::info!("scheduler: initial refresh");
            run_refresh(&ingestor, source.as_ref()).await;
        });
    }

    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_refresh_job(
    scheduler: &JobScheduler,
    ingestor: Ingestor,
    source: Arc<dyn RunSource>,
    cron: &str,
) -> Result<(), JobSchedulerError> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let ingestor = ingestor.clone();
        let source = Arc::clone(&source);

        Box::pin(async move {
            tracing::info!("scheduler: starting refresh");
            run_refresh(&ingestor, source.as_ref()).await;
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron, "scheduler: refresh job registered");
    Ok(())
}

/// Run one non-forced refresh and log its outcome.
async fn run_refresh(ingestor: &Ingestor, source: &dyn RunSource) {
    let outcome = ingestor.refresh(source, IngestOptions::default()).await;
    if outcome.success {
        tracing::info!(
            run_id = ?outcome.run_id,
            new_posts = outcome.new_posts_count,
            already_processed = outcome.already_processed,
            "scheduler: refresh complete"
        );
    } else {
        tracing::warn!(
            run_id = ?outcome.run_id,
            failure = ?outcome.failure,
            message = %outcome.message,
            "scheduler: refresh failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use brandfeed_core::{parse_brands, BrandDirectory, SourceError, SourceRun};
    use brandfeed_store::{MemoryBackend, PostStore, RunLedger, StateBackend};
    use chrono::TimeDelta;
    use serde_json::Value;

    use super::*;

    struct NoRuns;

    #[async_trait]
    impl RunSource for NoRuns {
        async fn latest_run(&self) -> Result<Option<SourceRun>, SourceError> {
            Ok(None)
        }

        async fn dataset_items(&self, _dataset_ref: &str) -> Result<Vec<Value>, SourceError> {
            Ok(Vec::new())
        }
    }

    fn ingestor() -> Ingestor {
        let brands = parse_brands(
            "tracked: [Nike]\nbrands:\n  - name: Nike\n    category: Fashion\n    sub_brands:\n      - name: Nike\n        account: nike\n",
        )
        .expect("valid fixture");
        let backend: Arc<dyn StateBackend> = Arc::new(MemoryBackend::new());
        Ingestor::new(
            Arc::new(BrandDirectory::from_config(&brands)),
            Arc::new(PostStore::new(Arc::clone(&backend), 10)),
            Arc::new(RunLedger::new(backend)),
            TimeDelta::days(730),
        )
    }

    #[tokio::test]
    async fn invalid_cron_expression_is_rejected() {
        let source: Arc<dyn RunSource> = Arc::new(NoRuns);
        let result = build_scheduler(ingestor(), Some(source), "every hour please").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn refresh_failure_does_not_touch_the_ledger() {
        let ingestor = ingestor();
        run_refresh(&ingestor, &NoRuns).await;
        assert!(ingestor.ledger().last_run().await.unwrap().is_none());
    }
}
