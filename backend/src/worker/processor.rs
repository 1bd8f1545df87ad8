//! Generic job worker: claim, process, finalize.
//!
//! The two queues share one state machine. A run is three transactions:
//! the claim (status → `processing`, attempts incremented), the work unit
//! (context load, rule chain, mutation application, job completion, and
//! the notification, all or nothing), and — only when the work unit fails —
//! the finalization that reschedules with backoff or records the terminal
//! failure. A failed work unit therefore leaves the job `processing` until
//! finalization runs, and a crashed worker leaves it for operator reset.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use mockable::Clock;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::domain::job::{FailureDisposition, JobError, JobKind, DEFAULT_MAX_ATTEMPTS};
use crate::domain::notification::truncate_error;
use crate::domain::StoreError;
use crate::outbound::persistence::error::map_pool_error;
use crate::outbound::persistence::{ClaimedJob, DbPool};

impl From<diesel::result::Error> for JobError {
    fn from(error: diesel::result::Error) -> Self {
        JobError::from(StoreError::from(error))
    }
}

/// Worker tuning knobs.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Attempts before a retryable failure becomes terminal.
    pub max_attempts: u32,
    /// Idle sleep between polls.
    pub poll_interval: std::time::Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            poll_interval: std::time::Duration::from_millis(1_000),
        }
    }
}

/// What one poll accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No due job was found.
    Idle,
    /// A job reached `completed`.
    Completed,
    /// A job was rescheduled with backoff.
    Rescheduled,
    /// A job reached `failed`.
    Failed,
}

/// Queue-specific half of the worker: claiming, the work unit, and the
/// job-row finalizers. Implementations run `process` inside the worker's
/// transaction and must mark the job and insert its notification there.
#[async_trait]
pub trait JobPipeline: Send + Sync {
    fn kind(&self) -> JobKind;

    async fn pick(
        &self,
        conn: &mut AsyncPgConnection,
        now: DateTime<Utc>,
    ) -> Result<Option<ClaimedJob>, StoreError>;

    async fn process(
        &self,
        conn: &mut AsyncPgConnection,
        job: &ClaimedJob,
        now: DateTime<Utc>,
    ) -> Result<Value, JobError>;

    async fn reschedule(
        &self,
        conn: &mut AsyncPgConnection,
        job: &ClaimedJob,
        error: &str,
        available_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Terminal failure: mark the job and insert the `failed` notification.
    async fn fail(
        &self,
        conn: &mut AsyncPgConnection,
        job: &ClaimedJob,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// Drives one [`JobPipeline`] against the store.
pub struct JobWorker<P> {
    pool: DbPool,
    pipeline: P,
    clock: Arc<dyn Clock>,
    config: ProcessorConfig,
}

impl<P: JobPipeline> JobWorker<P> {
    pub fn new(pool: DbPool, pipeline: P, clock: Arc<dyn Clock>, config: ProcessorConfig) -> Self {
        Self {
            pool,
            pipeline,
            clock,
            config,
        }
    }

    /// Claim and run at most one job.
    pub async fn run_once(&self) -> Result<RunOutcome, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let now = self.clock.utc();

        let Some(job) = self.pipeline.pick(&mut conn, now).await? else {
            return Ok(RunOutcome::Idle);
        };

        let kind = self.pipeline.kind();
        let job_for_tx = job.clone();
        let work = conn
            .transaction::<Value, JobError, _>(move |conn| {
                let job = job_for_tx.clone();
                async move { self.pipeline.process(conn, &job, now).await }.scope_boxed()
            })
            .await;

        match work {
            Ok(_summary) => {
                info!(
                    job_type = kind.as_str(),
                    job_id = %job.job_id,
                    tenant = %job.tenant,
                    attempts = job.attempts,
                    "job completed"
                );
                Ok(RunOutcome::Completed)
            }
            Err(job_error) => self.finalize_failure(&mut conn, &job, job_error, now).await,
        }
    }

    async fn finalize_failure(
        &self,
        conn: &mut AsyncPgConnection,
        job: &ClaimedJob,
        job_error: JobError,
        now: DateTime<Utc>,
    ) -> Result<RunOutcome, StoreError> {
        let kind = self.pipeline.kind();
        let attempts = u32::try_from(job.attempts).unwrap_or(u32::MAX);
        let message = truncate_error(job_error.message());

        match job_error.disposition(attempts, self.config.max_attempts) {
            FailureDisposition::Reschedule { delay } => {
                warn!(
                    job_type = kind.as_str(),
                    job_id = %job.job_id,
                    tenant = %job.tenant,
                    attempts,
                    error = %message,
                    delay_ms = delay.as_millis() as u64,
                    "job rescheduled"
                );
                let available_at = now
                    + chrono::Duration::from_std(delay)
                        .unwrap_or_else(|_| chrono::Duration::seconds(60));
                self.pipeline
                    .reschedule(conn, job, &message, available_at)
                    .await?;
                Ok(RunOutcome::Rescheduled)
            }
            FailureDisposition::Fail => {
                error!(
                    job_type = kind.as_str(),
                    job_id = %job.job_id,
                    tenant = %job.tenant,
                    attempts,
                    error = %message,
                    "job failed"
                );
                conn.transaction::<(), StoreError, _>(|conn| {
                    self.pipeline.fail(conn, job, &message, now).scope_boxed()
                })
                .await?;
                Ok(RunOutcome::Failed)
            }
        }
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        self.config.poll_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn diesel_errors_become_retryable_job_errors() {
        let err = JobError::from(diesel::result::Error::NotFound);
        assert!(matches!(err, JobError::Retryable { .. }));
    }

    #[rstest]
    fn duplicate_key_diesel_errors_are_terminal() {
        use diesel::result::{DatabaseErrorKind, Error as DieselError};
        let err = JobError::from(DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            Box::new("dup".to_string()),
        ));
        assert!(matches!(err, JobError::Terminal { .. }));
    }

    #[rstest]
    fn processor_defaults_match_queue_policy() {
        let config = ProcessorConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.poll_interval, std::time::Duration::from_millis(1_000));
    }
}
