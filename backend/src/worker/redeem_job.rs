//! Redemption work units: redeem chain over a loaded request.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel_async::AsyncPgConnection;
use serde_json::Value;

use crate::domain::job::{JobError, JobKind, JobStatus};
use crate::domain::notification::NotificationDraft;
use crate::domain::plugins::{run_redeem_chain, RedeemContext, RedeemDecision, RedeemRule};
use crate::domain::program_config::ProgramSettings;
use crate::domain::StoreError;
use crate::outbound::persistence::{
    config_store, notification_store, redeem_queue, redemption_store, ClaimedJob, TxHelpers,
};
use crate::worker::apply::apply_mutation;
use crate::worker::processor::JobPipeline;

/// Pipeline for the redemption queue.
pub struct RedeemPipeline {
    chain: Vec<Box<dyn RedeemRule>>,
}

impl RedeemPipeline {
    pub fn new(chain: Vec<Box<dyn RedeemRule>>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl JobPipeline for RedeemPipeline {
    fn kind(&self) -> JobKind {
        JobKind::Redeem
    }

    async fn pick(
        &self,
        conn: &mut AsyncPgConnection,
        now: DateTime<Utc>,
    ) -> Result<Option<ClaimedJob>, StoreError> {
        redeem_queue::pick_next(conn, now).await
    }

    async fn process(
        &self,
        conn: &mut AsyncPgConnection,
        job: &ClaimedJob,
        now: DateTime<Utc>,
    ) -> Result<Value, JobError> {
        let request = redemption_store::load(conn, &job.tenant, job.reference_id)
            .await
            .map_err(JobError::from)?
            .ok_or_else(|| JobError::terminal("Redemption payload missing"))?;

        let config = config_store::get(conn, &job.tenant, &request.program_id)
            .await
            .map_err(JobError::from)?;
        let settings = ProgramSettings::parse(config.as_ref());

        let ctx = RedeemContext {
            tenant: job.tenant.clone(),
            request,
        };
        let decision = {
            let mut helpers = TxHelpers::new(
                &mut *conn,
                job.tenant.as_str(),
                ctx.request.program_id.as_str(),
                ctx.request.unit.as_str(),
                now,
            );
            run_redeem_chain(&self.chain, &ctx, &mut helpers)
                .await
                .map_err(JobError::from)?
        };

        let mutation = match decision {
            None => return Err(JobError::retryable("No redeem plugin accepted the request")),
            Some(RedeemDecision::Rejected { reason, retryable }) => {
                return Err(if retryable {
                    JobError::retryable(reason)
                } else {
                    JobError::terminal(reason)
                });
            }
            Some(RedeemDecision::Accepted(mutation)) => mutation,
        };

        apply_mutation(conn, &job.tenant, &mutation, &settings, now).await?;

        let summary = mutation.summary_value();
        redeem_queue::complete(conn, job.job_id, &summary, now)
            .await
            .map_err(JobError::from)?;
        notification_store::insert(
            conn,
            &job.tenant,
            &NotificationDraft {
                job_kind: JobKind::Redeem,
                job_id: job.job_id,
                reference_id: job.reference_id,
                status: JobStatus::Completed,
                summary: Some(summary.clone()),
                error: None,
            },
            now,
        )
        .await
        .map_err(JobError::from)?;

        Ok(summary)
    }

    async fn reschedule(
        &self,
        conn: &mut AsyncPgConnection,
        job: &ClaimedJob,
        error: &str,
        available_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        redeem_queue::reschedule(conn, job.job_id, error, available_at).await
    }

    async fn fail(
        &self,
        conn: &mut AsyncPgConnection,
        job: &ClaimedJob,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        redeem_queue::fail(conn, job.job_id, error, now).await?;
        notification_store::insert(
            conn,
            &job.tenant,
            &NotificationDraft {
                job_kind: JobKind::Redeem,
                job_id: job.job_id,
                reference_id: job.reference_id,
                status: JobStatus::Failed,
                summary: None,
                error: Some(error.to_string()),
            },
            now,
        )
        .await
        .map(|_| ())
    }
}
