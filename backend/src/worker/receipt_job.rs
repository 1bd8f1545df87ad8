//! Receipt work units: rule chain over a loaded receipt.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel_async::AsyncPgConnection;
use serde_json::Value;

use crate::domain::accounts::POINTS_UNIT;
use crate::domain::job::{JobError, JobKind, JobStatus};
use crate::domain::notification::NotificationDraft;
use crate::domain::plugins::{
    merge_summaries, run_receipt_chain, ReceiptContext, ReceiptRule,
};
use crate::domain::program_config::ProgramSettings;
use crate::domain::StoreError;
use crate::outbound::persistence::{
    config_store, notification_store, receipt_queue, receipt_store, ClaimedJob, TxHelpers,
};
use crate::worker::apply::apply_mutation;
use crate::worker::processor::JobPipeline;

/// Pipeline for the receipt queue, carrying the fixed rule chain.
pub struct ReceiptPipeline {
    chain: Vec<Box<dyn ReceiptRule>>,
}

impl ReceiptPipeline {
    pub fn new(chain: Vec<Box<dyn ReceiptRule>>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl JobPipeline for ReceiptPipeline {
    fn kind(&self) -> JobKind {
        JobKind::Receipt
    }

    async fn pick(
        &self,
        conn: &mut AsyncPgConnection,
        now: DateTime<Utc>,
    ) -> Result<Option<ClaimedJob>, StoreError> {
        receipt_queue::pick_next(conn, now).await
    }

    async fn process(
        &self,
        conn: &mut AsyncPgConnection,
        job: &ClaimedJob,
        now: DateTime<Utc>,
    ) -> Result<Value, JobError> {
        let receipt = receipt_store::load(conn, &job.tenant, job.reference_id)
            .await
            .map_err(JobError::from)?
            .ok_or_else(|| JobError::terminal("Receipt payload missing"))?;

        let config = config_store::get(conn, &job.tenant, &receipt.program_id)
            .await
            .map_err(JobError::from)?;
        let settings = ProgramSettings::parse(config.as_ref());

        let ctx = ReceiptContext {
            tenant: job.tenant.clone(),
            receipt,
        };
        let mutations = {
            let mut helpers = TxHelpers::new(
                &mut *conn,
                job.tenant.as_str(),
                ctx.receipt.program_id.as_str(),
                POINTS_UNIT,
                now,
            );
            run_receipt_chain(&self.chain, &ctx, &mut helpers)
                .await
                .map_err(JobError::from)?
        };

        for mutation in &mutations {
            apply_mutation(conn, &job.tenant, mutation, &settings, now).await?;
        }

        let summary = merge_summaries(&mutations);
        receipt_queue::complete(conn, job.job_id, &summary, now)
            .await
            .map_err(JobError::from)?;
        notification_store::insert(
            conn,
            &job.tenant,
            &NotificationDraft {
                job_kind: JobKind::Receipt,
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
        receipt_queue::reschedule(conn, job.job_id, error, available_at).await
    }

    async fn fail(
        &self,
        conn: &mut AsyncPgConnection,
        job: &ClaimedJob,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        receipt_queue::fail(conn, job.job_id, error, now).await?;
        notification_store::insert(
            conn,
            &job.tenant,
            &NotificationDraft {
                job_kind: JobKind::Receipt,
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
