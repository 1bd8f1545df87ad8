//! Queue operations over the two structurally identical job tables.
//!
//! The receipt and redemption queues share one shape, so the per-table
//! Diesel plumbing is generated by a macro and the worker drives either
//! queue through the same row types. Selection uses
//! `FOR UPDATE SKIP LOCKED` so parallel workers never claim the same job;
//! the `single-writer` feature omits the locking clause for test databases
//! without row-lock support.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// A job freshly claimed by a worker: `processing`, attempts incremented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedJob {
    pub job_id: Uuid,
    pub tenant: String,
    pub reference_id: Uuid,
    /// Attempt count including the claim that produced this value.
    pub attempts: i32,
}

/// Full job state for status endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct JobView {
    pub job_id: Uuid,
    pub reference_id: Uuid,
    pub status: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub result_summary: Option<Value>,
    pub available_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

macro_rules! define_job_queue {
    ($(#[$doc:meta])* $mod_name:ident, $table:ident) => {
        $(#[$doc])*
        pub mod $mod_name {
            use chrono::{DateTime, Utc};
            use diesel::prelude::*;
            use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
            use diesel_async::scoped_futures::ScopedFutureExt;
            use serde_json::Value;
            use uuid::Uuid;

            use crate::domain::job::JobStatus;
            use crate::domain::StoreError;
            use crate::outbound::persistence::error::map_diesel_error;
            use crate::outbound::persistence::schema::$table as jobs;

            use super::{ClaimedJob, JobView};

            /// Insert a pending job; runs inside the caller's transaction so
            /// the job and its reference row commit together.
            pub async fn enqueue(
                conn: &mut AsyncPgConnection,
                tenant: &str,
                job_id: Uuid,
                reference_id: Uuid,
                now: DateTime<Utc>,
            ) -> Result<(), StoreError> {
                diesel::insert_into(jobs::table)
                    .values((
                        jobs::job_id.eq(job_id),
                        jobs::tenant.eq(tenant),
                        jobs::reference_id.eq(reference_id),
                        jobs::status.eq(JobStatus::Pending.as_str()),
                        jobs::attempts.eq(0),
                        jobs::available_at.eq(now),
                        jobs::created_at.eq(now),
                    ))
                    .execute(conn)
                    .await
                    .map(|_| ())
                    .map_err(map_diesel_error)
            }

            /// Claim the oldest due pending job: transition to `processing`
            /// and increment `attempts` in one transaction.
            pub async fn pick_next(
                conn: &mut AsyncPgConnection,
                now: DateTime<Utc>,
            ) -> Result<Option<ClaimedJob>, StoreError> {
                conn.transaction::<_, diesel::result::Error, _>(|conn| {
                    async move {
                        let query = jobs::table
                            .filter(jobs::status.eq(JobStatus::Pending.as_str()))
                            .filter(jobs::available_at.le(now))
                            .order(jobs::created_at.asc())
                            .limit(1)
                            .select((jobs::job_id, jobs::tenant, jobs::reference_id));

                        #[cfg(not(feature = "single-writer"))]
                        let claimed: Option<(Uuid, String, Uuid)> = query
                            .for_update()
                            .skip_locked()
                            .first(conn)
                            .await
                            .optional()?;
                        #[cfg(feature = "single-writer")]
                        let claimed: Option<(Uuid, String, Uuid)> =
                            query.first(conn).await.optional()?;

                        let Some((job_id, tenant, reference_id)) = claimed else {
                            return Ok(None);
                        };

                        let attempts: i32 =
                            diesel::update(jobs::table.filter(jobs::job_id.eq(job_id)))
                                .set((
                                    jobs::status.eq(JobStatus::Processing.as_str()),
                                    jobs::attempts.eq(jobs::attempts + 1),
                                ))
                                .returning(jobs::attempts)
                                .get_result(conn)
                                .await?;

                        Ok(Some(ClaimedJob {
                            job_id,
                            tenant,
                            reference_id,
                            attempts,
                        }))
                    }
                    .scope_boxed()
                })
                .await
                .map_err(map_diesel_error)
            }

            /// Terminal success; runs inside the work-unit transaction.
            pub async fn complete(
                conn: &mut AsyncPgConnection,
                job_id: Uuid,
                summary: &Value,
                now: DateTime<Utc>,
            ) -> Result<(), StoreError> {
                diesel::update(jobs::table.filter(jobs::job_id.eq(job_id)))
                    .set((
                        jobs::status.eq(JobStatus::Completed.as_str()),
                        jobs::result_summary.eq(Some(summary)),
                        jobs::completed_at.eq(Some(now)),
                    ))
                    .execute(conn)
                    .await
                    .map(|_| ())
                    .map_err(map_diesel_error)
            }

            /// Return a claimed job to the queue with a backoff delay.
            pub async fn reschedule(
                conn: &mut AsyncPgConnection,
                job_id: Uuid,
                error: &str,
                available_at: DateTime<Utc>,
            ) -> Result<(), StoreError> {
                diesel::update(jobs::table.filter(jobs::job_id.eq(job_id)))
                    .set((
                        jobs::status.eq(JobStatus::Pending.as_str()),
                        jobs::last_error.eq(Some(error)),
                        jobs::available_at.eq(available_at),
                    ))
                    .execute(conn)
                    .await
                    .map(|_| ())
                    .map_err(map_diesel_error)
            }

            /// Terminal failure with the last error preserved.
            pub async fn fail(
                conn: &mut AsyncPgConnection,
                job_id: Uuid,
                error: &str,
                now: DateTime<Utc>,
            ) -> Result<(), StoreError> {
                diesel::update(jobs::table.filter(jobs::job_id.eq(job_id)))
                    .set((
                        jobs::status.eq(JobStatus::Failed.as_str()),
                        jobs::last_error.eq(Some(error)),
                        jobs::completed_at.eq(Some(now)),
                    ))
                    .execute(conn)
                    .await
                    .map(|_| ())
                    .map_err(map_diesel_error)
            }

            /// Latest job handle for a reference, for ingress responses.
            pub async fn find_by_reference(
                conn: &mut AsyncPgConnection,
                tenant: &str,
                reference_id: Uuid,
            ) -> Result<Option<JobView>, StoreError> {
                let row: Option<(
                    Uuid,
                    Uuid,
                    String,
                    i32,
                    Option<String>,
                    Option<Value>,
                    DateTime<Utc>,
                    Option<DateTime<Utc>>,
                    DateTime<Utc>,
                )> = jobs::table
                    .filter(jobs::tenant.eq(tenant))
                    .filter(jobs::reference_id.eq(reference_id))
                    .order(jobs::created_at.desc())
                    .limit(1)
                    .select((
                        jobs::job_id,
                        jobs::reference_id,
                        jobs::status,
                        jobs::attempts,
                        jobs::last_error,
                        jobs::result_summary,
                        jobs::available_at,
                        jobs::completed_at,
                        jobs::created_at,
                    ))
                    .first(conn)
                    .await
                    .optional()
                    .map_err(map_diesel_error)?;

                Ok(row.map(
                    |(
                        job_id,
                        reference_id,
                        status,
                        attempts,
                        last_error,
                        result_summary,
                        available_at,
                        completed_at,
                        created_at,
                    )| JobView {
                        job_id,
                        reference_id,
                        status,
                        attempts,
                        last_error,
                        result_summary,
                        available_at,
                        completed_at,
                        created_at,
                    },
                ))
            }
        }
    };
}

define_job_queue!(
    /// Queue operations for receipt-processing jobs.
    receipt_queue,
    receipt_jobs
);
define_job_queue!(
    /// Queue operations for redemption jobs.
    redeem_queue,
    redeem_jobs
);
