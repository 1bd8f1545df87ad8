//! Durable notification outbox operations.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::notification::{truncate_error, JobNotification, NotificationDraft};
use crate::domain::StoreError;

use super::error::map_diesel_error;
use super::models::{NewNotificationRow, NotificationRow};
use super::schema::job_notifications;

/// Insert an outbox row; runs inside the job's terminal transaction so the
/// outcome and its notification commit together.
pub async fn insert(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    draft: &NotificationDraft,
    now: DateTime<Utc>,
) -> Result<Uuid, StoreError> {
    let notification_id = Uuid::new_v4();
    let error = draft.error.as_deref().map(truncate_error);
    diesel::insert_into(job_notifications::table)
        .values(&NewNotificationRow {
            notification_id,
            tenant,
            job_type: draft.job_kind.as_str(),
            job_id: draft.job_id,
            reference_id: draft.reference_id,
            status: draft.status.as_str(),
            summary: draft.summary.as_ref(),
            error: error.as_deref(),
            available_at: now,
        })
        .execute(conn)
        .await
        .map_err(map_diesel_error)?;
    Ok(notification_id)
}

/// Claim the oldest due undelivered row. The row lock is held for the
/// caller's transaction so no other dispatcher delivers it concurrently.
pub async fn pick_due(
    conn: &mut AsyncPgConnection,
    now: DateTime<Utc>,
) -> Result<Option<JobNotification>, StoreError> {
    let query = job_notifications::table
        .filter(job_notifications::delivered_at.is_null())
        .filter(job_notifications::available_at.le(now))
        .order(job_notifications::available_at.asc())
        .limit(1)
        .select(NotificationRow::as_select());

    #[cfg(not(feature = "single-writer"))]
    let row: Option<NotificationRow> = query
        .for_update()
        .skip_locked()
        .first(conn)
        .await
        .optional()
        .map_err(map_diesel_error)?;
    #[cfg(feature = "single-writer")]
    let row: Option<NotificationRow> =
        query.first(conn).await.optional().map_err(map_diesel_error)?;

    Ok(row.map(|row| JobNotification {
        notification_id: row.notification_id,
        tenant: row.tenant,
        job_type: row.job_type,
        job_id: row.job_id,
        reference_id: row.reference_id,
        status: row.status,
        summary: row.summary,
        error: row.error,
        delivery_attempts: row.delivery_attempts,
    }))
}

/// Record a successful delivery.
pub async fn mark_delivered(
    conn: &mut AsyncPgConnection,
    notification_id: Uuid,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    diesel::update(
        job_notifications::table.filter(job_notifications::notification_id.eq(notification_id)),
    )
    .set((
        job_notifications::delivered_at.eq(Some(now)),
        job_notifications::delivery_attempts.eq(job_notifications::delivery_attempts + 1),
    ))
    .execute(conn)
    .await
    .map(|_| ())
    .map_err(map_diesel_error)
}

/// Record a failed delivery and push the row back until `available_at`.
/// There is no attempt cap; stuck rows are drained out of band.
pub async fn mark_failed(
    conn: &mut AsyncPgConnection,
    notification_id: Uuid,
    error: &str,
    available_at: DateTime<Utc>,
) -> Result<(), StoreError> {
    diesel::update(
        job_notifications::table.filter(job_notifications::notification_id.eq(notification_id)),
    )
    .set((
        job_notifications::available_at.eq(available_at),
        job_notifications::delivery_attempts.eq(job_notifications::delivery_attempts + 1),
        job_notifications::last_delivery_error.eq(Some(truncate_error(error))),
    ))
    .execute(conn)
    .await
    .map(|_| ())
    .map_err(map_diesel_error)
}
