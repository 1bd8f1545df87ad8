//! Notification dispatcher: drains the outbox over the webhook adapter.
//!
//! At-least-once semantics: the row lock is held while the POST is in
//! flight, so a crash between delivery and the `delivered_at` update leads
//! to a redelivery, never a loss.

use std::sync::Arc;
use std::time::Duration;

use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::AsyncConnection;
use mockable::Clock;
use tracing::{info, warn};

use crate::domain::notification::redelivery_at;
use crate::domain::StoreError;
use crate::outbound::persistence::error::map_pool_error;
use crate::outbound::persistence::{notification_store, DbPool};
use crate::outbound::webhook::NotificationWebhook;

/// What one dispatcher poll accomplished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Idle,
    Delivered,
    Deferred,
}

/// Outbox drain loop state.
pub struct NotificationDispatcher {
    pool: DbPool,
    webhook: Arc<dyn NotificationWebhook>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        pool: DbPool,
        webhook: Arc<dyn NotificationWebhook>,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            pool,
            webhook,
            clock,
            poll_interval,
        }
    }

    /// Claim and deliver at most one due notification.
    pub async fn run_once(&self) -> Result<DispatchOutcome, StoreError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let now = self.clock.utc();

        conn.transaction::<DispatchOutcome, StoreError, _>(|conn| {
            async move {
                let Some(notification) = notification_store::pick_due(conn, now).await? else {
                    return Ok(DispatchOutcome::Idle);
                };

                match self.webhook.deliver(&notification).await {
                    Ok(()) => {
                        info!(
                            notification_id = %notification.notification_id,
                            tenant = %notification.tenant,
                            job_type = %notification.job_type,
                            "notification delivered"
                        );
                        notification_store::mark_delivered(
                            conn,
                            notification.notification_id,
                            now,
                        )
                        .await?;
                        Ok(DispatchOutcome::Delivered)
                    }
                    Err(err) => {
                        let next_attempt = redelivery_at(now, self.poll_interval);
                        warn!(
                            notification_id = %notification.notification_id,
                            tenant = %notification.tenant,
                            error = %err,
                            next_attempt = %next_attempt,
                            "notification delivery failed"
                        );
                        notification_store::mark_failed(
                            conn,
                            notification.notification_id,
                            &err.to_string(),
                            next_attempt,
                        )
                        .await?;
                        Ok(DispatchOutcome::Deferred)
                    }
                }
            }
            .scope_boxed()
        })
        .await
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    #[rstest]
    fn redelivery_backs_off_five_poll_intervals() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let next = redelivery_at(now, Duration::from_secs(2));
        assert_eq!(next - now, chrono::Duration::seconds(10));
    }
}
