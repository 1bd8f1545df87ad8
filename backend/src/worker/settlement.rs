//! Settlement reporter: one aggregation pass per invocation.

use std::sync::Arc;

use mockable::Clock;
use tracing::info;

use crate::domain::settlement::SettlementWindow;
use crate::domain::StoreError;
use crate::outbound::persistence::error::map_pool_error;
use crate::outbound::persistence::{settlement_store, DbPool};

/// Aggregate merchant-liability movement for the current window and upsert
/// the keyed report rows. Returns the number of rows written.
pub async fn run_settlement_pass(
    pool: &DbPool,
    clock: &Arc<dyn Clock>,
    lookback_days: i64,
) -> Result<usize, StoreError> {
    let mut conn = pool.get().await.map_err(map_pool_error)?;
    let now = clock.utc();
    let window = SettlementWindow::for_run(now, lookback_days);

    let rows = settlement_store::aggregate_liability(&mut conn, window).await?;
    for row in &rows {
        settlement_store::upsert_report(&mut conn, row, window, None, now).await?;
    }

    info!(
        period_start = %window.period_start,
        period_end = %window.period_end,
        reports = rows.len(),
        "settlement pass complete"
    );
    Ok(rows.len())
}
