//! Settlement aggregation and report upserts.

use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, Utc};
use diesel::dsl::sum;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde_json::Value;

use crate::domain::settlement::{SettlementRow, SettlementWindow};
use crate::domain::StoreError;

use super::error::map_diesel_error;
use super::models::SettlementReportUpsertRow;
use super::schema::{ledger_journal, ledger_lines, settlement_reports};

const LIABILITY_PATTERN: &str = "%::merchant_liability";

/// Net merchant-liability movement (`Σcredits − Σdebits`) inside the
/// window, grouped by `(tenant, account_id)`.
pub async fn aggregate_liability(
    conn: &mut AsyncPgConnection,
    window: SettlementWindow,
) -> Result<Vec<SettlementRow>, StoreError> {
    let rows: Vec<(String, String, Option<BigDecimal>, Option<BigDecimal>)> = ledger_lines::table
        .inner_join(ledger_journal::table)
        .filter(ledger_lines::account_id.like(LIABILITY_PATTERN))
        .filter(ledger_journal::created_at.ge(window.period_start))
        .filter(ledger_journal::created_at.lt(window.period_end))
        .group_by((ledger_journal::tenant, ledger_lines::account_id))
        .select((
            ledger_journal::tenant,
            ledger_lines::account_id,
            sum(ledger_lines::credit),
            sum(ledger_lines::debit),
        ))
        .order((ledger_journal::tenant.asc(), ledger_lines::account_id.asc()))
        .load(conn)
        .await
        .map_err(map_diesel_error)?;

    rows.into_iter()
        .map(|(tenant, merchant_account, credits, debits)| {
            let credits = credits.unwrap_or_else(|| BigDecimal::from(0));
            let debits = debits.unwrap_or_else(|| BigDecimal::from(0));
            let net_points = (credits - debits)
                .to_i64()
                .ok_or_else(|| StoreError::serialization("net points exceed i64 range"))?;
            Ok(SettlementRow {
                tenant,
                merchant_account,
                net_points,
            })
        })
        .collect()
}

/// Upsert one report row keyed by
/// `(tenant, merchant_account, period_start, period_end)`.
pub async fn upsert_report(
    conn: &mut AsyncPgConnection,
    row: &SettlementRow,
    window: SettlementWindow,
    summary: Option<&Value>,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    diesel::insert_into(settlement_reports::table)
        .values(&SettlementReportUpsertRow {
            tenant: &row.tenant,
            merchant_account: &row.merchant_account,
            period_start: window.period_start,
            period_end: window.period_end,
            net_points: row.net_points,
            summary,
            updated_at: now,
        })
        .on_conflict((
            settlement_reports::tenant,
            settlement_reports::merchant_account,
            settlement_reports::period_start,
            settlement_reports::period_end,
        ))
        .do_update()
        .set((
            settlement_reports::net_points.eq(row.net_points),
            settlement_reports::summary.eq(summary),
            settlement_reports::updated_at.eq(now),
        ))
        .execute(conn)
        .await
        .map(|_| ())
        .map_err(map_diesel_error)
}
