//! Point lot persistence: creation, FIFO consumption, and eligibility sums.
//!
//! Consumption is two-phase: an ordered candidate read, then a locked
//! re-read of those rows that holds the locks for the remainder of the
//! caller's transaction so FIFO order survives concurrency. On a shortfall
//! the caller must abort the transaction so no partial decrement persists.

use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, Utc};
use diesel::dsl::sum;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::lots::{plan_consumption, InsufficientLots, LotDraft, LotScope};
use crate::domain::StoreError;

use super::error::map_diesel_error;
use super::models::NewPointLotRow;
use super::schema::point_lots;

/// Failures while consuming lots.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LotStoreError {
    /// Scope could not cover the requested amount; abort the transaction.
    #[error(transparent)]
    Insufficient(#[from] InsufficientLots),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Identity of the balance being consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumeTarget<'a> {
    pub customer_account: &'a str,
    pub program_id: &'a str,
    pub unit: &'a str,
    pub amount: i64,
}

/// Record one lot against an earn entry.
pub async fn create_lot(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    draft: &LotDraft,
    now: DateTime<Utc>,
) -> Result<Uuid, StoreError> {
    let lot_id = Uuid::new_v4();
    diesel::insert_into(point_lots::table)
        .values(&NewPointLotRow {
            lot_id,
            tenant,
            program_id: &draft.program_id,
            unit: &draft.unit,
            customer_account: &draft.customer_account,
            merchant_id: draft.merchant_id.as_deref(),
            earn_entry_id: draft.earn_entry_id,
            qty_total: draft.qty,
            qty_remaining: draft.qty,
            expires_at: draft.expires_at,
            created_at: now,
        })
        .execute(conn)
        .await
        .map_err(map_diesel_error)?;
    Ok(lot_id)
}

/// Eligible lots in FIFO order (`expires_at NULLS LAST, created_at`) as
/// `(lot_id, qty_remaining)`.
async fn eligible_lots(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    customer_account: &str,
    program_id: &str,
    unit: &str,
    scope: &LotScope,
    now: DateTime<Utc>,
) -> Result<Vec<(Uuid, i64)>, StoreError> {
    // The age bound collapses to an always-true epoch comparison when the
    // scope is unbounded, keeping one statically-typed query per branch.
    let cutoff = scope
        .created_after(now)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    let base = point_lots::table
        .filter(point_lots::tenant.eq(tenant))
        .filter(point_lots::customer_account.eq(customer_account))
        .filter(point_lots::program_id.eq(program_id))
        .filter(point_lots::unit.eq(unit))
        .filter(point_lots::qty_remaining.gt(0))
        .filter(
            point_lots::expires_at
                .is_null()
                .or(point_lots::expires_at.gt(now)),
        )
        .filter(point_lots::created_at.gt(cutoff))
        .order((
            point_lots::expires_at.asc().nulls_last(),
            point_lots::created_at.asc(),
        ))
        .select((point_lots::lot_id, point_lots::qty_remaining));

    let rows = match &scope.merchant_ids {
        Some(merchant_ids) => {
            let scoped: Vec<Option<&str>> =
                merchant_ids.iter().map(|id| Some(id.as_str())).collect();
            base.filter(point_lots::merchant_id.eq_any(scoped))
                .load(conn)
                .await
        }
        None => base.load(conn).await,
    };
    rows.map_err(map_diesel_error)
}

/// Atomically decrement eligible lots in FIFO order until `target.amount`
/// is covered.
///
/// # Errors
/// [`LotStoreError::Insufficient`] when the scope cannot cover the amount;
/// nothing persists provided the caller aborts its transaction.
pub async fn consume(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    target: ConsumeTarget<'_>,
    scope: &LotScope,
    now: DateTime<Utc>,
) -> Result<(), LotStoreError> {
    if target.amount <= 0 {
        return Ok(());
    }

    let candidates = eligible_lots(
        conn,
        tenant,
        target.customer_account,
        target.program_id,
        target.unit,
        scope,
        now,
    )
    .await?;

    // Re-read the candidates under row locks; quantities may have moved
    // between the ordered read and lock acquisition.
    let ordered = lock_candidates(conn, &candidates).await?;

    let plan = plan_consumption(&ordered, target.amount)?;
    for (lot_id, take) in plan {
        diesel::update(point_lots::table.filter(point_lots::lot_id.eq(lot_id)))
            .set(point_lots::qty_remaining.eq(point_lots::qty_remaining - take))
            .execute(conn)
            .await
            .map_err(map_diesel_error)
            .map_err(LotStoreError::Store)?;
    }
    Ok(())
}

#[cfg(not(feature = "single-writer"))]
async fn lock_candidates(
    conn: &mut AsyncPgConnection,
    candidates: &[(Uuid, i64)],
) -> Result<Vec<(Uuid, i64)>, StoreError> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = candidates.iter().map(|(lot_id, _)| *lot_id).collect();
    point_lots::table
        .filter(point_lots::lot_id.eq_any(ids))
        .filter(point_lots::qty_remaining.gt(0))
        .order((
            point_lots::expires_at.asc().nulls_last(),
            point_lots::created_at.asc(),
        ))
        .select((point_lots::lot_id, point_lots::qty_remaining))
        .for_update()
        .load(conn)
        .await
        .map_err(map_diesel_error)
}

#[cfg(feature = "single-writer")]
async fn lock_candidates(
    _conn: &mut AsyncPgConnection,
    candidates: &[(Uuid, i64)],
) -> Result<Vec<(Uuid, i64)>, StoreError> {
    Ok(candidates.to_vec())
}

/// `Σ qty_remaining` over eligible lots in scope.
pub async fn sum_eligible(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    customer_account: &str,
    program_id: &str,
    unit: &str,
    scope: &LotScope,
    now: DateTime<Utc>,
) -> Result<i64, StoreError> {
    let lots = eligible_lots(conn, tenant, customer_account, program_id, unit, scope, now).await?;
    Ok(lots.iter().map(|(_, qty_remaining)| qty_remaining).sum())
}

/// Eligible remaining quantity grouped by earn merchant, for the
/// attribution fallback (which never scopes by merchant).
pub async fn remaining_by_merchant(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    customer_account: &str,
    program_id: &str,
    unit: &str,
    max_age_days: Option<i64>,
    now: DateTime<Utc>,
) -> Result<Vec<(Option<String>, i64)>, StoreError> {
    let cutoff = LotScope::unrestricted()
        .with_max_age_days(max_age_days)
        .created_after(now)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    let rows: Vec<(Option<String>, Option<BigDecimal>)> = point_lots::table
        .filter(point_lots::tenant.eq(tenant))
        .filter(point_lots::customer_account.eq(customer_account))
        .filter(point_lots::program_id.eq(program_id))
        .filter(point_lots::unit.eq(unit))
        .filter(point_lots::qty_remaining.gt(0))
        .filter(
            point_lots::expires_at
                .is_null()
                .or(point_lots::expires_at.gt(now)),
        )
        .filter(point_lots::created_at.gt(cutoff))
        .group_by(point_lots::merchant_id)
        .select((point_lots::merchant_id, sum(point_lots::qty_remaining)))
        .order(point_lots::merchant_id.asc())
        .load(conn)
        .await
        .map_err(map_diesel_error)?;

    rows.into_iter()
        .map(|(merchant_id, total)| {
            let qty = total
                .map(|value| {
                    value
                        .to_i64()
                        .ok_or_else(|| StoreError::serialization("lot sum exceeds i64 range"))
                })
                .unwrap_or(Ok(0))?;
            Ok((merchant_id, qty))
        })
        .collect()
}
