//! Point lots: per-earn inventory with expiry and merchant attribution.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A new lot to record against an earn entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotDraft {
    pub program_id: String,
    pub unit: String,
    pub customer_account: String,
    pub merchant_id: Option<String>,
    pub earn_entry_id: Uuid,
    pub qty: i64,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Eligibility scope for consumption and balance queries.
///
/// A lot qualifies when it has remaining quantity, has not passed its
/// `expires_at`, falls inside the merchant scope (when one is given), and —
/// when `max_age_days` is set — was created within that many days.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LotScope {
    pub merchant_ids: Option<Vec<String>>,
    pub max_age_days: Option<i64>,
}

impl LotScope {
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn for_merchants(merchant_ids: Vec<String>) -> Self {
        Self {
            merchant_ids: Some(merchant_ids),
            max_age_days: None,
        }
    }

    pub fn with_max_age_days(mut self, days: Option<i64>) -> Self {
        self.max_age_days = days;
        self
    }

    /// Oldest `created_at` still eligible under `max_age_days`.
    pub fn created_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.max_age_days.map(|days| now - Duration::days(days))
    }
}

/// Consumption shortfall: the scope could not cover the requested amount.
/// The surrounding transaction must roll back so no partial decrement
/// persists.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("insufficient point lots: requested {requested}, available {available}")]
pub struct InsufficientLots {
    pub requested: i64,
    pub available: i64,
}

/// Absolute expiry instant for a lot earned now with an optional horizon.
pub fn lot_expiry(now: DateTime<Utc>, expiry_days: Option<i64>) -> Option<DateTime<Utc>> {
    expiry_days.map(|days| now + Duration::days(days))
}

/// FIFO consumption plan over in-memory lots, shared by the store adapter
/// and unit tests: lots must already be ordered by
/// `(expires_at NULLS LAST, created_at)`.
///
/// Returns `(lot_id, take)` decrements covering `amount` exactly.
pub fn plan_consumption(
    ordered: &[(Uuid, i64)],
    amount: i64,
) -> Result<Vec<(Uuid, i64)>, InsufficientLots> {
    let mut remaining = amount;
    let mut takes = Vec::new();
    for (lot_id, qty_remaining) in ordered {
        if remaining == 0 {
            break;
        }
        let take = remaining.min((*qty_remaining).max(0));
        if take > 0 {
            takes.push((*lot_id, take));
            remaining -= take;
        }
    }
    if remaining > 0 {
        return Err(InsufficientLots {
            requested: amount,
            available: amount - remaining,
        });
    }
    Ok(takes)
}

/// Persisted lot row as surfaced to domain logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointLot {
    pub lot_id: Uuid,
    pub program_id: String,
    pub unit: String,
    pub customer_account: String,
    pub merchant_id: Option<String>,
    pub earn_entry_id: Uuid,
    pub qty_total: i64,
    pub qty_remaining: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    fn consumption_is_fifo_and_exact() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let plan = plan_consumption(&[(a, 5), (b, 10), (c, 100)], 12).expect("coverable");
        assert_eq!(plan, vec![(a, 5), (b, 7)]);
    }

    #[rstest]
    fn shortfall_reports_available_quantity() {
        let err = plan_consumption(&[(Uuid::new_v4(), 5)], 9).unwrap_err();
        assert_eq!(err.requested, 9);
        assert_eq!(err.available, 5);
    }

    #[rstest]
    fn zero_amount_consumes_nothing() {
        assert_eq!(plan_consumption(&[(Uuid::new_v4(), 5)], 0), Ok(vec![]));
    }

    #[rstest]
    fn scope_age_bound_resolves_to_a_cutoff() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let scope = LotScope::unrestricted().with_max_age_days(Some(30));
        assert_eq!(
            scope.created_after(now),
            Some(Utc.with_ymd_and_hms(2026, 2, 8, 12, 0, 0).unwrap())
        );
        assert_eq!(LotScope::unrestricted().created_after(now), None);
    }

    #[rstest]
    fn expiry_horizon_is_absolute() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap();
        assert_eq!(
            lot_expiry(now, Some(7)),
            Some(Utc.with_ymd_and_hms(2026, 3, 17, 0, 0, 0).unwrap())
        );
        assert_eq!(lot_expiry(now, None), None);
    }
}
