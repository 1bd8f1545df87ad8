//! Journal and line persistence with balance queries.
//!
//! Every function takes an open connection so callers compose the writes
//! into their own transaction; this layer never deduplicates and never
//! opens transactions of its own.

use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, Utc};
use diesel::dsl::sum;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::ledger::{validate_entry, EntryValidationError, LedgerEntry};
use crate::domain::StoreError;

use super::error::map_diesel_error;
use super::models::{NewJournalRow, NewLineRow};
use super::schema::{ledger_journal, ledger_lines};

/// Failures while appending ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerStoreError {
    /// The entry violates a ledger invariant; a bug in the producing rule.
    #[error(transparent)]
    Invalid(#[from] EntryValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// One row of the grouped balances query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitBalance {
    pub program_id: String,
    pub unit: String,
    pub qty: i64,
}

/// Append entries inside the caller's transaction, returning fresh entry
/// ids in input order. Line numbers start at 1 per entry, in input order.
pub async fn append_entries(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    entries: &[LedgerEntry],
    now: DateTime<Utc>,
) -> Result<Vec<Uuid>, LedgerStoreError> {
    let mut entry_ids = Vec::with_capacity(entries.len());
    for entry in entries {
        validate_entry(entry)?;
        let entry_id = Uuid::new_v4();

        diesel::insert_into(ledger_journal::table)
            .values(&NewJournalRow {
                entry_id,
                tenant,
                program_id: &entry.program_id,
                receipt_id: entry.receipt_id,
                memo: entry.memo.as_deref(),
                created_at: now,
            })
            .execute(conn)
            .await
            .map_err(map_diesel_error)?;

        let lines: Vec<NewLineRow<'_>> = entry
            .lines
            .iter()
            .enumerate()
            .map(|(index, line)| NewLineRow {
                entry_id,
                line_no: index as i32 + 1,
                account_id: &line.account_id,
                unit: &line.unit,
                debit: line.debit,
                credit: line.credit,
            })
            .collect();
        diesel::insert_into(ledger_lines::table)
            .values(&lines)
            .execute(conn)
            .await
            .map_err(map_diesel_error)?;

        entry_ids.push(entry_id);
    }
    Ok(entry_ids)
}

/// `Σcredits − Σdebits` for one account, optionally scoped by program and
/// unit. Not monotonic over time.
pub async fn balance(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    account_id: &str,
    program_id: Option<&str>,
    unit: Option<&str>,
) -> Result<i64, StoreError> {
    let balances = balances_for_account(conn, tenant, account_id, program_id).await?;
    Ok(balances
        .into_iter()
        .filter(|bucket| unit.map_or(true, |unit| bucket.unit == unit))
        .map(|bucket| bucket.qty)
        .sum())
}

/// Balances for one account grouped by `(program_id, unit)`, optionally
/// scoped to one program. Feeds the balances endpoint.
pub async fn balances_for_account(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    account_id: &str,
    program_id: Option<&str>,
) -> Result<Vec<UnitBalance>, StoreError> {
    let rows: Vec<(String, String, Option<BigDecimal>, Option<BigDecimal>)> = match program_id {
        Some(program_id) => {
            ledger_lines::table
                .inner_join(ledger_journal::table)
                .filter(ledger_journal::tenant.eq(tenant))
                .filter(ledger_lines::account_id.eq(account_id))
                .filter(ledger_journal::program_id.eq(program_id))
                .group_by((ledger_journal::program_id, ledger_lines::unit))
                .select((
                    ledger_journal::program_id,
                    ledger_lines::unit,
                    sum(ledger_lines::credit),
                    sum(ledger_lines::debit),
                ))
                .order((ledger_journal::program_id.asc(), ledger_lines::unit.asc()))
                .load(conn)
                .await
        }
        None => {
            ledger_lines::table
                .inner_join(ledger_journal::table)
                .filter(ledger_journal::tenant.eq(tenant))
                .filter(ledger_lines::account_id.eq(account_id))
                .group_by((ledger_journal::program_id, ledger_lines::unit))
                .select((
                    ledger_journal::program_id,
                    ledger_lines::unit,
                    sum(ledger_lines::credit),
                    sum(ledger_lines::debit),
                ))
                .order((ledger_journal::program_id.asc(), ledger_lines::unit.asc()))
                .load(conn)
                .await
        }
    }
    .map_err(map_diesel_error)?;

    rows.into_iter()
        .map(|(program_id, unit, credits, debits)| {
            Ok(UnitBalance {
                program_id,
                unit,
                qty: net(credits, debits)?,
            })
        })
        .collect()
}

fn net(credits: Option<BigDecimal>, debits: Option<BigDecimal>) -> Result<i64, StoreError> {
    let difference =
        credits.unwrap_or_else(|| BigDecimal::from(0)) - debits.unwrap_or_else(|| BigDecimal::from(0));
    difference
        .to_i64()
        .ok_or_else(|| StoreError::serialization("balance exceeds i64 range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn net_handles_missing_sums() {
        assert_eq!(net(None, None), Ok(0));
        assert_eq!(net(Some(BigDecimal::from(10)), None), Ok(10));
        assert_eq!(
            net(Some(BigDecimal::from(10)), Some(BigDecimal::from(25))),
            Ok(-15)
        );
    }

    #[rstest]
    fn net_rejects_out_of_range_balances() {
        let huge = BigDecimal::from(i64::MAX) + BigDecimal::from(1);
        assert!(matches!(
            net(Some(huge), None),
            Err(StoreError::Serialization { .. })
        ));
    }

    #[rstest]
    fn validation_error_wraps_into_store_error() {
        let entry = LedgerEntry::new("default", vec![]);
        let err = validate_entry(&entry).unwrap_err();
        let wrapped: LedgerStoreError = err.into();
        assert!(matches!(
            wrapped,
            LedgerStoreError::Invalid(EntryValidationError::EmptyEntry)
        ));
    }
}
