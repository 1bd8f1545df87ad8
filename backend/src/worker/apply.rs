//! Mutation application: journal writes, lot creation, lot consumption.
//!
//! Applied per mutation, in plugin-chain order, inside the work-unit
//! transaction:
//!
//! 1. append the ledger entries;
//! 2. create a lot for every points credit to a customer account on an
//!    entry whose memo marks an earn (`earn:{merchant_id}`);
//! 3. when the summary carries an allocation, consume lots per allocated
//!    partner; without one but with a redeemed quantity, consume FIFO
//!    across all merchants.

use chrono::{DateTime, Utc};
use diesel_async::AsyncPgConnection;
use tracing::error;
use uuid::Uuid;

use crate::domain::accounts::{earn_memo_merchant, is_customer_account, POINTS_UNIT};
use crate::domain::allocation::Allocation;
use crate::domain::job::JobError;
use crate::domain::ledger::{LedgerEntry, LedgerLine};
use crate::domain::lots::{lot_expiry, LotDraft, LotScope};
use crate::domain::plugins::{allocations_from_summary, Mutation, POINTS_REDEEMED_KEY};
use crate::domain::program_config::ProgramSettings;
use crate::domain::rules::combined_expiry_bound;
use crate::outbound::persistence::ledger_store::LedgerStoreError;
use crate::outbound::persistence::lot_store::{ConsumeTarget, LotStoreError};
use crate::outbound::persistence::{ledger_store, lot_store, rule_store};

/// Apply one mutation inside the caller's transaction.
pub async fn apply_mutation(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    mutation: &Mutation,
    settings: &ProgramSettings,
    now: DateTime<Utc>,
) -> Result<(), JobError> {
    let entry_ids = ledger_store::append_entries(conn, tenant, &mutation.entries, now)
        .await
        .map_err(ledger_error_to_job)?;

    for (entry, entry_id) in mutation.entries.iter().zip(&entry_ids) {
        create_earn_lots(conn, tenant, entry, *entry_id, settings, now).await?;
    }

    let summary = mutation.summary_value();
    if let Some(allocations) = allocations_from_summary(&summary) {
        let burn_merchant_id = summary.get("burn_merchant_id").and_then(|v| v.as_str());
        consume_allocated(
            conn,
            tenant,
            mutation,
            &allocations,
            burn_merchant_id,
            settings,
            now,
        )
        .await?;
    } else if let Some(points_redeemed) = summary.get(POINTS_REDEEMED_KEY).and_then(|v| v.as_i64())
    {
        consume_untargeted(conn, tenant, mutation, points_redeemed, now).await?;
    }

    Ok(())
}

async fn create_earn_lots(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    entry: &LedgerEntry,
    entry_id: Uuid,
    settings: &ProgramSettings,
    now: DateTime<Utc>,
) -> Result<(), JobError> {
    let Some(merchant_id) = entry.memo.as_deref().and_then(earn_memo_merchant) else {
        return Ok(());
    };

    for line in &entry.lines {
        if line.credit <= 0
            || line.unit != POINTS_UNIT
            || !is_customer_account(tenant, &line.account_id)
        {
            continue;
        }
        let expiry_days = settings.earn_expiry_days(merchant_id);
        lot_store::create_lot(
            conn,
            tenant,
            &LotDraft {
                program_id: entry.program_id.clone(),
                unit: line.unit.clone(),
                customer_account: line.account_id.clone(),
                merchant_id: Some(merchant_id.to_string()),
                earn_entry_id: entry_id,
                qty: line.credit,
                expires_at: lot_expiry(now, expiry_days),
            },
            now,
        )
        .await
        .map_err(JobError::from)?;
    }
    Ok(())
}

async fn consume_allocated(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    mutation: &Mutation,
    allocations: &[Allocation],
    burn_merchant_id: Option<&str>,
    settings: &ProgramSettings,
    now: DateTime<Utc>,
) -> Result<(), JobError> {
    let (entry, debit_line) = customer_debit_line(tenant, mutation)?;
    let rules = rule_store::load_rules(conn, tenant, burn_merchant_id)
        .await
        .map_err(JobError::from)?;
    let allocation_cfg = settings.cross_brand().cloned().unwrap_or_default();

    for allocation in allocations {
        let matching: Vec<_> = rules.for_account(&allocation.merchant_account).collect();
        let (merchant_ids, override_days) = if matching.is_empty() {
            (
                allocation_cfg.merchants_for_partner(&allocation.merchant_account),
                None,
            )
        } else {
            (
                matching
                    .iter()
                    .map(|rule| rule.earn_merchant_id.clone())
                    .collect(),
                matching.iter().filter_map(|rule| rule.expiry_days_override).min(),
            )
        };

        let scope = if merchant_ids.is_empty() {
            LotScope::unrestricted()
        } else {
            LotScope::for_merchants(merchant_ids)
        }
        .with_max_age_days(combined_expiry_bound(
            allocation_cfg.expiry_days,
            override_days,
        ));

        consume(conn, tenant, entry, debit_line, allocation.amount, &scope, now).await?;
    }
    Ok(())
}

async fn consume_untargeted(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    mutation: &Mutation,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<(), JobError> {
    let (entry, debit_line) = customer_debit_line(tenant, mutation)?;
    consume(
        conn,
        tenant,
        entry,
        debit_line,
        amount,
        &LotScope::unrestricted(),
        now,
    )
    .await
}

async fn consume(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    entry: &LedgerEntry,
    debit_line: &LedgerLine,
    amount: i64,
    scope: &LotScope,
    now: DateTime<Utc>,
) -> Result<(), JobError> {
    lot_store::consume(
        conn,
        tenant,
        ConsumeTarget {
            customer_account: &debit_line.account_id,
            program_id: &entry.program_id,
            unit: &debit_line.unit,
            amount,
        },
        scope,
        now,
    )
    .await
    .map_err(|err| match err {
        // A shortfall here means a concurrent consumer won the race after
        // the balance check passed; retry re-runs the check.
        LotStoreError::Insufficient(shortfall) => JobError::retryable(shortfall.to_string()),
        LotStoreError::Store(store) => JobError::from(store),
    })
}

/// The redeem entry's customer debit line fixes which balance the lots are
/// consumed from.
fn customer_debit_line<'a>(
    tenant: &str,
    mutation: &'a Mutation,
) -> Result<(&'a LedgerEntry, &'a LedgerLine), JobError> {
    for entry in &mutation.entries {
        for line in &entry.lines {
            if line.debit > 0 && is_customer_account(tenant, &line.account_id) {
                return Ok((entry, line));
            }
        }
    }
    error!("redeem mutation carries an allocation but no customer debit line");
    Err(JobError::terminal(
        "Redeem mutation missing a customer debit line",
    ))
}

fn ledger_error_to_job(error: LedgerStoreError) -> JobError {
    match error {
        // Unbalanced or empty entries are rule bugs; never retried.
        LedgerStoreError::Invalid(invalid) => {
            error!(error = %invalid, "rule produced an invalid ledger entry");
            JobError::terminal(invalid.to_string())
        }
        LedgerStoreError::Store(store) => JobError::from(store),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::LedgerLine;
    use rstest::rstest;
    use serde_json::Map;

    #[rstest]
    fn customer_debit_line_is_found_among_entries() {
        let entry = LedgerEntry::new(
            "default",
            vec![
                LedgerLine::debit("acme::acct::c-1", "points", 30),
                LedgerLine::credit("acct-a", "points", 30),
            ],
        );
        let mutation = Mutation::new(vec![entry], Map::new());

        let (_, line) = customer_debit_line("acme", &mutation).expect("debit line");
        assert_eq!(line.account_id, "acme::acct::c-1");
        assert_eq!(line.debit, 30);
    }

    #[rstest]
    fn missing_debit_line_is_terminal() {
        let entry = LedgerEntry::new(
            "default",
            vec![
                LedgerLine::debit("acct-a", "points", 30),
                LedgerLine::credit("acct-b", "points", 30),
            ],
        );
        let mutation = Mutation::new(vec![entry], Map::new());

        let err = customer_debit_line("acme", &mutation).unwrap_err();
        assert!(matches!(err, JobError::Terminal { .. }));
    }

    #[rstest]
    fn invalid_entries_map_to_terminal_errors() {
        let err = ledger_error_to_job(LedgerStoreError::Invalid(
            crate::domain::ledger::EntryValidationError::EmptyEntry,
        ));
        assert!(matches!(err, JobError::Terminal { .. }));
    }
}
