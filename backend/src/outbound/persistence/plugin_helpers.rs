//! The rule-helper contract implemented over a live transaction.
//!
//! One `TxHelpers` is built per work unit, borrowing the job's transaction
//! connection; every read the rules perform therefore observes the same
//! snapshot the mutations will be applied under. The clock is captured once
//! when the work unit opens.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel_async::AsyncPgConnection;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::attribution::{fallback_attribution, AttributionQuery, AttributionSlice};
use crate::domain::lots::LotScope;
use crate::domain::plugins::{RedeemHelpers, ReceiptHelpers, RollingSpendQuery};
use crate::domain::rules::combined_expiry_bound;
use crate::domain::tier::CustomerTier;
use crate::domain::StoreError;

use super::{
    config_store, ledger_store, lot_store, receipt_store, rule_store, status_store, tier_store,
};

/// Helper implementation bound to one job transaction.
pub struct TxHelpers<'a> {
    conn: &'a mut AsyncPgConnection,
    tenant: String,
    program_id: String,
    unit: String,
    now: DateTime<Utc>,
}

impl<'a> TxHelpers<'a> {
    /// Bind helpers to a transaction for a job scoped to
    /// `(tenant, program_id, unit)`.
    pub fn new(
        conn: &'a mut AsyncPgConnection,
        tenant: impl Into<String>,
        program_id: impl Into<String>,
        unit: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            conn,
            tenant: tenant.into(),
            program_id: program_id.into(),
            unit: unit.into(),
            now,
        }
    }
}

#[async_trait]
impl ReceiptHelpers for TxHelpers<'_> {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn generate_id(&mut self) -> Uuid {
        Uuid::new_v4()
    }

    async fn program_config(&mut self, program_id: &str) -> Result<Option<Value>, StoreError> {
        config_store::get(self.conn, &self.tenant, program_id).await
    }

    async fn account_balance(
        &mut self,
        account_id: &str,
        program_id: &str,
        unit: &str,
    ) -> Result<i64, StoreError> {
        ledger_store::balance(self.conn, &self.tenant, account_id, Some(program_id), Some(unit))
            .await
    }

    async fn rolling_spend_cents(&mut self, query: &RollingSpendQuery) -> Result<i64, StoreError> {
        receipt_store::rolling_spend_cents(
            self.conn,
            &self.tenant,
            &query.merchant_id,
            &query.customer_account_ref,
            query.window_start,
            query.window_end,
        )
        .await
    }

    async fn customer_tier(
        &mut self,
        merchant_id: &str,
        customer_account: &str,
    ) -> Result<Option<CustomerTier>, StoreError> {
        tier_store::get(self.conn, &self.tenant, merchant_id, customer_account).await
    }

    async fn upsert_customer_tier(&mut self, tier: &CustomerTier) -> Result<(), StoreError> {
        tier_store::upsert(self.conn, &self.tenant, tier).await
    }
}

#[async_trait]
impl RedeemHelpers for TxHelpers<'_> {
    async fn outstanding_attribution(
        &mut self,
        customer_account: &str,
        query: &AttributionQuery,
    ) -> Result<Vec<AttributionSlice>, StoreError> {
        let frozen =
            status_store::frozen_accounts(self.conn, &self.tenant, &query.partner_accounts).await?;
        let candidates: Vec<String> = query
            .partner_accounts
            .iter()
            .filter(|account| !frozen.contains(*account))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(burn_merchant_id) = query.burn_merchant_id.as_deref() {
            let rules =
                rule_store::load_rules(self.conn, &self.tenant, Some(burn_merchant_id)).await?;
            if rules.is_empty() {
                // A cross-brand burn without an enabled rule attributes
                // nothing, which the redeem rule reports as insufficient.
                return Ok(Vec::new());
            }

            let mut slices = Vec::new();
            for account in &candidates {
                for rule in rules.for_account(account) {
                    let bound =
                        combined_expiry_bound(query.expiry_days, rule.expiry_days_override);
                    let scope = LotScope::for_merchants(vec![rule.earn_merchant_id.clone()])
                        .with_max_age_days(bound);
                    let amount = lot_store::sum_eligible(
                        self.conn,
                        &self.tenant,
                        customer_account,
                        &self.program_id,
                        &self.unit,
                        &scope,
                        self.now,
                    )
                    .await?;
                    if amount > 0 {
                        slices.push(AttributionSlice {
                            account_id: account.clone(),
                            amount,
                            settlement_adjustment_bps: rule.settlement_adjustment_bps,
                        });
                    }
                }
            }
            return Ok(slices);
        }

        let by_merchant = lot_store::remaining_by_merchant(
            self.conn,
            &self.tenant,
            customer_account,
            &self.program_id,
            &self.unit,
            query.expiry_days,
            self.now,
        )
        .await?;
        Ok(fallback_attribution(
            &by_merchant,
            &query.partner_map,
            &candidates,
        ))
    }

    async fn frozen_merchants(
        &mut self,
        accounts: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        status_store::frozen_accounts(self.conn, &self.tenant, accounts).await
    }
}
