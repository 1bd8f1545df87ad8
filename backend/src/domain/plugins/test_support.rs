//! In-memory helper fixtures for rule tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::attribution::{AttributionQuery, AttributionSlice};
use crate::domain::error::StoreError;
use crate::domain::receipt::{LineItem, Receipt};
use crate::domain::redemption::RedeemRequest;
use crate::domain::tier::CustomerTier;

use super::{
    RedeemContext, RedeemHelpers, ReceiptContext, ReceiptHelpers, RollingSpendQuery,
};

pub(crate) const TENANT: &str = "acme";
pub(crate) const MERCHANT: &str = "m-1";
pub(crate) const ACCOUNT_REF: &str = "c-1";
pub(crate) const PROGRAM: &str = "default";

pub(crate) fn frozen_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

/// Deterministic helper double backed by plain maps.
#[derive(Debug, Default)]
pub(crate) struct InMemoryHelpers {
    config: Option<Value>,
    balances: HashMap<(String, String), i64>,
    rolling_spend: i64,
    tiers: HashMap<(String, String), CustomerTier>,
    attribution: Vec<AttributionSlice>,
    frozen: HashSet<String>,
    next_id: u128,
    pub upserted_tiers: Vec<CustomerTier>,
    pub last_attribution_query: Option<AttributionQuery>,
}

impl InMemoryHelpers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_balance(mut self, account_id: &str, unit: &str, qty: i64) -> Self {
        self.balances
            .insert((account_id.to_string(), unit.to_string()), qty);
        self
    }

    pub fn with_rolling_spend(mut self, cents: i64) -> Self {
        self.rolling_spend = cents;
        self
    }

    pub fn with_tier(mut self, tier: CustomerTier) -> Self {
        self.tiers.insert(
            (tier.merchant_id.clone(), tier.customer_account.clone()),
            tier,
        );
        self
    }

    pub fn with_attribution(mut self, slices: Vec<AttributionSlice>) -> Self {
        self.attribution = slices;
        self
    }

    pub fn with_frozen(mut self, accounts: &[&str]) -> Self {
        self.frozen = accounts.iter().map(|a| a.to_string()).collect();
        self
    }
}

#[async_trait]
impl ReceiptHelpers for InMemoryHelpers {
    fn now(&self) -> DateTime<Utc> {
        frozen_now()
    }

    fn generate_id(&mut self) -> Uuid {
        self.next_id += 1;
        Uuid::from_u128(self.next_id)
    }

    async fn program_config(&mut self, _program_id: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.config.clone())
    }

    async fn account_balance(
        &mut self,
        account_id: &str,
        _program_id: &str,
        unit: &str,
    ) -> Result<i64, StoreError> {
        Ok(self
            .balances
            .get(&(account_id.to_string(), unit.to_string()))
            .copied()
            .unwrap_or(0))
    }

    async fn rolling_spend_cents(&mut self, _query: &RollingSpendQuery) -> Result<i64, StoreError> {
        Ok(self.rolling_spend)
    }

    async fn customer_tier(
        &mut self,
        merchant_id: &str,
        customer_account: &str,
    ) -> Result<Option<CustomerTier>, StoreError> {
        Ok(self
            .tiers
            .get(&(merchant_id.to_string(), customer_account.to_string()))
            .cloned())
    }

    async fn upsert_customer_tier(&mut self, tier: &CustomerTier) -> Result<(), StoreError> {
        self.upserted_tiers.push(tier.clone());
        Ok(())
    }
}

#[async_trait]
impl RedeemHelpers for InMemoryHelpers {
    async fn outstanding_attribution(
        &mut self,
        _customer_account: &str,
        query: &AttributionQuery,
    ) -> Result<Vec<AttributionSlice>, StoreError> {
        self.last_attribution_query = Some(query.clone());
        Ok(self
            .attribution
            .iter()
            .filter(|slice| query.partner_accounts.contains(&slice.account_id))
            .cloned()
            .collect())
    }

    async fn frozen_merchants(
        &mut self,
        accounts: &[String],
    ) -> Result<HashSet<String>, StoreError> {
        Ok(accounts
            .iter()
            .filter(|a| self.frozen.contains(*a))
            .cloned()
            .collect())
    }
}

pub(crate) fn receipt_ctx(grand_total_cents: i64, items: &[(&str, i64)]) -> ReceiptContext {
    ReceiptContext {
        tenant: TENANT.to_string(),
        receipt: Receipt {
            receipt_id: Uuid::from_u128(0xFEED),
            merchant_id: MERCHANT.to_string(),
            store_id: None,
            account_ref: ACCOUNT_REF.to_string(),
            program_id: PROGRAM.to_string(),
            grand_total_cents,
            processor_txn_id: None,
            issued_at: frozen_now(),
            items: items
                .iter()
                .map(|(sku, qty)| LineItem {
                    sku: sku.to_string(),
                    qty: *qty,
                    unit_price_cents: None,
                    description: None,
                })
                .collect(),
        },
    }
}

pub(crate) fn redeem_ctx(qty: i64, burn_merchant_id: Option<&str>) -> RedeemContext {
    RedeemContext {
        tenant: TENANT.to_string(),
        request: RedeemRequest {
            request_id: Uuid::from_u128(0xBEEF),
            account_ref: ACCOUNT_REF.to_string(),
            program_id: PROGRAM.to_string(),
            unit: "points".to_string(),
            qty,
            memo: None,
            burn_merchant_id: burn_merchant_id.map(str::to_string),
            submitted_at: frozen_now(),
        },
    }
}
