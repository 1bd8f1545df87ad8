//! Reward rule plugins.
//!
//! A rule inspects a receipt or redemption inside the job transaction and
//! declares its effect as a [`Mutation`]: zero or more balanced ledger
//! entries plus a summary fragment. Rules never touch the database directly;
//! everything flows through the helper traits so a rule is deterministic
//! given a database snapshot and a frozen clock, and testable against
//! in-memory fixtures.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::attribution::{AttributionQuery, AttributionSlice};
use super::error::StoreError;
use super::ledger::LedgerEntry;
use super::receipt::Receipt;
use super::redemption::RedeemRequest;
use super::tier::CustomerTier;

mod default_earn;
mod default_redeem;
mod nth_free_stamps;
mod rolling_spend_tier;
mod runner;
#[cfg(test)]
pub(crate) mod test_support;

pub use default_earn::DefaultEarn;
pub use default_redeem::{allocations_from_summary, DefaultRedeem};
pub use nth_free_stamps::NthFreeStamps;
pub use rolling_spend_tier::RollingSpendTier;
pub use runner::{receipt_chain, redeem_chain, run_receipt_chain, run_redeem_chain};

/// Summary key whose presence makes the processor consume lots.
pub const ALLOCATION_KEY: &str = "allocation";
/// Summary key carrying the redeemed quantity.
pub const POINTS_REDEEMED_KEY: &str = "points_redeemed";

/// A rule's declarative output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mutation {
    pub entries: Vec<LedgerEntry>,
    pub summary: Map<String, Value>,
}

impl Mutation {
    pub fn new(entries: Vec<LedgerEntry>, summary: Map<String, Value>) -> Self {
        Self { entries, summary }
    }

    /// An informational mutation carrying only a summary.
    pub fn summary_only(summary: Map<String, Value>) -> Self {
        Self {
            entries: Vec::new(),
            summary,
        }
    }

    pub fn summary_value(&self) -> Value {
        Value::Object(self.summary.clone())
    }
}

/// Merge mutation summaries in application order; later keys win.
pub fn merge_summaries(mutations: &[Mutation]) -> Value {
    let mut merged = Map::new();
    for mutation in mutations {
        for (key, value) in &mutation.summary {
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}

/// Outcome of the redeem chain.
#[derive(Debug, Clone, PartialEq)]
pub enum RedeemDecision {
    /// Apply the mutation and complete the job.
    Accepted(Mutation),
    /// Fail the job with `reason`; `retryable` picks the failure track.
    Rejected { reason: String, retryable: bool },
}

impl RedeemDecision {
    pub fn rejected(reason: impl Into<String>, retryable: bool) -> Self {
        Self::Rejected {
            reason: reason.into(),
            retryable,
        }
    }
}

/// Everything a receipt rule may observe about its job.
#[derive(Debug, Clone)]
pub struct ReceiptContext {
    pub tenant: String,
    pub receipt: Receipt,
}

/// Everything a redeem rule may observe about its job.
#[derive(Debug, Clone)]
pub struct RedeemContext {
    pub tenant: String,
    pub request: RedeemRequest,
}

/// Scope of a rolling-spend aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollingSpendQuery {
    pub merchant_id: String,
    pub customer_account_ref: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

/// Database access surfaced to receipt rules. The clock and id source are
/// injected here so rules stay deterministic under test.
#[async_trait]
pub trait ReceiptHelpers: Send {
    /// Frozen wall clock for this work unit.
    fn now(&self) -> DateTime<Utc>;

    /// Fresh identifier.
    fn generate_id(&mut self) -> Uuid;

    async fn program_config(&mut self, program_id: &str) -> Result<Option<Value>, StoreError>;

    async fn account_balance(
        &mut self,
        account_id: &str,
        program_id: &str,
        unit: &str,
    ) -> Result<i64, StoreError>;

    async fn rolling_spend_cents(&mut self, query: &RollingSpendQuery) -> Result<i64, StoreError>;

    async fn customer_tier(
        &mut self,
        merchant_id: &str,
        customer_account: &str,
    ) -> Result<Option<CustomerTier>, StoreError>;

    async fn upsert_customer_tier(&mut self, tier: &CustomerTier) -> Result<(), StoreError>;
}

/// Receipt helpers extended with the attribution surface redeem rules need.
#[async_trait]
pub trait RedeemHelpers: ReceiptHelpers {
    async fn outstanding_attribution(
        &mut self,
        customer_account: &str,
        query: &AttributionQuery,
    ) -> Result<Vec<AttributionSlice>, StoreError>;

    async fn frozen_merchants(
        &mut self,
        accounts: &[String],
    ) -> Result<HashSet<String>, StoreError>;
}

/// A receipt rule: one link in the fixed evaluation chain.
#[async_trait]
pub trait ReceiptRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn should_handle(&self, ctx: &ReceiptContext) -> bool;

    /// Evaluate the rule. `None` means the rule does not apply to this
    /// receipt; an error aborts the work unit for retry.
    async fn apply(
        &self,
        ctx: &ReceiptContext,
        helpers: &mut dyn ReceiptHelpers,
    ) -> Result<Option<Mutation>, StoreError>;
}

/// A redeem rule; the first rule to return a decision wins.
#[async_trait]
pub trait RedeemRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn should_handle(&self, ctx: &RedeemContext) -> bool;

    async fn apply(
        &self,
        ctx: &RedeemContext,
        helpers: &mut dyn RedeemHelpers,
    ) -> Result<Option<RedeemDecision>, StoreError>;
}
