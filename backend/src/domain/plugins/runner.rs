//! Rule chain composition and evaluation.
//!
//! The chains are statically composed; evaluation order is the chain order
//! and the mutations a receipt chain returns are applied in that same order.

use crate::domain::error::StoreError;

use super::{
    DefaultEarn, DefaultRedeem, Mutation, NthFreeStamps, RedeemContext, RedeemDecision,
    RedeemHelpers, RedeemRule, ReceiptContext, ReceiptHelpers, ReceiptRule, RollingSpendTier,
};

/// The fixed receipt chain: earn, stamps, tier.
pub fn receipt_chain() -> Vec<Box<dyn ReceiptRule>> {
    vec![
        Box::new(DefaultEarn),
        Box::new(NthFreeStamps),
        Box::new(RollingSpendTier),
    ]
}

/// The fixed redeem chain.
pub fn redeem_chain() -> Vec<Box<dyn RedeemRule>> {
    vec![Box::new(DefaultRedeem)]
}

/// Evaluate every accepting receipt rule; skipped rules (`None`) are
/// filtered and the output order equals the chain order.
pub async fn run_receipt_chain(
    chain: &[Box<dyn ReceiptRule>],
    ctx: &ReceiptContext,
    helpers: &mut dyn ReceiptHelpers,
) -> Result<Vec<Mutation>, StoreError> {
    let mut mutations = Vec::new();
    for rule in chain {
        if !rule.should_handle(ctx) {
            continue;
        }
        if let Some(mutation) = rule.apply(ctx, helpers).await? {
            mutations.push(mutation);
        }
    }
    Ok(mutations)
}

/// Ask each accepting redeem rule in order; the first decision wins.
/// `None` from every rule means no rule accepted the request.
pub async fn run_redeem_chain(
    chain: &[Box<dyn RedeemRule>],
    ctx: &RedeemContext,
    helpers: &mut dyn RedeemHelpers,
) -> Result<Option<RedeemDecision>, StoreError> {
    for rule in chain {
        if !rule.should_handle(ctx) {
            continue;
        }
        if let Some(decision) = rule.apply(ctx, helpers).await? {
            return Ok(Some(decision));
        }
    }
    Ok(None)
}
