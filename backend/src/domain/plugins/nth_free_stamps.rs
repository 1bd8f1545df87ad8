//! Stamp-card rule: SKU-matched stamps with threshold-crossing coupons.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::domain::accounts::{customer_account, merchant_liability};
use crate::domain::error::StoreError;
use crate::domain::ledger::{LedgerEntry, LedgerLine};
use crate::domain::program_config::{ProgramSettings, StampProgram};

use super::{Mutation, ReceiptContext, ReceiptHelpers, ReceiptRule};

/// Issues stamps for configured SKUs and a coupon each time the running
/// stamp balance crosses a multiple of the program threshold.
#[derive(Debug, Default)]
pub struct NthFreeStamps;

#[async_trait]
impl ReceiptRule for NthFreeStamps {
    fn name(&self) -> &'static str {
        "nth-free-stamps"
    }

    fn should_handle(&self, ctx: &ReceiptContext) -> bool {
        !ctx.receipt.items.is_empty()
    }

    async fn apply(
        &self,
        ctx: &ReceiptContext,
        helpers: &mut dyn ReceiptHelpers,
    ) -> Result<Option<Mutation>, StoreError> {
        let receipt = &ctx.receipt;
        let config = helpers.program_config(&receipt.program_id).await?;
        let settings = ProgramSettings::parse(config.as_ref());
        if settings.stamp_programs().is_empty() {
            return Ok(None);
        }

        let customer = customer_account(&ctx.tenant, &receipt.account_ref);
        let liability = merchant_liability(&ctx.tenant);

        let mut entries = Vec::new();
        let mut program_summaries = Vec::new();
        for program in settings.stamp_programs() {
            let tier = helpers
                .customer_tier(&receipt.merchant_id, &customer)
                .await?;
            let tier_id = tier.as_ref().map(|t| t.tier_id.as_str());

            let stamps_added = stamps_for_receipt(program, receipt, tier_id);
            if stamps_added <= 0 {
                continue;
            }

            let stamp_unit = program.stamp_unit();
            let before = helpers
                .account_balance(&customer, &receipt.program_id, &stamp_unit)
                .await?;

            entries.push(
                LedgerEntry::new(
                    receipt.program_id.clone(),
                    vec![
                        LedgerLine::debit(&liability, &stamp_unit, stamps_added),
                        LedgerLine::credit(&customer, &stamp_unit, stamps_added),
                    ],
                )
                .with_receipt(receipt.receipt_id)
                .with_memo(format!("stamps:{}", program.id)),
            );

            let coupons = program
                .effective_threshold(tier_id)
                .map(|threshold| crossings(before, stamps_added, threshold))
                .unwrap_or(0);
            if coupons > 0 {
                let coupon_unit = program.coupon_unit();
                entries.push(
                    LedgerEntry::new(
                        receipt.program_id.clone(),
                        vec![
                            LedgerLine::debit(&liability, &coupon_unit, coupons),
                            LedgerLine::credit(&customer, &coupon_unit, coupons),
                        ],
                    )
                    .with_receipt(receipt.receipt_id)
                    .with_memo(format!("coupon:{}", program.id)),
                );
            }

            program_summaries.push(json!({
                "id": program.id,
                "stamps_added": stamps_added,
                "coupons_issued": coupons,
            }));
        }

        if entries.is_empty() {
            return Ok(None);
        }

        let mut summary = Map::new();
        summary.insert(
            "stamp_programs".to_string(),
            Value::Array(program_summaries),
        );
        Ok(Some(Mutation::new(entries, summary)))
    }
}

fn stamps_for_receipt(
    program: &StampProgram,
    receipt: &crate::domain::receipt::Receipt,
    tier_id: Option<&str>,
) -> i64 {
    let per_item = program.effective_stamps_per_item(tier_id);
    receipt
        .items
        .iter()
        .filter(|item| program.matches_sku(&item.sku))
        .map(|item| item.qty.saturating_mul(per_item))
        .sum()
}

/// Threshold multiples crossed when moving from `before` to
/// `before + added`.
fn crossings(before: i64, added: i64, threshold: i64) -> i64 {
    (before + added).div_euclid(threshold) - before.div_euclid(threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::plugins::test_support::{
        frozen_now, receipt_ctx, InMemoryHelpers, MERCHANT,
    };
    use crate::domain::tier::CustomerTier;
    use rstest::rstest;
    use serde_json::json;

    fn stamp_config() -> serde_json::Value {
        json!({
            "stamp_programs": [{
                "id": "coffee",
                "skus": ["latte", "flat-white"],
                "threshold": 5
            }]
        })
    }

    #[rstest]
    #[case(0, 3, 0)]
    #[case(4, 3, 1)] // 4 → 7 crosses 5
    #[case(4, 11, 3)] // 4 → 15 crosses 5, 10, 15
    fn crossing_counts(#[case] before: i64, #[case] added: i64, #[case] want: i64) {
        assert_eq!(crossings(before, added, 5), want);
    }

    #[rstest]
    #[tokio::test]
    async fn stamps_and_coupon_on_threshold_crossing() {
        // Prior balance 4, receipt adds 3: one stamp entry and one coupon.
        let ctx = receipt_ctx(1000, &[("Latte", 3)]);
        let mut helpers = InMemoryHelpers::new()
            .with_config(stamp_config())
            .with_balance("acme::acct::c-1", "stamps:coffee", 4);

        let mutation = NthFreeStamps
            .apply(&ctx, &mut helpers)
            .await
            .expect("no store error")
            .expect("mutation");

        assert_eq!(mutation.entries.len(), 2);
        assert_eq!(mutation.entries[0].lines[1].credit, 3);
        assert_eq!(mutation.entries[0].lines[1].unit, "stamps:coffee");
        assert_eq!(mutation.entries[1].lines[1].credit, 1);
        assert_eq!(mutation.entries[1].lines[1].unit, "coupon:coffee");
        assert_eq!(
            mutation.summary["stamp_programs"],
            json!([{"id": "coffee", "stamps_added": 3, "coupons_issued": 1}])
        );
    }

    #[rstest]
    #[tokio::test]
    async fn unmatched_skus_yield_nothing() {
        let ctx = receipt_ctx(1000, &[("tea", 2)]);
        let mut helpers = InMemoryHelpers::new().with_config(stamp_config());

        let result = NthFreeStamps
            .apply(&ctx, &mut helpers)
            .await
            .expect("no store error");
        assert!(result.is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn tier_override_doubles_stamps() {
        let ctx = receipt_ctx(1000, &[("latte", 2)]);
        let config = json!({
            "stamp_programs": [{
                "id": "coffee",
                "skus": ["latte"],
                "threshold": 5,
                "tier_overrides": {"gold": {"stamps_per_item": 2}}
            }]
        });
        let mut helpers = InMemoryHelpers::new().with_config(config).with_tier(CustomerTier {
            merchant_id: MERCHANT.to_string(),
            customer_account: "acme::acct::c-1".to_string(),
            tier_id: "gold".to_string(),
            tier_name: None,
            window_days: 30,
            window_start: frozen_now(),
            window_end: frozen_now(),
            rolling_spend_cents: 0,
            updated_at: frozen_now(),
        });

        let mutation = NthFreeStamps
            .apply(&ctx, &mut helpers)
            .await
            .expect("no store error")
            .expect("mutation");
        assert_eq!(mutation.entries[0].lines[1].credit, 4);
    }

    #[rstest]
    #[tokio::test]
    async fn missing_config_skips_the_rule() {
        let ctx = receipt_ctx(1000, &[("latte", 1)]);
        let mut helpers = InMemoryHelpers::new();
        let result = NthFreeStamps
            .apply(&ctx, &mut helpers)
            .await
            .expect("no store error");
        assert!(result.is_none());
    }
}
