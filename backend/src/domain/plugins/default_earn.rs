//! Base earn rule: grand total × multiplier, credited to the customer.

use async_trait::async_trait;
use serde_json::{json, Map};

use crate::domain::accounts::{customer_account, merchant_liability, POINTS_UNIT};
use crate::domain::error::StoreError;
use crate::domain::ledger::{LedgerEntry, LedgerLine};
use crate::domain::money::points_for_total;
use crate::domain::program_config::ProgramSettings;

use super::{Mutation, ReceiptContext, ReceiptHelpers, ReceiptRule};

/// Earns `round(grand_total × points_multiplier)` points per receipt by
/// debiting the merchant liability account and crediting the customer.
#[derive(Debug, Default)]
pub struct DefaultEarn;

#[async_trait]
impl ReceiptRule for DefaultEarn {
    fn name(&self) -> &'static str {
        "default-earn"
    }

    fn should_handle(&self, _ctx: &ReceiptContext) -> bool {
        true
    }

    async fn apply(
        &self,
        ctx: &ReceiptContext,
        helpers: &mut dyn ReceiptHelpers,
    ) -> Result<Option<Mutation>, StoreError> {
        let receipt = &ctx.receipt;
        let config = helpers.program_config(&receipt.program_id).await?;
        let settings = ProgramSettings::parse(config.as_ref());

        let points = points_for_total(
            receipt.grand_total_cents,
            &settings.earn().points_multiplier,
        );

        let mut summary = Map::new();
        summary.insert("points_earned".to_string(), json!(points.max(0)));
        if points <= 0 {
            return Ok(Some(Mutation::summary_only(summary)));
        }

        let entry = LedgerEntry::new(
            receipt.program_id.clone(),
            vec![
                LedgerLine::debit(merchant_liability(&ctx.tenant), POINTS_UNIT, points),
                LedgerLine::credit(
                    customer_account(&ctx.tenant, &receipt.account_ref),
                    POINTS_UNIT,
                    points,
                ),
            ],
        )
        .with_receipt(receipt.receipt_id)
        .with_memo(format!("earn:{}", receipt.merchant_id));

        Ok(Some(Mutation::new(vec![entry], summary)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::validate_entry;
    use crate::domain::plugins::test_support::{receipt_ctx, InMemoryHelpers};
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(4250, json!({}), 43)]
    #[case(4250, json!({"points_multiplier": 1.5}), 64)]
    #[tokio::test]
    async fn earns_rounded_points(
        #[case] cents: i64,
        #[case] config: serde_json::Value,
        #[case] want: i64,
    ) {
        let ctx = receipt_ctx(cents, &[]);
        let mut helpers = InMemoryHelpers::new().with_config(config);

        let mutation = DefaultEarn
            .apply(&ctx, &mut helpers)
            .await
            .expect("no store error")
            .expect("mutation");

        assert_eq!(mutation.summary["points_earned"], json!(want));
        assert_eq!(mutation.entries.len(), 1);
        let entry = &mutation.entries[0];
        assert_eq!(validate_entry(entry), Ok(()));
        assert_eq!(entry.memo.as_deref(), Some("earn:m-1"));
        assert_eq!(entry.lines[1].credit, want);
    }

    #[rstest]
    #[tokio::test]
    async fn zero_total_reports_without_entries() {
        let ctx = receipt_ctx(0, &[]);
        let mut helpers = InMemoryHelpers::new();

        let mutation = DefaultEarn
            .apply(&ctx, &mut helpers)
            .await
            .expect("no store error")
            .expect("mutation");

        assert!(mutation.entries.is_empty());
        assert_eq!(mutation.summary["points_earned"], json!(0));
    }
}
