//! Rolling-spend tier rule: windowed spend aggregation into a tier upsert.

use async_trait::async_trait;
use chrono::Duration;
use serde_json::{json, Map};

use crate::domain::accounts::customer_account;
use crate::domain::error::StoreError;
use crate::domain::program_config::ProgramSettings;
use crate::domain::tier::CustomerTier;

use super::{Mutation, ReceiptContext, ReceiptHelpers, ReceiptRule, RollingSpendQuery};

/// Recomputes a customer's tier from spend over a sliding window. Emits no
/// ledger entries; its effect is the tier upsert plus a summary fragment.
#[derive(Debug, Default)]
pub struct RollingSpendTier;

#[async_trait]
impl ReceiptRule for RollingSpendTier {
    fn name(&self) -> &'static str {
        "rolling-spend-tier"
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
        let Some(ladder) = settings.loyalty_tiers() else {
            return Ok(None);
        };
        if ladder.tiers.is_empty() || ladder.window_days <= 0 {
            return Ok(None);
        }

        let window_end = helpers.now();
        let window_start = window_end - Duration::days(ladder.window_days);
        let rolling_spend_cents = helpers
            .rolling_spend_cents(&RollingSpendQuery {
                merchant_id: receipt.merchant_id.clone(),
                customer_account_ref: receipt.account_ref.clone(),
                window_start,
                window_end,
            })
            .await?;

        let Some(tier) = ladder.select(rolling_spend_cents) else {
            return Ok(None);
        };

        let record = CustomerTier {
            merchant_id: receipt.merchant_id.clone(),
            customer_account: customer_account(&ctx.tenant, &receipt.account_ref),
            tier_id: tier.id.clone(),
            tier_name: tier.display_name.clone(),
            window_days: ladder.window_days,
            window_start,
            window_end,
            rolling_spend_cents,
            updated_at: window_end,
        };
        helpers.upsert_customer_tier(&record).await?;

        let mut summary = Map::new();
        summary.insert(
            "loyalty_tier".to_string(),
            json!({
                "tier_id": record.tier_id,
                "tier_name": record.tier_name,
                "rolling_spend_cents": rolling_spend_cents,
            }),
        );
        Ok(Some(Mutation::summary_only(summary)))
    }
}
