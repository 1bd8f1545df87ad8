//! Default redemption rule: balance check, freeze filtering, cross-brand
//! allocation, and the redeem ledger entry.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::domain::accounts::{customer_account, merchant_liability};
use crate::domain::allocation::{allocate, Allocation};
use crate::domain::attribution::AttributionQuery;
use crate::domain::error::StoreError;
use crate::domain::ledger::{LedgerEntry, LedgerLine};
use crate::domain::program_config::ProgramSettings;

use super::{
    Mutation, RedeemContext, RedeemDecision, RedeemHelpers, RedeemRule, ALLOCATION_KEY,
    POINTS_REDEEMED_KEY,
};

/// Redeems against the customer's outstanding attribution, splitting the
/// credit leg across partner accounts per the configured strategy.
#[derive(Debug, Default)]
pub struct DefaultRedeem;

#[async_trait]
impl RedeemRule for DefaultRedeem {
    fn name(&self) -> &'static str {
        "default-redeem"
    }

    fn should_handle(&self, _ctx: &RedeemContext) -> bool {
        true
    }

    async fn apply(
        &self,
        ctx: &RedeemContext,
        helpers: &mut dyn RedeemHelpers,
    ) -> Result<Option<RedeemDecision>, StoreError> {
        let request = &ctx.request;
        if request.qty <= 0 {
            return Ok(Some(RedeemDecision::rejected(
                "Redemption quantity must be positive",
                false,
            )));
        }

        let config = helpers.program_config(&request.program_id).await?;
        let settings = ProgramSettings::parse(config.as_ref());
        let allocation_cfg = settings.cross_brand().cloned().unwrap_or_default();

        let configured = allocation_cfg.partner_accounts();
        let candidates = if configured.is_empty() {
            vec![merchant_liability(&ctx.tenant)]
        } else {
            configured
        };
        let frozen = helpers.frozen_merchants(&candidates).await?;
        let unfrozen: Vec<String> = candidates
            .into_iter()
            .filter(|account| !frozen.contains(account))
            .collect();
        let partner_accounts = if unfrozen.is_empty() {
            vec![merchant_liability(&ctx.tenant)]
        } else {
            unfrozen
        };

        let customer = customer_account(&ctx.tenant, &request.account_ref);
        let attribution = helpers
            .outstanding_attribution(
                &customer,
                &AttributionQuery {
                    partner_accounts: partner_accounts.clone(),
                    partner_map: allocation_cfg.partner_map.clone(),
                    expiry_days: allocation_cfg.expiry_days,
                    burn_merchant_id: request.burn_merchant_id.clone(),
                },
            )
            .await?;

        let outstanding: i64 = attribution.iter().map(|slice| slice.amount).sum();
        if outstanding < request.qty {
            return Ok(Some(RedeemDecision::rejected("Insufficient balance", false)));
        }

        let eligible_partners: Vec<_> = allocation_cfg
            .partners
            .iter()
            .filter(|p| partner_accounts.contains(&p.merchant_account))
            .cloned()
            .collect();
        let allocations = allocate(
            allocation_cfg.strategy,
            request.qty,
            &attribution,
            &eligible_partners,
            allocation_cfg.partner_hint.as_deref(),
        );

        let mut lines = vec![LedgerLine::debit(&customer, &request.unit, request.qty)];
        for allocation in &allocations {
            lines.push(LedgerLine::credit(
                &allocation.merchant_account,
                &request.unit,
                allocation.amount,
            ));
        }
        let entry = LedgerEntry::new(request.program_id.clone(), lines).with_memo(
            request
                .memo
                .clone()
                .unwrap_or_else(|| "redeem".to_string()),
        );

        let mut summary = Map::new();
        summary.insert(POINTS_REDEEMED_KEY.to_string(), json!(request.qty));
        summary.insert(
            ALLOCATION_KEY.to_string(),
            Value::Array(allocations.iter().map(allocation_summary).collect()),
        );
        summary.insert(
            "burn_merchant_id".to_string(),
            request
                .burn_merchant_id
                .as_ref()
                .map(|id| json!(id))
                .unwrap_or(Value::Null),
        );

        Ok(Some(RedeemDecision::Accepted(Mutation::new(
            vec![entry],
            summary,
        ))))
    }
}

fn allocation_summary(allocation: &Allocation) -> Value {
    json!({
        "merchant_account": allocation.merchant_account,
        "amount": allocation.amount,
        "settlement_adjustment_bps": allocation.settlement_adjustment_bps,
    })
}

/// Shared by the processor: read back the allocation list a redeem summary
/// carries, if any.
pub fn allocations_from_summary(summary: &Value) -> Option<Vec<Allocation>> {
    let items = summary.get(ALLOCATION_KEY)?.as_array()?;
    let mut allocations = Vec::with_capacity(items.len());
    for item in items {
        allocations.push(Allocation {
            merchant_account: item.get("merchant_account")?.as_str()?.to_string(),
            amount: item.get("amount")?.as_i64()?,
            settlement_adjustment_bps: item
                .get("settlement_adjustment_bps")
                .and_then(Value::as_i64)
                .map(|bps| bps as i32),
        });
    }
    Some(allocations)
}
