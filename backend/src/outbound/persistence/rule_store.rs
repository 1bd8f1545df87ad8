//! Merchant redemption rule loads.

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::domain::rules::{MerchantRedemptionRule, RuleSet};
use crate::domain::StoreError;

use super::error::map_diesel_error;
use super::models::RedemptionRuleRow;
use super::schema::merchant_redemption_rules;

/// All enabled rules for one burn merchant. `None` yields an empty set:
/// same-merchant redemptions are not rule-governed.
pub async fn load_rules(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    burn_merchant_id: Option<&str>,
) -> Result<RuleSet, StoreError> {
    let Some(burn_merchant_id) = burn_merchant_id else {
        return Ok(RuleSet::default());
    };

    let rows: Vec<RedemptionRuleRow> = merchant_redemption_rules::table
        .filter(merchant_redemption_rules::tenant.eq(tenant))
        .filter(merchant_redemption_rules::burn_merchant_id.eq(burn_merchant_id))
        .filter(merchant_redemption_rules::enabled.eq(true))
        .order(merchant_redemption_rules::earn_merchant_id.asc())
        .select(RedemptionRuleRow::as_select())
        .load(conn)
        .await
        .map_err(map_diesel_error)?;

    Ok(RuleSet::new(
        rows.into_iter()
            .map(|row| MerchantRedemptionRule {
                earn_merchant_id: row.earn_merchant_id,
                burn_merchant_id: row.burn_merchant_id,
                earn_merchant_account: row.earn_merchant_account,
                expiry_days_override: row.expiry_days_override.map(i64::from),
                settlement_adjustment_bps: row.settlement_adjustment_bps,
            })
            .collect(),
    ))
}
