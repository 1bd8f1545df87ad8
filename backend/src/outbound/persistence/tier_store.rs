//! Customer tier persistence (last-writer-wins upsert).

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::domain::tier::CustomerTier;
use crate::domain::StoreError;

use super::error::map_diesel_error;
use super::models::{CustomerTierRow, CustomerTierUpsertRow};
use super::schema::customer_tiers;

/// Current tier standing for `(merchant_id, customer_account)`.
pub async fn get(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    merchant_id: &str,
    customer_account: &str,
) -> Result<Option<CustomerTier>, StoreError> {
    let row: Option<CustomerTierRow> = customer_tiers::table
        .filter(customer_tiers::tenant.eq(tenant))
        .filter(customer_tiers::merchant_id.eq(merchant_id))
        .filter(customer_tiers::customer_account.eq(customer_account))
        .select(CustomerTierRow::as_select())
        .first(conn)
        .await
        .optional()
        .map_err(map_diesel_error)?;

    Ok(row.map(|row| CustomerTier {
        merchant_id: row.merchant_id,
        customer_account: row.customer_account,
        tier_id: row.tier_id,
        tier_name: row.tier_name,
        window_days: i64::from(row.window_days),
        window_start: row.window_start,
        window_end: row.window_end,
        rolling_spend_cents: row.rolling_spend_cents,
        updated_at: row.updated_at,
    }))
}

/// Upsert the tier row keyed by `(tenant, merchant_id, customer_account)`.
pub async fn upsert(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    tier: &CustomerTier,
) -> Result<(), StoreError> {
    let row = CustomerTierUpsertRow {
        tenant,
        merchant_id: &tier.merchant_id,
        customer_account: &tier.customer_account,
        tier_id: &tier.tier_id,
        tier_name: tier.tier_name.as_deref(),
        window_days: tier.window_days.try_into().unwrap_or(i32::MAX),
        window_start: tier.window_start,
        window_end: tier.window_end,
        rolling_spend_cents: tier.rolling_spend_cents,
        updated_at: tier.updated_at,
    };

    diesel::insert_into(customer_tiers::table)
        .values(&row)
        .on_conflict((
            customer_tiers::tenant,
            customer_tiers::merchant_id,
            customer_tiers::customer_account,
        ))
        .do_update()
        .set(&row)
        .execute(conn)
        .await
        .map(|_| ())
        .map_err(map_diesel_error)
}
