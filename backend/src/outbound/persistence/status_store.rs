//! Merchant freeze-state lookups.

use std::collections::HashSet;

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::domain::StoreError;

use super::error::map_diesel_error;
use super::models::MerchantStatusRow;
use super::schema::merchant_statuses;

/// Which of `accounts` are currently frozen. Accounts without a status row
/// are unfrozen.
pub async fn frozen_accounts(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    accounts: &[String],
) -> Result<HashSet<String>, StoreError> {
    if accounts.is_empty() {
        return Ok(HashSet::new());
    }

    let rows: Vec<MerchantStatusRow> = merchant_statuses::table
        .filter(merchant_statuses::tenant.eq(tenant))
        .filter(merchant_statuses::merchant_account.eq_any(accounts))
        .filter(merchant_statuses::frozen.eq(true))
        .select(MerchantStatusRow::as_select())
        .load(conn)
        .await
        .map_err(map_diesel_error)?;

    Ok(rows.into_iter().map(|row| row.merchant_account).collect())
}
