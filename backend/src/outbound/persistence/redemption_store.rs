//! Redemption request persistence.

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use uuid::Uuid;

use crate::domain::redemption::RedeemRequest;
use crate::domain::StoreError;

use super::error::map_diesel_error;
use super::models::{NewRedeemRequestRow, RedeemRequestRow};
use super::schema::redeem_requests;

/// Persist one request row inside the caller's transaction. A duplicate
/// `(tenant, idempotency_key)` surfaces as [`StoreError::DuplicateKey`].
pub async fn insert(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    request: &RedeemRequest,
    idempotency_key: Option<&str>,
) -> Result<(), StoreError> {
    diesel::insert_into(redeem_requests::table)
        .values(&NewRedeemRequestRow {
            tenant,
            request_id: request.request_id,
            idempotency_key,
            account_ref: &request.account_ref,
            program_id: &request.program_id,
            unit: &request.unit,
            qty: request.qty,
            memo: request.memo.as_deref(),
            burn_merchant_id: request.burn_merchant_id.as_deref(),
        })
        .execute(conn)
        .await
        .map(|_| ())
        .map_err(map_diesel_error)
}

/// Locate a previously accepted request by idempotency key.
pub async fn find_by_idempotency_key(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    idempotency_key: &str,
) -> Result<Option<Uuid>, StoreError> {
    redeem_requests::table
        .filter(redeem_requests::tenant.eq(tenant))
        .filter(redeem_requests::idempotency_key.eq(idempotency_key))
        .select(redeem_requests::request_id)
        .first(conn)
        .await
        .optional()
        .map_err(map_diesel_error)
}

/// Load a request for rule evaluation.
pub async fn load(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    request_id: Uuid,
) -> Result<Option<RedeemRequest>, StoreError> {
    let row: Option<RedeemRequestRow> = redeem_requests::table
        .filter(redeem_requests::tenant.eq(tenant))
        .filter(redeem_requests::request_id.eq(request_id))
        .select(RedeemRequestRow::as_select())
        .first(conn)
        .await
        .optional()
        .map_err(map_diesel_error)?;

    Ok(row.map(|row| RedeemRequest {
        request_id: row.request_id,
        account_ref: row.account_ref,
        program_id: row.program_id,
        unit: row.unit,
        qty: row.qty,
        memo: row.memo,
        burn_merchant_id: row.burn_merchant_id,
        submitted_at: row.created_at,
    }))
}
