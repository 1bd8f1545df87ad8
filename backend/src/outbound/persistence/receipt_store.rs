//! Receipt persistence: idempotent ingest, payload loads, and the rolling
//! spend aggregation.

use bigdecimal::{BigDecimal, ToPrimitive};
use chrono::{DateTime, Utc};
use diesel::dsl::sum;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::receipt::{LineItem, Receipt};
use crate::domain::StoreError;

use super::error::map_diesel_error;
use super::models::{NewReceiptRow, ReceiptRow};
use super::schema::receipts;

/// Persist one receipt row inside the caller's transaction. Uniqueness on
/// `(tenant, idempotency_key)` and `(tenant, fingerprint)` surfaces as
/// [`StoreError::DuplicateKey`].
pub async fn insert(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    receipt: &Receipt,
    idempotency_key: &str,
    fingerprint: &str,
    payload: &Value,
) -> Result<(), StoreError> {
    diesel::insert_into(receipts::table)
        .values(&NewReceiptRow {
            tenant,
            receipt_id: receipt.receipt_id,
            idempotency_key,
            fingerprint,
            merchant_id: &receipt.merchant_id,
            store_id: receipt.store_id.as_deref(),
            account_ref: &receipt.account_ref,
            program_id: &receipt.program_id,
            grand_total_cents: receipt.grand_total_cents,
            processor_txn_id: receipt.processor_txn_id.as_deref(),
            issued_at: receipt.issued_at,
            payload,
        })
        .execute(conn)
        .await
        .map(|_| ())
        .map_err(map_diesel_error)
}

/// Locate a previously accepted submission by idempotency key or content
/// fingerprint.
pub async fn find_duplicate(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    idempotency_key: &str,
    fingerprint: &str,
) -> Result<Option<Uuid>, StoreError> {
    receipts::table
        .filter(receipts::tenant.eq(tenant))
        .filter(
            receipts::idempotency_key
                .eq(idempotency_key)
                .or(receipts::fingerprint.eq(fingerprint)),
        )
        .select(receipts::receipt_id)
        .first(conn)
        .await
        .optional()
        .map_err(map_diesel_error)
}

/// Load a receipt with its items for rule evaluation. `None` when the
/// payload row is missing.
pub async fn load(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    receipt_id: Uuid,
) -> Result<Option<Receipt>, StoreError> {
    let row: Option<ReceiptRow> = receipts::table
        .filter(receipts::tenant.eq(tenant))
        .filter(receipts::receipt_id.eq(receipt_id))
        .select(ReceiptRow::as_select())
        .first(conn)
        .await
        .optional()
        .map_err(map_diesel_error)?;

    Ok(row.map(row_to_receipt))
}

/// `Σ grand_total_cents` over receipts of `(merchant_id, account_ref)`
/// issued within `[window_start, window_end)`.
pub async fn rolling_spend_cents(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    merchant_id: &str,
    account_ref: &str,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Result<i64, StoreError> {
    let total: Option<BigDecimal> = receipts::table
        .filter(receipts::tenant.eq(tenant))
        .filter(receipts::merchant_id.eq(merchant_id))
        .filter(receipts::account_ref.eq(account_ref))
        .filter(receipts::issued_at.ge(window_start))
        .filter(receipts::issued_at.lt(window_end))
        .select(sum(receipts::grand_total_cents))
        .first(conn)
        .await
        .map_err(map_diesel_error)?;

    total
        .map(|value| {
            value
                .to_i64()
                .ok_or_else(|| StoreError::serialization("rolling spend exceeds i64 range"))
        })
        .unwrap_or(Ok(0))
}

fn row_to_receipt(row: ReceiptRow) -> Receipt {
    // Items ride in the stored payload; rows written by older ingest
    // versions without an items array read as item-free receipts.
    let items: Vec<LineItem> = row
        .payload
        .get("items")
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default();

    Receipt {
        receipt_id: row.receipt_id,
        merchant_id: row.merchant_id,
        store_id: row.store_id,
        account_ref: row.account_ref,
        program_id: row.program_id,
        grand_total_cents: row.grand_total_cents,
        processor_txn_id: row.processor_txn_id,
        issued_at: row.issued_at,
        items,
    }
}
