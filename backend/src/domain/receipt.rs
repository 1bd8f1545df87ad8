//! Receipt submissions and the canonical duplicate-detection fingerprint.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use utoipa::ToSchema;
use uuid::Uuid;

use super::money::{format_cents, parse_grand_total_cents};
use super::{DomainError, ErrorCode};

/// One purchased item on a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LineItem {
    pub sku: String,
    pub qty: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price_cents: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Ingress payload for `POST /v1/receipts`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReceiptSubmission {
    pub idempotency_key: String,
    pub merchant_id: String,
    #[serde(default)]
    pub store_id: Option<String>,
    pub account_ref: String,
    pub program_id: String,
    /// Decimal grand total; a number or a string with at most two fraction
    /// digits.
    #[schema(value_type = String, example = "42.50")]
    pub grand_total: Value,
    #[serde(default)]
    pub processor_txn_id: Option<String>,
    pub issued_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

/// An accepted, immutable receipt as the rule plugins see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub receipt_id: Uuid,
    pub merchant_id: String,
    pub store_id: Option<String>,
    pub account_ref: String,
    pub program_id: String,
    pub grand_total_cents: i64,
    pub processor_txn_id: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub items: Vec<LineItem>,
}

impl Receipt {
    /// Validate a submission into a receipt with a fresh id.
    ///
    /// # Errors
    /// Returns [`ErrorCode::UnprocessableEntity`] naming the offending field.
    pub fn from_submission(
        submission: &ReceiptSubmission,
        receipt_id: Uuid,
    ) -> Result<Self, DomainError> {
        require_non_empty("idempotency_key", &submission.idempotency_key)?;
        require_non_empty("merchant_id", &submission.merchant_id)?;
        require_non_empty("account_ref", &submission.account_ref)?;
        require_non_empty("program_id", &submission.program_id)?;

        let grand_total_cents = parse_grand_total_cents(&submission.grand_total).ok_or_else(|| {
            DomainError::new(
                ErrorCode::UnprocessableEntity,
                "grand_total must be a non-negative decimal with at most two fraction digits",
            )
        })?;

        for (index, item) in submission.items.iter().enumerate() {
            if item.sku.trim().is_empty() || item.qty <= 0 {
                return Err(DomainError::new(
                    ErrorCode::UnprocessableEntity,
                    format!("items[{index}] must have a non-empty sku and positive qty"),
                ));
            }
        }

        Ok(Self {
            receipt_id,
            merchant_id: submission.merchant_id.clone(),
            store_id: submission.store_id.clone(),
            account_ref: submission.account_ref.clone(),
            program_id: submission.program_id.clone(),
            grand_total_cents,
            processor_txn_id: submission.processor_txn_id.clone(),
            issued_at: submission.issued_at,
            items: submission.items.clone(),
        })
    }
}

/// Compute the stable duplicate-detection fingerprint for a submission.
///
/// The fingerprint is the lowercase hex SHA-256 of a canonical string so two
/// submissions of the same purchase hash identically regardless of payload
/// formatting: the grand total is normalized to two decimals and `issued_at`
/// to UTC with second precision.
pub fn receipt_fingerprint(tenant: &str, submission: &ReceiptSubmission) -> String {
    let grand_total_cents = parse_grand_total_cents(&submission.grand_total).unwrap_or(0);
    let canonical = [
        tenant,
        &submission.idempotency_key,
        &submission.merchant_id,
        submission.store_id.as_deref().unwrap_or(""),
        &submission.account_ref,
        &format_cents(grand_total_cents),
        submission.processor_txn_id.as_deref().unwrap_or(""),
        &submission
            .issued_at
            .to_rfc3339_opts(SecondsFormat::Secs, true),
    ]
    .join("|");

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

fn require_non_empty(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::new(
            ErrorCode::UnprocessableEntity,
            format!("{field} must not be empty"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn submission() -> ReceiptSubmission {
        serde_json::from_value(json!({
            "idempotency_key": "k-1",
            "merchant_id": "m-1",
            "store_id": "s-1",
            "account_ref": "c-1",
            "program_id": "default",
            "grand_total": "42.50",
            "issued_at": "2026-03-01T09:30:00Z",
            "items": [{"sku": "latte", "qty": 2}]
        }))
        .expect("valid submission")
    }

    #[rstest]
    fn submission_validates_into_receipt() {
        let receipt =
            Receipt::from_submission(&submission(), Uuid::new_v4()).expect("valid receipt");
        assert_eq!(receipt.grand_total_cents, 4250);
        assert_eq!(receipt.items.len(), 1);
    }

    #[rstest]
    fn blank_fields_are_rejected() {
        let mut bad = submission();
        bad.merchant_id = "  ".into();
        let err = Receipt::from_submission(&bad, Uuid::new_v4()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnprocessableEntity);
    }

    #[rstest]
    fn non_positive_item_qty_is_rejected() {
        let mut bad = submission();
        bad.items[0].qty = 0;
        assert!(Receipt::from_submission(&bad, Uuid::new_v4()).is_err());
    }

    #[rstest]
    fn fingerprint_is_stable_across_formatting() {
        let base = submission();
        let mut renumbered = submission();
        renumbered.grand_total = json!(42.5);

        assert_eq!(
            receipt_fingerprint("acme", &base),
            receipt_fingerprint("acme", &renumbered)
        );
    }

    #[rstest]
    fn fingerprint_distinguishes_tenants_and_totals() {
        let base = submission();
        let mut pricier = submission();
        pricier.grand_total = json!("43.50");

        assert_ne!(
            receipt_fingerprint("acme", &base),
            receipt_fingerprint("other", &base)
        );
        assert_ne!(
            receipt_fingerprint("acme", &base),
            receipt_fingerprint("acme", &pricier)
        );
    }
}
