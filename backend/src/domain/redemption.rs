//! Redemption requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{DomainError, ErrorCode};

/// Ingress payload for `POST /v1/redeem`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RedemptionSubmission {
    /// Customer account reference (`{tenant}::acct::{account_id}` is derived).
    pub account_id: String,
    pub program_id: String,
    pub unit: String,
    pub qty: i64,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub burn_merchant_id: Option<String>,
}

/// An accepted, immutable redemption request as the redeem plugins see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedeemRequest {
    pub request_id: Uuid,
    pub account_ref: String,
    pub program_id: String,
    pub unit: String,
    pub qty: i64,
    pub memo: Option<String>,
    pub burn_merchant_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl RedeemRequest {
    /// Validate a submission into a request with a fresh id.
    ///
    /// `qty` positivity is enforced by the ingress handler; requests that
    /// reach the pipeline through other paths fail in the redeem rule, which
    /// records the canonical failure on the job row.
    pub fn from_submission(
        submission: &RedemptionSubmission,
        request_id: Uuid,
        submitted_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        for (field, value) in [
            ("account_id", &submission.account_id),
            ("program_id", &submission.program_id),
            ("unit", &submission.unit),
        ] {
            if value.trim().is_empty() {
                return Err(DomainError::new(
                    ErrorCode::UnprocessableEntity,
                    format!("{field} must not be empty"),
                ));
            }
        }

        Ok(Self {
            request_id,
            account_ref: submission.account_id.clone(),
            program_id: submission.program_id.clone(),
            unit: submission.unit.clone(),
            qty: submission.qty,
            memo: submission.memo.clone(),
            burn_merchant_id: submission.burn_merchant_id.clone(),
            submitted_at,
        })
    }
}
