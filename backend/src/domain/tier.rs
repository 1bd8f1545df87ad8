//! Customer loyalty tiers from rolling spend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current tier standing for `(merchant_id, customer_account)`, upserted
/// with last-writer-wins on `updated_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerTier {
    pub merchant_id: String,
    pub customer_account: String,
    pub tier_id: String,
    pub tier_name: Option<String>,
    pub window_days: i64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub rolling_spend_cents: i64,
    pub updated_at: DateTime<Utc>,
}
