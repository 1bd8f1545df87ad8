//! Internal Diesel row structs for database operations.
//!
//! Implementation details of the persistence layer; never exposed to the
//! domain. Store modules convert between these rows and domain types so
//! Diesel stays confined to the outbound adapter.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;
use uuid::Uuid;

use super::schema::{
    customer_tiers, job_notifications, ledger_journal, ledger_lines, merchant_redemption_rules,
    merchant_statuses, point_lots, program_configs, receipts, redeem_requests, settlement_reports,
};

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = receipts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct ReceiptRow {
    pub tenant: String,
    pub receipt_id: Uuid,
    pub idempotency_key: String,
    pub fingerprint: String,
    pub merchant_id: String,
    pub store_id: Option<String>,
    pub account_ref: String,
    pub program_id: String,
    pub grand_total_cents: i64,
    pub processor_txn_id: Option<String>,
    pub issued_at: DateTime<Utc>,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = receipts)]
pub(crate) struct NewReceiptRow<'a> {
    pub tenant: &'a str,
    pub receipt_id: Uuid,
    pub idempotency_key: &'a str,
    pub fingerprint: &'a str,
    pub merchant_id: &'a str,
    pub store_id: Option<&'a str>,
    pub account_ref: &'a str,
    pub program_id: &'a str,
    pub grand_total_cents: i64,
    pub processor_txn_id: Option<&'a str>,
    pub issued_at: DateTime<Utc>,
    pub payload: &'a Value,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = redeem_requests)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct RedeemRequestRow {
    pub tenant: String,
    pub request_id: Uuid,
    pub idempotency_key: Option<String>,
    pub account_ref: String,
    pub program_id: String,
    pub unit: String,
    pub qty: i64,
    pub memo: Option<String>,
    pub burn_merchant_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = redeem_requests)]
pub(crate) struct NewRedeemRequestRow<'a> {
    pub tenant: &'a str,
    pub request_id: Uuid,
    pub idempotency_key: Option<&'a str>,
    pub account_ref: &'a str,
    pub program_id: &'a str,
    pub unit: &'a str,
    pub qty: i64,
    pub memo: Option<&'a str>,
    pub burn_merchant_id: Option<&'a str>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ledger_journal)]
pub(crate) struct NewJournalRow<'a> {
    pub entry_id: Uuid,
    pub tenant: &'a str,
    pub program_id: &'a str,
    pub receipt_id: Option<Uuid>,
    pub memo: Option<&'a str>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = ledger_lines)]
pub(crate) struct NewLineRow<'a> {
    pub entry_id: Uuid,
    pub line_no: i32,
    pub account_id: &'a str,
    pub unit: &'a str,
    pub debit: i64,
    pub credit: i64,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = point_lots)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct PointLotRow {
    pub lot_id: Uuid,
    pub tenant: String,
    pub program_id: String,
    pub unit: String,
    pub customer_account: String,
    pub merchant_id: Option<String>,
    pub earn_entry_id: Uuid,
    pub qty_total: i64,
    pub qty_remaining: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = point_lots)]
pub(crate) struct NewPointLotRow<'a> {
    pub lot_id: Uuid,
    pub tenant: &'a str,
    pub program_id: &'a str,
    pub unit: &'a str,
    pub customer_account: &'a str,
    pub merchant_id: Option<&'a str>,
    pub earn_entry_id: Uuid,
    pub qty_total: i64,
    pub qty_remaining: i64,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = merchant_redemption_rules)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct RedemptionRuleRow {
    pub tenant: String,
    pub earn_merchant_id: String,
    pub burn_merchant_id: String,
    pub earn_merchant_account: String,
    pub expiry_days_override: Option<i32>,
    pub settlement_adjustment_bps: Option<i32>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = customer_tiers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct CustomerTierRow {
    pub tenant: String,
    pub merchant_id: String,
    pub customer_account: String,
    pub tier_id: String,
    pub tier_name: Option<String>,
    pub window_days: i32,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub rolling_spend_cents: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, AsChangeset)]
#[diesel(table_name = customer_tiers)]
pub(crate) struct CustomerTierUpsertRow<'a> {
    pub tenant: &'a str,
    pub merchant_id: &'a str,
    pub customer_account: &'a str,
    pub tier_id: &'a str,
    pub tier_name: Option<&'a str>,
    pub window_days: i32,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub rolling_spend_cents: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = merchant_statuses)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct MerchantStatusRow {
    pub merchant_account: String,
    pub frozen: bool,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = program_configs)]
pub(crate) struct NewProgramConfigRow<'a> {
    pub tenant: &'a str,
    pub program_id: &'a str,
    pub config: &'a Value,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = job_notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct NotificationRow {
    pub notification_id: Uuid,
    pub tenant: String,
    pub job_type: String,
    pub job_id: Uuid,
    pub reference_id: Uuid,
    pub status: String,
    pub summary: Option<Value>,
    pub error: Option<String>,
    pub delivery_attempts: i32,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = job_notifications)]
pub(crate) struct NewNotificationRow<'a> {
    pub notification_id: Uuid,
    pub tenant: &'a str,
    pub job_type: &'a str,
    pub job_id: Uuid,
    pub reference_id: Uuid,
    pub status: &'a str,
    pub summary: Option<&'a Value>,
    pub error: Option<&'a str>,
    pub available_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = settlement_reports)]
pub(crate) struct SettlementReportUpsertRow<'a> {
    pub tenant: &'a str,
    pub merchant_account: &'a str,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub net_points: i64,
    pub summary: Option<&'a Value>,
    pub updated_at: DateTime<Utc>,
}
