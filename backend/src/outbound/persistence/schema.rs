//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the database migrations exactly; Diesel uses
//! them for compile-time query validation and type-safe SQL generation. The
//! relational schema is the system's external contract: payout and
//! reconciliation workers read these tables directly.

diesel::table! {
    /// Immutable purchase receipts, unique per tenant by id, idempotency
    /// key, and content fingerprint.
    receipts (tenant, receipt_id) {
        tenant -> Varchar,
        receipt_id -> Uuid,
        idempotency_key -> Varchar,
        fingerprint -> Varchar,
        merchant_id -> Varchar,
        store_id -> Nullable<Varchar>,
        account_ref -> Varchar,
        program_id -> Varchar,
        grand_total_cents -> Int8,
        processor_txn_id -> Nullable<Varchar>,
        issued_at -> Timestamptz,
        payload -> Jsonb,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Immutable redemption requests.
    redeem_requests (tenant, request_id) {
        tenant -> Varchar,
        request_id -> Uuid,
        idempotency_key -> Nullable<Varchar>,
        account_ref -> Varchar,
        program_id -> Varchar,
        unit -> Varchar,
        qty -> Int8,
        memo -> Nullable<Text>,
        burn_merchant_id -> Nullable<Varchar>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Processing queue for receipts; one active job per receipt.
    receipt_jobs (job_id) {
        job_id -> Uuid,
        tenant -> Varchar,
        reference_id -> Uuid,
        status -> Varchar,
        attempts -> Int4,
        last_error -> Nullable<Text>,
        result_summary -> Nullable<Jsonb>,
        available_at -> Timestamptz,
        completed_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Processing queue for redemption requests.
    redeem_jobs (job_id) {
        job_id -> Uuid,
        tenant -> Varchar,
        reference_id -> Uuid,
        status -> Varchar,
        attempts -> Int4,
        last_error -> Nullable<Text>,
        result_summary -> Nullable<Jsonb>,
        available_at -> Timestamptz,
        completed_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only journal headers.
    ledger_journal (entry_id) {
        entry_id -> Uuid,
        tenant -> Varchar,
        program_id -> Varchar,
        receipt_id -> Nullable<Uuid>,
        memo -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Append-only journal lines; `line_no` starts at 1 within an entry.
    ledger_lines (entry_id, line_no) {
        entry_id -> Uuid,
        line_no -> Int4,
        account_id -> Varchar,
        unit -> Varchar,
        debit -> Int8,
        credit -> Int8,
    }
}

diesel::table! {
    /// Per-earn point inventory; `qty_remaining` only ever decreases.
    point_lots (lot_id) {
        lot_id -> Uuid,
        tenant -> Varchar,
        program_id -> Varchar,
        unit -> Varchar,
        customer_account -> Varchar,
        merchant_id -> Nullable<Varchar>,
        earn_entry_id -> Uuid,
        qty_total -> Int8,
        qty_remaining -> Int8,
        expires_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Earn→burn authorization and settlement economics.
    merchant_redemption_rules (tenant, earn_merchant_id, burn_merchant_id) {
        tenant -> Varchar,
        earn_merchant_id -> Varchar,
        burn_merchant_id -> Varchar,
        earn_merchant_account -> Varchar,
        expiry_days_override -> Nullable<Int4>,
        settlement_adjustment_bps -> Nullable<Int4>,
        enabled -> Bool,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Rolling-spend tier standing per merchant and customer.
    customer_tiers (tenant, merchant_id, customer_account) {
        tenant -> Varchar,
        merchant_id -> Varchar,
        customer_account -> Varchar,
        tier_id -> Varchar,
        tier_name -> Nullable<Varchar>,
        window_days -> Int4,
        window_start -> Timestamptz,
        window_end -> Timestamptz,
        rolling_spend_cents -> Int8,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Freeze flags per merchant account.
    merchant_statuses (tenant, merchant_account) {
        tenant -> Varchar,
        merchant_account -> Varchar,
        frozen -> Bool,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Opaque per-program configuration documents.
    program_configs (tenant, program_id) {
        tenant -> Varchar,
        program_id -> Varchar,
        config -> Jsonb,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Durable webhook outbox for job outcomes.
    job_notifications (notification_id) {
        notification_id -> Uuid,
        tenant -> Varchar,
        job_type -> Varchar,
        job_id -> Uuid,
        reference_id -> Uuid,
        status -> Varchar,
        summary -> Nullable<Jsonb>,
        error -> Nullable<Text>,
        available_at -> Timestamptz,
        delivered_at -> Nullable<Timestamptz>,
        delivery_attempts -> Int4,
        last_delivery_error -> Nullable<Text>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Aggregated merchant-liability movement per settlement period.
    settlement_reports (tenant, merchant_account, period_start, period_end) {
        tenant -> Varchar,
        merchant_account -> Varchar,
        period_start -> Timestamptz,
        period_end -> Timestamptz,
        net_points -> Int8,
        summary -> Nullable<Jsonb>,
        updated_at -> Timestamptz,
    }
}

diesel::joinable!(ledger_lines -> ledger_journal (entry_id));

diesel::allow_tables_to_appear_in_same_query!(ledger_journal, ledger_lines);

diesel::allow_columns_to_appear_in_same_group_by_clause!(
    ledger_journal::tenant,
    ledger_lines::account_id,
    ledger_journal::program_id,
    ledger_lines::unit,
);
