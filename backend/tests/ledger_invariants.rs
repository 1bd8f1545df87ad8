//! Cross-module invariants: entry balance, account conventions, fingerprint
//! stability, and retry policy.

use backend::domain::accounts::{
    customer_account, earn_memo_merchant, merchant_liability, resolve_query_account,
};
use backend::domain::job::{retry_backoff, JobError, FailureDisposition};
use backend::domain::ledger::{validate_entry, EntryValidationError, LedgerEntry, LedgerLine};
use backend::domain::notification::{truncate_error, MAX_ERROR_LEN};
use backend::domain::receipt::{receipt_fingerprint, ReceiptSubmission};
use rstest::rstest;
use serde_json::json;
use std::time::Duration;

fn submission(grand_total: serde_json::Value) -> ReceiptSubmission {
    serde_json::from_value(json!({
        "idempotency_key": "k-1",
        "merchant_id": "m-1",
        "account_ref": "c-1",
        "program_id": "default",
        "grand_total": grand_total,
        "issued_at": "2026-03-01T09:30:00Z",
        "items": []
    }))
    .expect("valid submission")
}

#[rstest]
fn earn_shaped_entries_balance_per_unit() {
    let tenant = "acme";
    let entry = LedgerEntry::new(
        "default",
        vec![
            LedgerLine::debit(merchant_liability(tenant), "points", 43),
            LedgerLine::credit(customer_account(tenant, "c-1"), "points", 43),
        ],
    )
    .with_memo("earn:m-1");

    assert_eq!(validate_entry(&entry), Ok(()));
    assert_eq!(
        entry.memo.as_deref().and_then(earn_memo_merchant),
        Some("m-1")
    );
}

#[rstest]
fn unbalanced_units_never_validate() {
    let entry = LedgerEntry::new(
        "default",
        vec![
            LedgerLine::debit("a", "points", 10),
            LedgerLine::credit("b", "points", 9),
            LedgerLine::debit("a", "stamps:s", 1),
            LedgerLine::credit("b", "stamps:s", 1),
        ],
    );
    assert!(matches!(
        validate_entry(&entry),
        Err(EntryValidationError::UnbalancedEntry { ref unit, .. }) if unit == "points"
    ));
}

#[rstest]
fn balance_queries_resolve_merchant_aliases() {
    assert_eq!(
        resolve_query_account("acme", "merchant"),
        merchant_liability("acme")
    );
    assert_eq!(
        resolve_query_account("acme", "c-9"),
        customer_account("acme", "c-9")
    );
}

#[rstest]
fn equivalent_submissions_share_a_fingerprint() {
    let text = submission(json!("42.50"));
    let number = submission(json!(42.5));
    assert_eq!(
        receipt_fingerprint("acme", &text),
        receipt_fingerprint("acme", &number)
    );
    assert_ne!(
        receipt_fingerprint("acme", &text),
        receipt_fingerprint("emca", &text)
    );
}

#[rstest]
fn backoff_is_linear_until_the_cap() {
    assert_eq!(retry_backoff(1), Duration::from_secs(5));
    assert_eq!(retry_backoff(4), Duration::from_secs(20));
    assert_eq!(retry_backoff(40), Duration::from_secs(60));
}

#[rstest]
fn retry_exhaustion_is_terminal() {
    let err = JobError::retryable("transient");
    assert!(matches!(
        err.disposition(4, 5),
        FailureDisposition::Reschedule { .. }
    ));
    assert_eq!(err.disposition(5, 5), FailureDisposition::Fail);
    assert_eq!(
        JobError::terminal("Insufficient balance").disposition(1, 5),
        FailureDisposition::Fail
    );
}

#[rstest]
fn notification_errors_are_capped() {
    let long = "e".repeat(5_000);
    assert_eq!(truncate_error(&long).len(), MAX_ERROR_LEN);
}
