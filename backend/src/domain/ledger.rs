//! Double-entry ledger primitives.
//!
//! A [`LedgerEntry`] is an append-only journal header plus its lines. Every
//! line moves a quantity of one unit through exactly one side (debit or
//! credit), and within an entry the debits and credits of every unit must
//! balance. Validation lives here so every writer shares one invariant.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// One journal line: a single-sided movement of `unit` on `account_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerLine {
    pub account_id: String,
    pub unit: String,
    pub debit: i64,
    pub credit: i64,
}

impl LedgerLine {
    /// A debit line (value flows out of the account's credit balance).
    pub fn debit(account_id: impl Into<String>, unit: impl Into<String>, amount: i64) -> Self {
        Self {
            account_id: account_id.into(),
            unit: unit.into(),
            debit: amount,
            credit: 0,
        }
    }

    /// A credit line (value flows into the account's credit balance).
    pub fn credit(account_id: impl Into<String>, unit: impl Into<String>, amount: i64) -> Self {
        Self {
            account_id: account_id.into(),
            unit: unit.into(),
            debit: 0,
            credit: amount,
        }
    }
}

/// A journal entry awaiting persistence.
///
/// The entry id is assigned at append time; callers never supply one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub program_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    pub lines: Vec<LedgerLine>,
}

impl LedgerEntry {
    pub fn new(program_id: impl Into<String>, lines: Vec<LedgerLine>) -> Self {
        Self {
            program_id: program_id.into(),
            receipt_id: None,
            memo: None,
            lines,
        }
    }

    pub fn with_receipt(mut self, receipt_id: Uuid) -> Self {
        self.receipt_id = Some(receipt_id);
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }
}

/// Entry-level invariant violations. These are bugs in the producing rule,
/// never user input, and are surfaced as terminal job failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryValidationError {
    #[error("ledger entry has no lines")]
    EmptyEntry,
    #[error("ledger entry does not balance for unit {unit}: debits {debits}, credits {credits}")]
    UnbalancedEntry {
        unit: String,
        debits: i64,
        credits: i64,
    },
    #[error("ledger line for {account_id} must set exactly one of debit/credit, both non-negative")]
    MalformedLine { account_id: String },
}

/// Validate one entry: non-empty, well-formed lines, and per-unit balance.
pub fn validate_entry(entry: &LedgerEntry) -> Result<(), EntryValidationError> {
    if entry.lines.is_empty() {
        return Err(EntryValidationError::EmptyEntry);
    }

    let mut per_unit: BTreeMap<&str, (i64, i64)> = BTreeMap::new();
    for line in &entry.lines {
        let one_sided = (line.debit > 0) ^ (line.credit > 0);
        if !one_sided || line.debit < 0 || line.credit < 0 {
            return Err(EntryValidationError::MalformedLine {
                account_id: line.account_id.clone(),
            });
        }
        let sums = per_unit.entry(line.unit.as_str()).or_default();
        sums.0 += line.debit;
        sums.1 += line.credit;
    }

    for (unit, (debits, credits)) in per_unit {
        if debits != credits {
            return Err(EntryValidationError::UnbalancedEntry {
                unit: unit.to_string(),
                debits,
                credits,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn earn_entry(debit: i64, credit: i64) -> LedgerEntry {
        LedgerEntry::new(
            "default",
            vec![
                LedgerLine::debit("t::merchant_liability", "points", debit),
                LedgerLine::credit("t::acct::c1", "points", credit),
            ],
        )
    }

    #[rstest]
    fn balanced_entry_passes() {
        assert_eq!(validate_entry(&earn_entry(10, 10)), Ok(()));
    }

    #[rstest]
    fn empty_entry_is_rejected() {
        let entry = LedgerEntry::new("default", vec![]);
        assert_eq!(validate_entry(&entry), Err(EntryValidationError::EmptyEntry));
    }

    #[rstest]
    fn unbalanced_unit_is_rejected() {
        let err = validate_entry(&earn_entry(10, 7)).unwrap_err();
        assert!(matches!(
            err,
            EntryValidationError::UnbalancedEntry { debits: 10, credits: 7, .. }
        ));
    }

    #[rstest]
    fn balance_is_checked_per_unit() {
        // Mixed units in one entry are permitted as long as each balances.
        let entry = LedgerEntry::new(
            "default",
            vec![
                LedgerLine::debit("t::merchant_liability", "points", 5),
                LedgerLine::credit("t::acct::c1", "points", 5),
                LedgerLine::debit("t::merchant_liability", "stamps:s1", 2),
                LedgerLine::credit("t::acct::c1", "stamps:s1", 2),
            ],
        );
        assert_eq!(validate_entry(&entry), Ok(()));

        let mut skewed = entry;
        skewed.lines[3].credit = 3;
        assert!(matches!(
            validate_entry(&skewed),
            Err(EntryValidationError::UnbalancedEntry { ref unit, .. }) if unit == "stamps:s1"
        ));
    }

    #[rstest]
    #[case(LedgerLine { account_id: "a".into(), unit: "points".into(), debit: 5, credit: 5 })]
    #[case(LedgerLine { account_id: "a".into(), unit: "points".into(), debit: 0, credit: 0 })]
    #[case(LedgerLine { account_id: "a".into(), unit: "points".into(), debit: -5, credit: 0 })]
    fn two_sided_or_negative_lines_are_rejected(#[case] line: LedgerLine) {
        let entry = LedgerEntry::new("default", vec![line]);
        assert!(matches!(
            validate_entry(&entry),
            Err(EntryValidationError::MalformedLine { .. })
        ));
    }
}
