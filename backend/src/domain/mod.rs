//! Domain primitives and rules for the loyalty ledger.
//!
//! Purpose: strongly typed entities, monetary invariants, and the reward
//! rule chain, free of database and transport concerns. Adapters in
//! `outbound/` and `api/` map these types to their respective edges.

pub mod accounts;
pub mod allocation;
pub mod attribution;
pub mod error;
pub mod job;
pub mod ledger;
pub mod lots;
pub mod money;
pub mod notification;
pub mod plugins;
pub mod program_config;
pub mod receipt;
pub mod redemption;
pub mod rules;
pub mod settlement;
pub mod tier;

pub use self::error::{DomainError, ErrorCode, StoreError};
pub use self::job::{JobError, JobKind, JobStatus};
pub use self::ledger::{LedgerEntry, LedgerLine};
pub use self::receipt::{Receipt, ReceiptSubmission};
pub use self::redemption::{RedeemRequest, RedemptionSubmission};

/// Convenient API result alias.
pub type ApiResult<T> = Result<T, DomainError>;
