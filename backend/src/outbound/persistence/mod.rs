//! PostgreSQL persistence adapters (Diesel + diesel-async).
//!
//! Store modules expose free functions over `&mut AsyncPgConnection` so the
//! job processor can compose a whole work unit into one transaction. Only
//! the pool owns connections.

pub mod config_store;
pub(crate) mod error;
pub mod job_store;
pub mod ledger_store;
pub mod lot_store;
pub mod models;
pub mod notification_store;
pub mod plugin_helpers;
pub mod pool;
pub mod receipt_store;
pub mod redemption_store;
pub mod rule_store;
pub mod schema;
pub mod settlement_store;
pub mod status_store;
pub mod tier_store;

pub use job_store::{receipt_queue, redeem_queue, ClaimedJob, JobView};
pub use plugin_helpers::TxHelpers;
pub use pool::{DbPool, PoolConfig, PoolError};
