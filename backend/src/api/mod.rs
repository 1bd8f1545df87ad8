//! HTTP ingress handlers.

pub mod balances;
pub mod error;
pub mod health;
pub mod programs;
pub mod receipts;
pub mod redemptions;
pub mod tenant;

pub use error::{ApiError, HandlerResult};
pub use tenant::TenantId;
