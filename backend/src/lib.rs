//! Multi-tenant loyalty ledger service.
//!
//! Receipts and redemption requests enter over HTTP, flow through a
//! transactional job pipeline that evaluates the reward rule chain, and
//! land as balanced double-entry journal mutations with FIFO point lots.
//! Workers drain the job queues, the notification outbox, and the
//! settlement aggregation.

pub mod api;
pub mod doc;
pub mod domain;
pub mod middleware;
pub mod outbound;
pub mod server;
pub mod worker;

pub use doc::ApiDoc;
pub use middleware::Trace;
