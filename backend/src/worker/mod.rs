//! Background workers and the `WORKER` environment selector.

use std::str::FromStr;
use std::sync::Arc;

use mockable::Clock;
use tokio::time::sleep;
use tracing::{error, info};

use crate::domain::plugins::{receipt_chain, redeem_chain};
use crate::domain::StoreError;
use crate::outbound::persistence::DbPool;
use crate::outbound::webhook::NotificationWebhook;

mod apply;
mod notifier;
mod processor;
mod receipt_job;
mod redeem_job;
mod settlement;

pub use notifier::{DispatchOutcome, NotificationDispatcher};
pub use processor::{JobPipeline, JobWorker, ProcessorConfig, RunOutcome};
pub use receipt_job::ReceiptPipeline;
pub use redeem_job::RedeemPipeline;
pub use settlement::run_settlement_pass;

/// Which worker a process runs, from the `WORKER` environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    /// Job processor over both queues.
    RuleRunner,
    /// Notification outbox dispatcher.
    Notifier,
    /// Settlement reporting pass.
    Settlement,
}

/// Raised for `WORKER` values this binary does not serve. The payout and
/// collection workers run as separate deployments against the same tables.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown worker '{0}'; valid workers are rule-runner, notifier, and settlement")]
pub struct ParseWorkerError(pub String);

impl FromStr for WorkerKind {
    type Err = ParseWorkerError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "rule-runner" => Ok(Self::RuleRunner),
            "notifier" => Ok(Self::Notifier),
            "settlement" => Ok(Self::Settlement),
            other => Err(ParseWorkerError(other.to_string())),
        }
    }
}

impl std::fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::RuleRunner => "rule-runner",
            Self::Notifier => "notifier",
            Self::Settlement => "settlement",
        })
    }
}

/// Run the selected worker until completion or a shutdown signal.
pub async fn run_worker(
    kind: WorkerKind,
    pool: DbPool,
    clock: Arc<dyn Clock>,
    config: ProcessorConfig,
    webhook: Option<Arc<dyn NotificationWebhook>>,
    settlement_lookback_days: i64,
) -> Result<(), StoreError> {
    info!(worker = %kind, "worker starting");
    match kind {
        WorkerKind::RuleRunner => run_rule_runner(pool, clock, config).await,
        WorkerKind::Notifier => {
            let Some(webhook) = webhook else {
                error!("notifier requires a configured webhook endpoint");
                return Err(StoreError::query("notifier misconfigured: no webhook url"));
            };
            let dispatcher = NotificationDispatcher::new(
                pool,
                webhook,
                clock,
                config.poll_interval,
            );
            run_notifier(dispatcher).await
        }
        WorkerKind::Settlement => {
            run_settlement_pass(&pool, &clock, settlement_lookback_days).await?;
            Ok(())
        }
    }
}

/// One claimed job per queue per iteration; sleep only when both are idle.
async fn run_rule_runner(
    pool: DbPool,
    clock: Arc<dyn Clock>,
    config: ProcessorConfig,
) -> Result<(), StoreError> {
    let receipts = JobWorker::new(
        pool.clone(),
        ReceiptPipeline::new(receipt_chain()),
        clock.clone(),
        config.clone(),
    );
    let redemptions = JobWorker::new(
        pool,
        RedeemPipeline::new(redeem_chain()),
        clock,
        config.clone(),
    );

    let mut shutdown = std::pin::pin!(tokio::signal::ctrl_c());
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown signal received");
                return Ok(());
            }
            outcome = poll_both(&receipts, &redemptions) => {
                match outcome {
                    Ok(true) => {}
                    Ok(false) => sleep(config.poll_interval).await,
                    Err(err) => {
                        error!(error = %err, "worker iteration failed");
                        sleep(config.poll_interval).await;
                    }
                }
            }
        }
    }
}

async fn poll_both(
    receipts: &JobWorker<ReceiptPipeline>,
    redemptions: &JobWorker<RedeemPipeline>,
) -> Result<bool, StoreError> {
    let receipt_outcome = receipts.run_once().await?;
    let redeem_outcome = redemptions.run_once().await?;
    Ok(receipt_outcome != RunOutcome::Idle || redeem_outcome != RunOutcome::Idle)
}

async fn run_notifier(dispatcher: NotificationDispatcher) -> Result<(), StoreError> {
    let mut shutdown = std::pin::pin!(tokio::signal::ctrl_c());
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown signal received");
                return Ok(());
            }
            outcome = dispatcher.run_once() => {
                match outcome {
                    Ok(DispatchOutcome::Idle) => sleep(dispatcher.poll_interval()).await,
                    Ok(_) => {}
                    Err(err) => {
                        error!(error = %err, "dispatcher iteration failed");
                        sleep(dispatcher.poll_interval()).await;
                    }
                }
            }
        }
    }
}
