//! Process entry-point: HTTP server by default, or the worker selected by
//! the `WORKER` environment variable.

use std::sync::Arc;
use std::time::Duration;

use mockable::{Clock, DefaultClock};
use tracing::{error, warn};
use tracing_subscriber::{fmt, EnvFilter};

use backend::outbound::persistence::{DbPool, PoolConfig};
use backend::outbound::webhook::{HttpNotificationWebhook, NotificationWebhook};
use backend::server::{run_server, AppConfig};
use backend::worker::{run_worker, ProcessorConfig};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let config = AppConfig::from_env().map_err(|err| {
        error!(error = %err, "configuration error");
        std::io::Error::other(err.to_string())
    })?;

    let pool = DbPool::new(PoolConfig::new(&config.database_url))
        .await
        .map_err(|err| {
            error!(error = %err, "database pool construction failed");
            std::io::Error::other(err.to_string())
        })?;
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);

    match config.worker {
        None => run_server(&config, pool, clock).await,
        Some(kind) => {
            let webhook: Option<Arc<dyn NotificationWebhook>> = match &config.webhook_url {
                Some(url) => Some(Arc::new(
                    HttpNotificationWebhook::new(
                        url.clone(),
                        config.webhook_secret.clone(),
                        WEBHOOK_TIMEOUT,
                    )
                    .map_err(std::io::Error::other)?,
                )),
                None => None,
            };
            let processor = ProcessorConfig {
                max_attempts: config.max_attempts,
                poll_interval: config.poll_interval,
            };
            run_worker(
                kind,
                pool,
                clock,
                processor,
                webhook,
                config.settlement_lookback_days,
            )
            .await
            .map_err(|err| {
                error!(error = %err, "worker terminated with error");
                std::io::Error::other(err.to_string())
            })
        }
    }
}
