//! Environment-driven application configuration.

use std::net::SocketAddr;
use std::time::Duration;

use reqwest::Url;

use crate::domain::job::DEFAULT_MAX_ATTEMPTS;
use crate::worker::WorkerKind;

/// Fatal configuration problems; the process exits nonzero on these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {variable}: {reason}")]
    Invalid {
        variable: &'static str,
        reason: String,
    },
}

/// Resolved process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// `None` serves HTTP; `Some` runs the selected worker.
    pub worker: Option<WorkerKind>,
    pub webhook_url: Option<Url>,
    pub webhook_secret: Option<String>,
    pub poll_interval: Duration,
    pub max_attempts: u32,
    pub settlement_lookback_days: i64,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Testable variant over an environment lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let bind_addr = match lookup("BIND_ADDR") {
            Some(raw) => raw.parse().map_err(|err| ConfigError::Invalid {
                variable: "BIND_ADDR",
                reason: format!("{err}"),
            })?,
            None => SocketAddr::from(([0, 0, 0, 0], 8080)),
        };

        let worker = match lookup("WORKER").filter(|raw| !raw.is_empty()) {
            Some(raw) => Some(raw.parse::<WorkerKind>().map_err(|err| {
                ConfigError::Invalid {
                    variable: "WORKER",
                    reason: err.to_string(),
                }
            })?),
            None => None,
        };

        let webhook_url = match lookup("WEBHOOK_URL").filter(|raw| !raw.is_empty()) {
            Some(raw) => Some(Url::parse(&raw).map_err(|err| ConfigError::Invalid {
                variable: "WEBHOOK_URL",
                reason: err.to_string(),
            })?),
            None => None,
        };

        let poll_interval = match lookup("POLL_INTERVAL_MS") {
            Some(raw) => Duration::from_millis(parse_number(&raw, "POLL_INTERVAL_MS")?),
            None => Duration::from_millis(1_000),
        };

        let max_attempts = match lookup("MAX_ATTEMPTS") {
            Some(raw) => parse_number::<u32>(&raw, "MAX_ATTEMPTS")?.max(1),
            None => DEFAULT_MAX_ATTEMPTS,
        };

        let settlement_lookback_days = match lookup("SETTLEMENT_LOOKBACK_DAYS") {
            Some(raw) => parse_number::<i64>(&raw, "SETTLEMENT_LOOKBACK_DAYS")?.max(1),
            None => 1,
        };

        Ok(Self {
            database_url,
            bind_addr,
            worker,
            webhook_url,
            webhook_secret: lookup("WEBHOOK_SECRET").filter(|raw| !raw.is_empty()),
            poll_interval,
            max_attempts,
            settlement_lookback_days,
        })
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, variable: &'static str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|err: T::Err| ConfigError::Invalid {
        variable,
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars = env(pairs);
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[rstest]
    fn database_url_is_required() {
        assert_eq!(
            config_from(&[]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );
    }

    #[rstest]
    fn defaults_apply_without_optional_vars() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/ledger")])
            .expect("valid config");
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.worker, None);
        assert_eq!(config.poll_interval, Duration::from_millis(1_000));
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.settlement_lookback_days, 1);
    }

    #[rstest]
    fn worker_selector_parses_and_rejects() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://localhost/ledger"),
            ("WORKER", "notifier"),
        ])
        .expect("valid config");
        assert_eq!(config.worker, Some(WorkerKind::Notifier));

        let err = config_from(&[
            ("DATABASE_URL", "postgres://localhost/ledger"),
            ("WORKER", "freezer"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { variable: "WORKER", .. }));
    }

    #[rstest]
    fn webhook_url_must_parse() {
        let err = config_from(&[
            ("DATABASE_URL", "postgres://localhost/ledger"),
            ("WEBHOOK_URL", "not a url"),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { variable: "WEBHOOK_URL", .. }
        ));
    }
}
