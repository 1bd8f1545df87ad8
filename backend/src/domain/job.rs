//! Processing-job lifecycle: states, retry classification, and backoff.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Cap applied to the linear retry backoff.
const MAX_BACKOFF: Duration = Duration::from_millis(60_000);
/// Backoff grows by this much per recorded attempt.
const BACKOFF_STEP: Duration = Duration::from_millis(5_000);

/// Default number of attempts before a retryable failure becomes terminal.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Which queue a job belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Receipt,
    Redeem,
}

impl JobKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Receipt => "receipt",
            Self::Redeem => "redeem",
        }
    }
}

/// Job lifecycle state.
///
/// `Completed` and `Failed` are terminal: no update may transition a job out
/// of them. `Processing` may fall back to `Pending` on a retryable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Raised when a persisted status string is not a known state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown job status: {0}")]
pub struct ParseJobStatusError(pub String);

impl std::str::FromStr for JobStatus {
    type Err = ParseJobStatusError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(ParseJobStatusError(other.to_string())),
        }
    }
}

/// A work-unit failure, classified for the outer retry handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// Reschedule with backoff while attempts remain.
    #[error("{message}")]
    Retryable { message: String },
    /// Finalize the job as failed immediately.
    #[error("{message}")]
    Terminal { message: String },
}

impl JobError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Retryable {
            message: message.into(),
        }
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        Self::Terminal {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Retryable { message } | Self::Terminal { message } => message,
        }
    }

    /// Resolve the next state for a failed attempt.
    pub fn disposition(&self, attempts: u32, max_attempts: u32) -> FailureDisposition {
        match self {
            Self::Terminal { .. } => FailureDisposition::Fail,
            Self::Retryable { .. } if attempts >= max_attempts => FailureDisposition::Fail,
            Self::Retryable { .. } => FailureDisposition::Reschedule {
                delay: retry_backoff(attempts),
            },
        }
    }
}

impl From<super::error::StoreError> for JobError {
    fn from(error: super::error::StoreError) -> Self {
        if error.is_retryable() {
            Self::retryable(error.to_string())
        } else {
            Self::terminal(error.to_string())
        }
    }
}

/// Outcome of classifying a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    Reschedule { delay: Duration },
    Fail,
}

/// Linear backoff: `min(60s, attempts × 5s)`.
pub fn retry_backoff(attempts: u32) -> Duration {
    let scaled = BACKOFF_STEP.saturating_mul(attempts.max(1));
    scaled.min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, 5_000)]
    #[case(3, 15_000)]
    #[case(11, 55_000)]
    #[case(12, 60_000)]
    #[case(100, 60_000)]
    fn backoff_is_linear_and_capped(#[case] attempts: u32, #[case] want_ms: u64) {
        assert_eq!(retry_backoff(attempts), Duration::from_millis(want_ms));
    }

    #[rstest]
    fn terminal_states_are_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[rstest]
    fn status_round_trips_through_strings() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>(), Ok(status));
        }
        assert!("paused".parse::<JobStatus>().is_err());
    }

    #[rstest]
    fn retryable_errors_reschedule_until_exhaustion() {
        let err = JobError::retryable("store timeout");
        assert_eq!(
            err.disposition(2, 5),
            FailureDisposition::Reschedule {
                delay: Duration::from_millis(10_000)
            }
        );
        assert_eq!(err.disposition(5, 5), FailureDisposition::Fail);
    }

    #[rstest]
    fn terminal_errors_fail_immediately() {
        let err = JobError::terminal("Insufficient balance");
        assert_eq!(err.disposition(1, 5), FailureDisposition::Fail);
    }
}
