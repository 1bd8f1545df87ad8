//! Durable job-outcome notifications (webhook outbox).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::job::{JobKind, JobStatus};

/// Error strings persisted on jobs and notifications are capped at this
/// many bytes.
pub const MAX_ERROR_LEN: usize = 1024;

/// Truncate an error message to [`MAX_ERROR_LEN`] on a char boundary.
pub fn truncate_error(message: &str) -> String {
    if message.len() <= MAX_ERROR_LEN {
        return message.to_string();
    }
    let mut end = MAX_ERROR_LEN;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}

/// A notification awaiting insertion into the outbox.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationDraft {
    pub job_kind: JobKind,
    pub job_id: Uuid,
    pub reference_id: Uuid,
    pub status: JobStatus,
    pub summary: Option<Value>,
    pub error: Option<String>,
}

/// A persisted outbox row ready for delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct JobNotification {
    pub notification_id: Uuid,
    pub tenant: String,
    pub job_type: String,
    pub job_id: Uuid,
    pub reference_id: Uuid,
    pub status: String,
    pub summary: Option<Value>,
    pub error: Option<String>,
    pub delivery_attempts: i32,
}

/// The JSON body POSTed to the webhook endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookBody {
    pub tenant_id: String,
    pub job_type: String,
    pub job_id: Uuid,
    pub reference_id: Uuid,
    pub status: String,
    pub summary: Option<Value>,
    pub error: Option<String>,
}

impl JobNotification {
    pub fn webhook_body(&self) -> WebhookBody {
        WebhookBody {
            tenant_id: self.tenant.clone(),
            job_type: self.job_type.clone(),
            job_id: self.job_id,
            reference_id: self.reference_id,
            status: self.status.clone(),
            summary: self.summary.clone(),
            error: self.error.clone(),
        }
    }
}

/// When a failed delivery becomes due again.
pub fn redelivery_at(now: DateTime<Utc>, poll_interval: std::time::Duration) -> DateTime<Utc> {
    now + chrono::Duration::from_std(poll_interval * 5)
        .unwrap_or_else(|_| chrono::Duration::seconds(300))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn short_errors_pass_through() {
        assert_eq!(truncate_error("boom"), "boom");
    }

    #[rstest]
    fn long_errors_are_capped() {
        let long = "x".repeat(MAX_ERROR_LEN + 100);
        assert_eq!(truncate_error(&long).len(), MAX_ERROR_LEN);
    }

    #[rstest]
    fn truncation_respects_char_boundaries() {
        // Multi-byte char straddling the cap must not split.
        let mut long = "a".repeat(MAX_ERROR_LEN - 1);
        long.push('é');
        let truncated = truncate_error(&long);
        assert!(truncated.len() <= MAX_ERROR_LEN);
        assert!(truncated.chars().all(|c| c == 'a'));
    }

    #[rstest]
    fn webhook_body_uses_camel_case() {
        let notification = JobNotification {
            notification_id: Uuid::new_v4(),
            tenant: "acme".into(),
            job_type: "receipt".into(),
            job_id: Uuid::new_v4(),
            reference_id: Uuid::new_v4(),
            status: "completed".into(),
            summary: None,
            error: None,
            delivery_attempts: 0,
        };
        let body = serde_json::to_value(notification.webhook_body()).expect("serializable");
        assert!(body.get("tenantId").is_some());
        assert!(body.get("jobType").is_some());
        assert!(body.get("referenceId").is_some());
    }
}
