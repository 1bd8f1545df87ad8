//! Reqwest-backed webhook delivery for job notifications.
//!
//! Owns transport details only: body serialization, identification headers,
//! the optional HMAC-SHA256 signature over the exact body bytes, and HTTP
//! error mapping. Retry policy belongs to the dispatcher loop.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, Url};
use sha2::Sha256;

use crate::domain::notification::JobNotification;

type HmacSha256 = Hmac<Sha256>;

/// Signature header attached when a secret is configured.
pub const SIGNATURE_HEADER: &str = "x-signature-sha256";

/// Delivery failures; every variant is retried by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebhookError {
    #[error("webhook endpoint returned status {status}")]
    Status { status: u16 },
    #[error("webhook transport failed: {message}")]
    Transport { message: String },
    #[error("webhook body serialization failed: {message}")]
    Serialization { message: String },
}

/// Port for notification delivery, mockable in dispatcher tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationWebhook: Send + Sync {
    /// Deliver one notification; `Ok` means the receiver acknowledged with
    /// a 2xx.
    async fn deliver(&self, notification: &JobNotification) -> Result<(), WebhookError>;
}

/// HTTP adapter posting signed JSON bodies to one configured endpoint.
pub struct HttpNotificationWebhook {
    client: Client,
    endpoint: Url,
    secret: Option<String>,
}

impl HttpNotificationWebhook {
    /// Build the adapter with an explicit request timeout.
    ///
    /// # Errors
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        endpoint: Url,
        secret: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            secret,
        })
    }
}

#[async_trait]
impl NotificationWebhook for HttpNotificationWebhook {
    async fn deliver(&self, notification: &JobNotification) -> Result<(), WebhookError> {
        let body = serde_json::to_vec(&notification.webhook_body()).map_err(|err| {
            WebhookError::Serialization {
                message: err.to_string(),
            }
        })?;

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("x-tenant-id", notification.tenant.as_str())
            .header("x-job-type", notification.job_type.as_str())
            .header("x-job-id", notification.job_id.to_string());
        if let Some(secret) = &self.secret {
            request = request.header(SIGNATURE_HEADER, sign_body(secret, &body));
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|err| WebhookError::Transport {
                message: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebhookError::Status {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Lowercase hex HMAC-SHA256 of the body under `secret`.
fn sign_body(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("hmac accepts keys of any length"));
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn signatures_are_stable_hex() {
        let first = sign_body("secret", b"{\"a\":1}");
        let second = sign_body("secret", b"{\"a\":1}");
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[rstest]
    fn signatures_vary_by_secret_and_body() {
        let base = sign_body("secret", b"payload");
        assert_ne!(base, sign_body("other", b"payload"));
        assert_ne!(base, sign_body("secret", b"payload2"));
    }
}
