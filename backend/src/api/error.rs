//! HTTP error payloads and mapping from domain errors.
//!
//! Keep the domain free of transport concerns by translating
//! [`DomainError`] into Actix responses here.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;
use utoipa::ToSchema;

use crate::domain::{DomainError, ErrorCode, StoreError};
use crate::middleware::trace::current_trace_id;
use crate::outbound::persistence::PoolError;

/// Standard error envelope returned by HTTP handlers.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    #[schema(example = "invalid_request")]
    code: ErrorCode,
    #[schema(example = "Something went wrong")]
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl ApiError {
    /// Construct an API error from a domain failure, capturing any ambient
    /// trace identifier.
    pub fn from_domain(error: DomainError) -> Self {
        let redacted = error.redacted_for_clients();
        Self {
            code: redacted.code(),
            message: redacted.message().to_owned(),
            trace_id: current_trace_id(),
            details: redacted.details().cloned(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn to_status_code(&self) -> StatusCode {
        match self.code {
            ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorCode::UnprocessableEntity => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        ApiError::from_domain(value)
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        let domain = match &value {
            StoreError::Connection { .. } => {
                DomainError::service_unavailable("storage temporarily unavailable")
            }
            StoreError::DuplicateKey { .. } => DomainError::conflict("resource already exists"),
            StoreError::Query { .. } | StoreError::Serialization { .. } => {
                error!(error = %value, "store error promoted to API error");
                DomainError::internal(value.to_string())
            }
        };
        ApiError::from_domain(domain)
    }
}

impl From<PoolError> for ApiError {
    fn from(value: PoolError) -> Self {
        ApiError::from_domain(DomainError::service_unavailable(value.to_string()))
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.to_status_code()
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(self)
    }
}

/// Convenience alias for HTTP handlers.
pub type HandlerResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DomainError::invalid_request("bad"), StatusCode::BAD_REQUEST)]
    #[case(DomainError::unprocessable("shape"), StatusCode::UNPROCESSABLE_ENTITY)]
    #[case(DomainError::conflict("dup"), StatusCode::CONFLICT)]
    #[case(DomainError::not_found("gone"), StatusCode::NOT_FOUND)]
    #[case(DomainError::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR)]
    fn status_codes_follow_error_codes(#[case] domain: DomainError, #[case] want: StatusCode) {
        assert_eq!(ApiError::from(domain).status_code(), want);
    }

    #[rstest]
    fn internal_messages_are_redacted() {
        let api = ApiError::from(DomainError::internal("connection string leaked"));
        assert_eq!(api.message(), "Internal server error");
    }

    #[rstest]
    fn connection_store_errors_read_as_unavailable() {
        let api = ApiError::from(StoreError::connection("refused"));
        assert_eq!(api.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
