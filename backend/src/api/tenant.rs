//! Tenant scoping extractor.
//!
//! Every ingress request is tenant-scoped through the `x-tenant-id` header.
//! API-key validation happens in the fronting auth layer; this extractor
//! only enforces presence and shape.

use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpRequest};

use crate::domain::DomainError;

use super::error::ApiError;

/// Header carrying the tenant identifier.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// The authenticated tenant for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantId(String);

impl TenantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromRequest for TenantId {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let tenant = req
            .headers()
            .get(TENANT_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        ready(match tenant {
            Some(tenant) => Ok(Self(tenant)),
            None => Err(ApiError::from(DomainError::invalid_request(
                "missing x-tenant-id header",
            ))),
        })
    }
}
