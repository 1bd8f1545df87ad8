//! Receipt ingress: submission and status.

use actix_web::{get, post, web, HttpResponse};
use chrono::{DateTime, Utc};
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::AsyncConnection;
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::receipt::{receipt_fingerprint, Receipt, ReceiptSubmission};
use crate::domain::{DomainError, StoreError};
use crate::outbound::persistence::{receipt_queue, receipt_store, JobView};
use crate::server::AppState;

use super::error::{ApiError, HandlerResult};
use super::tenant::TenantId;

/// Handle returned for accepted and duplicate submissions.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReceiptSubmissionResponse {
    pub receipt_id: Uuid,
    pub processing_job_id: Uuid,
    pub status: String,
}

/// Full job state for polling clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReceiptStatusResponse {
    pub receipt_id: Uuid,
    pub processing_job_id: Uuid,
    pub status: String,
    pub attempts: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub available_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ReceiptStatusResponse {
    fn from_view(view: JobView) -> Self {
        Self {
            receipt_id: view.reference_id,
            processing_job_id: view.job_id,
            status: view.status,
            attempts: view.attempts,
            last_error: view.last_error,
            summary: view.result_summary,
            completed_at: view.completed_at,
            available_at: view.available_at,
            created_at: view.created_at,
        }
    }
}

/// Accept a receipt and enqueue its processing job.
#[utoipa::path(
    post,
    path = "/v1/receipts",
    request_body = ReceiptSubmission,
    responses(
        (status = 202, description = "Receipt queued", body = ReceiptSubmissionResponse),
        (status = 409, description = "Duplicate submission", body = ReceiptSubmissionResponse),
        (status = 422, description = "Payload fails validation", body = ApiError)
    ),
    tags = ["receipts"]
)]
#[post("/receipts")]
pub async fn submit_receipt(
    tenant: TenantId,
    state: web::Data<AppState>,
    body: web::Json<Value>,
) -> HandlerResult<HttpResponse> {
    let payload = body.into_inner();
    let submission: ReceiptSubmission = serde_json::from_value(payload.clone()).map_err(|err| {
        ApiError::from(DomainError::unprocessable(format!(
            "invalid receipt payload: {err}"
        )))
    })?;
    let receipt = Receipt::from_submission(&submission, Uuid::new_v4())?;
    let fingerprint = receipt_fingerprint(tenant.as_str(), &submission);

    let mut conn = state.pool.get().await?;
    if let Some(existing) = receipt_store::find_duplicate(
        &mut conn,
        tenant.as_str(),
        &submission.idempotency_key,
        &fingerprint,
    )
    .await?
    {
        return duplicate_response(&mut conn, tenant.as_str(), existing).await;
    }

    let now = state.clock.utc();
    let job_id = Uuid::new_v4();
    let receipt_id = receipt.receipt_id;
    let tenant_id = tenant.as_str();
    let receipt_ref = &receipt;
    let idempotency_key = submission.idempotency_key.as_str();
    let fingerprint_ref = fingerprint.as_str();
    let payload_ref = &payload;
    let inserted = conn
        .transaction::<(), StoreError, _>(|conn| {
            async move {
                receipt_store::insert(
                    conn,
                    tenant_id,
                    receipt_ref,
                    idempotency_key,
                    fingerprint_ref,
                    payload_ref,
                )
                .await?;
                receipt_queue::enqueue(conn, tenant_id, job_id, receipt_id, now).await
            }
            .scope_boxed()
        })
        .await;

    match inserted {
        Ok(()) => {
            info!(tenant = tenant.as_str(), receipt_id = %receipt_id, "receipt queued");
            Ok(HttpResponse::Accepted().json(ReceiptSubmissionResponse {
                receipt_id,
                processing_job_id: job_id,
                status: "queued".to_string(),
            }))
        }
        Err(StoreError::DuplicateKey { .. }) => {
            // Lost an insert race; surface the winner's handle.
            let existing = receipt_store::find_duplicate(
                &mut conn,
                tenant.as_str(),
                &submission.idempotency_key,
                &fingerprint,
            )
            .await?
            .ok_or_else(|| {
                ApiError::from(DomainError::conflict("duplicate receipt submission"))
            })?;
            duplicate_response(&mut conn, tenant.as_str(), existing).await
        }
        Err(other) => Err(other.into()),
    }
}

async fn duplicate_response(
    conn: &mut diesel_async::AsyncPgConnection,
    tenant: &str,
    receipt_id: Uuid,
) -> HandlerResult<HttpResponse> {
    let job = receipt_queue::find_by_reference(conn, tenant, receipt_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::conflict("duplicate receipt submission")))?;
    Ok(HttpResponse::Conflict().json(ReceiptSubmissionResponse {
        receipt_id,
        processing_job_id: job.job_id,
        status: job.status,
    }))
}

/// Poll the processing status of a receipt.
#[utoipa::path(
    get,
    path = "/v1/receipts/{receipt_id}/status",
    responses(
        (status = 200, description = "Job state", body = ReceiptStatusResponse),
        (status = 400, description = "Malformed receipt id", body = ApiError),
        (status = 404, description = "No job for this receipt", body = ApiError)
    ),
    tags = ["receipts"]
)]
#[get("/receipts/{receipt_id}/status")]
pub async fn receipt_status(
    tenant: TenantId,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HandlerResult<web::Json<ReceiptStatusResponse>> {
    let receipt_id = parse_reference_id(&path)?;
    let mut conn = state.pool.get().await?;
    let view = receipt_queue::find_by_reference(&mut conn, tenant.as_str(), receipt_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::not_found("no job for this receipt")))?;
    Ok(web::Json(ReceiptStatusResponse::from_view(view)))
}

pub(super) fn parse_reference_id(raw: &str) -> Result<Uuid, ApiError> {
    raw.parse::<Uuid>().map_err(|_| {
        ApiError::from(DomainError::invalid_request("malformed resource identifier"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn reference_ids_must_be_uuids() {
        assert!(parse_reference_id("not-a-uuid").is_err());
        assert!(parse_reference_id("3b51bd6e-1fbb-4a64-8df3-3c9bd7d72f1b").is_ok());
    }
}
