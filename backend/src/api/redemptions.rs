//! Redemption ingress: submission and status.

use actix_web::{get, post, web, HttpResponse};
use chrono::{DateTime, Utc};
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::AsyncConnection;
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::redemption::{RedeemRequest, RedemptionSubmission};
use crate::domain::{DomainError, StoreError};
use crate::outbound::persistence::{redeem_queue, redemption_store, JobView};
use crate::server::AppState;

use super::error::{ApiError, HandlerResult};
use super::receipts::parse_reference_id;
use super::tenant::TenantId;

/// Handle returned for accepted and duplicate submissions.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RedemptionSubmissionResponse {
    pub redemption_id: Uuid,
    pub processing_job_id: Uuid,
    pub status: String,
}

/// Full job state for polling clients.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RedemptionStatusResponse {
    pub redemption_id: Uuid,
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

impl RedemptionStatusResponse {
    fn from_view(view: JobView) -> Self {
        Self {
            redemption_id: view.reference_id,
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

/// Accept a redemption request and enqueue its processing job.
#[utoipa::path(
    post,
    path = "/v1/redeem",
    request_body = RedemptionSubmission,
    responses(
        (status = 202, description = "Redemption queued", body = RedemptionSubmissionResponse),
        (status = 409, description = "Duplicate submission", body = RedemptionSubmissionResponse),
        (status = 422, description = "Payload fails validation", body = ApiError)
    ),
    tags = ["redemptions"]
)]
#[post("/redeem")]
pub async fn submit_redemption(
    tenant: TenantId,
    state: web::Data<AppState>,
    body: web::Json<Value>,
) -> HandlerResult<HttpResponse> {
    let payload = body.into_inner();
    let submission: RedemptionSubmission =
        serde_json::from_value(payload).map_err(|err| {
            ApiError::from(DomainError::unprocessable(format!(
                "invalid redemption payload: {err}"
            )))
        })?;
    if submission.qty <= 0 {
        return Err(ApiError::from(DomainError::unprocessable(
            "qty must be positive",
        )));
    }

    let now = state.clock.utc();
    let request = RedeemRequest::from_submission(&submission, Uuid::new_v4(), now)?;

    let mut conn = state.pool.get().await?;
    if let Some(key) = submission.idempotency_key.as_deref() {
        if let Some(existing) =
            redemption_store::find_by_idempotency_key(&mut conn, tenant.as_str(), key).await?
        {
            return duplicate_response(&mut conn, tenant.as_str(), existing).await;
        }
    }

    let job_id = Uuid::new_v4();
    let request_id = request.request_id;
    let tenant_id = tenant.as_str();
    let request_ref = &request;
    let idempotency_key = submission.idempotency_key.as_deref();
    let inserted = conn
        .transaction::<(), StoreError, _>(|conn| {
            async move {
                redemption_store::insert(conn, tenant_id, request_ref, idempotency_key).await?;
                redeem_queue::enqueue(conn, tenant_id, job_id, request_id, now).await
            }
            .scope_boxed()
        })
        .await;

    match inserted {
        Ok(()) => {
            info!(tenant = tenant.as_str(), redemption_id = %request_id, "redemption queued");
            Ok(HttpResponse::Accepted().json(RedemptionSubmissionResponse {
                redemption_id: request_id,
                processing_job_id: job_id,
                status: "queued".to_string(),
            }))
        }
        Err(StoreError::DuplicateKey { .. }) => {
            let key = submission.idempotency_key.as_deref().unwrap_or_default();
            let existing =
                redemption_store::find_by_idempotency_key(&mut conn, tenant.as_str(), key)
                    .await?
                    .ok_or_else(|| {
                        ApiError::from(DomainError::conflict("duplicate redemption submission"))
                    })?;
            duplicate_response(&mut conn, tenant.as_str(), existing).await
        }
        Err(other) => Err(other.into()),
    }
}

async fn duplicate_response(
    conn: &mut diesel_async::AsyncPgConnection,
    tenant: &str,
    request_id: Uuid,
) -> HandlerResult<HttpResponse> {
    let job = redeem_queue::find_by_reference(conn, tenant, request_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::conflict("duplicate redemption submission")))?;
    Ok(HttpResponse::Conflict().json(RedemptionSubmissionResponse {
        redemption_id: request_id,
        processing_job_id: job.job_id,
        status: job.status,
    }))
}

/// Poll the processing status of a redemption.
#[utoipa::path(
    get,
    path = "/v1/redeem/{redemption_id}/status",
    responses(
        (status = 200, description = "Job state", body = RedemptionStatusResponse),
        (status = 400, description = "Malformed redemption id", body = ApiError),
        (status = 404, description = "No job for this redemption", body = ApiError)
    ),
    tags = ["redemptions"]
)]
#[get("/redeem/{redemption_id}/status")]
pub async fn redemption_status(
    tenant: TenantId,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HandlerResult<web::Json<RedemptionStatusResponse>> {
    let request_id = parse_reference_id(&path)?;
    let mut conn = state.pool.get().await?;
    let view = redeem_queue::find_by_reference(&mut conn, tenant.as_str(), request_id)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::not_found("no job for this redemption")))?;
    Ok(web::Json(RedemptionStatusResponse::from_view(view)))
}
