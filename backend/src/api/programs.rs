//! Program configuration management.

use actix_web::{get, put, web, HttpResponse};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::domain::DomainError;
use crate::outbound::persistence::config_store;
use crate::server::AppState;

use super::error::{ApiError, HandlerResult};
use super::tenant::TenantId;

/// Configuration document wrapper.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProgramConfigResponse {
    pub program_id: String,
    pub config: Value,
}

/// Replace the configuration for a program.
#[utoipa::path(
    put,
    path = "/v1/programs/{program_id}/config",
    request_body = Value,
    responses((status = 204, description = "Configuration stored")),
    tags = ["programs"]
)]
#[put("/programs/{program_id}/config")]
pub async fn put_program_config(
    tenant: TenantId,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<Value>,
) -> HandlerResult<HttpResponse> {
    let mut conn = state.pool.get().await?;
    config_store::put(
        &mut conn,
        tenant.as_str(),
        &path,
        &body.into_inner(),
        state.clock.utc(),
    )
    .await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Fetch the configuration for a program.
#[utoipa::path(
    get,
    path = "/v1/programs/{program_id}/config",
    responses(
        (status = 200, description = "Configuration", body = ProgramConfigResponse),
        (status = 404, description = "Program has no configuration", body = ApiError)
    ),
    tags = ["programs"]
)]
#[get("/programs/{program_id}/config")]
pub async fn get_program_config(
    tenant: TenantId,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> HandlerResult<web::Json<ProgramConfigResponse>> {
    let mut conn = state.pool.get().await?;
    let config = config_store::get(&mut conn, tenant.as_str(), &path)
        .await?
        .ok_or_else(|| ApiError::from(DomainError::not_found("program has no configuration")))?;
    Ok(web::Json(ProgramConfigResponse {
        program_id: path.into_inner(),
        config,
    }))
}
