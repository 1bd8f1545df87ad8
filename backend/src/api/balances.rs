//! Account balance queries.

use actix_web::{get, web};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::accounts::resolve_query_account;
use crate::outbound::persistence::ledger_store;
use crate::server::AppState;

use super::error::HandlerResult;
use super::tenant::TenantId;

/// One balance bucket for an account.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BalanceEntry {
    pub program_id: String,
    pub unit: String,
    pub qty: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BalanceQuery {
    #[serde(default)]
    pub program_id: Option<String>,
}

/// Balances for an account grouped by program and unit.
///
/// The literals `merchant` and `merchant_liability` address the tenant's
/// merchant liability account; any other value is a customer reference.
#[utoipa::path(
    get,
    path = "/v1/accounts/{account_id}/balances",
    params(("program_id" = Option<String>, Query, description = "Restrict to one program")),
    responses(
        (status = 200, description = "Balances", body = [BalanceEntry])
    ),
    tags = ["accounts"]
)]
#[get("/accounts/{account_id}/balances")]
pub async fn account_balances(
    tenant: TenantId,
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<BalanceQuery>,
) -> HandlerResult<web::Json<Vec<BalanceEntry>>> {
    let account_id = resolve_query_account(tenant.as_str(), &path);
    let mut conn = state.pool.get().await?;
    let balances = ledger_store::balances_for_account(
        &mut conn,
        tenant.as_str(),
        &account_id,
        query.program_id.as_deref(),
    )
    .await?;

    Ok(web::Json(
        balances
            .into_iter()
            .map(|balance| BalanceEntry {
                program_id: balance.program_id,
                unit: balance.unit,
                qty: balance.qty,
            })
            .collect(),
    ))
}
