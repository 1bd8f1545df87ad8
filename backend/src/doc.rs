//! OpenAPI surface used by Swagger UI and tooling.

use utoipa::OpenApi;

use crate::api;

/// Public OpenAPI document for the ingress surface.
#[derive(OpenApi)]
#[openapi(
    paths(
        api::receipts::submit_receipt,
        api::receipts::receipt_status,
        api::redemptions::submit_redemption,
        api::redemptions::redemption_status,
        api::balances::account_balances,
        api::programs::put_program_config,
        api::programs::get_program_config,
        api::health::ready,
        api::health::live,
    ),
    components(schemas(
        api::error::ApiError,
        api::receipts::ReceiptSubmissionResponse,
        api::receipts::ReceiptStatusResponse,
        api::redemptions::RedemptionSubmissionResponse,
        api::redemptions::RedemptionStatusResponse,
        api::balances::BalanceEntry,
        api::programs::ProgramConfigResponse,
        crate::domain::receipt::ReceiptSubmission,
        crate::domain::receipt::LineItem,
        crate::domain::redemption::RedemptionSubmission,
    )),
    tags(
        (name = "receipts", description = "Receipt ingestion and status"),
        (name = "redemptions", description = "Redemption ingestion and status"),
        (name = "accounts", description = "Balance queries"),
        (name = "programs", description = "Program configuration")
    )
)]
pub struct ApiDoc;
