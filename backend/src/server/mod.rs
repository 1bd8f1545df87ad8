//! HTTP server wiring.

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use mockable::Clock;
use tracing::info;

use crate::api;
use crate::api::health::{live, ready, HealthState};
use crate::middleware::Trace;
use crate::outbound::persistence::DbPool;

mod config;

pub use config::{AppConfig, ConfigError};

/// Shared state handed to every handler.
pub struct AppState {
    pub pool: DbPool,
    pub clock: Arc<dyn Clock>,
}

/// Mount the versioned API surface.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/v1")
            .service(api::receipts::submit_receipt)
            .service(api::receipts::receipt_status)
            .service(api::redemptions::submit_redemption)
            .service(api::redemptions::redemption_status)
            .service(api::balances::account_balances)
            .service(api::programs::put_program_config)
            .service(api::programs::get_program_config),
    );
}

/// Serve the ingress API until shutdown.
pub async fn run_server(
    config: &AppConfig,
    pool: DbPool,
    clock: Arc<dyn Clock>,
) -> std::io::Result<()> {
    let state = web::Data::new(AppState { pool, clock });
    let health_state = web::Data::new(HealthState::new());
    let server_health_state = health_state.clone();

    let server = HttpServer::new(move || {
        let app = App::new()
            .app_data(state.clone())
            .app_data(server_health_state.clone())
            .wrap(Trace)
            .configure(configure_api)
            .service(ready)
            .service(live);

        #[cfg(debug_assertions)]
        let app = {
            use utoipa::OpenApi;
            app.service(
                utoipa_swagger_ui::SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", crate::doc::ApiDoc::openapi()),
            )
        };

        app
    })
    .bind(config.bind_addr)?;

    info!(bind_addr = %config.bind_addr, "http server listening");
    health_state.mark_ready();
    server.run().await
}
