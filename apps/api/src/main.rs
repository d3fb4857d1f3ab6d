//! Rolegate API composition root.

#![forbid(unsafe_code)]

mod api_config;
mod api_router;
mod api_services;
mod bootstrap;
mod dto;
mod error;
mod handlers;
mod middleware;
mod state;

use rolegate_core::AppError;
use rolegate_infrastructure::PostgresSecurityStore;
use tracing::info;

use crate::api_config::{ApiCommand, ApiConfig, init_tracing};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ApiConfig::load()?;
    let pool = api_services::connect_database(&config.database_url).await?;
    api_services::run_migrations(&pool).await?;

    let app_state = api_services::build_app_state(&config, pool.clone())?;

    match config.command {
        ApiCommand::Migrate => {
            info!("database migrations applied successfully");
            return Ok(());
        }
        ApiCommand::BootstrapAdmin(user_id) => {
            let store = PostgresSecurityStore::new(pool);
            bootstrap::bootstrap_admin(&store, &app_state.authorization_service, user_id)
                .await?;
            return Ok(());
        }
        ApiCommand::Serve => {}
    }

    let address = config.socket_address()?;
    let app = api_router::build_router(app_state);

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| AppError::Internal(format!("failed to bind listener: {error}")))?;

    info!(
        %address,
        cache_ttl_seconds = config.authorization.cache_ttl_seconds,
        deadline_ms = config.authorization.default_deadline.as_millis(),
        "rolegate-api listening"
    );

    axum::serve(listener, app)
        .await
        .map_err(|error| AppError::Internal(format!("api server error: {error}")))
}
