use std::sync::Arc;

use rolegate_application::{
    AuthorizationService, EffectivePermissionCache, SecurityAdminService, SecurityStores,
};
use rolegate_core::AppError;
use rolegate_infrastructure::{
    InMemoryEffectivePermissionCache, PostgresSecurityStore, RedisEffectivePermissionCache,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::api_config::ApiConfig;
use crate::state::AppState;

pub async fn connect_database(database_url: &str) -> Result<PgPool, AppError> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))
}

pub fn build_redis_client(redis_url: &str) -> Result<redis::Client, AppError> {
    redis::Client::open(redis_url)
        .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))
}

pub fn build_app_state(config: &ApiConfig, pool: PgPool) -> Result<AppState, AppError> {
    let redis_client = config
        .redis_url
        .as_deref()
        .map(build_redis_client)
        .transpose()?;

    let cache: Arc<dyn EffectivePermissionCache> = match redis_client.clone() {
        Some(client) => {
            info!(prefix = %config.cache_key_prefix, "using redis effective permission cache");
            Arc::new(RedisEffectivePermissionCache::new(
                client,
                config.cache_key_prefix.clone(),
            ))
        }
        None => {
            info!("using in-memory effective permission cache");
            Arc::new(InMemoryEffectivePermissionCache::new())
        }
    };

    let store = Arc::new(PostgresSecurityStore::new(pool.clone()));
    let stores = SecurityStores {
        assignments: store.clone(),
        roles: store.clone(),
        permissions: store.clone(),
        policies: store.clone(),
        audit: store,
        cache,
    };

    let authorization_service =
        AuthorizationService::new(stores.clone(), config.authorization.clone());
    let security_admin_service = SecurityAdminService::new(authorization_service.clone(), stores);

    Ok(AppState {
        authorization_service,
        security_admin_service,
        postgres_pool: pool,
        redis_client,
    })
}
