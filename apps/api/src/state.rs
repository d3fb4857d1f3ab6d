use rolegate_application::{AuthorizationService, SecurityAdminService};
use sqlx::PgPool;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub authorization_service: AuthorizationService,
    pub security_admin_service: SecurityAdminService,
    pub postgres_pool: PgPool,
    pub redis_client: Option<redis::Client>,
}
