use axum::Router;
use axum::middleware::from_fn;
use axum::routing::{get, post, put};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

pub fn build_router(app_state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/authorize", post(handlers::authorize_handler))
        .route(
            "/api/effective-permissions",
            get(handlers::effective_permissions_handler),
        )
        .route("/api/assignments", post(handlers::assign_role_handler))
        .route(
            "/api/assignments/revoke",
            post(handlers::revoke_role_handler),
        )
        .route(
            "/api/roles",
            get(handlers::list_roles_handler).post(handlers::create_role_handler),
        )
        .route(
            "/api/roles/{role_id}/permissions/{permission_id}",
            put(handlers::grant_permission_handler).delete(handlers::revoke_permission_handler),
        )
        .route(
            "/api/permissions",
            get(handlers::list_permissions_handler).post(handlers::create_permission_handler),
        )
        .route(
            "/api/policies",
            get(handlers::list_policies_handler).post(handlers::save_policy_handler),
        )
        .route("/api/audit", get(handlers::list_audit_entries_handler))
        .route_layer(from_fn(middleware::require_identity));

    Router::new()
        .route("/health", get(handlers::health_handler))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
