use rolegate_application::{AssignRoleInput, AuthorizationService, RoleCatalog};
use rolegate_core::{AppError, AppResult, UserId};
use rolegate_domain::{AssignmentId, Scope};
use tracing::info;

/// Code of the administrator role seeded by the initial migration.
pub const SYSTEM_ADMINISTRATOR_ROLE: &str = "system.administrator";

/// Grants the seeded administrator role globally to `user_id`.
///
/// Runs outside the HTTP surface because no principal can hold `rbac.manage` yet.
pub async fn bootstrap_admin(
    roles: &dyn RoleCatalog,
    authorization_service: &AuthorizationService,
    user_id: UserId,
) -> AppResult<AssignmentId> {
    let role = roles
        .list_roles()
        .await?
        .into_iter()
        .find(|role| role.code().as_str() == SYSTEM_ADMINISTRATOR_ROLE)
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "role '{SYSTEM_ADMINISTRATOR_ROLE}' is missing, run migrations first"
            ))
        })?;

    let assignment_id = authorization_service
        .assign_role(AssignRoleInput {
            user_id,
            role_id: role.id(),
            scope: Scope::Global,
            tenant_context: None,
            expires_at: None,
            granted_by: user_id,
            conflict_policy_id: None,
        })
        .await?;

    info!(%user_id, %assignment_id, "system administrator bootstrapped");
    Ok(assignment_id)
}
