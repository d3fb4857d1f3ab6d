use async_trait::async_trait;
use chrono::{DateTime, Utc};

use rolegate_core::{AppResult, UserId};
use rolegate_domain::{Permission, PermissionId, Role, RoleGrant, RoleId};

use super::WriteOutcome;

/// Input for withdrawing a permission from a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokePermissionInput {
    /// Role losing the permission.
    pub role_id: RoleId,
    /// Withdrawn permission.
    pub permission_id: PermissionId,
    /// Administrator revoking the grant.
    pub revoked_by: UserId,
    /// Revocation instant.
    pub revoked_at: DateTime<Utc>,
    /// Captured justification.
    pub reason: Option<String>,
}

/// Durable store of roles.
#[async_trait]
pub trait RoleCatalog: Send + Sync {
    /// Finds one role.
    async fn role(&self, role_id: RoleId) -> AppResult<Option<Role>>;

    /// Returns the roles that exist among `role_ids`.
    async fn roles(&self, role_ids: &[RoleId]) -> AppResult<Vec<Role>>;

    /// Persists a new role and bumps the catalog epoch.
    async fn create_role(&self, role: Role) -> AppResult<()>;

    /// Lists every role ordered by code.
    async fn list_roles(&self) -> AppResult<Vec<Role>>;
}

/// Durable store of permissions and role grants.
#[async_trait]
pub trait PermissionCatalog: Send + Sync {
    /// Returns the active permissions granted to a role.
    async fn permissions_of(&self, role_id: RoleId) -> AppResult<Vec<Permission>>;

    /// Finds one permission.
    async fn permission(&self, permission_id: PermissionId) -> AppResult<Option<Permission>>;

    /// Persists a new permission and bumps the catalog epoch.
    async fn create_permission(&self, permission: Permission) -> AppResult<()>;

    /// Grants a permission to a role unless the grant exists.
    ///
    /// A new grant commits with its GRANTED audit entry and a catalog epoch bump.
    async fn grant_permission(&self, grant: RoleGrant) -> AppResult<WriteOutcome<RoleGrant>>;

    /// Withdraws a grant; `false` when it did not exist.
    async fn revoke_permission(&self, input: RevokePermissionInput) -> AppResult<bool>;

    /// Lists every permission ordered by code.
    async fn list_permissions(&self) -> AppResult<Vec<Permission>>;
}
