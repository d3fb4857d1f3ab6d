use chrono::Utc;
use tracing::info;

use rolegate_core::AppError;
use rolegate_domain::{
    Permission, PermissionId, PermissionInput, Role, RoleGrant, RoleId, RoleInput,
};

use crate::security_ports::RevokePermissionInput;

use super::*;

impl SecurityAdminService {
    /// Lists every role.
    pub async fn list_roles(&self, actor: &AccessContext) -> AppResult<Vec<Role>> {
        self.require_rbac_manage(actor).await?;
        self.stores.roles.list_roles().await
    }

    /// Defines a new role.
    pub async fn create_role(&self, actor: &AccessContext, input: RoleInput) -> AppResult<Role> {
        self.require_rbac_manage(actor).await?;

        let role = Role::new(RoleId::new(), input)?;
        self.stores.roles.create_role(role.clone()).await?;

        info!(
            role = %role.code(),
            role_id = %role.id(),
            actor = %actor.principal.user_id,
            "role created"
        );
        Ok(role)
    }

    /// Lists every permission.
    pub async fn list_permissions(&self, actor: &AccessContext) -> AppResult<Vec<Permission>> {
        self.require_rbac_manage(actor).await?;
        self.stores.permissions.list_permissions().await
    }

    /// Defines a new permission whose code derives from resource and action.
    pub async fn create_permission(
        &self,
        actor: &AccessContext,
        input: PermissionInput,
    ) -> AppResult<Permission> {
        self.require_rbac_manage(actor).await?;

        let permission = Permission::new(PermissionId::new(), input)?;
        self.stores
            .permissions
            .create_permission(permission.clone())
            .await?;

        info!(
            permission = %permission.code(),
            actor = %actor.principal.user_id,
            "permission created"
        );
        Ok(permission)
    }

    /// Grants a permission to a role, returning the existing grant when present.
    pub async fn grant_permission_to_role(
        &self,
        actor: &AccessContext,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<RoleGrant> {
        self.require_rbac_manage(actor).await?;
        self.ensure_grant_targets_exist(role_id, permission_id)
            .await?;

        let outcome = self
            .stores
            .permissions
            .grant_permission(RoleGrant {
                role_id,
                permission_id,
                granted_at: Utc::now(),
                granted_by: actor.principal.user_id,
            })
            .await?;

        if outcome.was_created() {
            info!(
                %role_id,
                %permission_id,
                actor = %actor.principal.user_id,
                "permission granted to role"
            );
        }
        Ok(outcome.into_value())
    }

    /// Withdraws a permission from a role; `false` when it was not granted.
    pub async fn revoke_permission_from_role(
        &self,
        actor: &AccessContext,
        role_id: RoleId,
        permission_id: PermissionId,
        reason: Option<String>,
    ) -> AppResult<bool> {
        self.require_rbac_manage(actor).await?;
        self.ensure_grant_targets_exist(role_id, permission_id)
            .await?;

        let revoked = self
            .stores
            .permissions
            .revoke_permission(RevokePermissionInput {
                role_id,
                permission_id,
                revoked_by: actor.principal.user_id,
                revoked_at: Utc::now(),
                reason: reason
                    .map(|reason| reason.trim().to_owned())
                    .filter(|reason| !reason.is_empty()),
            })
            .await?;

        if revoked {
            info!(
                %role_id,
                %permission_id,
                actor = %actor.principal.user_id,
                "permission revoked from role"
            );
        }
        Ok(revoked)
    }

    async fn ensure_grant_targets_exist(
        &self,
        role_id: RoleId,
        permission_id: PermissionId,
    ) -> AppResult<()> {
        if self.stores.roles.role(role_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "role '{role_id}' does not exist"
            )));
        }

        if self
            .stores
            .permissions
            .permission(permission_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound(format!(
                "permission '{permission_id}' does not exist"
            )));
        }

        Ok(())
    }
}
