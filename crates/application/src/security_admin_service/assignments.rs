use rolegate_core::UserId;
use rolegate_domain::{AssignmentId, RoleId, Scope};

use crate::authorization_service::AssignRoleInput;

use super::*;

impl SecurityAdminService {
    /// Assigns a role on behalf of an administrator.
    ///
    /// Tenant assignments need `rbac.manage` in the target tenant and GLOBAL assignments
    /// need it through a GLOBAL grant. `granted_by` is always the acting principal.
    pub async fn assign_role(
        &self,
        actor: &AccessContext,
        input: AssignRoleInput,
    ) -> AppResult<AssignmentId> {
        match (input.scope, input.tenant_context) {
            (Scope::Tenant, Some(tenant_id)) => {
                self.require_rbac_manage(&actor.in_tenant(tenant_id)).await?;
            }
            (Scope::Tenant, None) => self.require_rbac_manage(actor).await?,
            (Scope::Global, _) => self.require_global_rbac_manage(actor).await?,
        }
        self.authorization_service
            .assign_role(AssignRoleInput {
                granted_by: actor.principal.user_id,
                ..input
            })
            .await
    }

    /// Revokes every active assignment of a role on behalf of an administrator.
    ///
    /// The revocation spans every scope and tenant, so it needs a GLOBAL grant.
    pub async fn revoke_role(
        &self,
        actor: &AccessContext,
        user_id: UserId,
        role_id: RoleId,
        reason: &str,
    ) -> AppResult<bool> {
        self.require_global_rbac_manage(actor).await?;
        self.authorization_service
            .revoke_role(user_id, role_id, reason, actor.principal.user_id)
            .await
    }
}
