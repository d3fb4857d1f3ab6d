use tracing::{debug, info, warn};

use rolegate_core::{AppError, AppResult};
use rolegate_domain::{AssignmentId, AssignmentInput, AssignmentKey};

use crate::security_ports::{PolicyLookup, RevokeAssignmentsInput};

use super::*;

impl AuthorizationService {
    /// Assigns a role, returning the existing assignment id when one is already active.
    pub async fn assign_role(&self, input: AssignRoleInput) -> AppResult<AssignmentId> {
        let role = self
            .stores
            .roles
            .role(input.role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{}' does not exist", input.role_id)))?;

        if !role.is_active() {
            return Err(AppError::Conflict(format!(
                "role '{}' is inactive and cannot be assigned",
                role.code()
            )));
        }

        if input.scope == Scope::Global && role.scope() != Scope::Global {
            return Err(AppError::Validation(format!(
                "role '{}' is tenant scoped and cannot be assigned globally",
                role.code()
            )));
        }

        if let Some(policy_id) = input.conflict_policy_id {
            match self.stores.policies.find_policy(policy_id).await? {
                PolicyLookup::Found(_) => {}
                PolicyLookup::Missing => {
                    return Err(AppError::NotFound(format!(
                        "conflict policy '{policy_id}' does not exist"
                    )));
                }
                PolicyLookup::Malformed(detail) => {
                    return Err(AppError::InvalidPolicyConfiguration(format!(
                        "conflict policy '{policy_id}' is malformed: {detail}"
                    )));
                }
            }
        }

        let key = AssignmentKey::new(
            input.user_id,
            input.role_id,
            input.scope,
            input.tenant_context,
        )?;
        let outcome = self
            .stores
            .assignments
            .create_assignment(
                AssignmentInput {
                    key,
                    expires_at: input.expires_at,
                    granted_by: input.granted_by,
                    conflict_policy_id: input.conflict_policy_id,
                },
                Utc::now(),
            )
            .await?;

        let assignment_id = outcome.value().id();
        if outcome.was_created() {
            info!(
                user_id = %input.user_id,
                role = %role.code(),
                %assignment_id,
                granted_by = %input.granted_by,
                "role assigned"
            );
            self.evict_principal(input.user_id).await;
        } else {
            debug!(user_id = %input.user_id, role = %role.code(), %assignment_id, "role already assigned");
        }

        Ok(assignment_id)
    }

    /// Revokes every active assignment of the role; `false` when none was active.
    pub async fn revoke_role(
        &self,
        user_id: UserId,
        role_id: RoleId,
        reason: &str,
        revoked_by: UserId,
    ) -> AppResult<bool> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::Validation(
                "revoke reason must not be empty".to_owned(),
            ));
        }

        let revoked = self
            .stores
            .assignments
            .revoke_assignments(RevokeAssignmentsInput {
                user_id,
                role_id,
                reason: reason.to_owned(),
                revoked_by,
                revoked_at: Utc::now(),
            })
            .await?;

        if revoked.is_empty() {
            debug!(%user_id, %role_id, "no active assignment to revoke");
            return Ok(false);
        }

        info!(
            %user_id,
            %role_id,
            revoked = revoked.len(),
            %revoked_by,
            "role revoked"
        );
        self.evict_principal(user_id).await;
        Ok(true)
    }

    async fn evict_principal(&self, user_id: UserId) {
        if let Err(error) = self.stores.cache.invalidate_principal(user_id).await {
            warn!(%user_id, %error, "effective permission cache eviction failed");
        }
    }
}
