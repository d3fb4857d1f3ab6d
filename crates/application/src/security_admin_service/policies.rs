use tracing::info;

use rolegate_core::AppError;
use rolegate_domain::{AuditEntry, ConflictPolicy, ConflictPolicyInput, PolicyId};

use crate::security_ports::{AuditQuery, PolicyLookup};

use super::*;

impl SecurityAdminService {
    /// Lists every conflict policy.
    pub async fn list_policies(&self, actor: &AccessContext) -> AppResult<Vec<ConflictPolicy>> {
        self.require_rbac_manage(actor).await?;
        self.stores.policies.list_policies().await
    }

    /// Creates a policy, or replaces `policy_id` when given.
    ///
    /// System policies cannot be created or modified here.
    pub async fn save_conflict_policy(
        &self,
        actor: &AccessContext,
        policy_id: Option<PolicyId>,
        input: ConflictPolicyInput,
    ) -> AppResult<ConflictPolicy> {
        self.require_rbac_manage(actor).await?;

        if input.is_system {
            return Err(AppError::InvalidPolicyConfiguration(
                "system policies are managed by migrations".to_owned(),
            ));
        }

        let policy_id = match policy_id {
            Some(policy_id) => {
                match self.stores.policies.find_policy(policy_id).await? {
                    PolicyLookup::Found(existing) if existing.is_system() => {
                        return Err(AppError::InvalidPolicyConfiguration(format!(
                            "system policy '{}' is immutable",
                            existing.code()
                        )));
                    }
                    PolicyLookup::Found(_) | PolicyLookup::Malformed(_) => policy_id,
                    PolicyLookup::Missing => {
                        return Err(AppError::NotFound(format!(
                            "conflict policy '{policy_id}' does not exist"
                        )));
                    }
                }
            }
            None => PolicyId::new(),
        };

        let policy = ConflictPolicy::new(policy_id, input)?;
        self.stores.policies.save_policy(policy.clone()).await?;

        info!(
            policy = %policy.code(),
            %policy_id,
            strategy = policy.conflict_strategy().as_str(),
            actor = %actor.principal.user_id,
            "conflict policy saved"
        );
        Ok(policy)
    }

    /// Lists audit entries in append order.
    pub async fn list_audit_entries(
        &self,
        actor: &AccessContext,
        query: AuditQuery,
    ) -> AppResult<Vec<AuditEntry>> {
        self.require_rbac_manage(actor).await?;
        self.stores.audit.entries(query).await
    }
}
