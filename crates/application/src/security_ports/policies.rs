use async_trait::async_trait;

use rolegate_core::AppResult;
use rolegate_domain::{ConflictPolicy, PolicyFallback, PolicyId, PolicySelection, PolicySource};

/// Policy references in precedence order, highest first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PolicyChain {
    /// Override carried by an assignment.
    pub assignment: Option<PolicyId>,
    /// Principal default.
    pub principal: Option<PolicyId>,
    /// Tenant default.
    pub tenant: Option<PolicyId>,
    /// Deployment-wide default.
    pub system: Option<PolicyId>,
}

impl PolicyChain {
    /// Returns the highest-precedence reference.
    #[must_use]
    pub fn first(&self) -> Option<(PolicyId, PolicySource)> {
        [
            (self.assignment, PolicySource::Assignment),
            (self.principal, PolicySource::Principal),
            (self.tenant, PolicySource::Tenant),
            (self.system, PolicySource::System),
        ]
        .into_iter()
        .find_map(|(policy_id, source)| policy_id.map(|policy_id| (policy_id, source)))
    }
}

/// Outcome of looking up one stored policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyLookup {
    /// Stored and well formed.
    Found(ConflictPolicy),
    /// No row with that id.
    Missing,
    /// Stored but not interpretable, e.g. an unknown strategy.
    Malformed(String),
}

/// Durable store of conflict policies.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Looks up one policy.
    async fn find_policy(&self, policy_id: PolicyId) -> AppResult<PolicyLookup>;

    /// Inserts or replaces a policy and bumps the catalog epoch.
    async fn save_policy(&self, policy: ConflictPolicy) -> AppResult<()>;

    /// Lists every policy ordered by code.
    async fn list_policies(&self) -> AppResult<Vec<ConflictPolicy>>;

    /// Picks the policy for an evaluation.
    ///
    /// Only the highest-precedence reference is consulted. A missing or malformed target
    /// selects the fail-closed policy instead of falling through to lower levels.
    async fn resolve(&self, chain: PolicyChain) -> AppResult<PolicySelection> {
        let Some((policy_id, source)) = chain.first() else {
            return Ok(PolicySelection::fail_closed(PolicyFallback::Unconfigured));
        };

        Ok(match self.find_policy(policy_id).await? {
            PolicyLookup::Found(policy) => PolicySelection::configured(policy, source),
            PolicyLookup::Missing => {
                PolicySelection::fail_closed(PolicyFallback::Missing { policy_id })
            }
            PolicyLookup::Malformed(detail) => {
                PolicySelection::fail_closed(PolicyFallback::Malformed { policy_id, detail })
            }
        })
    }
}
