use std::str::FromStr;

use rolegate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::PolicyId;

/// Code of the built-in policy substituted when no usable policy resolves.
pub const FAIL_CLOSED_POLICY_CODE: &str = "builtin.fail_closed";

/// Merge rule applied to the permission sets of simultaneously active roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictStrategy {
    /// Intersection: any role lacking a permission vetoes it.
    DenyOverride,
    /// Union: any role granting a permission is enough.
    AllowUnion,
    /// Only the highest-priority role counts.
    PriorityBased,
    /// The role granting the fewest permissions sets the ceiling.
    MostRestrictive,
}

impl ConflictStrategy {
    /// Returns a stable storage value for this strategy.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DenyOverride => "DENY_OVERRIDE",
            Self::AllowUnion => "ALLOW_UNION",
            Self::PriorityBased => "PRIORITY_BASED",
            Self::MostRestrictive => "MOST_RESTRICTIVE",
        }
    }
}

impl FromStr for ConflictStrategy {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "DENY_OVERRIDE" => Ok(Self::DenyOverride),
            "ALLOW_UNION" => Ok(Self::AllowUnion),
            "PRIORITY_BASED" => Ok(Self::PriorityBased),
            "MOST_RESTRICTIVE" => Ok(Self::MostRestrictive),
            _ => Err(AppError::InvalidPolicyConfiguration(format!(
                "unknown conflict strategy '{value}'"
            ))),
        }
    }
}

/// Which end of the priority key wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriorityDirection {
    /// Numerically smaller key wins.
    Asc,
    /// Numerically larger key wins.
    Desc,
}

impl PriorityDirection {
    /// Returns a stable storage value for this direction.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for PriorityDirection {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            _ => Err(AppError::InvalidPolicyConfiguration(format!(
                "unknown priority direction '{value}'"
            ))),
        }
    }
}

/// Input used to write a conflict policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictPolicyInput {
    /// Unique policy code.
    pub code: String,
    /// Merge rule.
    pub conflict_strategy: ConflictStrategy,
    /// Optional cap on simultaneously counted roles.
    pub max_concurrent_roles: Option<i64>,
    /// Rank by role priority instead of role level.
    pub use_role_priority: bool,
    /// Which end of the ranking key wins.
    pub priority_direction: Option<PriorityDirection>,
    /// Whether global assignments join tenant evaluations.
    pub apply_global_rules: bool,
    /// Whether manager admin roles go through the strategy too.
    pub apply_to_admins: bool,
    /// Marks a built-in policy; immutable once set.
    pub is_system: bool,
}

/// Configured strategy for merging permission sets of concurrent roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictPolicy {
    id: PolicyId,
    code: String,
    conflict_strategy: ConflictStrategy,
    max_concurrent_roles: Option<u32>,
    use_role_priority: bool,
    priority_direction: Option<PriorityDirection>,
    apply_global_rules: bool,
    apply_to_admins: bool,
    is_system: bool,
}

impl ConflictPolicy {
    /// Creates a policy, rejecting configurations that cannot be evaluated.
    pub fn new(id: PolicyId, input: ConflictPolicyInput) -> AppResult<Self> {
        let max_concurrent_roles = input
            .max_concurrent_roles
            .map(|cap| {
                u32::try_from(cap)
                    .ok()
                    .filter(|cap| *cap > 0)
                    .ok_or_else(|| {
                        AppError::InvalidPolicyConfiguration(format!(
                            "max_concurrent_roles must be positive, got {cap}"
                        ))
                    })
            })
            .transpose()?;

        if input.use_role_priority && input.priority_direction.is_none() {
            return Err(AppError::InvalidPolicyConfiguration(
                "priority_direction is required when use_role_priority is set".to_owned(),
            ));
        }

        let code = input.code.trim().to_owned();
        if code.is_empty() {
            return Err(AppError::InvalidPolicyConfiguration(
                "policy code must not be empty".to_owned(),
            ));
        }

        Ok(Self {
            id,
            code,
            conflict_strategy: input.conflict_strategy,
            max_concurrent_roles,
            use_role_priority: input.use_role_priority,
            priority_direction: input.priority_direction,
            apply_global_rules: input.apply_global_rules,
            apply_to_admins: input.apply_to_admins,
            is_system: input.is_system,
        })
    }

    /// Returns the conservative policy substituted for a missing or malformed one.
    ///
    /// Manager admins are not carved out of the intersection under this policy.
    #[must_use]
    pub fn fail_closed() -> Self {
        Self {
            id: PolicyId::from_uuid(Uuid::nil()),
            code: FAIL_CLOSED_POLICY_CODE.to_owned(),
            conflict_strategy: ConflictStrategy::DenyOverride,
            max_concurrent_roles: None,
            use_role_priority: false,
            priority_direction: None,
            apply_global_rules: true,
            apply_to_admins: true,
            is_system: true,
        }
    }

    /// Returns the policy identifier.
    #[must_use]
    pub fn id(&self) -> PolicyId {
        self.id
    }

    /// Returns the unique policy code.
    #[must_use]
    pub fn code(&self) -> &str {
        self.code.as_str()
    }

    /// Returns the merge rule.
    #[must_use]
    pub fn conflict_strategy(&self) -> ConflictStrategy {
        self.conflict_strategy
    }

    /// Returns the optional cap on counted roles.
    #[must_use]
    pub fn max_concurrent_roles(&self) -> Option<u32> {
        self.max_concurrent_roles
    }

    /// Returns whether ranking uses role priority instead of level.
    #[must_use]
    pub fn use_role_priority(&self) -> bool {
        self.use_role_priority
    }

    /// Returns the configured direction, if any.
    #[must_use]
    pub fn priority_direction(&self) -> Option<PriorityDirection> {
        self.priority_direction
    }

    /// Returns the direction used for ranking, ascending when unset.
    #[must_use]
    pub fn effective_direction(&self) -> PriorityDirection {
        self.priority_direction.unwrap_or(PriorityDirection::Asc)
    }

    /// Returns whether global assignments join tenant evaluations.
    #[must_use]
    pub fn apply_global_rules(&self) -> bool {
        self.apply_global_rules
    }

    /// Returns whether manager admins go through the strategy.
    #[must_use]
    pub fn apply_to_admins(&self) -> bool {
        self.apply_to_admins
    }

    /// Returns whether this is a built-in policy.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.is_system
    }
}

/// Level of the precedence chain a policy was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicySource {
    /// Override carried by an assignment.
    Assignment,
    /// Principal default.
    Principal,
    /// Tenant default.
    Tenant,
    /// Deployment-wide default.
    System,
}

/// Why the fail-closed policy replaced the configured one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyFallback {
    /// The referenced policy does not exist.
    Missing {
        /// Referenced policy.
        policy_id: PolicyId,
    },
    /// The stored policy could not be interpreted.
    Malformed {
        /// Referenced policy.
        policy_id: PolicyId,
        /// Operator diagnostic.
        detail: String,
    },
    /// No level of the precedence chain names a policy.
    Unconfigured,
}

/// Policy chosen for one evaluation, with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySelection {
    policy: ConflictPolicy,
    source: Option<PolicySource>,
    fallback: Option<PolicyFallback>,
}

impl PolicySelection {
    /// Wraps a policy resolved from the precedence chain.
    #[must_use]
    pub fn configured(policy: ConflictPolicy, source: PolicySource) -> Self {
        Self {
            policy,
            source: Some(source),
            fallback: None,
        }
    }

    /// Substitutes the fail-closed policy and records why.
    #[must_use]
    pub fn fail_closed(fallback: PolicyFallback) -> Self {
        Self {
            policy: ConflictPolicy::fail_closed(),
            source: None,
            fallback: Some(fallback),
        }
    }

    /// Returns the policy in force.
    #[must_use]
    pub fn policy(&self) -> &ConflictPolicy {
        &self.policy
    }

    /// Returns where the policy came from, `None` for the fail-closed substitute.
    #[must_use]
    pub fn source(&self) -> Option<PolicySource> {
        self.source
    }

    /// Returns the substitution reason, if any.
    #[must_use]
    pub fn fallback(&self) -> Option<&PolicyFallback> {
        self.fallback.as_ref()
    }
}

/// Monotonic version of everything that feeds a principal's effective permissions.
///
/// `catalog` moves on role, permission, grant and policy writes; `principal` moves on the
/// principal's assignment writes. Both only grow.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PolicyVersion {
    /// Catalog epoch.
    pub catalog: i64,
    /// Principal epoch.
    pub principal: i64,
}

impl std::fmt::Display for PolicyVersion {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}.{}", self.catalog, self.principal)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rolegate_core::AppError;

    use super::{ConflictPolicy, ConflictPolicyInput, ConflictStrategy, PriorityDirection};
    use crate::PolicyId;

    fn input() -> ConflictPolicyInput {
        ConflictPolicyInput {
            code: "tenant.default".to_owned(),
            conflict_strategy: ConflictStrategy::AllowUnion,
            max_concurrent_roles: None,
            use_role_priority: false,
            priority_direction: None,
            apply_global_rules: true,
            apply_to_admins: false,
            is_system: false,
        }
    }

    #[test]
    fn non_positive_cap_is_rejected() {
        for cap in [0, -3] {
            let result = ConflictPolicy::new(
                PolicyId::new(),
                ConflictPolicyInput {
                    max_concurrent_roles: Some(cap),
                    ..input()
                },
            );
            assert!(matches!(
                result,
                Err(AppError::InvalidPolicyConfiguration(_))
            ));
        }
    }

    #[test]
    fn role_priority_requires_direction() {
        let result = ConflictPolicy::new(
            PolicyId::new(),
            ConflictPolicyInput {
                use_role_priority: true,
                ..input()
            },
        );
        assert!(matches!(
            result,
            Err(AppError::InvalidPolicyConfiguration(_))
        ));

        let result = ConflictPolicy::new(
            PolicyId::new(),
            ConflictPolicyInput {
                use_role_priority: true,
                priority_direction: Some(PriorityDirection::Desc),
                ..input()
            },
        );
        assert!(result.is_ok());
    }

    #[test]
    fn unknown_strategy_is_a_configuration_error() {
        assert!(matches!(
            ConflictStrategy::from_str("FIRST_MATCH"),
            Err(AppError::InvalidPolicyConfiguration(_))
        ));
    }

    #[test]
    fn fail_closed_policy_is_deny_override() {
        let policy = ConflictPolicy::fail_closed();
        assert_eq!(policy.conflict_strategy(), ConflictStrategy::DenyOverride);
        assert!(policy.apply_to_admins());
    }
}
