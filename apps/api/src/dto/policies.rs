use rolegate_core::AppResult;
use rolegate_domain::{ConflictPolicy, ConflictPolicyInput, PolicyId, PriorityDirection};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{parse_enum, parse_uuid};

/// Incoming payload for creating or replacing a conflict policy.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/save-conflict-policy-request.ts"
)]
pub struct SaveConflictPolicyRequest {
    /// Existing policy to replace; a new policy is created when absent.
    pub policy_id: Option<String>,
    pub code: String,
    pub conflict_strategy: String,
    pub max_concurrent_roles: Option<i32>,
    #[serde(default)]
    pub use_role_priority: bool,
    pub priority_direction: Option<String>,
    #[serde(default = "enabled")]
    pub apply_global_rules: bool,
    #[serde(default = "enabled")]
    pub apply_to_admins: bool,
}

fn enabled() -> bool {
    true
}

impl SaveConflictPolicyRequest {
    pub fn into_parts(self) -> AppResult<(Option<PolicyId>, ConflictPolicyInput)> {
        let policy_id = self
            .policy_id
            .as_deref()
            .map(|value| parse_uuid("policy_id", value).map(PolicyId::from_uuid))
            .transpose()?;

        let priority_direction = self
            .priority_direction
            .as_deref()
            .map(parse_enum::<PriorityDirection>)
            .transpose()?;

        Ok((
            policy_id,
            ConflictPolicyInput {
                conflict_strategy: parse_enum(self.conflict_strategy.as_str())?,
                max_concurrent_roles: self.max_concurrent_roles.map(i64::from),
                use_role_priority: self.use_role_priority,
                priority_direction,
                apply_global_rules: self.apply_global_rules,
                apply_to_admins: self.apply_to_admins,
                is_system: false,
                code: self.code,
            },
        ))
    }
}

/// API representation of a conflict policy.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/conflict-policy-response.ts"
)]
pub struct ConflictPolicyResponse {
    pub policy_id: String,
    pub code: String,
    pub conflict_strategy: String,
    pub max_concurrent_roles: Option<u32>,
    pub use_role_priority: bool,
    pub priority_direction: Option<String>,
    pub apply_global_rules: bool,
    pub apply_to_admins: bool,
    pub is_system: bool,
}

impl From<ConflictPolicy> for ConflictPolicyResponse {
    fn from(value: ConflictPolicy) -> Self {
        Self {
            policy_id: value.id().to_string(),
            code: value.code().to_owned(),
            conflict_strategy: value.conflict_strategy().as_str().to_owned(),
            max_concurrent_roles: value.max_concurrent_roles(),
            use_role_priority: value.use_role_priority(),
            priority_direction: value
                .priority_direction()
                .map(|direction| direction.as_str().to_owned()),
            apply_global_rules: value.apply_global_rules(),
            apply_to_admins: value.apply_to_admins(),
            is_system: value.is_system(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rolegate_core::AppError;
    use rolegate_domain::ConflictStrategy;

    use super::*;

    fn request(strategy: &str, direction: Option<&str>) -> SaveConflictPolicyRequest {
        SaveConflictPolicyRequest {
            policy_id: None,
            code: "finance.priority".to_owned(),
            conflict_strategy: strategy.to_owned(),
            max_concurrent_roles: Some(2),
            use_role_priority: true,
            priority_direction: direction.map(str::to_owned),
            apply_global_rules: true,
            apply_to_admins: true,
        }
    }

    #[test]
    fn policy_payload_is_parsed() {
        let Ok((policy_id, input)) = request("priority_based", Some("desc")).into_parts() else {
            panic!("expected a valid policy payload");
        };
        assert_eq!(policy_id, None);
        assert_eq!(input.conflict_strategy, ConflictStrategy::PriorityBased);
        assert_eq!(input.priority_direction, Some(PriorityDirection::Desc));
        assert_eq!(input.max_concurrent_roles, Some(2));
        assert!(!input.is_system);
    }

    #[test]
    fn unknown_strategy_is_a_policy_configuration_error() {
        let result = request("FIRST_MATCH", None).into_parts();
        assert!(matches!(
            result,
            Err(AppError::InvalidPolicyConfiguration(_))
        ));

        let direction = request("PRIORITY_BASED", Some("sideways")).into_parts();
        assert!(matches!(
            direction,
            Err(AppError::InvalidPolicyConfiguration(_))
        ));
    }
}
