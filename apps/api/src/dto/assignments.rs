use rolegate_application::AssignRoleInput;
use rolegate_core::{AppResult, TenantId, UserId};
use rolegate_domain::{AssignmentId, PolicyId, RoleId, Scope};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{parse_enum, parse_timestamp, parse_uuid};

/// Incoming payload for role assignment.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/assign-role-request.ts"
)]
pub struct AssignRoleRequest {
    pub user_id: String,
    pub role_id: String,
    /// `GLOBAL` or `TENANT`.
    pub scope: String,
    pub tenant_id: Option<String>,
    pub expires_at: Option<String>,
    pub conflict_policy_id: Option<String>,
}

impl AssignRoleRequest {
    pub fn into_input(self, granted_by: UserId) -> AppResult<AssignRoleInput> {
        let scope: Scope = parse_enum(self.scope.as_str())?;
        Ok(AssignRoleInput {
            user_id: UserId::from_uuid(parse_uuid("user_id", self.user_id.as_str())?),
            role_id: RoleId::from_uuid(parse_uuid("role_id", self.role_id.as_str())?),
            scope,
            tenant_context: self
                .tenant_id
                .as_deref()
                .map(|value| parse_uuid("tenant_id", value).map(TenantId::from_uuid))
                .transpose()?,
            expires_at: self
                .expires_at
                .as_deref()
                .map(|value| parse_timestamp("expires_at", value))
                .transpose()?,
            granted_by,
            conflict_policy_id: self
                .conflict_policy_id
                .as_deref()
                .map(|value| parse_uuid("conflict_policy_id", value).map(PolicyId::from_uuid))
                .transpose()?,
        })
    }
}

/// Incoming payload for role revocation.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/revoke-role-request.ts"
)]
pub struct RevokeRoleRequest {
    pub user_id: String,
    pub role_id: String,
    pub reason: String,
}

impl RevokeRoleRequest {
    pub fn parse_ids(&self) -> AppResult<(UserId, RoleId)> {
        Ok((
            UserId::from_uuid(parse_uuid("user_id", self.user_id.as_str())?),
            RoleId::from_uuid(parse_uuid("role_id", self.role_id.as_str())?),
        ))
    }
}

/// Identifier of the active assignment after an assign call.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/assignment-response.ts"
)]
pub struct AssignmentResponse {
    pub assignment_id: String,
}

impl From<AssignmentId> for AssignmentResponse {
    fn from(value: AssignmentId) -> Self {
        Self {
            assignment_id: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rolegate_core::AppError;

    use super::*;

    #[test]
    fn tenant_assignment_payload_is_parsed() {
        let tenant_id = uuid::Uuid::new_v4();
        let granted_by = UserId::new();
        let request = AssignRoleRequest {
            user_id: uuid::Uuid::new_v4().to_string(),
            role_id: uuid::Uuid::new_v4().to_string(),
            scope: "tenant".to_owned(),
            tenant_id: Some(tenant_id.to_string()),
            expires_at: Some("2027-01-01T00:00:00+02:00".to_owned()),
            conflict_policy_id: None,
        };

        let Ok(input) = request.into_input(granted_by) else {
            panic!("expected a valid assignment payload");
        };
        assert_eq!(input.scope, Scope::Tenant);
        assert_eq!(input.tenant_context, Some(TenantId::from_uuid(tenant_id)));
        assert_eq!(input.granted_by, granted_by);
        assert_eq!(
            input.expires_at.map(|expires_at| expires_at.to_rfc3339()).as_deref(),
            Some("2026-12-31T22:00:00+00:00")
        );
    }

    #[test]
    fn unknown_scope_is_rejected() {
        let request = AssignRoleRequest {
            user_id: uuid::Uuid::new_v4().to_string(),
            role_id: uuid::Uuid::new_v4().to_string(),
            scope: "REGION".to_owned(),
            tenant_id: None,
            expires_at: None,
            conflict_policy_id: None,
        };

        assert!(matches!(
            request.into_input(UserId::new()),
            Err(AppError::Validation(_))
        ));
    }
}
