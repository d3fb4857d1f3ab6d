use rolegate_core::AppResult;
use rolegate_domain::{
    AppliesTo, Permission, PermissionAction, PermissionInput, RecordStatus, Role, RoleGrant,
    RoleInput,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::parse_enum;

/// Incoming payload for role creation.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/create-role-request.ts"
)]
pub struct CreateRoleRequest {
    pub code: String,
    pub name: String,
    pub category: String,
    pub level: u8,
    pub scope: String,
    pub priority: i32,
    #[serde(default)]
    pub is_default: bool,
    pub status: Option<String>,
}

impl CreateRoleRequest {
    pub fn into_input(self) -> AppResult<RoleInput> {
        Ok(RoleInput {
            category: parse_enum(self.category.as_str())?,
            scope: parse_enum(self.scope.as_str())?,
            status: parse_status(self.status.as_deref())?,
            code: self.code,
            name: self.name,
            level: self.level,
            priority: self.priority,
            is_default: self.is_default,
        })
    }
}

/// API representation of a role.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/role-response.ts"
)]
pub struct RoleResponse {
    pub role_id: String,
    pub code: String,
    pub name: String,
    pub category: String,
    pub level: u8,
    pub scope: String,
    pub priority: i32,
    pub is_default: bool,
    pub status: String,
}

impl From<Role> for RoleResponse {
    fn from(value: Role) -> Self {
        Self {
            role_id: value.id().to_string(),
            code: value.code().as_str().to_owned(),
            name: value.name().as_str().to_owned(),
            category: value.category().as_str().to_owned(),
            level: value.level(),
            scope: value.scope().as_str().to_owned(),
            priority: value.priority(),
            is_default: value.is_default(),
            status: value.status().as_str().to_owned(),
        }
    }
}

/// Incoming payload for permission creation.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/create-permission-request.ts"
)]
pub struct CreatePermissionRequest {
    pub resource: String,
    pub action: String,
    pub scope: String,
    pub applies_to: Option<String>,
    pub status: Option<String>,
}

impl CreatePermissionRequest {
    pub fn into_input(self) -> AppResult<PermissionInput> {
        Ok(PermissionInput {
            action: parse_enum::<PermissionAction>(self.action.as_str())?,
            scope: parse_enum(self.scope.as_str())?,
            applies_to: self
                .applies_to
                .as_deref()
                .map(parse_enum)
                .transpose()?
                .unwrap_or(AppliesTo::All),
            status: parse_status(self.status.as_deref())?,
            resource: self.resource,
            is_system: false,
        })
    }
}

/// API representation of a permission.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/permission-response.ts"
)]
pub struct PermissionResponse {
    pub permission_id: String,
    pub code: String,
    pub resource: String,
    pub action: String,
    pub scope: String,
    pub applies_to: String,
    pub is_system: bool,
    pub status: String,
}

impl From<Permission> for PermissionResponse {
    fn from(value: Permission) -> Self {
        Self {
            permission_id: value.id().to_string(),
            code: value.code().to_string(),
            resource: value.resource().as_str().to_owned(),
            action: value.action().as_str().to_owned(),
            scope: value.scope().as_str().to_owned(),
            applies_to: value.applies_to().as_str().to_owned(),
            is_system: value.is_system(),
            status: value.status().as_str().to_owned(),
        }
    }
}

/// API representation of a role grant.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/role-grant-response.ts"
)]
pub struct RoleGrantResponse {
    pub role_id: String,
    pub permission_id: String,
    pub granted_at: String,
    pub granted_by: String,
}

impl From<RoleGrant> for RoleGrantResponse {
    fn from(value: RoleGrant) -> Self {
        Self {
            role_id: value.role_id.to_string(),
            permission_id: value.permission_id.to_string(),
            granted_at: value.granted_at.to_rfc3339(),
            granted_by: value.granted_by.to_string(),
        }
    }
}

/// Optional reason attached to a grant withdrawal.
#[derive(Debug, Default, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/revoke-permission-query.ts"
)]
pub struct RevokePermissionQuery {
    pub reason: Option<String>,
}

fn parse_status(value: Option<&str>) -> AppResult<RecordStatus> {
    value
        .map(parse_enum)
        .transpose()
        .map(|status| status.unwrap_or(RecordStatus::Active))
}
