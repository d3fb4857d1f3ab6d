use rolegate_application::AuditQuery;
use rolegate_core::{AppResult, UserId};
use rolegate_domain::{AuditEntry, AuditTarget, RoleId};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::{parse_enum, parse_uuid};

/// Query string filters for audit listing.
#[derive(Debug, Default, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/audit-query-params.ts"
)]
pub struct AuditQueryParams {
    pub user_id: Option<String>,
    pub role_id: Option<String>,
    pub action: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl AuditQueryParams {
    pub fn into_query(self) -> AppResult<AuditQuery> {
        let defaults = AuditQuery::default();
        Ok(AuditQuery {
            user_id: self
                .user_id
                .as_deref()
                .map(|value| parse_uuid("user_id", value).map(UserId::from_uuid))
                .transpose()?,
            role_id: self
                .role_id
                .as_deref()
                .map(|value| parse_uuid("role_id", value).map(RoleId::from_uuid))
                .transpose()?,
            action: self.action.as_deref().map(parse_enum).transpose()?,
            limit: self
                .limit
                .map_or(defaults.limit, |limit| limit.clamp(1, 500) as usize),
            offset: self.offset.map_or(defaults.offset, |offset| offset as usize),
        })
    }
}

/// API representation of one history row.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/audit-entry-response.ts"
)]
pub struct AuditEntryResponse {
    pub entry_id: String,
    pub target_kind: String,
    pub role_id: Option<String>,
    pub permission_id: Option<String>,
    pub assignment_id: Option<String>,
    pub user_id: Option<String>,
    pub tenant_id: Option<String>,
    pub permission_code: Option<String>,
    pub allowed: Option<bool>,
    pub action: String,
    pub changed_at: String,
    pub changed_by: String,
    pub reason: Option<String>,
}

impl From<AuditEntry> for AuditEntryResponse {
    fn from(value: AuditEntry) -> Self {
        let mut response = Self {
            entry_id: value.id().to_string(),
            target_kind: String::new(),
            role_id: None,
            permission_id: None,
            assignment_id: None,
            user_id: None,
            tenant_id: None,
            permission_code: None,
            allowed: None,
            action: value.action().as_str().to_owned(),
            changed_at: value.changed_at().to_rfc3339(),
            changed_by: value.changed_by().to_string(),
            reason: value.reason().map(str::to_owned),
        };

        match value.target() {
            AuditTarget::RoleGrant {
                role_id,
                permission_id,
            } => {
                response.target_kind = "role_grant".to_owned();
                response.role_id = Some(role_id.to_string());
                response.permission_id = Some(permission_id.to_string());
            }
            AuditTarget::Assignment {
                assignment_id,
                user_id,
                role_id,
            } => {
                response.target_kind = "assignment".to_owned();
                response.assignment_id = Some(assignment_id.to_string());
                response.user_id = Some(user_id.to_string());
                response.role_id = Some(role_id.to_string());
            }
            AuditTarget::Decision {
                user_id,
                tenant_id,
                permission,
                allowed,
            } => {
                response.target_kind = "decision".to_owned();
                response.user_id = Some(user_id.to_string());
                response.tenant_id = Some(tenant_id.to_string());
                response.permission_code = Some(permission.to_string());
                response.allowed = Some(*allowed);
            }
        }

        response
    }
}
