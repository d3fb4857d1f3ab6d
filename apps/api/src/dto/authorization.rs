use std::collections::BTreeSet;
use std::time::Duration;

use rolegate_application::{AccessContext, AuthorizationRequest};
use rolegate_core::AppResult;
use rolegate_domain::{
    Decision, ExplanationNote, PermissionCode, PolicyFallback, PolicySource, RoleId,
    RoleSkipReason,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::parse_timestamp;

/// Incoming authorization question for the calling principal.
#[derive(Debug, Deserialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/authorize-request.ts"
)]
pub struct AuthorizeRequest {
    pub permission: String,
    /// RFC 3339 instant; call time when absent.
    pub as_of: Option<String>,
    pub deadline_ms: Option<u32>,
}

impl AuthorizeRequest {
    pub fn into_request(self, context: AccessContext) -> AppResult<AuthorizationRequest> {
        Ok(AuthorizationRequest {
            context,
            permission: PermissionCode::parse(self.permission.as_str())?,
            as_of: self
                .as_of
                .as_deref()
                .map(|value| parse_timestamp("as_of", value))
                .transpose()?,
            deadline: self
                .deadline_ms
                .filter(|deadline_ms| *deadline_ms > 0)
                .map(|deadline_ms| Duration::from_millis(u64::from(deadline_ms))),
        })
    }
}

/// One operator-facing explanation step.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/explanation-note-response.ts"
)]
pub struct ExplanationNoteResponse {
    pub kind: String,
    pub roles: Vec<String>,
    pub detail: Option<String>,
}

/// API representation of an authorization decision.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/decision-response.ts"
)]
pub struct DecisionResponse {
    pub allowed: bool,
    pub message: String,
    pub requested: String,
    pub matched_permission: Option<String>,
    pub contributing_roles: Vec<String>,
    pub policy_id: Option<String>,
    pub policy_code: Option<String>,
    pub policy_source: Option<String>,
    pub strategy: Option<String>,
    pub denial_code: Option<String>,
    pub explanation: Vec<ExplanationNoteResponse>,
}

/// Effective permission set of the calling principal.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/effective-permissions-response.ts"
)]
pub struct EffectivePermissionsResponse {
    pub user_id: String,
    pub tenant_id: String,
    pub permissions: Vec<String>,
}

impl EffectivePermissionsResponse {
    pub fn new(context: &AccessContext, permissions: BTreeSet<PermissionCode>) -> Self {
        Self {
            user_id: context.principal.user_id.to_string(),
            tenant_id: context.tenant.tenant_id.to_string(),
            permissions: permissions.into_iter().map(String::from).collect(),
        }
    }
}

impl From<Decision> for DecisionResponse {
    fn from(value: Decision) -> Self {
        let policy = value.policy_applied();
        Self {
            allowed: value.allowed(),
            message: value.user_message().to_owned(),
            requested: value.requested().to_string(),
            matched_permission: value.matched_permission().map(ToString::to_string),
            contributing_roles: role_strings(value.contributing_roles()),
            policy_id: policy.map(|policy| policy.policy_id.to_string()),
            policy_code: policy.map(|policy| policy.code.clone()),
            policy_source: policy
                .and_then(|policy| policy.source)
                .map(|source| policy_source_str(source).to_owned()),
            strategy: value
                .strategy_applied()
                .map(|strategy| strategy.as_str().to_owned()),
            denial_code: value.denial().map(|denial| denial.as_str().to_owned()),
            explanation: value
                .explanation()
                .iter()
                .map(ExplanationNoteResponse::from)
                .collect(),
        }
    }
}

impl From<&ExplanationNote> for ExplanationNoteResponse {
    fn from(value: &ExplanationNote) -> Self {
        let (kind, roles, detail) = match value {
            ExplanationNote::NoActiveRoles => ("no_active_roles", Vec::new(), None),
            ExplanationNote::PolicyFallback { reason } => {
                ("policy_fallback", Vec::new(), Some(fallback_detail(reason)))
            }
            ExplanationNote::AdminCarveOut { roles } => {
                ("admin_carve_out", role_strings(roles), None)
            }
            ExplanationNote::CapTruncated { cap, dropped } => (
                "cap_truncated",
                role_strings(dropped),
                Some(format!("max_concurrent_roles is {cap}")),
            ),
            ExplanationNote::RoleSkipped { role_id, reason } => (
                "role_skipped",
                vec![role_id.to_string()],
                Some(
                    match reason {
                        RoleSkipReason::Inactive => "role is inactive",
                        RoleSkipReason::Missing => "role does not exist",
                    }
                    .to_owned(),
                ),
            ),
            ExplanationNote::GlobalRulesExcluded { roles } => {
                ("global_rules_excluded", role_strings(roles), None)
            }
        };

        Self {
            kind: kind.to_owned(),
            roles,
            detail,
        }
    }
}

fn role_strings(roles: &[RoleId]) -> Vec<String> {
    roles.iter().map(ToString::to_string).collect()
}

fn policy_source_str(source: PolicySource) -> &'static str {
    match source {
        PolicySource::Assignment => "assignment",
        PolicySource::Principal => "principal",
        PolicySource::Tenant => "tenant",
        PolicySource::System => "system",
    }
}

fn fallback_detail(reason: &PolicyFallback) -> String {
    match reason {
        PolicyFallback::Missing { policy_id } => format!("policy '{policy_id}' does not exist"),
        PolicyFallback::Malformed { policy_id, detail } => {
            format!("policy '{policy_id}' is malformed: {detail}")
        }
        PolicyFallback::Unconfigured => "no conflict policy is configured".to_owned(),
    }
}
