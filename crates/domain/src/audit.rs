use std::str::FromStr;

use chrono::{DateTime, Utc};
use rolegate_core::{AppError, TenantId, UserId};
use serde::{Deserialize, Serialize};

use crate::{AssignmentId, AuditEntryId, PermissionCode, PermissionId, RoleGrant, RoleId};

/// Transition recorded by an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    /// A grant or assignment came into force.
    Granted,
    /// A grant or assignment was withdrawn.
    Revoked,
    /// A sensitive authorization decision was made.
    Evaluated,
}

impl AuditAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "GRANTED",
            Self::Revoked => "REVOKED",
            Self::Evaluated => "EVALUATED",
        }
    }
}

impl FromStr for AuditAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "GRANTED" => Ok(Self::Granted),
            "REVOKED" => Ok(Self::Revoked),
            "EVALUATED" => Ok(Self::Evaluated),
            _ => Err(AppError::Validation(format!(
                "unknown audit action '{value}'"
            ))),
        }
    }
}

/// Record an audit entry is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditTarget {
    /// A role to permission grant.
    RoleGrant {
        /// Granting role.
        role_id: RoleId,
        /// Granted permission.
        permission_id: PermissionId,
    },
    /// A user role assignment.
    Assignment {
        /// Assignment row.
        assignment_id: AssignmentId,
        /// Principal.
        user_id: UserId,
        /// Assigned role.
        role_id: RoleId,
    },
    /// An authorization decision.
    Decision {
        /// Principal.
        user_id: UserId,
        /// Tenant evaluated.
        tenant_id: TenantId,
        /// Requested permission.
        permission: PermissionCode,
        /// Outcome.
        allowed: bool,
    },
}

/// Append-only history row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    id: AuditEntryId,
    target: AuditTarget,
    action: AuditAction,
    changed_at: DateTime<Utc>,
    changed_by: UserId,
    reason: Option<String>,
}

impl AuditEntry {
    /// Records a grant transition.
    #[must_use]
    pub fn role_grant(
        grant: &RoleGrant,
        action: AuditAction,
        changed_at: DateTime<Utc>,
        changed_by: UserId,
        reason: Option<String>,
    ) -> Self {
        Self::restore(
            AuditEntryId::new(),
            AuditTarget::RoleGrant {
                role_id: grant.role_id,
                permission_id: grant.permission_id,
            },
            action,
            changed_at,
            changed_by,
            reason,
        )
    }

    /// Records an assignment transition.
    #[must_use]
    pub fn assignment(
        assignment_id: AssignmentId,
        user_id: UserId,
        role_id: RoleId,
        action: AuditAction,
        changed_at: DateTime<Utc>,
        changed_by: UserId,
        reason: Option<String>,
    ) -> Self {
        Self::restore(
            AuditEntryId::new(),
            AuditTarget::Assignment {
                assignment_id,
                user_id,
                role_id,
            },
            action,
            changed_at,
            changed_by,
            reason,
        )
    }

    /// Records a sensitive decision made for `user_id`.
    #[must_use]
    pub fn decision(
        user_id: UserId,
        tenant_id: TenantId,
        permission: PermissionCode,
        allowed: bool,
        changed_at: DateTime<Utc>,
    ) -> Self {
        Self::restore(
            AuditEntryId::new(),
            AuditTarget::Decision {
                user_id,
                tenant_id,
                permission,
                allowed,
            },
            AuditAction::Evaluated,
            changed_at,
            user_id,
            None,
        )
    }

    /// Rebuilds an entry loaded from storage.
    #[must_use]
    pub fn restore(
        id: AuditEntryId,
        target: AuditTarget,
        action: AuditAction,
        changed_at: DateTime<Utc>,
        changed_by: UserId,
        reason: Option<String>,
    ) -> Self {
        Self {
            id,
            target,
            action,
            changed_at,
            changed_by,
            reason,
        }
    }

    /// Returns the entry identifier.
    #[must_use]
    pub fn id(&self) -> AuditEntryId {
        self.id
    }

    /// Returns the audited record.
    #[must_use]
    pub fn target(&self) -> &AuditTarget {
        &self.target
    }

    /// Returns the transition.
    #[must_use]
    pub fn action(&self) -> AuditAction {
        self.action
    }

    /// Returns when the transition happened.
    #[must_use]
    pub fn changed_at(&self) -> DateTime<Utc> {
        self.changed_at
    }

    /// Returns who caused the transition.
    #[must_use]
    pub fn changed_by(&self) -> UserId {
        self.changed_by
    }

    /// Returns the captured justification.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Returns the principal the entry concerns, if any.
    #[must_use]
    pub fn subject_user(&self) -> Option<UserId> {
        match &self.target {
            AuditTarget::Assignment { user_id, .. } | AuditTarget::Decision { user_id, .. } => {
                Some(*user_id)
            }
            AuditTarget::RoleGrant { .. } => None,
        }
    }

    /// Returns the role the entry concerns, if any.
    #[must_use]
    pub fn subject_role(&self) -> Option<RoleId> {
        match &self.target {
            AuditTarget::RoleGrant { role_id, .. } | AuditTarget::Assignment { role_id, .. } => {
                Some(*role_id)
            }
            AuditTarget::Decision { .. } => None,
        }
    }
}
