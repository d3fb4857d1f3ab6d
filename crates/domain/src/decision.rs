use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{
    ConflictStrategy, PermissionCode, PolicyFallback, PolicyId, PolicySelection, PolicySource,
    Resolution, RoleId,
};

/// Message shown to end users for every denial.
pub const ACCESS_DENIED_MESSAGE: &str = "access denied";

/// Why a role reachable through an assignment contributed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSkipReason {
    /// The role is marked inactive.
    Inactive,
    /// The role no longer exists in the catalog.
    Missing,
}

/// Operator-facing note describing one step of an evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "note", rename_all = "snake_case")]
pub enum ExplanationNote {
    /// The principal holds no active role in this tenant.
    NoActiveRoles,
    /// The configured policy was replaced by the fail-closed policy.
    PolicyFallback {
        /// Substitution reason.
        reason: PolicyFallback,
    },
    /// Manager admin roles were unioned in after the strategy ran.
    AdminCarveOut {
        /// Carved-out roles.
        roles: Vec<RoleId>,
    },
    /// Lower-ranked roles were dropped to honor `max_concurrent_roles`.
    CapTruncated {
        /// Configured cap.
        cap: u32,
        /// Dropped roles, best-ranked first.
        dropped: Vec<RoleId>,
    },
    /// A role was ignored.
    RoleSkipped {
        /// Ignored role.
        role_id: RoleId,
        /// Reason.
        reason: RoleSkipReason,
    },
    /// Global assignments were left out because the policy does not apply global rules.
    GlobalRulesExcluded {
        /// Excluded roles.
        roles: Vec<RoleId>,
    },
}

/// Diagnostic code attached to a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenialCode {
    /// The effective set does not contain the requested permission.
    NoMatchingPermission,
    /// The evaluation missed its deadline.
    Timeout,
    /// A store or catalog lookup failed during resolution.
    ResolutionFailed,
    /// A sensitive decision could not be audited.
    AuditUnavailable,
}

impl DenialCode {
    /// Returns a stable value for logs and operator payloads.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoMatchingPermission => "NO_MATCHING_PERMISSION",
            Self::Timeout => "TIMEOUT",
            Self::ResolutionFailed => "RESOLUTION_FAILED",
            Self::AuditUnavailable => "AUDIT_UNAVAILABLE",
        }
    }
}

impl Display for DenialCode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Policy that produced a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedPolicy {
    /// Policy identifier.
    pub policy_id: PolicyId,
    /// Policy code.
    pub code: String,
    /// Precedence level, `None` for the fail-closed substitute.
    pub source: Option<PolicySource>,
}

/// Authoritative answer to one authorization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    allowed: bool,
    requested: PermissionCode,
    matched_permission: Option<PermissionCode>,
    contributing_roles: Vec<RoleId>,
    policy_applied: Option<AppliedPolicy>,
    strategy_applied: Option<ConflictStrategy>,
    explanation: Vec<ExplanationNote>,
    denial: Option<DenialCode>,
}

impl Decision {
    /// Checks `requested` against a resolved effective set.
    #[must_use]
    pub fn evaluate(
        requested: PermissionCode,
        selection: &PolicySelection,
        resolution: Resolution,
    ) -> Self {
        let matched_permission = resolution.matching_permission(&requested);
        let allowed = matched_permission.is_some();
        let policy = selection.policy();

        Self {
            allowed,
            requested,
            matched_permission,
            contributing_roles: resolution.contributing_roles,
            policy_applied: Some(AppliedPolicy {
                policy_id: policy.id(),
                code: policy.code().to_owned(),
                source: selection.source(),
            }),
            strategy_applied: Some(resolution.strategy_applied),
            explanation: resolution.notes,
            denial: (!allowed).then_some(DenialCode::NoMatchingPermission),
        }
    }

    /// Builds a denial for an evaluation that could not complete.
    #[must_use]
    pub fn fail_closed(requested: PermissionCode, code: DenialCode) -> Self {
        Self {
            allowed: false,
            requested,
            matched_permission: None,
            contributing_roles: Vec::new(),
            policy_applied: None,
            strategy_applied: None,
            explanation: Vec::new(),
            denial: Some(code),
        }
    }

    /// Turns this decision into a denial while keeping its explanation.
    #[must_use]
    pub fn into_denial(self, code: DenialCode) -> Self {
        Self {
            allowed: false,
            matched_permission: None,
            denial: Some(code),
            ..self
        }
    }

    /// Returns whether access is granted.
    #[must_use]
    pub fn allowed(&self) -> bool {
        self.allowed
    }

    /// Returns the requested permission.
    #[must_use]
    pub fn requested(&self) -> &PermissionCode {
        &self.requested
    }

    /// Returns the effective permission that granted access.
    #[must_use]
    pub fn matched_permission(&self) -> Option<&PermissionCode> {
        self.matched_permission.as_ref()
    }

    /// Returns the roles that shaped the effective set.
    #[must_use]
    pub fn contributing_roles(&self) -> &[RoleId] {
        &self.contributing_roles
    }

    /// Returns the policy in force, absent when the evaluation failed.
    #[must_use]
    pub fn policy_applied(&self) -> Option<&AppliedPolicy> {
        self.policy_applied.as_ref()
    }

    /// Returns the strategy that ran.
    #[must_use]
    pub fn strategy_applied(&self) -> Option<ConflictStrategy> {
        self.strategy_applied
    }

    /// Returns operator-facing notes.
    #[must_use]
    pub fn explanation(&self) -> &[ExplanationNote] {
        &self.explanation
    }

    /// Returns the diagnostic code of a denial.
    #[must_use]
    pub fn denial(&self) -> Option<DenialCode> {
        self.denial
    }

    /// Returns the only text end users may see.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        if self.allowed {
            "access granted"
        } else {
            ACCESS_DENIED_MESSAGE
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{DenialCode, Decision};
    use crate::{
        ConflictStrategy, PermissionCode, PolicyFallback, PolicySelection, Resolution, RoleId,
    };

    fn code(value: &str) -> PermissionCode {
        match PermissionCode::parse(value) {
            Ok(code) => code,
            Err(error) => panic!("invalid test code: {error}"),
        }
    }

    #[test]
    fn denial_never_leaks_details_to_users() {
        let decision = Decision::fail_closed(code("payroll.read"), DenialCode::Timeout);
        assert!(!decision.allowed());
        assert_eq!(decision.user_message(), "access denied");
        assert_eq!(decision.denial(), Some(DenialCode::Timeout));
    }

    #[test]
    fn audit_failure_turns_grant_into_denial() {
        let resolution = Resolution {
            effective: BTreeSet::from([code("payroll.read")]),
            contributing_roles: vec![RoleId::new()],
            strategy_applied: ConflictStrategy::DenyOverride,
            notes: Vec::new(),
        };
        let selection = PolicySelection::fail_closed(PolicyFallback::Unconfigured);
        let decision = Decision::evaluate(code("payroll.read"), &selection, resolution);
        assert!(decision.allowed());

        let decision = decision.into_denial(DenialCode::AuditUnavailable);
        assert!(!decision.allowed());
        assert!(decision.matched_permission().is_none());
        assert_eq!(decision.contributing_roles().len(), 1);
    }
}
