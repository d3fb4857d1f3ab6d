use chrono::{DateTime, Utc};
use rolegate_core::{AppError, AppResult, TenantId, UserId};
use serde::{Deserialize, Serialize};

use crate::{AssignmentId, PolicyId, RoleId, Scope};

/// Lifecycle of a user role assignment.
///
/// Expiry is derived from `expires_at` at evaluation time. `Revoked` and `Retired` are
/// terminal and an expired assignment never becomes active again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AssignmentState {
    /// Granted and not revoked.
    Active {
        /// Optional expiry instant, exclusive.
        expires_at: Option<DateTime<Utc>>,
    },
    /// Explicitly withdrawn.
    Revoked {
        /// Revocation instant.
        at: DateTime<Utc>,
        /// Administrator who revoked the assignment.
        by: UserId,
        /// Captured justification.
        reason: String,
    },
    /// Expired and cleared from the active set by storage.
    Retired {
        /// Expiry instant the assignment had.
        expired_at: DateTime<Utc>,
    },
}

impl AssignmentState {
    /// Rebuilds the state from the persisted flag and timestamp columns.
    pub fn from_columns(
        is_active: bool,
        expires_at: Option<DateTime<Utc>>,
        revoked_at: Option<DateTime<Utc>>,
        revoked_by: Option<UserId>,
        revoke_reason: Option<String>,
    ) -> AppResult<Self> {
        match (is_active, revoked_at, revoked_by) {
            (true, None, None) => Ok(Self::Active { expires_at }),
            (false, None, None) => match expires_at {
                Some(expired_at) => Ok(Self::Retired { expired_at }),
                None => Err(AppError::Internal(
                    "inactive assignment without revocation or expiry".to_owned(),
                )),
            },
            (false, Some(at), Some(by)) => Ok(Self::Revoked {
                at,
                by,
                reason: revoke_reason.unwrap_or_default(),
            }),
            _ => Err(AppError::Internal(format!(
                "inconsistent assignment columns (is_active={is_active}, revoked_at={revoked_at:?})"
            ))),
        }
    }

    /// Returns the `is_active` column value for this state.
    #[must_use]
    pub fn is_active_flag(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

/// Uniqueness key of an active assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssignmentKey {
    /// Principal.
    pub user_id: UserId,
    /// Assigned role.
    pub role_id: RoleId,
    /// Assignment scope.
    pub scope: Scope,
    /// Tenant the assignment is bound to, present iff scope is tenant.
    pub tenant_context: Option<TenantId>,
}

impl AssignmentKey {
    /// Creates a key after checking the scope and tenant context pairing.
    pub fn new(
        user_id: UserId,
        role_id: RoleId,
        scope: Scope,
        tenant_context: Option<TenantId>,
    ) -> AppResult<Self> {
        match (scope, tenant_context) {
            (Scope::Tenant, None) => Err(AppError::Validation(
                "tenant scoped assignments require a tenant context".to_owned(),
            )),
            (Scope::Global, Some(_)) => Err(AppError::Validation(
                "global assignments must not carry a tenant context".to_owned(),
            )),
            _ => Ok(Self {
                user_id,
                role_id,
                scope,
                tenant_context,
            }),
        }
    }
}

/// Input for a new assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentInput {
    /// Assignment identity.
    pub key: AssignmentKey,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Administrator granting the role.
    pub granted_by: UserId,
    /// Optional policy override for this assignment.
    pub conflict_policy_id: Option<PolicyId>,
}

/// User to role association with its own scope, expiry and revocation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRoleAssignment {
    id: AssignmentId,
    key: AssignmentKey,
    granted_at: DateTime<Utc>,
    granted_by: UserId,
    conflict_policy_id: Option<PolicyId>,
    state: AssignmentState,
}

impl UserRoleAssignment {
    /// Creates an active assignment granted at `granted_at`.
    pub fn grant(
        id: AssignmentId,
        input: AssignmentInput,
        granted_at: DateTime<Utc>,
    ) -> AppResult<Self> {
        if input
            .expires_at
            .is_some_and(|expires_at| expires_at <= granted_at)
        {
            return Err(AppError::Validation(
                "assignment expiry must be in the future".to_owned(),
            ));
        }

        Ok(Self {
            id,
            key: input.key,
            granted_at,
            granted_by: input.granted_by,
            conflict_policy_id: input.conflict_policy_id,
            state: AssignmentState::Active {
                expires_at: input.expires_at,
            },
        })
    }

    /// Rebuilds an assignment loaded from storage.
    #[must_use]
    pub fn restore(
        id: AssignmentId,
        key: AssignmentKey,
        granted_at: DateTime<Utc>,
        granted_by: UserId,
        conflict_policy_id: Option<PolicyId>,
        state: AssignmentState,
    ) -> Self {
        Self {
            id,
            key,
            granted_at,
            granted_by,
            conflict_policy_id,
            state,
        }
    }

    /// Returns the assignment identifier.
    #[must_use]
    pub fn id(&self) -> AssignmentId {
        self.id
    }

    /// Returns the uniqueness key.
    #[must_use]
    pub fn key(&self) -> AssignmentKey {
        self.key
    }

    /// Returns the principal.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.key.user_id
    }

    /// Returns the assigned role.
    #[must_use]
    pub fn role_id(&self) -> RoleId {
        self.key.role_id
    }

    /// Returns the assignment scope.
    #[must_use]
    pub fn scope(&self) -> Scope {
        self.key.scope
    }

    /// Returns the bound tenant, if any.
    #[must_use]
    pub fn tenant_context(&self) -> Option<TenantId> {
        self.key.tenant_context
    }

    /// Returns the grant instant.
    #[must_use]
    pub fn granted_at(&self) -> DateTime<Utc> {
        self.granted_at
    }

    /// Returns the granting administrator.
    #[must_use]
    pub fn granted_by(&self) -> UserId {
        self.granted_by
    }

    /// Returns the assignment-level policy override.
    #[must_use]
    pub fn conflict_policy_id(&self) -> Option<PolicyId> {
        self.conflict_policy_id
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> &AssignmentState {
        &self.state
    }

    /// Returns the expiry for active assignments.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            AssignmentState::Active { expires_at } => *expires_at,
            AssignmentState::Retired { expired_at } => Some(*expired_at),
            AssignmentState::Revoked { .. } => None,
        }
    }

    /// Returns whether the assignment counts at `instant`.
    ///
    /// Revoked assignments never count, not even for instants before the revocation.
    #[must_use]
    pub fn is_active_at(&self, instant: DateTime<Utc>) -> bool {
        if self.granted_at > instant {
            return false;
        }

        match &self.state {
            AssignmentState::Active { expires_at } => {
                expires_at.is_none_or(|expires_at| expires_at > instant)
            }
            AssignmentState::Revoked { .. } | AssignmentState::Retired { .. } => false,
        }
    }

    /// Returns whether the assignment reaches `tenant_id`.
    #[must_use]
    pub fn applies_to_tenant(&self, tenant_id: TenantId) -> bool {
        match self.key.scope {
            Scope::Global => true,
            Scope::Tenant => self.key.tenant_context == Some(tenant_id),
        }
    }

    /// Moves an active assignment to the terminal revoked state.
    pub fn revoke(&mut self, at: DateTime<Utc>, by: UserId, reason: &str) -> AppResult<()> {
        if !self.is_active_at(at) {
            return Err(AppError::Conflict(format!(
                "assignment '{}' is not active",
                self.id
            )));
        }

        self.state = AssignmentState::Revoked {
            at,
            by,
            reason: reason.to_owned(),
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rolegate_core::{TenantId, UserId};

    use super::{AssignmentInput, AssignmentKey, AssignmentState, UserRoleAssignment};
    use crate::{AssignmentId, RoleId, Scope};

    fn global_key() -> AssignmentKey {
        AssignmentKey {
            user_id: UserId::new(),
            role_id: RoleId::new(),
            scope: Scope::Global,
            tenant_context: None,
        }
    }

    #[test]
    fn tenant_scope_requires_context() {
        let key = AssignmentKey::new(UserId::new(), RoleId::new(), Scope::Tenant, None);
        assert!(key.is_err());

        let key = AssignmentKey::new(
            UserId::new(),
            RoleId::new(),
            Scope::Global,
            Some(TenantId::new()),
        );
        assert!(key.is_err());
    }

    #[test]
    fn expiry_is_computed_without_revocation() {
        let granted_at = Utc::now() - Duration::hours(2);
        let assignment = UserRoleAssignment::grant(
            AssignmentId::new(),
            AssignmentInput {
                key: global_key(),
                expires_at: Some(granted_at + Duration::hours(1)),
                granted_by: UserId::new(),
                conflict_policy_id: None,
            },
            granted_at,
        );
        let Ok(assignment) = assignment else {
            panic!("expected a valid assignment");
        };

        assert!(assignment.is_active_at(granted_at + Duration::minutes(30)));
        assert!(!assignment.is_active_at(Utc::now()));
        assert!(assignment.state().is_active_flag());
    }

    #[test]
    fn revoked_assignment_cannot_be_revoked_again() {
        let now = Utc::now();
        let Ok(mut assignment) = UserRoleAssignment::grant(
            AssignmentId::new(),
            AssignmentInput {
                key: global_key(),
                expires_at: None,
                granted_by: UserId::new(),
                conflict_policy_id: None,
            },
            now,
        ) else {
            panic!("expected a valid assignment");
        };

        assert!(assignment.revoke(now, UserId::new(), "policy change").is_ok());
        assert!(!assignment.is_active_at(now));
        assert!(assignment.revoke(now, UserId::new(), "again").is_err());
    }

    #[test]
    fn inconsistent_columns_are_rejected() {
        let state = AssignmentState::from_columns(true, None, Some(Utc::now()), None, None);
        assert!(state.is_err());

        let state = AssignmentState::from_columns(false, None, None, None, None);
        assert!(state.is_err());
    }

    #[test]
    fn cleared_rows_with_an_expiry_never_count() {
        let now = Utc::now();

        for expires_at in [now - Duration::days(1), now + Duration::days(30)] {
            let Ok(state) = AssignmentState::from_columns(false, Some(expires_at), None, None, None)
            else {
                panic!("expected a retired state");
            };
            assert_eq!(
                state,
                AssignmentState::Retired {
                    expired_at: expires_at
                }
            );
            assert!(!state.is_active_flag());

            let assignment = UserRoleAssignment::restore(
                AssignmentId::new(),
                global_key(),
                now - Duration::days(2),
                UserId::new(),
                None,
                state,
            );
            assert!(!assignment.is_active_at(now));
        }
    }
}
