use async_trait::async_trait;
use chrono::{DateTime, Utc};

use rolegate_core::{AppResult, TenantId, UserId};
use rolegate_domain::{AssignmentInput, PolicyVersion, RoleId, UserRoleAssignment};

/// Result of an idempotent write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome<T> {
    /// A new row was committed together with its audit entry.
    Created(T),
    /// An equivalent row already existed and was returned unchanged.
    Existing(T),
}

impl<T> WriteOutcome<T> {
    /// Returns the written or existing value.
    #[must_use]
    pub fn value(&self) -> &T {
        match self {
            Self::Created(value) | Self::Existing(value) => value,
        }
    }

    /// Consumes the outcome and returns its value.
    #[must_use]
    pub fn into_value(self) -> T {
        match self {
            Self::Created(value) | Self::Existing(value) => value,
        }
    }

    /// Returns whether the write created a new row.
    #[must_use]
    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Input for revoking every active assignment of one role for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokeAssignmentsInput {
    /// Principal.
    pub user_id: UserId,
    /// Role to withdraw.
    pub role_id: RoleId,
    /// Captured justification.
    pub reason: String,
    /// Administrator revoking the role.
    pub revoked_by: UserId,
    /// Revocation instant.
    pub revoked_at: DateTime<Utc>,
}

/// Durable store of user role assignments.
///
/// Every write commits the assignment rows, the principal epoch bump and one audit entry
/// per transition as a single unit, or applies nothing.
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// Returns the user's assignments that may apply in `tenant_id` at `as_of`.
    ///
    /// Implementations may return extra rows; callers re-check activity and scope.
    async fn assignments_for(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
        as_of: DateTime<Utc>,
    ) -> AppResult<Vec<UserRoleAssignment>>;

    /// Creates an assignment unless an active one exists for the same key.
    async fn create_assignment(
        &self,
        input: AssignmentInput,
        granted_at: DateTime<Utc>,
    ) -> AppResult<WriteOutcome<UserRoleAssignment>>;

    /// Revokes every assignment of the role active at `revoked_at` and returns them.
    async fn revoke_assignments(
        &self,
        input: RevokeAssignmentsInput,
    ) -> AppResult<Vec<UserRoleAssignment>>;

    /// Returns the current version of everything feeding the user's permissions.
    async fn policy_version(&self, user_id: UserId) -> AppResult<PolicyVersion>;
}
