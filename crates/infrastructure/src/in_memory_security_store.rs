//! In-memory adapter for the security store ports.

mod assignments;
mod catalog;
mod policies;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use rolegate_application::{
    AssignmentStore, AuditSink, PermissionCatalog, PolicyLookup, PolicyStore,
    RevokeAssignmentsInput, RevokePermissionInput, RoleCatalog, WriteOutcome,
};
use rolegate_core::{AppError, AppResult, TenantId, UserId};
use rolegate_domain::{
    AssignmentId, AssignmentInput, AuditAction, AuditEntry, ConflictPolicy, Permission,
    PermissionId, PolicyId, PolicyVersion, RecordStatus, Role, RoleGrant, RoleId,
    UserRoleAssignment,
};

#[derive(Default)]
struct SecurityState {
    roles: HashMap<RoleId, Role>,
    permissions: HashMap<PermissionId, Permission>,
    grants: Vec<RoleGrant>,
    policies: HashMap<PolicyId, ConflictPolicy>,
    assignments: Vec<UserRoleAssignment>,
    catalog_epoch: i64,
    principal_epochs: HashMap<UserId, i64>,
}

impl SecurityState {
    fn bump_catalog(&mut self) {
        self.catalog_epoch += 1;
    }

    fn bump_principal(&mut self, user_id: UserId) {
        *self.principal_epochs.entry(user_id).or_default() += 1;
    }
}

/// In-memory implementation of the assignment, catalog and policy stores.
///
/// Each mutation runs under one write lock and touches the state only after its audit
/// entries were accepted by the sink.
pub struct InMemorySecurityStore {
    state: RwLock<SecurityState>,
    audit: Arc<dyn AuditSink>,
}

impl InMemorySecurityStore {
    /// Creates an empty store writing its history to `audit`.
    #[must_use]
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self {
            state: RwLock::new(SecurityState::default()),
            audit,
        }
    }
}
