use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use rolegate_core::{AppError, AppResult, TenantId, UserId};
use rolegate_domain::{
    AssignmentId, AssignmentInput, AuditAction, AuditEntry, ConflictPolicy, ConflictPolicyInput,
    ConflictStrategy, Permission, PermissionAction, PermissionId, PermissionInput, PolicyId,
    PolicyVersion, PriorityDirection, RecordStatus, Role, RoleCategory, RoleGrant, RoleId,
    RoleInput, Scope, UserRoleAssignment,
};

use crate::authorization_service::{AccessContext, PrincipalContext, SecurityStores, TenantContext};
use crate::security_ports::{
    AssignmentStore, AuditQuery, AuditSink, CacheKey, CachedPermissions,
    EffectivePermissionCache, PermissionCatalog, PolicyLookup, PolicyStore,
    RevokeAssignmentsInput, RevokePermissionInput, RoleCatalog, WriteOutcome,
};

#[derive(Default)]
pub(crate) struct FakeState {
    pub assignments: Vec<UserRoleAssignment>,
    pub roles: HashMap<RoleId, Role>,
    pub permissions: HashMap<PermissionId, Permission>,
    pub grants: Vec<RoleGrant>,
    pub policies: HashMap<PolicyId, PolicyLookup>,
    pub audit: Vec<AuditEntry>,
    pub cache: HashMap<CacheKey, CachedPermissions>,
    pub catalog_epoch: i64,
    pub principal_epochs: HashMap<UserId, i64>,
    pub permission_lookups: usize,
    pub fail_assignment_reads: bool,
    pub assignment_read_delay: Option<Duration>,
    pub fail_audit: bool,
}

#[derive(Default)]
pub(crate) struct FakeSecurityStore {
    pub state: Mutex<FakeState>,
}

impl FakeSecurityStore {
    pub fn stores(self: &Arc<Self>) -> SecurityStores {
        SecurityStores {
            assignments: self.clone(),
            roles: self.clone(),
            permissions: self.clone(),
            policies: self.clone(),
            audit: self.clone(),
            cache: self.clone(),
        }
    }

    pub async fn seed_role(&self, role: &Role, permissions: &[&Permission]) {
        let mut state = self.state.lock().await;
        state.roles.insert(role.id(), role.clone());
        for permission in permissions {
            state
                .permissions
                .insert(permission.id(), (*permission).clone());
            state.grants.push(RoleGrant {
                role_id: role.id(),
                permission_id: permission.id(),
                granted_at: Utc::now(),
                granted_by: UserId::new(),
            });
        }
    }

    pub async fn seed_policy(&self, policy: &ConflictPolicy) {
        self.state
            .lock()
            .await
            .policies
            .insert(policy.id(), PolicyLookup::Found(policy.clone()));
    }

    pub async fn seed_assignment(&self, assignment: UserRoleAssignment) {
        self.state.lock().await.assignments.push(assignment);
    }
}

pub(crate) fn tenant_role(code: &str, priority: i32) -> Role {
    role(code, RoleCategory::TenantUser, Scope::Tenant, priority)
}

pub(crate) fn role(code: &str, category: RoleCategory, scope: Scope, priority: i32) -> Role {
    let level = match category {
        RoleCategory::ManagerAdmin => 1,
        RoleCategory::PlatformSupport => 20,
        RoleCategory::TenantAdmin => 50,
        RoleCategory::TenantUser => 100,
    };
    let input = RoleInput {
        code: code.to_owned(),
        name: code.to_owned(),
        category,
        level,
        scope,
        priority,
        is_default: false,
        status: RecordStatus::Active,
    };

    match Role::new(RoleId::new(), input) {
        Ok(role) => role,
        Err(error) => panic!("invalid test role: {error}"),
    }
}

pub(crate) fn permission(resource: &str, action: PermissionAction) -> Permission {
    let input = PermissionInput {
        resource: resource.to_owned(),
        action,
        scope: Scope::Tenant,
        applies_to: rolegate_domain::AppliesTo::Tenant,
        is_system: false,
        status: RecordStatus::Active,
    };

    match Permission::new(PermissionId::new(), input) {
        Ok(permission) => permission,
        Err(error) => panic!("invalid test permission: {error}"),
    }
}

pub(crate) fn policy(
    strategy: ConflictStrategy,
    direction: Option<PriorityDirection>,
    max_concurrent_roles: Option<i64>,
) -> ConflictPolicy {
    let input = ConflictPolicyInput {
        code: format!("test.{}", strategy.as_str().to_ascii_lowercase()),
        conflict_strategy: strategy,
        max_concurrent_roles,
        use_role_priority: direction.is_some(),
        priority_direction: direction,
        apply_global_rules: true,
        apply_to_admins: false,
        is_system: false,
    };

    match ConflictPolicy::new(PolicyId::new(), input) {
        Ok(policy) => policy,
        Err(error) => panic!("invalid test policy: {error}"),
    }
}

pub(crate) fn assignment(
    user_id: UserId,
    role: &Role,
    tenant_id: Option<TenantId>,
    granted_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
) -> UserRoleAssignment {
    let scope = if tenant_id.is_some() {
        Scope::Tenant
    } else {
        Scope::Global
    };
    let key = match rolegate_domain::AssignmentKey::new(user_id, role.id(), scope, tenant_id) {
        Ok(key) => key,
        Err(error) => panic!("invalid test key: {error}"),
    };

    match UserRoleAssignment::grant(
        AssignmentId::new(),
        AssignmentInput {
            key,
            expires_at,
            granted_by: UserId::new(),
            conflict_policy_id: None,
        },
        granted_at,
    ) {
        Ok(assignment) => assignment,
        Err(error) => panic!("invalid test assignment: {error}"),
    }
}

pub(crate) fn context(
    user_id: UserId,
    tenant_id: TenantId,
    tenant_policy: Option<PolicyId>,
) -> AccessContext {
    AccessContext {
        principal: PrincipalContext {
            user_id,
            default_policy_id: None,
        },
        tenant: TenantContext {
            tenant_id,
            default_policy_id: tenant_policy,
        },
    }
}

#[async_trait]
impl AssignmentStore for FakeSecurityStore {
    async fn assignments_for(
        &self,
        user_id: UserId,
        _tenant_id: TenantId,
        _as_of: DateTime<Utc>,
    ) -> AppResult<Vec<UserRoleAssignment>> {
        let delay = {
            let state = self.state.lock().await;
            if state.fail_assignment_reads {
                return Err(AppError::Internal("assignment store offline".to_owned()));
            }
            state.assignment_read_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        Ok(self
            .state
            .lock()
            .await
            .assignments
            .iter()
            .filter(|assignment| assignment.user_id() == user_id)
            .cloned()
            .collect())
    }

    async fn create_assignment(
        &self,
        input: AssignmentInput,
        granted_at: DateTime<Utc>,
    ) -> AppResult<WriteOutcome<UserRoleAssignment>> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.assignments.iter().find(|assignment| {
            assignment.key() == input.key && assignment.is_active_at(granted_at)
        }) {
            return Ok(WriteOutcome::Existing(existing.clone()));
        }

        let assignment = UserRoleAssignment::grant(AssignmentId::new(), input, granted_at)?;
        let entry = AuditEntry::assignment(
            assignment.id(),
            assignment.user_id(),
            assignment.role_id(),
            AuditAction::Granted,
            granted_at,
            assignment.granted_by(),
            None,
        );
        if state.fail_audit {
            return Err(AppError::AuditWriteFailure("audit sink offline".to_owned()));
        }

        state.audit.push(entry);
        *state
            .principal_epochs
            .entry(assignment.user_id())
            .or_default() += 1;
        state.assignments.push(assignment.clone());
        Ok(WriteOutcome::Created(assignment))
    }

    async fn revoke_assignments(
        &self,
        input: RevokeAssignmentsInput,
    ) -> AppResult<Vec<UserRoleAssignment>> {
        let mut state = self.state.lock().await;
        let mut revoked = Vec::new();
        for assignment in &mut state.assignments {
            if assignment.user_id() == input.user_id
                && assignment.role_id() == input.role_id
                && assignment.is_active_at(input.revoked_at)
            {
                assignment.revoke(input.revoked_at, input.revoked_by, &input.reason)?;
                revoked.push(assignment.clone());
            }
        }

        for assignment in &revoked {
            state.audit.push(AuditEntry::assignment(
                assignment.id(),
                assignment.user_id(),
                assignment.role_id(),
                AuditAction::Revoked,
                input.revoked_at,
                input.revoked_by,
                Some(input.reason.clone()),
            ));
        }
        if !revoked.is_empty() {
            *state.principal_epochs.entry(input.user_id).or_default() += 1;
        }

        Ok(revoked)
    }

    async fn policy_version(&self, user_id: UserId) -> AppResult<PolicyVersion> {
        let state = self.state.lock().await;
        Ok(PolicyVersion {
            catalog: state.catalog_epoch,
            principal: state
                .principal_epochs
                .get(&user_id)
                .copied()
                .unwrap_or_default(),
        })
    }
}

#[async_trait]
impl RoleCatalog for FakeSecurityStore {
    async fn role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self.state.lock().await.roles.get(&role_id).cloned())
    }

    async fn roles(&self, role_ids: &[RoleId]) -> AppResult<Vec<Role>> {
        let state = self.state.lock().await;
        Ok(role_ids
            .iter()
            .filter_map(|role_id| state.roles.get(role_id).cloned())
            .collect())
    }

    async fn create_role(&self, role: Role) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state
            .roles
            .values()
            .any(|existing| existing.code() == role.code())
        {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.code()
            )));
        }
        state.roles.insert(role.id(), role);
        state.catalog_epoch += 1;
        Ok(())
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        Ok(self.state.lock().await.roles.values().cloned().collect())
    }
}

#[async_trait]
impl PermissionCatalog for FakeSecurityStore {
    async fn permissions_of(&self, role_id: RoleId) -> AppResult<Vec<Permission>> {
        let mut state = self.state.lock().await;
        state.permission_lookups += 1;
        Ok(state
            .grants
            .iter()
            .filter(|grant| grant.role_id == role_id)
            .filter_map(|grant| state.permissions.get(&grant.permission_id).cloned())
            .filter(|permission| permission.status() == RecordStatus::Active)
            .collect())
    }

    async fn permission(&self, permission_id: PermissionId) -> AppResult<Option<Permission>> {
        Ok(self
            .state
            .lock()
            .await
            .permissions
            .get(&permission_id)
            .cloned())
    }

    async fn create_permission(&self, permission: Permission) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state.permissions.insert(permission.id(), permission);
        state.catalog_epoch += 1;
        Ok(())
    }

    async fn grant_permission(&self, grant: RoleGrant) -> AppResult<WriteOutcome<RoleGrant>> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.grants.iter().find(|existing| {
            existing.role_id == grant.role_id && existing.permission_id == grant.permission_id
        }) {
            return Ok(WriteOutcome::Existing(existing.clone()));
        }

        if state.fail_audit {
            return Err(AppError::AuditWriteFailure("audit sink offline".to_owned()));
        }
        state.audit.push(AuditEntry::role_grant(
            &grant,
            AuditAction::Granted,
            grant.granted_at,
            grant.granted_by,
            None,
        ));
        state.grants.push(grant.clone());
        state.catalog_epoch += 1;
        Ok(WriteOutcome::Created(grant))
    }

    async fn revoke_permission(&self, input: RevokePermissionInput) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let Some(index) = state.grants.iter().position(|grant| {
            grant.role_id == input.role_id && grant.permission_id == input.permission_id
        }) else {
            return Ok(false);
        };

        let grant = state.grants.remove(index);
        state.audit.push(AuditEntry::role_grant(
            &grant,
            AuditAction::Revoked,
            input.revoked_at,
            input.revoked_by,
            input.reason,
        ));
        state.catalog_epoch += 1;
        Ok(true)
    }

    async fn list_permissions(&self) -> AppResult<Vec<Permission>> {
        Ok(self
            .state
            .lock()
            .await
            .permissions
            .values()
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PolicyStore for FakeSecurityStore {
    async fn find_policy(&self, policy_id: PolicyId) -> AppResult<PolicyLookup> {
        Ok(self
            .state
            .lock()
            .await
            .policies
            .get(&policy_id)
            .cloned()
            .unwrap_or(PolicyLookup::Missing))
    }

    async fn save_policy(&self, policy: ConflictPolicy) -> AppResult<()> {
        let mut state = self.state.lock().await;
        state
            .policies
            .insert(policy.id(), PolicyLookup::Found(policy));
        state.catalog_epoch += 1;
        Ok(())
    }

    async fn list_policies(&self) -> AppResult<Vec<ConflictPolicy>> {
        Ok(self
            .state
            .lock()
            .await
            .policies
            .values()
            .filter_map(|lookup| match lookup {
                PolicyLookup::Found(policy) => Some(policy.clone()),
                PolicyLookup::Missing | PolicyLookup::Malformed(_) => None,
            })
            .collect())
    }
}

#[async_trait]
impl AuditSink for FakeSecurityStore {
    async fn append(&self, entry: AuditEntry) -> AppResult<()> {
        let mut state = self.state.lock().await;
        if state.fail_audit {
            return Err(AppError::AuditWriteFailure("audit sink offline".to_owned()));
        }
        state.audit.push(entry);
        Ok(())
    }

    async fn entries(&self, query: AuditQuery) -> AppResult<Vec<AuditEntry>> {
        Ok(self
            .state
            .lock()
            .await
            .audit
            .iter()
            .filter(|entry| query.matches(entry))
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EffectivePermissionCache for FakeSecurityStore {
    async fn get(&self, key: &CacheKey) -> AppResult<Option<CachedPermissions>> {
        Ok(self.state.lock().await.cache.get(key).cloned())
    }

    async fn put(
        &self,
        key: CacheKey,
        value: CachedPermissions,
        _ttl_seconds: u32,
    ) -> AppResult<()> {
        self.state.lock().await.cache.insert(key, value);
        Ok(())
    }

    async fn invalidate_principal(&self, user_id: UserId) -> AppResult<()> {
        self.state
            .lock()
            .await
            .cache
            .retain(|key, _| key.user_id != user_id);
        Ok(())
    }
}
