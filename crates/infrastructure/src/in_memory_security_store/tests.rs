use chrono::Duration;

use rolegate_application::AuditQuery;
use rolegate_domain::{
    AppliesTo, AssignmentKey, ConflictPolicyInput, ConflictStrategy, PermissionAction,
    PermissionInput, RoleCategory, RoleInput, Scope,
};

use crate::InMemoryAuditSink;

use super::*;

/// Sink that refuses every write.
struct UnavailableAuditSink;

#[async_trait]
impl AuditSink for UnavailableAuditSink {
    async fn append(&self, _entry: AuditEntry) -> AppResult<()> {
        Err(AppError::AuditWriteFailure("audit sink offline".to_owned()))
    }

    async fn entries(&self, _query: AuditQuery) -> AppResult<Vec<AuditEntry>> {
        Ok(Vec::new())
    }
}

fn clerk_role() -> Role {
    let input = RoleInput {
        code: "orders.clerk".to_owned(),
        name: "Order Clerk".to_owned(),
        category: RoleCategory::TenantUser,
        level: 100,
        scope: Scope::Tenant,
        priority: 10,
        is_default: false,
        status: RecordStatus::Active,
    };
    match Role::new(RoleId::new(), input) {
        Ok(role) => role,
        Err(error) => panic!("invalid test role: {error}"),
    }
}

fn read_permission(status: RecordStatus) -> Permission {
    let input = PermissionInput {
        resource: "orders".to_owned(),
        action: PermissionAction::Read,
        scope: Scope::Tenant,
        applies_to: AppliesTo::Tenant,
        is_system: false,
        status,
    };
    match Permission::new(PermissionId::new(), input) {
        Ok(permission) => permission,
        Err(error) => panic!("invalid test permission: {error}"),
    }
}

fn assignment_input(user_id: UserId, role_id: RoleId, tenant_id: TenantId) -> AssignmentInput {
    let key = match AssignmentKey::new(user_id, role_id, Scope::Tenant, Some(tenant_id)) {
        Ok(key) => key,
        Err(error) => panic!("invalid test key: {error}"),
    };
    AssignmentInput {
        key,
        expires_at: None,
        granted_by: UserId::new(),
        conflict_policy_id: None,
    }
}

async fn store_with_role(audit: Arc<dyn AuditSink>) -> (InMemorySecurityStore, Role) {
    let store = InMemorySecurityStore::new(audit);
    let role = clerk_role();
    if let Err(error) = store.create_role(role.clone()).await {
        panic!("failed to seed role: {error}");
    }
    (store, role)
}

#[tokio::test]
async fn assignment_writes_are_idempotent_and_versioned() {
    let audit = Arc::new(InMemoryAuditSink::new());
    let (store, role) = store_with_role(audit.clone()).await;
    let user_id = UserId::new();
    let tenant_id = TenantId::new();
    let now = Utc::now();

    let first = store
        .create_assignment(assignment_input(user_id, role.id(), tenant_id), now)
        .await;
    let second = store
        .create_assignment(
            assignment_input(user_id, role.id(), tenant_id),
            now + Duration::seconds(1),
        )
        .await;

    let (Ok(first), Ok(second)) = (first, second) else {
        panic!("expected both writes to succeed");
    };
    assert!(first.was_created());
    assert!(!second.was_created());
    assert_eq!(first.value().id(), second.value().id());

    let version = store.policy_version(user_id).await;
    assert_eq!(version.ok().map(|version| version.principal), Some(1));

    let entries = audit.entries(AuditQuery::default()).await;
    assert_eq!(entries.ok().map(|entries| entries.len()), Some(1));
}

#[tokio::test]
async fn audit_failure_applies_nothing() {
    let (store, role) = store_with_role(Arc::new(UnavailableAuditSink)).await;
    let user_id = UserId::new();

    let result = store
        .create_assignment(
            assignment_input(user_id, role.id(), TenantId::new()),
            Utc::now(),
        )
        .await;

    assert!(matches!(result, Err(AppError::AuditWriteFailure(_))));
    let assignments = store
        .assignments_for(user_id, TenantId::new(), Utc::now())
        .await;
    assert!(matches!(assignments, Ok(ref rows) if rows.is_empty()));
    let version = store.policy_version(user_id).await;
    assert_eq!(version.ok().map(|version| version.principal), Some(0));
}

#[tokio::test]
async fn concurrent_assignments_settle_on_one_row() {
    let audit = Arc::new(InMemoryAuditSink::new());
    let (store, role) = store_with_role(audit).await;
    let store = Arc::new(store);
    let user_id = UserId::new();
    let tenant_id = TenantId::new();
    let now = Utc::now();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let input = assignment_input(user_id, role.id(), tenant_id);
            tokio::spawn(async move { store.create_assignment(input, now).await })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.await {
            Ok(Ok(outcome)) if outcome.was_created() => created += 1,
            Ok(Ok(_)) => {}
            Ok(Err(error)) => panic!("assignment failed: {error}"),
            Err(error) => panic!("task failed: {error}"),
        }
    }

    assert_eq!(created, 1);
    let rows = store.assignments_for(user_id, tenant_id, now).await;
    assert_eq!(rows.ok().map(|rows| rows.len()), Some(1));
}

#[tokio::test]
async fn revoke_covers_every_tenant_and_audits_each_row() {
    let audit = Arc::new(InMemoryAuditSink::new());
    let (store, role) = store_with_role(audit.clone()).await;
    let user_id = UserId::new();
    let admin_id = UserId::new();
    let granted_at = Utc::now() - Duration::minutes(5);

    for tenant_id in [TenantId::new(), TenantId::new()] {
        let created = store
            .create_assignment(assignment_input(user_id, role.id(), tenant_id), granted_at)
            .await;
        assert!(created.is_ok());
    }

    let revoked = store
        .revoke_assignments(RevokeAssignmentsInput {
            user_id,
            role_id: role.id(),
            reason: "left the team".to_owned(),
            revoked_by: admin_id,
            revoked_at: Utc::now(),
        })
        .await;
    assert_eq!(revoked.ok().map(|rows| rows.len()), Some(2));

    let revoked_entries = audit
        .entries(AuditQuery {
            action: Some(AuditAction::Revoked),
            ..AuditQuery::default()
        })
        .await;
    let Ok(revoked_entries) = revoked_entries else {
        panic!("expected audit entries");
    };
    assert_eq!(revoked_entries.len(), 2);
    assert!(
        revoked_entries
            .iter()
            .all(|entry| entry.reason() == Some("left the team") && entry.changed_by() == admin_id)
    );

    let version = store.policy_version(user_id).await;
    assert_eq!(version.ok().map(|version| version.principal), Some(3));
}

#[tokio::test]
async fn expired_assignment_can_be_granted_again() {
    let audit = Arc::new(InMemoryAuditSink::new());
    let (store, role) = store_with_role(audit).await;
    let user_id = UserId::new();
    let tenant_id = TenantId::new();
    let granted_at = Utc::now() - Duration::days(2);

    let mut expiring = assignment_input(user_id, role.id(), tenant_id);
    expiring.expires_at = Some(granted_at + Duration::days(1));
    let first = store.create_assignment(expiring, granted_at).await;
    let second = store
        .create_assignment(assignment_input(user_id, role.id(), tenant_id), Utc::now())
        .await;

    let (Ok(first), Ok(second)) = (first, second) else {
        panic!("expected both writes to succeed");
    };
    assert!(second.was_created());
    assert_ne!(first.value().id(), second.value().id());
}

#[tokio::test]
async fn grants_are_idempotent_and_hide_inactive_permissions() {
    let audit = Arc::new(InMemoryAuditSink::new());
    let (store, role) = store_with_role(audit.clone()).await;
    let active = read_permission(RecordStatus::Active);
    let inactive = match Permission::new(
        PermissionId::new(),
        PermissionInput {
            resource: "invoices".to_owned(),
            action: PermissionAction::Read,
            scope: Scope::Tenant,
            applies_to: AppliesTo::Tenant,
            is_system: false,
            status: RecordStatus::Inactive,
        },
    ) {
        Ok(permission) => permission,
        Err(error) => panic!("invalid test permission: {error}"),
    };
    for permission in [&active, &inactive] {
        assert!(store.create_permission(permission.clone()).await.is_ok());
    }

    let grant = |permission_id| RoleGrant {
        role_id: role.id(),
        permission_id,
        granted_at: Utc::now(),
        granted_by: UserId::new(),
    };
    let first = store.grant_permission(grant(active.id())).await;
    let again = store.grant_permission(grant(active.id())).await;
    let hidden = store.grant_permission(grant(inactive.id())).await;

    assert!(matches!(first, Ok(ref outcome) if outcome.was_created()));
    assert!(matches!(again, Ok(ref outcome) if !outcome.was_created()));
    assert!(hidden.is_ok());

    let permissions = store.permissions_of(role.id()).await;
    let Ok(permissions) = permissions else {
        panic!("expected permissions");
    };
    assert_eq!(permissions.len(), 1);
    assert_eq!(permissions.first().map(Permission::id), Some(active.id()));

    let granted_entries = audit
        .entries(AuditQuery {
            action: Some(AuditAction::Granted),
            ..AuditQuery::default()
        })
        .await;
    assert_eq!(granted_entries.ok().map(|entries| entries.len()), Some(2));
}

#[tokio::test]
async fn duplicate_codes_conflict() {
    let (store, _) = store_with_role(Arc::new(InMemoryAuditSink::new())).await;

    let duplicate_role = store.create_role(clerk_role()).await;
    assert!(matches!(duplicate_role, Err(AppError::Conflict(_))));

    let permission = read_permission(RecordStatus::Active);
    assert!(store.create_permission(permission).await.is_ok());
    let duplicate_permission = store
        .create_permission(read_permission(RecordStatus::Active))
        .await;
    assert!(matches!(duplicate_permission, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn policy_writes_bump_the_catalog_epoch() {
    let store = InMemorySecurityStore::new(Arc::new(InMemoryAuditSink::new()));
    let user_id = UserId::new();
    let before = store.policy_version(user_id).await;

    let policy = match ConflictPolicy::new(
        PolicyId::new(),
        ConflictPolicyInput {
            code: "tenant.union".to_owned(),
            conflict_strategy: ConflictStrategy::AllowUnion,
            max_concurrent_roles: None,
            use_role_priority: false,
            priority_direction: None,
            apply_global_rules: true,
            apply_to_admins: false,
            is_system: false,
        },
    ) {
        Ok(policy) => policy,
        Err(error) => panic!("invalid test policy: {error}"),
    };
    assert!(store.save_policy(policy.clone()).await.is_ok());

    let after = store.policy_version(user_id).await;
    let (Ok(before), Ok(after)) = (before, after) else {
        panic!("expected versions");
    };
    assert!(after > before);
    assert_eq!(
        store.find_policy(policy.id()).await.ok(),
        Some(PolicyLookup::Found(policy))
    );
    assert_eq!(
        store.find_policy(PolicyId::new()).await.ok(),
        Some(PolicyLookup::Missing)
    );
}

#[tokio::test]
async fn authorization_service_runs_on_in_memory_adapters() {
    use rolegate_application::{
        AccessContext, AssignRoleInput, AuthorizationRequest, AuthorizationService,
        AuthorizationSettings, PrincipalContext, SecurityStores, TenantContext,
    };

    use crate::InMemoryEffectivePermissionCache;

    let audit = Arc::new(InMemoryAuditSink::new());
    let (store, role) = store_with_role(audit.clone()).await;
    let permission = read_permission(RecordStatus::Active);
    assert!(store.create_permission(permission.clone()).await.is_ok());
    let granted = store
        .grant_permission(RoleGrant {
            role_id: role.id(),
            permission_id: permission.id(),
            granted_at: Utc::now(),
            granted_by: UserId::new(),
        })
        .await;
    assert!(granted.is_ok());

    let store = Arc::new(store);
    let service = AuthorizationService::new(
        SecurityStores {
            assignments: store.clone(),
            roles: store.clone(),
            permissions: store.clone(),
            policies: store,
            audit: audit.clone(),
            cache: Arc::new(InMemoryEffectivePermissionCache::new()),
        },
        AuthorizationSettings::default(),
    );

    let user_id = UserId::new();
    let admin_id = UserId::new();
    let tenant_id = TenantId::new();
    let context = AccessContext {
        principal: PrincipalContext {
            user_id,
            default_policy_id: None,
        },
        tenant: TenantContext {
            tenant_id,
            default_policy_id: None,
        },
    };
    let assign = AssignRoleInput {
        user_id,
        role_id: role.id(),
        scope: Scope::Tenant,
        tenant_context: Some(tenant_id),
        expires_at: None,
        granted_by: admin_id,
        conflict_policy_id: None,
    };
    let request = AuthorizationRequest::now(context, permission.code().clone());

    assert!(service.assign_role(assign.clone()).await.is_ok());
    assert!(service.authorize(request.clone()).await.allowed());

    let revoked = service
        .revoke_role(user_id, role.id(), "access review", admin_id)
        .await;
    assert_eq!(revoked.ok(), Some(true));
    assert!(!service.authorize(request.clone()).await.allowed());

    assert!(service.assign_role(assign).await.is_ok());
    assert!(service.authorize(request).await.allowed());

    let entries = audit
        .entries(AuditQuery {
            user_id: Some(user_id),
            ..AuditQuery::default()
        })
        .await;
    let Ok(entries) = entries else {
        panic!("expected audit entries");
    };
    let actions: Vec<AuditAction> = entries.iter().map(AuditEntry::action).collect();
    assert_eq!(
        actions,
        vec![AuditAction::Granted, AuditAction::Revoked, AuditAction::Granted]
    );
}
