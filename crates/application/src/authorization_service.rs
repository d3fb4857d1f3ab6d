mod authorize;
mod mutations;
mod resolution;


use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use rolegate_core::{TenantId, UserId, UserIdentity};
use rolegate_domain::{PermissionCode, PolicyId, RoleId, Scope};

use crate::permission_set_builder::PermissionSetBuilder;
use crate::role_assignment_resolver::RoleAssignmentResolver;
use crate::security_ports::{
    AssignmentStore, AuditSink, EffectivePermissionCache, PermissionCatalog, PolicyStore,
    RoleCatalog,
};

/// Store handles shared by the security services.
#[derive(Clone)]
pub struct SecurityStores {
    /// User role assignments.
    pub assignments: Arc<dyn AssignmentStore>,
    /// Role definitions.
    pub roles: Arc<dyn RoleCatalog>,
    /// Permissions and role grants.
    pub permissions: Arc<dyn PermissionCatalog>,
    /// Conflict policies.
    pub policies: Arc<dyn PolicyStore>,
    /// Audit trail.
    pub audit: Arc<dyn AuditSink>,
    /// Effective permission cache.
    pub cache: Arc<dyn EffectivePermissionCache>,
}

/// Engine tuning passed at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationSettings {
    /// Time-to-live of cached effective permissions.
    pub cache_ttl_seconds: u32,
    /// Deadline applied when a request carries none.
    pub default_deadline: Duration,
    /// Resources whose decisions are written to the audit trail.
    pub sensitive_resources: BTreeSet<String>,
    /// Policy used when neither assignment, principal nor tenant names one.
    pub system_default_policy_id: Option<PolicyId>,
}

impl Default for AuthorizationSettings {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: 60,
            default_deadline: Duration::from_millis(250),
            sensitive_resources: BTreeSet::new(),
            system_default_policy_id: None,
        }
    }
}

impl AuthorizationSettings {
    /// Returns whether decisions on `permission` must be audited.
    #[must_use]
    pub fn is_sensitive(&self, permission: &PermissionCode) -> bool {
        self.sensitive_resources.contains(permission.resource())
    }
}

/// Principal facts consumed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrincipalContext {
    /// Principal.
    pub user_id: UserId,
    /// Principal default conflict policy.
    pub default_policy_id: Option<PolicyId>,
}

/// Tenant facts consumed by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TenantContext {
    /// Tenant evaluated.
    pub tenant_id: TenantId,
    /// Tenant default conflict policy.
    pub default_policy_id: Option<PolicyId>,
}

/// Principal and tenant of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessContext {
    /// Principal facts.
    pub principal: PrincipalContext,
    /// Tenant facts.
    pub tenant: TenantContext,
}

impl AccessContext {
    /// Builds a context without default policies.
    #[must_use]
    pub fn from_identity(identity: &UserIdentity) -> Self {
        Self {
            principal: PrincipalContext {
                user_id: identity.user_id(),
                default_policy_id: None,
            },
            tenant: TenantContext {
                tenant_id: identity.tenant_id(),
                default_policy_id: None,
            },
        }
    }

    /// Returns the same principal evaluated in `tenant_id`.
    ///
    /// The tenant default policy only carries over when the tenant is unchanged.
    #[must_use]
    pub fn in_tenant(&self, tenant_id: TenantId) -> Self {
        if tenant_id == self.tenant.tenant_id {
            return *self;
        }

        Self {
            principal: self.principal,
            tenant: TenantContext {
                tenant_id,
                default_policy_id: None,
            },
        }
    }
}

/// One authorization question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// Who asks and where.
    pub context: AccessContext,
    /// Requested `<resource>.<action>`.
    pub permission: PermissionCode,
    /// Evaluation instant, call time when absent.
    pub as_of: Option<DateTime<Utc>>,
    /// Caller deadline, the configured default when absent.
    pub deadline: Option<Duration>,
}

impl AuthorizationRequest {
    /// Builds a request evaluated at call time with the default deadline.
    #[must_use]
    pub fn now(context: AccessContext, permission: PermissionCode) -> Self {
        Self {
            context,
            permission,
            as_of: None,
            deadline: None,
        }
    }
}

/// Input for assigning a role to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignRoleInput {
    /// Principal receiving the role.
    pub user_id: UserId,
    /// Assigned role.
    pub role_id: RoleId,
    /// Assignment scope.
    pub scope: Scope,
    /// Tenant, required for tenant scope.
    pub tenant_context: Option<TenantId>,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Administrator granting the role.
    pub granted_by: UserId,
    /// Optional policy override.
    pub conflict_policy_id: Option<PolicyId>,
}

/// Public façade of the permission engine.
#[derive(Clone)]
pub struct AuthorizationService {
    stores: SecurityStores,
    resolver: RoleAssignmentResolver,
    builder: PermissionSetBuilder,
    settings: Arc<AuthorizationSettings>,
}

impl AuthorizationService {
    /// Creates a new authorization service from store implementations.
    #[must_use]
    pub fn new(stores: SecurityStores, settings: AuthorizationSettings) -> Self {
        let resolver = RoleAssignmentResolver::new(
            stores.assignments.clone(),
            stores.roles.clone(),
            stores.policies.clone(),
        );
        let builder = PermissionSetBuilder::new(stores.permissions.clone());

        Self {
            stores,
            resolver,
            builder,
            settings: Arc::new(settings),
        }
    }

    /// Returns the engine settings.
    #[must_use]
    pub fn settings(&self) -> &AuthorizationSettings {
        &self.settings
    }
}
