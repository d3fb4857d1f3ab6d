//! Application services and ports.

#![forbid(unsafe_code)]

mod authorization_service;
mod permission_set_builder;
mod role_assignment_resolver;
mod security_admin_service;
mod security_ports;

#[cfg(test)]
mod test_fakes;

pub use authorization_service::{
    AccessContext, AssignRoleInput, AuthorizationRequest, AuthorizationService,
    AuthorizationSettings, PrincipalContext, SecurityStores, TenantContext,
};
pub use permission_set_builder::PermissionSetBuilder;
pub use role_assignment_resolver::{ActiveAssignments, ActiveRole, RoleAssignmentResolver};
pub use security_admin_service::{RBAC_RESOURCE, SecurityAdminService};
pub use security_ports::{
    AssignmentStore, AuditQuery, AuditSink, CacheKey, CachedPermissions,
    EffectivePermissionCache, PermissionCatalog, PolicyChain, PolicyLookup, PolicyStore,
    RevokeAssignmentsInput, RevokePermissionInput, RoleCatalog, WriteOutcome,
};
