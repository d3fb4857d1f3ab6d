use std::sync::Arc;

use rolegate_core::AppResult;
use rolegate_domain::RolePermissionSet;

use crate::role_assignment_resolver::ActiveRole;
use crate::security_ports::PermissionCatalog;

/// Expands active roles into their granted permission codes.
#[derive(Clone)]
pub struct PermissionSetBuilder {
    permissions: Arc<dyn PermissionCatalog>,
}

impl PermissionSetBuilder {
    /// Creates a builder over the permission catalog.
    #[must_use]
    pub fn new(permissions: Arc<dyn PermissionCatalog>) -> Self {
        Self { permissions }
    }

    /// Returns one set per role. A role without grants yields an empty set.
    pub async fn expand(&self, roles: &[ActiveRole]) -> AppResult<Vec<RolePermissionSet>> {
        let mut sets = Vec::with_capacity(roles.len());
        for active in roles {
            let permissions = self
                .permissions
                .permissions_of(active.role.id())
                .await?
                .into_iter()
                .map(|permission| permission.code().clone())
                .collect();

            sets.push(RolePermissionSet {
                role_id: active.role.id(),
                role_code: active.role.code().as_str().to_owned(),
                category: active.role.category(),
                priority: active.role.priority(),
                level: active.role.level(),
                granted_at: active.assignment.granted_at(),
                permissions,
            });
        }

        Ok(sets)
    }
}
