mod assignments;
mod catalog;
mod policies;


use rolegate_core::AppResult;
use rolegate_domain::{PermissionAction, PermissionCode};

use crate::authorization_service::{AccessContext, AuthorizationService, SecurityStores};

/// Resource guarding every administrative operation.
pub const RBAC_RESOURCE: &str = "rbac";

/// Application service for catalog, grant and policy administration.
#[derive(Clone)]
pub struct SecurityAdminService {
    authorization_service: AuthorizationService,
    stores: SecurityStores,
}

impl SecurityAdminService {
    /// Creates a new service from required dependencies.
    #[must_use]
    pub fn new(authorization_service: AuthorizationService, stores: SecurityStores) -> Self {
        Self {
            authorization_service,
            stores,
        }
    }

    async fn require_rbac_manage(&self, actor: &AccessContext) -> AppResult<()> {
        self.authorization_service
            .require_permission(actor, rbac_manage()?)
            .await
            .map(|_| ())
    }

    async fn require_global_rbac_manage(&self, actor: &AccessContext) -> AppResult<()> {
        self.authorization_service
            .require_global_permission(actor, rbac_manage()?)
            .await
    }
}

fn rbac_manage() -> AppResult<PermissionCode> {
    PermissionCode::from_parts(RBAC_RESOURCE, PermissionAction::Manage)
}
