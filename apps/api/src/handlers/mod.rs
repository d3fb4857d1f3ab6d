use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;

use rolegate_application::AccessContext;

use crate::dto::{
    AssignRoleRequest, AssignmentResponse, AuditEntryResponse, AuditQueryParams,
    AuthorizeRequest, ConflictPolicyResponse, CreatePermissionRequest, CreateRoleRequest,
    DecisionResponse, EffectivePermissionsResponse, PermissionResponse, RevokePermissionQuery,
    RevokeResponse, RevokeRoleRequest, RoleGrantResponse, RoleResponse,
    SaveConflictPolicyRequest,
};
use crate::error::ApiResult;
use crate::state::AppState;

mod assignments;
mod audit;
mod authorization;
mod catalog;
mod health;
mod policies;


pub use assignments::{assign_role_handler, revoke_role_handler};
pub use audit::list_audit_entries_handler;
pub use authorization::{authorize_handler, effective_permissions_handler};
pub use catalog::{
    create_permission_handler, create_role_handler, grant_permission_handler,
    list_permissions_handler, list_roles_handler, revoke_permission_handler,
};
pub use health::health_handler;
pub use policies::{list_policies_handler, save_policy_handler};
