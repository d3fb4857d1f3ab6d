mod assignments;
mod audit;
mod authorization;
mod catalog;
mod common;
mod policies;

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rolegate_core::{AppError, AppResult};

pub use assignments::{AssignRoleRequest, AssignmentResponse, RevokeRoleRequest};
pub use audit::{AuditEntryResponse, AuditQueryParams};
pub use authorization::{AuthorizeRequest, DecisionResponse, EffectivePermissionsResponse};
pub use catalog::{
    CreatePermissionRequest, CreateRoleRequest, PermissionResponse, RevokePermissionQuery,
    RoleGrantResponse, RoleResponse,
};
pub use common::{HealthDependencyStatus, HealthResponse, RevokeResponse};
pub use policies::{ConflictPolicyResponse, SaveConflictPolicyRequest};

/// Parses an enum transported as its storage value, case-insensitively.
fn parse_enum<T>(value: &str) -> AppResult<T>
where
    T: FromStr<Err = AppError>,
{
    T::from_str(value.trim().to_ascii_uppercase().as_str())
}

fn parse_uuid(field: &str, value: &str) -> AppResult<uuid::Uuid> {
    uuid::Uuid::parse_str(value.trim())
        .map_err(|error| AppError::Validation(format!("invalid {field}: {error}")))
}

fn parse_timestamp(field: &str, value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| AppError::Validation(format!("invalid {field}: {error}")))
}
