use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rolegate_core::{AppError, AppResult, NonEmptyString, UserId};
use serde::{Deserialize, Serialize};

use crate::{PermissionId, RecordStatus, RoleId, Scope};

/// Operation a permission allows on its resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionAction {
    /// Create new records.
    Create,
    /// Read one record.
    Read,
    /// Modify records.
    Update,
    /// Remove records.
    Delete,
    /// Enumerate records.
    List,
    /// Every action on the resource.
    Manage,
}

impl PermissionAction {
    /// Returns the lowercase segment used in permission codes.
    #[must_use]
    pub fn code_segment(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::List => "list",
            Self::Manage => "manage",
        }
    }

    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Read => "READ",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::List => "LIST",
            Self::Manage => "MANAGE",
        }
    }

    fn from_code_segment(value: &str) -> Option<Self> {
        match value {
            "create" => Some(Self::Create),
            "read" => Some(Self::Read),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            "list" => Some(Self::List),
            "manage" => Some(Self::Manage),
            _ => None,
        }
    }
}

impl FromStr for PermissionAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_code_segment(value.to_ascii_lowercase().as_str()).ok_or_else(|| {
            AppError::Validation(format!("unknown permission action '{value}'"))
        })
    }
}

/// Part of the platform a permission is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppliesTo {
    /// Everywhere.
    All,
    /// Master (platform operator) data.
    Master,
    /// Tenant data.
    Tenant,
    /// Internal system surfaces.
    System,
}

impl AppliesTo {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Master => "MASTER",
            Self::Tenant => "TENANT",
            Self::System => "SYSTEM",
        }
    }
}

impl FromStr for AppliesTo {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ALL" => Ok(Self::All),
            "MASTER" => Ok(Self::Master),
            "TENANT" => Ok(Self::Tenant),
            "SYSTEM" => Ok(Self::System),
            _ => Err(AppError::Validation(format!(
                "unknown applies_to value '{value}'"
            ))),
        }
    }
}

/// Stable `<resource>.<action>` permission code such as `users.create`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionCode(String);

impl PermissionCode {
    /// Builds the code for an action on a resource.
    pub fn from_parts(resource: &str, action: PermissionAction) -> AppResult<Self> {
        let resource = resource.trim();
        if resource.is_empty() || resource.starts_with('.') || resource.ends_with('.') {
            return Err(AppError::Validation(format!(
                "invalid permission resource '{resource}'"
            )));
        }

        Ok(Self(format!(
            "{}.{}",
            resource.to_ascii_lowercase(),
            action.code_segment()
        )))
    }

    /// Parses and validates a transport value.
    pub fn parse(value: &str) -> AppResult<Self> {
        let (resource, action) = value.trim().rsplit_once('.').ok_or_else(|| {
            AppError::Validation(format!(
                "permission code '{value}' must look like '<resource>.<action>'"
            ))
        })?;
        let action = PermissionAction::from_code_segment(action).ok_or_else(|| {
            AppError::Validation(format!("permission code '{value}' has an unknown action"))
        })?;

        Self::from_parts(resource, action)
    }

    /// Returns the resource segment.
    #[must_use]
    pub fn resource(&self) -> &str {
        self.0
            .rsplit_once('.')
            .map(|(resource, _)| resource)
            .unwrap_or(self.0.as_str())
    }

    /// Returns the code granting every action on the same resource.
    #[must_use]
    pub fn manage_code(&self) -> Self {
        Self(format!(
            "{}.{}",
            self.resource(),
            PermissionAction::Manage.code_segment()
        ))
    }

    /// Returns the underlying code.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for PermissionCode {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

impl TryFrom<String> for PermissionCode {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value.as_str())
    }
}

impl From<PermissionCode> for String {
    fn from(value: PermissionCode) -> Self {
        value.0
    }
}

/// Input used to define a permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionInput {
    /// Resource the permission guards.
    pub resource: String,
    /// Operation on the resource.
    pub action: PermissionAction,
    /// Permission reach.
    pub scope: Scope,
    /// Target platform area.
    pub applies_to: AppliesTo,
    /// Marks a built-in permission; immutable once set.
    pub is_system: bool,
    /// Lifecycle flag.
    pub status: RecordStatus,
}

/// Atomic `(resource, action)` capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    id: PermissionId,
    code: PermissionCode,
    resource: NonEmptyString,
    action: PermissionAction,
    scope: Scope,
    applies_to: AppliesTo,
    is_system: bool,
    status: RecordStatus,
}

impl Permission {
    /// Creates a permission whose code is derived from resource and action.
    pub fn new(id: PermissionId, input: PermissionInput) -> AppResult<Self> {
        let code = PermissionCode::from_parts(input.resource.as_str(), input.action)?;
        let resource = NonEmptyString::new(code.resource())?;

        Ok(Self {
            id,
            code,
            resource,
            action: input.action,
            scope: input.scope,
            applies_to: input.applies_to,
            is_system: input.is_system,
            status: input.status,
        })
    }

    /// Returns the permission identifier.
    #[must_use]
    pub fn id(&self) -> PermissionId {
        self.id
    }

    /// Returns the unique code.
    #[must_use]
    pub fn code(&self) -> &PermissionCode {
        &self.code
    }

    /// Returns the guarded resource.
    #[must_use]
    pub fn resource(&self) -> &NonEmptyString {
        &self.resource
    }

    /// Returns the allowed action.
    #[must_use]
    pub fn action(&self) -> PermissionAction {
        self.action
    }

    /// Returns the permission reach.
    #[must_use]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Returns the target platform area.
    #[must_use]
    pub fn applies_to(&self) -> AppliesTo {
        self.applies_to
    }

    /// Returns whether this is a built-in permission.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.is_system
    }

    /// Returns the lifecycle flag.
    #[must_use]
    pub fn status(&self) -> RecordStatus {
        self.status
    }
}

/// Role to permission association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    /// Granting role.
    pub role_id: RoleId,
    /// Granted permission.
    pub permission_id: PermissionId,
    /// Grant timestamp.
    pub granted_at: DateTime<Utc>,
    /// Administrator who created the grant.
    pub granted_by: UserId,
}

#[cfg(test)]
mod tests {
    use super::{PermissionAction, PermissionCode};

    #[test]
    fn code_is_derived_from_resource_and_action() {
        let code = PermissionCode::from_parts("Users", PermissionAction::Create);
        assert_eq!(
            code.map(|code| code.as_str().to_owned()).ok().as_deref(),
            Some("users.create")
        );
    }

    #[test]
    fn dotted_resources_keep_their_namespace() {
        let Ok(code) = PermissionCode::parse("crm.contacts.read") else {
            panic!("expected a valid code");
        };
        assert_eq!(code.resource(), "crm.contacts");
        assert_eq!(code.manage_code().as_str(), "crm.contacts.manage");
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!(PermissionCode::parse("users.approve").is_err());
        assert!(PermissionCode::parse("users").is_err());
        assert!(PermissionCode::parse(".read").is_err());
    }
}
