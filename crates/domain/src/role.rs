use std::str::FromStr;

use rolegate_core::{AppError, AppResult, NonEmptyString};
use serde::{Deserialize, Serialize};

use crate::RoleId;

/// Most privileged role level.
pub const ROLE_LEVEL_MIN: u8 = 1;

/// Least privileged role level.
pub const ROLE_LEVEL_MAX: u8 = 200;

/// Reach of a role, permission or assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    /// Applies across all tenants.
    Global,
    /// Applies inside one tenant context only.
    Tenant,
}

impl Scope {
    /// Returns a stable storage value for this scope.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Global => "GLOBAL",
            Self::Tenant => "TENANT",
        }
    }
}

impl FromStr for Scope {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "GLOBAL" => Ok(Self::Global),
            "TENANT" => Ok(Self::Tenant),
            _ => Err(AppError::Validation(format!("unknown scope '{value}'"))),
        }
    }
}

/// Lifecycle flag shared by catalog rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    /// Row participates in resolution.
    Active,
    /// Row is retained but ignored.
    Inactive,
}

impl RecordStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
        }
    }
}

impl FromStr for RecordStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            _ => Err(AppError::Validation(format!("unknown status '{value}'"))),
        }
    }
}

/// Role families with distinct scope rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleCategory {
    /// Operators of the whole platform.
    ManagerAdmin,
    /// Cross-tenant support staff.
    PlatformSupport,
    /// Administrators of one tenant.
    TenantAdmin,
    /// Regular tenant members.
    TenantUser,
}

impl RoleCategory {
    /// Returns a stable storage value for this category.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManagerAdmin => "MANAGER_ADMIN",
            Self::PlatformSupport => "PLATFORM_SUPPORT",
            Self::TenantAdmin => "TENANT_ADMIN",
            Self::TenantUser => "TENANT_USER",
        }
    }

    /// Returns the only scope a role of this category may declare.
    #[must_use]
    pub fn required_scope(&self) -> Scope {
        match self {
            Self::ManagerAdmin | Self::PlatformSupport => Scope::Global,
            Self::TenantAdmin | Self::TenantUser => Scope::Tenant,
        }
    }
}

impl FromStr for RoleCategory {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "MANAGER_ADMIN" => Ok(Self::ManagerAdmin),
            "PLATFORM_SUPPORT" => Ok(Self::PlatformSupport),
            "TENANT_ADMIN" => Ok(Self::TenantAdmin),
            "TENANT_USER" => Ok(Self::TenantUser),
            _ => Err(AppError::Validation(format!(
                "unknown role category '{value}'"
            ))),
        }
    }
}

/// Input used to define a role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleInput {
    /// Unique role code.
    pub code: String,
    /// Human-readable name.
    pub name: String,
    /// Role family.
    pub category: RoleCategory,
    /// Privilege level, lower is more privileged.
    pub level: u8,
    /// Declared role scope.
    pub scope: Scope,
    /// Sort and tie-break key.
    pub priority: i32,
    /// Whether the role is handed out by default.
    pub is_default: bool,
    /// Lifecycle flag.
    pub status: RecordStatus,
}

/// A named, prioritized bundle of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    id: RoleId,
    code: NonEmptyString,
    name: NonEmptyString,
    category: RoleCategory,
    level: u8,
    scope: Scope,
    priority: i32,
    is_default: bool,
    status: RecordStatus,
}

impl Role {
    /// Creates a role after checking level bounds and the category scope rule.
    pub fn new(id: RoleId, input: RoleInput) -> AppResult<Self> {
        if !(ROLE_LEVEL_MIN..=ROLE_LEVEL_MAX).contains(&input.level) {
            return Err(AppError::Validation(format!(
                "role level must be between {ROLE_LEVEL_MIN} and {ROLE_LEVEL_MAX}, got {}",
                input.level
            )));
        }

        let required_scope = input.category.required_scope();
        if input.scope != required_scope {
            return Err(AppError::Validation(format!(
                "role category '{}' requires scope '{}', got '{}'",
                input.category.as_str(),
                required_scope.as_str(),
                input.scope.as_str()
            )));
        }

        Ok(Self {
            id,
            code: NonEmptyString::new(input.code.trim())?,
            name: NonEmptyString::new(input.name)?,
            category: input.category,
            level: input.level,
            scope: input.scope,
            priority: input.priority,
            is_default: input.is_default,
            status: input.status,
        })
    }

    /// Returns the role identifier.
    #[must_use]
    pub fn id(&self) -> RoleId {
        self.id
    }

    /// Returns the unique role code.
    #[must_use]
    pub fn code(&self) -> &NonEmptyString {
        &self.code
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &NonEmptyString {
        &self.name
    }

    /// Returns the role family.
    #[must_use]
    pub fn category(&self) -> RoleCategory {
        self.category
    }

    /// Returns the privilege level.
    #[must_use]
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Returns the declared scope.
    #[must_use]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Returns the sort and tie-break key.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Returns whether the role is a default role.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// Returns the lifecycle flag.
    #[must_use]
    pub fn status(&self) -> RecordStatus {
        self.status
    }

    /// Returns whether assignments of this role currently count.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == RecordStatus::Active
    }
}
