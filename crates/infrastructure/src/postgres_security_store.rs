//! PostgreSQL adapter for the security store ports.

mod assignments;
mod audit;
mod catalog;
mod policies;


use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{debug, warn};

use rolegate_application::{
    AssignmentStore, AuditQuery, AuditSink, PermissionCatalog, PolicyLookup, PolicyStore,
    RevokeAssignmentsInput, RevokePermissionInput, RoleCatalog, WriteOutcome,
};
use rolegate_core::{AppError, AppResult, TenantId, UserId};
use rolegate_domain::{
    AppliesTo, AssignmentId, AssignmentInput, AssignmentKey, AssignmentState, AuditAction,
    AuditEntry, AuditEntryId, AuditTarget, ConflictPolicy, ConflictPolicyInput,
    ConflictStrategy, Permission, PermissionAction, PermissionCode, PermissionId,
    PermissionInput, PolicyId, PolicyVersion, PriorityDirection, RecordStatus, Role,
    RoleCategory, RoleGrant, RoleId, RoleInput, Scope, UserRoleAssignment,
};

const CATALOG_SUBJECT: &str = "catalog";

/// PostgreSQL-backed store for roles, permissions, grants, assignments, policies and
/// their history.
///
/// Every mutation commits its rows, the policy version bump and its history rows in one
/// transaction.
#[derive(Clone)]
pub struct PostgresSecurityStore {
    pool: PgPool,
}

impl PostgresSecurityStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> AppResult<Transaction<'_, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|error| AppError::Internal(format!("failed to begin transaction: {error}")))
    }
}

async fn commit(transaction: Transaction<'_, Postgres>) -> AppResult<()> {
    transaction
        .commit()
        .await
        .map_err(|error| AppError::Internal(format!("failed to commit transaction: {error}")))
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(database_error)
            if database_error.code().as_deref() == Some("23505")
    )
}

fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Database(database_error)
            if database_error.code().as_deref() == Some("23503")
    )
}

fn principal_subject(user_id: UserId) -> String {
    user_id.to_string()
}

async fn bump_epoch(transaction: &mut Transaction<'_, Postgres>, subject: &str) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO policy_versions (subject, epoch)
        VALUES ($1, 1)
        ON CONFLICT (subject) DO UPDATE
        SET epoch = policy_versions.epoch + 1,
            updated_at = now()
        "#,
    )
    .bind(subject)
    .execute(&mut **transaction)
    .await
    .map_err(|error| {
        AppError::Internal(format!(
            "failed to bump policy version for '{subject}': {error}"
        ))
    })?;

    Ok(())
}

/// Columns of one history row, flattened from its target.
struct AuditColumns {
    target_kind: &'static str,
    role_id: Option<uuid::Uuid>,
    permission_id: Option<uuid::Uuid>,
    assignment_id: Option<uuid::Uuid>,
    user_id: Option<uuid::Uuid>,
    tenant_id: Option<uuid::Uuid>,
    permission_code: Option<String>,
    allowed: Option<bool>,
}

impl AuditColumns {
    fn from_target(target: &AuditTarget) -> Self {
        let empty = Self {
            target_kind: "",
            role_id: None,
            permission_id: None,
            assignment_id: None,
            user_id: None,
            tenant_id: None,
            permission_code: None,
            allowed: None,
        };

        match target {
            AuditTarget::RoleGrant {
                role_id,
                permission_id,
            } => Self {
                target_kind: "ROLE_GRANT",
                role_id: Some(role_id.as_uuid()),
                permission_id: Some(permission_id.as_uuid()),
                ..empty
            },
            AuditTarget::Assignment {
                assignment_id,
                user_id,
                role_id,
            } => Self {
                target_kind: "ASSIGNMENT",
                assignment_id: Some(assignment_id.as_uuid()),
                user_id: Some(user_id.as_uuid()),
                role_id: Some(role_id.as_uuid()),
                ..empty
            },
            AuditTarget::Decision {
                user_id,
                tenant_id,
                permission,
                allowed,
            } => Self {
                target_kind: "DECISION",
                user_id: Some(user_id.as_uuid()),
                tenant_id: Some(tenant_id.as_uuid()),
                permission_code: Some(permission.as_str().to_owned()),
                allowed: Some(*allowed),
                ..empty
            },
        }
    }
}

async fn insert_audit_entry<'e, E>(executor: E, entry: &AuditEntry) -> AppResult<()>
where
    E: sqlx::PgExecutor<'e>,
{
    let columns = AuditColumns::from_target(entry.target());
    sqlx::query(
        r#"
        INSERT INTO role_permissions_history (
            id,
            target_kind,
            role_id,
            permission_id,
            assignment_id,
            user_id,
            tenant_id,
            permission_code,
            allowed,
            action,
            changed_at,
            changed_by,
            reason
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(entry.id().as_uuid())
    .bind(columns.target_kind)
    .bind(columns.role_id)
    .bind(columns.permission_id)
    .bind(columns.assignment_id)
    .bind(columns.user_id)
    .bind(columns.tenant_id)
    .bind(columns.permission_code)
    .bind(columns.allowed)
    .bind(entry.action().as_str())
    .bind(entry.changed_at())
    .bind(entry.changed_by().as_uuid())
    .bind(entry.reason())
    .execute(executor)
    .await
    .map_err(|error| {
        AppError::AuditWriteFailure(format!(
            "failed to append {} history entry: {error}",
            entry.action().as_str()
        ))
    })?;

    Ok(())
}

#[derive(Debug, FromRow)]
struct RoleRow {
    id: uuid::Uuid,
    code: String,
    name: String,
    category: String,
    level: i16,
    scope: String,
    priority: i32,
    is_default: bool,
    status: String,
}

impl RoleRow {
    fn into_role(self) -> AppResult<Role> {
        let stored = |error: AppError| {
            AppError::Internal(format!("invalid stored role '{}': {error}", self.code))
        };
        let level = u8::try_from(self.level).map_err(|error| {
            AppError::Internal(format!(
                "invalid stored role level for '{}': {error}",
                self.code
            ))
        })?;
        let input = RoleInput {
            code: self.code.clone(),
            name: self.name.clone(),
            category: RoleCategory::from_str(self.category.as_str()).map_err(stored)?,
            level,
            scope: Scope::from_str(self.scope.as_str()).map_err(stored)?,
            priority: self.priority,
            is_default: self.is_default,
            status: RecordStatus::from_str(self.status.as_str()).map_err(stored)?,
        };

        Role::new(RoleId::from_uuid(self.id), input).map_err(stored)
    }
}

#[derive(Debug, FromRow)]
struct PermissionRow {
    id: uuid::Uuid,
    code: String,
    resource: String,
    action: String,
    scope: String,
    applies_to: String,
    is_system: bool,
    status: String,
}

impl PermissionRow {
    fn into_permission(self) -> AppResult<Permission> {
        let stored = |error: AppError| {
            AppError::Internal(format!("invalid stored permission '{}': {error}", self.code))
        };
        let input = PermissionInput {
            resource: self.resource.clone(),
            action: PermissionAction::from_str(self.action.as_str()).map_err(stored)?,
            scope: Scope::from_str(self.scope.as_str()).map_err(stored)?,
            applies_to: AppliesTo::from_str(self.applies_to.as_str()).map_err(stored)?,
            is_system: self.is_system,
            status: RecordStatus::from_str(self.status.as_str()).map_err(stored)?,
        };

        let permission = Permission::new(PermissionId::from_uuid(self.id), input).map_err(stored)?;
        if permission.code().as_str() != self.code {
            return Err(AppError::Internal(format!(
                "stored permission code '{}' disagrees with derived code '{}'",
                self.code,
                permission.code()
            )));
        }

        Ok(permission)
    }
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    id: uuid::Uuid,
    user_id: uuid::Uuid,
    role_id: uuid::Uuid,
    scope: String,
    tenant_context: Option<uuid::Uuid>,
    granted_at: DateTime<Utc>,
    granted_by: uuid::Uuid,
    conflict_policy_id: Option<uuid::Uuid>,
    is_active: bool,
    expires_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
    revoked_by: Option<uuid::Uuid>,
    revoke_reason: Option<String>,
}

impl AssignmentRow {
    fn into_assignment(self) -> AppResult<UserRoleAssignment> {
        let stored = |error: AppError| {
            AppError::Internal(format!("invalid stored assignment '{}': {error}", self.id))
        };
        let key = AssignmentKey::new(
            UserId::from_uuid(self.user_id),
            RoleId::from_uuid(self.role_id),
            Scope::from_str(self.scope.as_str()).map_err(stored)?,
            self.tenant_context.map(TenantId::from_uuid),
        )
        .map_err(stored)?;
        let state = AssignmentState::from_columns(
            self.is_active,
            self.expires_at,
            self.revoked_at,
            self.revoked_by.map(UserId::from_uuid),
            self.revoke_reason.clone(),
        )
        .map_err(stored)?;

        Ok(UserRoleAssignment::restore(
            AssignmentId::from_uuid(self.id),
            key,
            self.granted_at,
            UserId::from_uuid(self.granted_by),
            self.conflict_policy_id.map(PolicyId::from_uuid),
            state,
        ))
    }
}

const ASSIGNMENT_COLUMNS: &str = r#"
    id,
    user_id,
    role_id,
    scope,
    tenant_context,
    granted_at,
    granted_by,
    conflict_policy_id,
    is_active,
    expires_at,
    revoked_at,
    revoked_by,
    revoke_reason
"#;

#[derive(Debug, FromRow)]
struct PolicyRow {
    id: uuid::Uuid,
    code: String,
    conflict_strategy: String,
    max_concurrent_roles: Option<i32>,
    use_role_priority: bool,
    priority_direction: Option<String>,
    apply_global_rules: bool,
    apply_to_admins: bool,
    is_system: bool,
}

impl PolicyRow {
    /// Interprets the row, reporting unreadable configurations as malformed.
    fn into_lookup(self) -> PolicyLookup {
        let parsed = ConflictStrategy::from_str(self.conflict_strategy.as_str()).and_then(
            |conflict_strategy| {
                let priority_direction = self
                    .priority_direction
                    .as_deref()
                    .map(PriorityDirection::from_str)
                    .transpose()?;

                ConflictPolicy::new(
                    PolicyId::from_uuid(self.id),
                    ConflictPolicyInput {
                        code: self.code.clone(),
                        conflict_strategy,
                        max_concurrent_roles: self.max_concurrent_roles.map(i64::from),
                        use_role_priority: self.use_role_priority,
                        priority_direction,
                        apply_global_rules: self.apply_global_rules,
                        apply_to_admins: self.apply_to_admins,
                        is_system: self.is_system,
                    },
                )
            },
        );

        match parsed {
            Ok(policy) => PolicyLookup::Found(policy),
            Err(error) => PolicyLookup::Malformed(error.to_string()),
        }
    }
}

#[derive(Debug, FromRow)]
struct AuditRow {
    id: uuid::Uuid,
    target_kind: String,
    role_id: Option<uuid::Uuid>,
    permission_id: Option<uuid::Uuid>,
    assignment_id: Option<uuid::Uuid>,
    user_id: Option<uuid::Uuid>,
    tenant_id: Option<uuid::Uuid>,
    permission_code: Option<String>,
    allowed: Option<bool>,
    action: String,
    changed_at: DateTime<Utc>,
    changed_by: uuid::Uuid,
    reason: Option<String>,
}

impl AuditRow {
    fn into_entry(self) -> AppResult<AuditEntry> {
        let missing = |column: &str| {
            AppError::Internal(format!(
                "history row '{}' of kind '{}' lacks column '{column}'",
                self.id, self.target_kind
            ))
        };

        let target = match self.target_kind.as_str() {
            "ROLE_GRANT" => AuditTarget::RoleGrant {
                role_id: RoleId::from_uuid(self.role_id.ok_or_else(|| missing("role_id"))?),
                permission_id: PermissionId::from_uuid(
                    self.permission_id.ok_or_else(|| missing("permission_id"))?,
                ),
            },
            "ASSIGNMENT" => AuditTarget::Assignment {
                assignment_id: AssignmentId::from_uuid(
                    self.assignment_id.ok_or_else(|| missing("assignment_id"))?,
                ),
                user_id: UserId::from_uuid(self.user_id.ok_or_else(|| missing("user_id"))?),
                role_id: RoleId::from_uuid(self.role_id.ok_or_else(|| missing("role_id"))?),
            },
            "DECISION" => AuditTarget::Decision {
                user_id: UserId::from_uuid(self.user_id.ok_or_else(|| missing("user_id"))?),
                tenant_id: TenantId::from_uuid(
                    self.tenant_id.ok_or_else(|| missing("tenant_id"))?,
                ),
                permission: PermissionCode::parse(
                    self.permission_code
                        .as_deref()
                        .ok_or_else(|| missing("permission_code"))?,
                )?,
                allowed: self.allowed.ok_or_else(|| missing("allowed"))?,
            },
            other => {
                return Err(AppError::Internal(format!(
                    "unknown history target kind '{other}'"
                )));
            }
        };

        Ok(AuditEntry::restore(
            AuditEntryId::from_uuid(self.id),
            target,
            AuditAction::from_str(self.action.as_str())?,
            self.changed_at,
            UserId::from_uuid(self.changed_by),
            self.reason,
        ))
    }
}
