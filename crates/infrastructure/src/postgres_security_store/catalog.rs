use super::*;

const ROLE_COLUMNS: &str = "id, code, name, category, level, scope, priority, is_default, status";

#[derive(Debug, FromRow)]
struct GrantRow {
    granted_at: DateTime<Utc>,
    granted_by: uuid::Uuid,
}

#[async_trait]
impl RoleCatalog for PostgresSecurityStore {
    async fn role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        sqlx::query_as::<_, RoleRow>(&format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1"))
            .bind(role_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to load role: {error}")))?
            .map(RoleRow::into_role)
            .transpose()
    }

    async fn roles(&self, role_ids: &[RoleId]) -> AppResult<Vec<Role>> {
        let ids: Vec<uuid::Uuid> = role_ids.iter().map(RoleId::as_uuid).collect();
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE id = ANY($1) ORDER BY code"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load roles: {error}")))?;

        rows.into_iter().map(RoleRow::into_role).collect()
    }

    async fn create_role(&self, role: Role) -> AppResult<()> {
        let mut transaction = self.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO roles (id, code, name, category, level, scope, priority, is_default, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(role.id().as_uuid())
        .bind(role.code().as_str())
        .bind(role.name().as_str())
        .bind(role.category().as_str())
        .bind(i16::from(role.level()))
        .bind(role.scope().as_str())
        .bind(role.priority())
        .bind(role.is_default())
        .bind(role.status().as_str())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            if is_unique_violation(&error) {
                return AppError::Conflict(format!("role '{}' already exists", role.code()));
            }
            AppError::Internal(format!("failed to create role: {error}"))
        })?;

        bump_epoch(&mut transaction, CATALOG_SUBJECT).await?;
        commit(transaction).await
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(&format!(
            "SELECT {ROLE_COLUMNS} FROM roles ORDER BY code"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        rows.into_iter().map(RoleRow::into_role).collect()
    }
}

#[async_trait]
impl PermissionCatalog for PostgresSecurityStore {
    async fn permissions_of(&self, role_id: RoleId) -> AppResult<Vec<Permission>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT
                permissions.id,
                permissions.code,
                permissions.resource,
                permissions.action,
                permissions.scope,
                permissions.applies_to,
                permissions.is_system,
                permissions.status
            FROM role_permissions
            INNER JOIN permissions
                ON permissions.id = role_permissions.permission_id
            WHERE role_permissions.role_id = $1
                AND permissions.status = 'ACTIVE'
            ORDER BY permissions.code
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load permissions of role '{role_id}': {error}"
            ))
        })?;

        rows.into_iter()
            .map(PermissionRow::into_permission)
            .collect()
    }

    async fn permission(&self, permission_id: PermissionId) -> AppResult<Option<Permission>> {
        sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT id, code, resource, action, scope, applies_to, is_system, status
            FROM permissions
            WHERE id = $1
            "#,
        )
        .bind(permission_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load permission: {error}")))?
        .map(PermissionRow::into_permission)
        .transpose()
    }

    async fn create_permission(&self, permission: Permission) -> AppResult<()> {
        let mut transaction = self.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO permissions (id, code, resource, action, scope, applies_to, is_system, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(permission.id().as_uuid())
        .bind(permission.code().as_str())
        .bind(permission.resource().as_str())
        .bind(permission.action().as_str())
        .bind(permission.scope().as_str())
        .bind(permission.applies_to().as_str())
        .bind(permission.is_system())
        .bind(permission.status().as_str())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            if is_unique_violation(&error) {
                return AppError::Conflict(format!(
                    "permission '{}' already exists",
                    permission.code()
                ));
            }
            AppError::Internal(format!("failed to create permission: {error}"))
        })?;

        bump_epoch(&mut transaction, CATALOG_SUBJECT).await?;
        commit(transaction).await
    }

    async fn grant_permission(&self, grant: RoleGrant) -> AppResult<WriteOutcome<RoleGrant>> {
        let mut transaction = self.begin().await?;
        let inserted = sqlx::query_as::<_, GrantRow>(
            r#"
            INSERT INTO role_permissions (role_id, permission_id, granted_at, granted_by)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (role_id, permission_id) DO NOTHING
            RETURNING granted_at, granted_by
            "#,
        )
        .bind(grant.role_id.as_uuid())
        .bind(grant.permission_id.as_uuid())
        .bind(grant.granted_at)
        .bind(grant.granted_by.as_uuid())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| {
            if is_foreign_key_violation(&error) {
                return AppError::NotFound(format!(
                    "role '{}' or permission '{}' does not exist",
                    grant.role_id, grant.permission_id
                ));
            }
            AppError::Internal(format!("failed to grant permission: {error}"))
        })?;

        if inserted.is_none() {
            let existing = sqlx::query_as::<_, GrantRow>(
                r#"
                SELECT granted_at, granted_by
                FROM role_permissions
                WHERE role_id = $1 AND permission_id = $2
                "#,
            )
            .bind(grant.role_id.as_uuid())
            .bind(grant.permission_id.as_uuid())
            .fetch_one(&mut *transaction)
            .await
            .map_err(|error| AppError::Internal(format!("failed to load grant: {error}")))?;
            commit(transaction).await?;

            return Ok(WriteOutcome::Existing(RoleGrant {
                granted_at: existing.granted_at,
                granted_by: UserId::from_uuid(existing.granted_by),
                ..grant
            }));
        }

        insert_audit_entry(
            &mut *transaction,
            &AuditEntry::role_grant(
                &grant,
                AuditAction::Granted,
                grant.granted_at,
                grant.granted_by,
                None,
            ),
        )
        .await?;
        bump_epoch(&mut transaction, CATALOG_SUBJECT).await?;
        commit(transaction).await?;

        Ok(WriteOutcome::Created(grant))
    }

    async fn revoke_permission(&self, input: RevokePermissionInput) -> AppResult<bool> {
        let mut transaction = self.begin().await?;
        let removed = sqlx::query_as::<_, GrantRow>(
            r#"
            DELETE FROM role_permissions
            WHERE role_id = $1 AND permission_id = $2
            RETURNING granted_at, granted_by
            "#,
        )
        .bind(input.role_id.as_uuid())
        .bind(input.permission_id.as_uuid())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to revoke permission: {error}")))?;

        let Some(removed) = removed else {
            return Ok(false);
        };

        let grant = RoleGrant {
            role_id: input.role_id,
            permission_id: input.permission_id,
            granted_at: removed.granted_at,
            granted_by: UserId::from_uuid(removed.granted_by),
        };
        insert_audit_entry(
            &mut *transaction,
            &AuditEntry::role_grant(
                &grant,
                AuditAction::Revoked,
                input.revoked_at,
                input.revoked_by,
                input.reason,
            ),
        )
        .await?;
        bump_epoch(&mut transaction, CATALOG_SUBJECT).await?;
        commit(transaction).await?;

        Ok(true)
    }

    async fn list_permissions(&self) -> AppResult<Vec<Permission>> {
        let rows = sqlx::query_as::<_, PermissionRow>(
            r#"
            SELECT id, code, resource, action, scope, applies_to, is_system, status
            FROM permissions
            ORDER BY code
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list permissions: {error}")))?;

        rows.into_iter()
            .map(PermissionRow::into_permission)
            .collect()
    }
}
