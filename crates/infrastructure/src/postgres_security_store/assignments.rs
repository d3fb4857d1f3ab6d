use super::*;

const MAX_ASSIGNMENT_ATTEMPTS: u32 = 3;

impl PostgresSecurityStore {
    /// Runs one create attempt; `None` when a concurrent insert won the unique index.
    async fn try_create_assignment(
        &self,
        input: &AssignmentInput,
        granted_at: DateTime<Utc>,
    ) -> AppResult<Option<WriteOutcome<UserRoleAssignment>>> {
        let key = input.key;
        let mut transaction = self.begin().await?;

        // expired rows keep their slot in the partial unique index until retired
        sqlx::query(
            r#"
            UPDATE user_role_assignments
            SET is_active = false,
                updated_at = now()
            WHERE user_id = $1
                AND role_id = $2
                AND scope = $3
                AND tenant_context IS NOT DISTINCT FROM $4
                AND is_active
                AND expires_at IS NOT NULL
                AND expires_at <= $5
            "#,
        )
        .bind(key.user_id.as_uuid())
        .bind(key.role_id.as_uuid())
        .bind(key.scope.as_str())
        .bind(key.tenant_context.map(|tenant_id| tenant_id.as_uuid()))
        .bind(granted_at)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to retire expired assignments: {error}"))
        })?;

        let existing = sqlx::query_as::<_, AssignmentRow>(&format!(
            r#"
            SELECT {ASSIGNMENT_COLUMNS}
            FROM user_role_assignments
            WHERE user_id = $1
                AND role_id = $2
                AND scope = $3
                AND tenant_context IS NOT DISTINCT FROM $4
                AND is_active
            LIMIT 1
            FOR UPDATE
            "#
        ))
        .bind(key.user_id.as_uuid())
        .bind(key.role_id.as_uuid())
        .bind(key.scope.as_str())
        .bind(key.tenant_context.map(|tenant_id| tenant_id.as_uuid()))
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load assignment: {error}")))?;

        if let Some(row) = existing {
            let assignment = row.into_assignment()?;
            commit(transaction).await?;
            return Ok(Some(WriteOutcome::Existing(assignment)));
        }

        let assignment = UserRoleAssignment::grant(AssignmentId::new(), input.clone(), granted_at)?;
        let inserted = sqlx::query(
            r#"
            INSERT INTO user_role_assignments (
                id,
                user_id,
                role_id,
                scope,
                tenant_context,
                granted_at,
                granted_by,
                conflict_policy_id,
                is_active,
                expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, true, $9)
            "#,
        )
        .bind(assignment.id().as_uuid())
        .bind(key.user_id.as_uuid())
        .bind(key.role_id.as_uuid())
        .bind(key.scope.as_str())
        .bind(key.tenant_context.map(|tenant_id| tenant_id.as_uuid()))
        .bind(granted_at)
        .bind(assignment.granted_by().as_uuid())
        .bind(assignment.conflict_policy_id().map(|policy_id| policy_id.as_uuid()))
        .bind(assignment.expires_at())
        .execute(&mut *transaction)
        .await;

        match inserted {
            Ok(_) => {}
            Err(error) if is_unique_violation(&error) => return Ok(None),
            Err(error) if is_foreign_key_violation(&error) => {
                return Err(AppError::NotFound(format!(
                    "assignment references a missing role or policy: {error}"
                )));
            }
            Err(error) => {
                return Err(AppError::Internal(format!(
                    "failed to create assignment: {error}"
                )));
            }
        }

        insert_audit_entry(
            &mut *transaction,
            &AuditEntry::assignment(
                assignment.id(),
                assignment.user_id(),
                assignment.role_id(),
                AuditAction::Granted,
                granted_at,
                assignment.granted_by(),
                None,
            ),
        )
        .await?;
        bump_epoch(&mut transaction, &principal_subject(key.user_id)).await?;
        commit(transaction).await?;

        Ok(Some(WriteOutcome::Created(assignment)))
    }
}

#[async_trait]
impl AssignmentStore for PostgresSecurityStore {
    async fn assignments_for(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
        as_of: DateTime<Utc>,
    ) -> AppResult<Vec<UserRoleAssignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(&format!(
            r#"
            SELECT {ASSIGNMENT_COLUMNS}
            FROM user_role_assignments
            WHERE user_id = $1
                AND (tenant_context IS NULL OR tenant_context = $2)
                AND revoked_at IS NULL
                AND granted_at <= $3
                AND (expires_at IS NULL OR expires_at > $3)
            ORDER BY granted_at, id
            "#
        ))
        .bind(user_id.as_uuid())
        .bind(tenant_id.as_uuid())
        .bind(as_of)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load assignments: {error}")))?;

        rows.into_iter().map(AssignmentRow::into_assignment).collect()
    }

    async fn create_assignment(
        &self,
        input: AssignmentInput,
        granted_at: DateTime<Utc>,
    ) -> AppResult<WriteOutcome<UserRoleAssignment>> {
        for attempt in 1..=MAX_ASSIGNMENT_ATTEMPTS {
            if let Some(outcome) = self.try_create_assignment(&input, granted_at).await? {
                return Ok(outcome);
            }
            debug!(
                user_id = %input.key.user_id,
                role_id = %input.key.role_id,
                attempt,
                "assignment insert lost a race, retrying"
            );
        }

        Err(AppError::ConcurrentModification(format!(
            "assignment of role '{}' to user '{}' kept conflicting with concurrent writes",
            input.key.role_id, input.key.user_id
        )))
    }

    async fn revoke_assignments(
        &self,
        input: RevokeAssignmentsInput,
    ) -> AppResult<Vec<UserRoleAssignment>> {
        let mut transaction = self.begin().await?;
        let rows = sqlx::query_as::<_, AssignmentRow>(&format!(
            r#"
            SELECT {ASSIGNMENT_COLUMNS}
            FROM user_role_assignments
            WHERE user_id = $1
                AND role_id = $2
                AND is_active
            ORDER BY granted_at, id
            FOR UPDATE
            "#
        ))
        .bind(input.user_id.as_uuid())
        .bind(input.role_id.as_uuid())
        .fetch_all(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load assignments: {error}")))?;

        let mut revoked = Vec::new();
        for row in rows {
            let mut assignment = row.into_assignment()?;
            if !assignment.is_active_at(input.revoked_at) {
                continue;
            }
            assignment.revoke(input.revoked_at, input.revoked_by, &input.reason)?;

            sqlx::query(
                r#"
                UPDATE user_role_assignments
                SET is_active = false,
                    revoked_at = $2,
                    revoked_by = $3,
                    revoke_reason = $4,
                    updated_at = now()
                WHERE id = $1
                "#,
            )
            .bind(assignment.id().as_uuid())
            .bind(input.revoked_at)
            .bind(input.revoked_by.as_uuid())
            .bind(input.reason.as_str())
            .execute(&mut *transaction)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to revoke assignment: {error}"))
            })?;

            insert_audit_entry(
                &mut *transaction,
                &AuditEntry::assignment(
                    assignment.id(),
                    assignment.user_id(),
                    assignment.role_id(),
                    AuditAction::Revoked,
                    input.revoked_at,
                    input.revoked_by,
                    Some(input.reason.clone()),
                ),
            )
            .await?;
            revoked.push(assignment);
        }

        if revoked.is_empty() {
            return Ok(revoked);
        }

        bump_epoch(&mut transaction, &principal_subject(input.user_id)).await?;
        commit(transaction).await?;
        Ok(revoked)
    }

    async fn policy_version(&self, user_id: UserId) -> AppResult<PolicyVersion> {
        let (catalog, principal) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                COALESCE((SELECT epoch FROM policy_versions WHERE subject = $1), 0),
                COALESCE((SELECT epoch FROM policy_versions WHERE subject = $2), 0)
            "#,
        )
        .bind(CATALOG_SUBJECT)
        .bind(principal_subject(user_id))
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load policy version: {error}")))?;

        Ok(PolicyVersion { catalog, principal })
    }
}
