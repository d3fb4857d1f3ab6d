use super::*;

#[async_trait]
impl AuditSink for PostgresSecurityStore {
    async fn append(&self, entry: AuditEntry) -> AppResult<()> {
        insert_audit_entry(&self.pool, &entry).await
    }

    async fn append_all(&self, entries: Vec<AuditEntry>) -> AppResult<()> {
        let mut transaction = self.begin().await?;
        for entry in &entries {
            insert_audit_entry(&mut *transaction, entry).await?;
        }
        commit(transaction).await
    }

    async fn entries(&self, query: AuditQuery) -> AppResult<Vec<AuditEntry>> {
        let capped_limit = i64::try_from(query.limit.clamp(1, 500)).unwrap_or(500);
        let capped_offset = i64::try_from(query.offset.min(50_000)).unwrap_or(0);
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT
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
            FROM role_permissions_history
            WHERE ($1::UUID IS NULL OR user_id = $1)
                AND ($2::UUID IS NULL OR role_id = $2)
                AND ($3::TEXT IS NULL OR action = $3)
            ORDER BY sequence
            LIMIT $4
            OFFSET $5
            "#,
        )
        .bind(query.user_id.map(|user_id| user_id.as_uuid()))
        .bind(query.role_id.map(|role_id| role_id.as_uuid()))
        .bind(query.action.map(|action| action.as_str()))
        .bind(capped_limit)
        .bind(capped_offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list history entries: {error}"))
        })?;

        rows.into_iter().map(AuditRow::into_entry).collect()
    }
}
