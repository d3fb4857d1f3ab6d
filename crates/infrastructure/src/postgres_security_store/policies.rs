use super::*;

const POLICY_COLUMNS: &str = r#"
    id,
    code,
    conflict_strategy,
    max_concurrent_roles,
    use_role_priority,
    priority_direction,
    apply_global_rules,
    apply_to_admins,
    is_system
"#;

#[async_trait]
impl PolicyStore for PostgresSecurityStore {
    async fn find_policy(&self, policy_id: PolicyId) -> AppResult<PolicyLookup> {
        let row = sqlx::query_as::<_, PolicyRow>(&format!(
            "SELECT {POLICY_COLUMNS} FROM conflict_policies WHERE id = $1"
        ))
        .bind(policy_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to load conflict policy: {error}"))
        })?;

        Ok(row.map_or(PolicyLookup::Missing, PolicyRow::into_lookup))
    }

    async fn save_policy(&self, policy: ConflictPolicy) -> AppResult<()> {
        let max_concurrent_roles = policy
            .max_concurrent_roles()
            .map(i32::try_from)
            .transpose()
            .map_err(|error| {
                AppError::InvalidPolicyConfiguration(format!(
                    "max_concurrent_roles is out of range: {error}"
                ))
            })?;

        let mut transaction = self.begin().await?;
        let written = sqlx::query(
            r#"
            INSERT INTO conflict_policies (
                id,
                code,
                conflict_strategy,
                max_concurrent_roles,
                use_role_priority,
                priority_direction,
                apply_global_rules,
                apply_to_admins,
                is_system
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE
            SET code = EXCLUDED.code,
                conflict_strategy = EXCLUDED.conflict_strategy,
                max_concurrent_roles = EXCLUDED.max_concurrent_roles,
                use_role_priority = EXCLUDED.use_role_priority,
                priority_direction = EXCLUDED.priority_direction,
                apply_global_rules = EXCLUDED.apply_global_rules,
                apply_to_admins = EXCLUDED.apply_to_admins,
                updated_at = now()
            WHERE conflict_policies.is_system = false
            "#,
        )
        .bind(policy.id().as_uuid())
        .bind(policy.code())
        .bind(policy.conflict_strategy().as_str())
        .bind(max_concurrent_roles)
        .bind(policy.use_role_priority())
        .bind(policy.priority_direction().map(|direction| direction.as_str()))
        .bind(policy.apply_global_rules())
        .bind(policy.apply_to_admins())
        .bind(policy.is_system())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            if is_unique_violation(&error) {
                return AppError::Conflict(format!(
                    "conflict policy '{}' already exists",
                    policy.code()
                ));
            }
            AppError::Internal(format!("failed to save conflict policy: {error}"))
        })?;

        if written.rows_affected() == 0 {
            return Err(AppError::InvalidPolicyConfiguration(format!(
                "system policy '{}' is immutable",
                policy.id()
            )));
        }

        bump_epoch(&mut transaction, CATALOG_SUBJECT).await?;
        commit(transaction).await
    }

    async fn list_policies(&self) -> AppResult<Vec<ConflictPolicy>> {
        let rows = sqlx::query_as::<_, PolicyRow>(&format!(
            "SELECT {POLICY_COLUMNS} FROM conflict_policies ORDER BY code"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list conflict policies: {error}"))
        })?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let policy_id = row.id;
                match row.into_lookup() {
                    PolicyLookup::Found(policy) => Some(policy),
                    PolicyLookup::Malformed(detail) => {
                        warn!(%policy_id, %detail, "skipping malformed conflict policy");
                        None
                    }
                    PolicyLookup::Missing => None,
                }
            })
            .collect())
    }
}
