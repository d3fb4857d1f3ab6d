use super::*;

#[async_trait]
impl AssignmentStore for InMemorySecurityStore {
    async fn assignments_for(
        &self,
        user_id: UserId,
        tenant_id: TenantId,
        _as_of: DateTime<Utc>,
    ) -> AppResult<Vec<UserRoleAssignment>> {
        Ok(self
            .state
            .read()
            .await
            .assignments
            .iter()
            .filter(|assignment| {
                assignment.user_id() == user_id && assignment.applies_to_tenant(tenant_id)
            })
            .cloned()
            .collect())
    }

    async fn create_assignment(
        &self,
        input: AssignmentInput,
        granted_at: DateTime<Utc>,
    ) -> AppResult<WriteOutcome<UserRoleAssignment>> {
        let mut state = self.state.write().await;
        if let Some(existing) = state
            .assignments
            .iter()
            .find(|assignment| assignment.key() == input.key && assignment.is_active_at(granted_at))
        {
            return Ok(WriteOutcome::Existing(existing.clone()));
        }

        if !state.roles.contains_key(&input.key.role_id) {
            return Err(AppError::NotFound(format!(
                "role '{}' does not exist",
                input.key.role_id
            )));
        }

        let assignment = UserRoleAssignment::grant(AssignmentId::new(), input, granted_at)?;
        self.audit
            .append(AuditEntry::assignment(
                assignment.id(),
                assignment.user_id(),
                assignment.role_id(),
                AuditAction::Granted,
                granted_at,
                assignment.granted_by(),
                None,
            ))
            .await?;

        state.bump_principal(assignment.user_id());
        state.assignments.push(assignment.clone());
        Ok(WriteOutcome::Created(assignment))
    }

    async fn revoke_assignments(
        &self,
        input: RevokeAssignmentsInput,
    ) -> AppResult<Vec<UserRoleAssignment>> {
        let mut state = self.state.write().await;
        let mut revoked = Vec::new();
        for assignment in state.assignments.iter().filter(|assignment| {
            assignment.user_id() == input.user_id
                && assignment.role_id() == input.role_id
                && assignment.is_active_at(input.revoked_at)
        }) {
            let mut assignment = assignment.clone();
            assignment.revoke(input.revoked_at, input.revoked_by, &input.reason)?;
            revoked.push(assignment);
        }

        if revoked.is_empty() {
            return Ok(revoked);
        }

        self.audit
            .append_all(
                revoked
                    .iter()
                    .map(|assignment| {
                        AuditEntry::assignment(
                            assignment.id(),
                            assignment.user_id(),
                            assignment.role_id(),
                            AuditAction::Revoked,
                            input.revoked_at,
                            input.revoked_by,
                            Some(input.reason.clone()),
                        )
                    })
                    .collect(),
            )
            .await?;

        for assignment in &revoked {
            if let Some(stored) = state
                .assignments
                .iter_mut()
                .find(|stored| stored.id() == assignment.id())
            {
                *stored = assignment.clone();
            }
        }
        state.bump_principal(input.user_id);

        Ok(revoked)
    }

    async fn policy_version(&self, user_id: UserId) -> AppResult<PolicyVersion> {
        let state = self.state.read().await;
        Ok(PolicyVersion {
            catalog: state.catalog_epoch,
            principal: state
                .principal_epochs
                .get(&user_id)
                .copied()
                .unwrap_or_default(),
        })
    }
}
