use super::*;

#[async_trait]
impl RoleCatalog for InMemorySecurityStore {
    async fn role(&self, role_id: RoleId) -> AppResult<Option<Role>> {
        Ok(self.state.read().await.roles.get(&role_id).cloned())
    }

    async fn roles(&self, role_ids: &[RoleId]) -> AppResult<Vec<Role>> {
        let state = self.state.read().await;
        Ok(role_ids
            .iter()
            .filter_map(|role_id| state.roles.get(role_id).cloned())
            .collect())
    }

    async fn create_role(&self, role: Role) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state
            .roles
            .values()
            .any(|existing| existing.code() == role.code())
        {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                role.code()
            )));
        }

        state.roles.insert(role.id(), role);
        state.bump_catalog();
        Ok(())
    }

    async fn list_roles(&self) -> AppResult<Vec<Role>> {
        let mut roles: Vec<Role> = self.state.read().await.roles.values().cloned().collect();
        roles.sort_by(|left, right| left.code().as_str().cmp(right.code().as_str()));
        Ok(roles)
    }
}

#[async_trait]
impl PermissionCatalog for InMemorySecurityStore {
    async fn permissions_of(&self, role_id: RoleId) -> AppResult<Vec<Permission>> {
        let state = self.state.read().await;
        Ok(state
            .grants
            .iter()
            .filter(|grant| grant.role_id == role_id)
            .filter_map(|grant| state.permissions.get(&grant.permission_id))
            .filter(|permission| permission.status() == RecordStatus::Active)
            .cloned()
            .collect())
    }

    async fn permission(&self, permission_id: PermissionId) -> AppResult<Option<Permission>> {
        Ok(self
            .state
            .read()
            .await
            .permissions
            .get(&permission_id)
            .cloned())
    }

    async fn create_permission(&self, permission: Permission) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state
            .permissions
            .values()
            .any(|existing| existing.code() == permission.code())
        {
            return Err(AppError::Conflict(format!(
                "permission '{}' already exists",
                permission.code()
            )));
        }

        state.permissions.insert(permission.id(), permission);
        state.bump_catalog();
        Ok(())
    }

    async fn grant_permission(&self, grant: RoleGrant) -> AppResult<WriteOutcome<RoleGrant>> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.grants.iter().find(|existing| {
            existing.role_id == grant.role_id && existing.permission_id == grant.permission_id
        }) {
            return Ok(WriteOutcome::Existing(existing.clone()));
        }

        if !state.roles.contains_key(&grant.role_id) {
            return Err(AppError::NotFound(format!(
                "role '{}' does not exist",
                grant.role_id
            )));
        }
        if !state.permissions.contains_key(&grant.permission_id) {
            return Err(AppError::NotFound(format!(
                "permission '{}' does not exist",
                grant.permission_id
            )));
        }

        self.audit
            .append(AuditEntry::role_grant(
                &grant,
                AuditAction::Granted,
                grant.granted_at,
                grant.granted_by,
                None,
            ))
            .await?;

        state.grants.push(grant.clone());
        state.bump_catalog();
        Ok(WriteOutcome::Created(grant))
    }

    async fn revoke_permission(&self, input: RevokePermissionInput) -> AppResult<bool> {
        let mut state = self.state.write().await;
        let Some(index) = state.grants.iter().position(|grant| {
            grant.role_id == input.role_id && grant.permission_id == input.permission_id
        }) else {
            return Ok(false);
        };

        let Some(grant) = state.grants.get(index) else {
            return Ok(false);
        };
        self.audit
            .append(AuditEntry::role_grant(
                grant,
                AuditAction::Revoked,
                input.revoked_at,
                input.revoked_by,
                input.reason,
            ))
            .await?;

        state.grants.remove(index);
        state.bump_catalog();
        Ok(true)
    }

    async fn list_permissions(&self) -> AppResult<Vec<Permission>> {
        let mut permissions: Vec<Permission> = self
            .state
            .read()
            .await
            .permissions
            .values()
            .cloned()
            .collect();
        permissions.sort_by(|left, right| left.code().as_str().cmp(right.code().as_str()));
        Ok(permissions)
    }
}
