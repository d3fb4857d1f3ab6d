use super::*;

#[async_trait]
impl PolicyStore for InMemorySecurityStore {
    async fn find_policy(&self, policy_id: PolicyId) -> AppResult<PolicyLookup> {
        Ok(self
            .state
            .read()
            .await
            .policies
            .get(&policy_id)
            .cloned()
            .map_or(PolicyLookup::Missing, PolicyLookup::Found))
    }

    async fn save_policy(&self, policy: ConflictPolicy) -> AppResult<()> {
        let mut state = self.state.write().await;
        if state
            .policies
            .values()
            .any(|existing| existing.id() != policy.id() && existing.code() == policy.code())
        {
            return Err(AppError::Conflict(format!(
                "conflict policy '{}' already exists",
                policy.code()
            )));
        }

        if state
            .policies
            .get(&policy.id())
            .is_some_and(ConflictPolicy::is_system)
        {
            return Err(AppError::InvalidPolicyConfiguration(format!(
                "system policy '{}' is immutable",
                policy.code()
            )));
        }

        state.policies.insert(policy.id(), policy);
        state.bump_catalog();
        Ok(())
    }

    async fn list_policies(&self) -> AppResult<Vec<ConflictPolicy>> {
        let mut policies: Vec<ConflictPolicy> =
            self.state.read().await.policies.values().cloned().collect();
        policies.sort_by(|left, right| left.code().cmp(right.code()));
        Ok(policies)
    }
}
