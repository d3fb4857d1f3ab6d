use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use rolegate_core::AppResult;
use rolegate_domain::ConflictResolver;

use crate::security_ports::{CacheKey, CachedPermissions};

use super::*;

impl AuthorizationService {
    /// Returns effective permissions, served from the cache for call-time evaluations.
    pub(super) async fn effective(
        &self,
        context: &AccessContext,
        as_of: Option<DateTime<Utc>>,
    ) -> AppResult<CachedPermissions> {
        match as_of {
            Some(as_of) => self.compute(context, as_of).await,
            None => self.effective_now(context).await,
        }
    }

    async fn effective_now(&self, context: &AccessContext) -> AppResult<CachedPermissions> {
        let now = Utc::now();
        let version = self
            .stores
            .assignments
            .policy_version(context.principal.user_id)
            .await?;
        let key = CacheKey {
            user_id: context.principal.user_id,
            tenant_id: context.tenant.tenant_id,
            version,
            principal_policy_id: context.principal.default_policy_id,
            tenant_policy_id: context.tenant.default_policy_id,
        };

        match self.stores.cache.get(&key).await {
            Ok(Some(cached)) if cached.is_fresh_at(now) => {
                debug!(user_id = %key.user_id, tenant_id = %key.tenant_id, %version, "effective permission cache hit");
                return Ok(cached);
            }
            Ok(_) => {
                debug!(user_id = %key.user_id, tenant_id = %key.tenant_id, %version, "effective permission cache miss");
            }
            Err(error) => {
                warn!(user_id = %key.user_id, %error, "effective permission cache read failed");
            }
        }

        let computed = self.compute(context, now).await?;
        if let Err(error) = self
            .stores
            .cache
            .put(key, computed.clone(), self.settings.cache_ttl_seconds)
            .await
        {
            warn!(user_id = %key.user_id, %error, "effective permission cache write failed");
        }

        Ok(computed)
    }

    async fn compute(
        &self,
        context: &AccessContext,
        as_of: DateTime<Utc>,
    ) -> AppResult<CachedPermissions> {
        let active = self
            .resolver
            .resolve_active(
                &context.principal,
                &context.tenant,
                as_of,
                self.settings.system_default_policy_id,
            )
            .await?;

        if let Some(fallback) = active.selection.fallback() {
            warn!(
                user_id = %context.principal.user_id,
                tenant_id = %context.tenant.tenant_id,
                ?fallback,
                "conflict policy unavailable, using fail-closed deny override"
            );
        }

        let sets = self.builder.expand(&active.roles).await?;
        let mut resolution = ConflictResolver::resolve(&active.selection, sets);
        let mut notes = active.notes;
        notes.append(&mut resolution.notes);
        resolution.notes = notes;

        Ok(CachedPermissions {
            selection: active.selection,
            resolution,
            valid_until: active.valid_until,
        })
    }
}
