use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rolegate_core::{AppResult, TenantId, UserId};
use rolegate_domain::{PolicyId, PolicySelection, PolicyVersion, Resolution};

/// Cache key of one principal's effective permissions in one tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Principal.
    pub user_id: UserId,
    /// Tenant evaluated.
    pub tenant_id: TenantId,
    /// Version observed before the evaluation.
    pub version: PolicyVersion,
    /// Principal default policy passed by the caller.
    pub principal_policy_id: Option<PolicyId>,
    /// Tenant default policy passed by the caller.
    pub tenant_policy_id: Option<PolicyId>,
}

impl CacheKey {
    /// Returns a stable string form for external caches.
    #[must_use]
    pub fn storage_key(&self) -> String {
        let optional = |policy_id: Option<PolicyId>| {
            policy_id.map_or_else(|| "-".to_owned(), |policy_id| policy_id.to_string())
        };

        format!(
            "{}:{}:{}:{}:{}",
            self.user_id,
            self.tenant_id,
            self.version,
            optional(self.principal_policy_id),
            optional(self.tenant_policy_id)
        )
    }
}

/// Memoized resolver output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedPermissions {
    /// Policy the resolution ran under.
    pub selection: PolicySelection,
    /// Resolved permissions.
    pub resolution: Resolution,
    /// Earliest expiry among the assignments that fed the resolution.
    pub valid_until: Option<DateTime<Utc>>,
}

impl CachedPermissions {
    /// Returns whether the entry may still be served at `now`.
    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.is_none_or(|valid_until| valid_until > now)
    }
}

/// Memoization of effective permissions keyed by policy version.
#[async_trait]
pub trait EffectivePermissionCache: Send + Sync {
    /// Returns a cached entry.
    async fn get(&self, key: &CacheKey) -> AppResult<Option<CachedPermissions>>;

    /// Stores an entry with a time-to-live.
    async fn put(&self, key: CacheKey, value: CachedPermissions, ttl_seconds: u32)
    -> AppResult<()>;

    /// Drops every entry of the principal.
    async fn invalidate_principal(&self, user_id: UserId) -> AppResult<()>;
}
