use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use rolegate_application::{CacheKey, CachedPermissions, EffectivePermissionCache};
use rolegate_core::{AppResult, UserId};

#[derive(Debug, Clone)]
struct EffectivePermissionEntry {
    value: CachedPermissions,
    expires_at: Instant,
}

/// In-memory cache adapter for effective permissions.
#[derive(Default)]
pub struct InMemoryEffectivePermissionCache {
    entries: RwLock<HashMap<CacheKey, EffectivePermissionEntry>>,
}

impl InMemoryEffectivePermissionCache {
    /// Creates an empty in-memory effective permission cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EffectivePermissionCache for InMemoryEffectivePermissionCache {
    async fn get(&self, key: &CacheKey) -> AppResult<Option<CachedPermissions>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => {
                    return Ok(Some(entry.value.clone()));
                }
                Some(_) => {}
                None => return Ok(None),
            }
        }

        let mut entries = self.entries.write().await;
        if entries
            .get(key)
            .is_some_and(|entry| entry.expires_at <= Instant::now())
        {
            entries.remove(key);
        }

        Ok(None)
    }

    async fn put(
        &self,
        key: CacheKey,
        value: CachedPermissions,
        ttl_seconds: u32,
    ) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Ok(());
        }

        let now = Instant::now();
        let expires_at = now
            .checked_add(Duration::from_secs(u64::from(ttl_seconds)))
            .unwrap_or(now);

        let mut entries = self.entries.write().await;
        // expired entries and superseded versions of the same principal are unreachable
        entries.retain(|existing, entry| {
            entry.expires_at > now
                && (existing.user_id != key.user_id || existing.version >= key.version)
        });
        entries.insert(key, EffectivePermissionEntry { value, expires_at });

        Ok(())
    }

    async fn invalidate_principal(&self, user_id: UserId) -> AppResult<()> {
        self.entries
            .write()
            .await
            .retain(|key, _| key.user_id != user_id);
        Ok(())
    }
}
