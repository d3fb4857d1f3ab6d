//! Redis-backed effective permission cache.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;

use rolegate_application::{CacheKey, CachedPermissions, EffectivePermissionCache};
use rolegate_core::{AppError, AppResult, UserId};

/// Redis implementation of the effective permission cache port.
///
/// Values are JSON documents. A per-principal set indexes the live keys so eviction does
/// not need a keyspace scan.
#[derive(Clone)]
pub struct RedisEffectivePermissionCache {
    client: redis::Client,
    key_prefix: String,
}

impl RedisEffectivePermissionCache {
    /// Creates a cache adapter with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, key: &CacheKey) -> String {
        format!("{}:effective:{}", self.key_prefix, key.storage_key())
    }

    fn index_key_for(&self, user_id: UserId) -> String {
        format!("{}:principal:{user_id}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }
}

#[async_trait]
impl EffectivePermissionCache for RedisEffectivePermissionCache {
    async fn get(&self, key: &CacheKey) -> AppResult<Option<CachedPermissions>> {
        let mut connection = self.connection().await?;
        let encoded: Option<String> = connection.get(self.key_for(key)).await.map_err(|error| {
            AppError::Internal(format!(
                "failed to read effective permission cache entry: {error}"
            ))
        })?;

        encoded
            .as_deref()
            .map(|value| {
                serde_json::from_str::<CachedPermissions>(value).map_err(|error| {
                    AppError::Internal(format!(
                        "invalid effective permission cache value for '{}': {error}",
                        key.storage_key()
                    ))
                })
            })
            .transpose()
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

        let entry_key = self.key_for(&key);
        let index_key = self.index_key_for(key.user_id);
        let encoded = serde_json::to_string(&value).map_err(|error| {
            AppError::Internal(format!(
                "failed to encode effective permission cache entry: {error}"
            ))
        })?;

        let mut connection = self.connection().await?;
        let () = redis::pipe()
            .atomic()
            .set_ex(entry_key.as_str(), encoded, u64::from(ttl_seconds))
            .ignore()
            .sadd(index_key.as_str(), entry_key.as_str())
            .ignore()
            .expire(index_key.as_str(), i64::from(ttl_seconds))
            .ignore()
            .query_async(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to write effective permission cache entry: {error}"
                ))
            })?;

        Ok(())
    }

    async fn invalidate_principal(&self, user_id: UserId) -> AppResult<()> {
        let index_key = self.index_key_for(user_id);
        let mut connection = self.connection().await?;

        let mut keys: Vec<String> = connection
            .smembers(index_key.as_str())
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to read effective permission cache index: {error}"
                ))
            })?;
        keys.push(index_key);

        let _: i64 = connection.del(keys).await.map_err(|error| {
            AppError::Internal(format!(
                "failed to evict effective permission cache entries: {error}"
            ))
        })?;

        Ok(())
    }
}
