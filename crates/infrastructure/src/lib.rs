//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_audit_sink;
mod in_memory_effective_permission_cache;
mod in_memory_security_store;
mod postgres_security_store;
mod redis_effective_permission_cache;

pub use in_memory_audit_sink::InMemoryAuditSink;
pub use in_memory_effective_permission_cache::InMemoryEffectivePermissionCache;
pub use in_memory_security_store::InMemorySecurityStore;
pub use postgres_security_store::PostgresSecurityStore;
pub use redis_effective_permission_cache::RedisEffectivePermissionCache;
