mod assignments;
mod audit;
mod cache;
mod catalog;
mod policies;

pub use assignments::{AssignmentStore, RevokeAssignmentsInput, WriteOutcome};
pub use audit::{AuditQuery, AuditSink};
pub use cache::{CacheKey, CachedPermissions, EffectivePermissionCache};
pub use catalog::{PermissionCatalog, RevokePermissionInput, RoleCatalog};
pub use policies::{PolicyChain, PolicyLookup, PolicyStore};
