//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod assignment;
mod audit;
mod conflict;
mod decision;
mod ids;
mod permission;
mod policy;
mod role;

pub use assignment::{AssignmentInput, AssignmentKey, AssignmentState, UserRoleAssignment};
pub use audit::{AuditAction, AuditEntry, AuditTarget};
pub use conflict::{
    AllowUnion, ConflictResolver, DenyOverride, MergeOutcome, MergeStrategy, MostRestrictive,
    PriorityBased, RankFields, Resolution, RoleRanking, RolePermissionSet,
};
pub use decision::{
    ACCESS_DENIED_MESSAGE, AppliedPolicy, Decision, DenialCode, ExplanationNote, RoleSkipReason,
};
pub use ids::{AssignmentId, AuditEntryId, PermissionId, PolicyId, RoleId};
pub use permission::{
    AppliesTo, Permission, PermissionAction, PermissionCode, PermissionInput, RoleGrant,
};
pub use policy::{
    ConflictPolicy, ConflictPolicyInput, ConflictStrategy, FAIL_CLOSED_POLICY_CODE,
    PolicyFallback, PolicySelection, PolicySource, PolicyVersion, PriorityDirection,
};
pub use role::{ROLE_LEVEL_MAX, ROLE_LEVEL_MIN, RecordStatus, Role, RoleCategory, RoleInput, Scope};
