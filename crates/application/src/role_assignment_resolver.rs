use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use rolegate_core::AppResult;
use rolegate_domain::{
    ExplanationNote, PolicyId, PolicySelection, RankFields, Role, RoleId, RoleRanking,
    RoleSkipReason, Scope, UserRoleAssignment,
};

use crate::authorization_service::{PrincipalContext, TenantContext};
use crate::security_ports::{AssignmentStore, PolicyChain, PolicyStore, RoleCatalog};

/// Active assignment joined with its role definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveRole {
    /// Assignment that activated the role.
    pub assignment: UserRoleAssignment,
    /// Role definition.
    pub role: Role,
}

impl ActiveRole {
    /// Returns the fields used to rank this role.
    #[must_use]
    pub fn rank_fields(&self) -> RankFields {
        RankFields {
            role_id: self.role.id(),
            priority: self.role.priority(),
            level: self.role.level(),
            granted_at: self.assignment.granted_at(),
        }
    }
}

/// Roles that count for one evaluation, with the policy selected for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveAssignments {
    /// Counted roles.
    pub roles: Vec<ActiveRole>,
    /// Policy in force.
    pub selection: PolicySelection,
    /// Notes about skipped, excluded or truncated roles.
    pub notes: Vec<ExplanationNote>,
    /// Earliest expiry among the counted assignments.
    pub valid_until: Option<DateTime<Utc>>,
}

/// Computes the assignments active for a principal in a tenant at an instant.
#[derive(Clone)]
pub struct RoleAssignmentResolver {
    assignments: Arc<dyn AssignmentStore>,
    roles: Arc<dyn RoleCatalog>,
    policies: Arc<dyn PolicyStore>,
}

impl RoleAssignmentResolver {
    /// Creates a resolver over the given stores.
    #[must_use]
    pub fn new(
        assignments: Arc<dyn AssignmentStore>,
        roles: Arc<dyn RoleCatalog>,
        policies: Arc<dyn PolicyStore>,
    ) -> Self {
        Self {
            assignments,
            roles,
            policies,
        }
    }

    /// Resolves the counted roles and the policy for one evaluation.
    ///
    /// A principal without assignments yields an empty role list, never an error.
    pub async fn resolve_active(
        &self,
        principal: &PrincipalContext,
        tenant: &TenantContext,
        as_of: DateTime<Utc>,
        system_default_policy_id: Option<PolicyId>,
    ) -> AppResult<ActiveAssignments> {
        let mut notes = Vec::new();

        let assignments: Vec<UserRoleAssignment> = self
            .assignments
            .assignments_for(principal.user_id, tenant.tenant_id, as_of)
            .await?
            .into_iter()
            .filter(|assignment| {
                assignment.user_id() == principal.user_id
                    && assignment.is_active_at(as_of)
                    && assignment.applies_to_tenant(tenant.tenant_id)
            })
            .collect();

        let roles = self.load_roles(&assignments).await?;
        let mut candidates: Vec<ActiveRole> = Vec::new();
        let mut earliest: HashMap<RoleId, usize> = HashMap::new();
        for assignment in assignments {
            let role_id = assignment.role_id();
            let Some(role) = roles.get(&role_id) else {
                push_skip(&mut notes, role_id, RoleSkipReason::Missing);
                continue;
            };
            if !role.is_active() {
                push_skip(&mut notes, role_id, RoleSkipReason::Inactive);
                continue;
            }

            match earliest.get(&role_id) {
                Some(index) => {
                    let existing = &mut candidates[*index];
                    if assignment.granted_at() < existing.assignment.granted_at() {
                        existing.assignment = assignment;
                    }
                }
                None => {
                    earliest.insert(role_id, candidates.len());
                    candidates.push(ActiveRole {
                        assignment,
                        role: role.clone(),
                    });
                }
            }
        }

        let selection = self
            .policies
            .resolve(PolicyChain {
                assignment: assignment_override(&candidates),
                principal: principal.default_policy_id,
                tenant: tenant.default_policy_id,
                system: system_default_policy_id,
            })
            .await?;
        let policy = selection.policy();

        if !policy.apply_global_rules() {
            let (global, scoped): (Vec<_>, Vec<_>) = candidates
                .into_iter()
                .partition(|candidate| candidate.assignment.scope() == Scope::Global);
            if !global.is_empty() {
                notes.push(ExplanationNote::GlobalRulesExcluded {
                    roles: global.iter().map(|candidate| candidate.role.id()).collect(),
                });
            }
            candidates = scoped;
        }

        let (kept, dropped) = RoleRanking::for_cap(policy).truncate(
            candidates,
            policy.max_concurrent_roles(),
            ActiveRole::rank_fields,
        );
        if let (Some(cap), false) = (policy.max_concurrent_roles(), dropped.is_empty()) {
            notes.push(ExplanationNote::CapTruncated {
                cap,
                dropped: dropped.iter().map(|candidate| candidate.role.id()).collect(),
            });
        }

        let valid_until = kept
            .iter()
            .filter_map(|candidate| candidate.assignment.expires_at())
            .min();

        Ok(ActiveAssignments {
            roles: kept,
            selection,
            notes,
            valid_until,
        })
    }

    async fn load_roles(
        &self,
        assignments: &[UserRoleAssignment],
    ) -> AppResult<HashMap<RoleId, Role>> {
        if assignments.is_empty() {
            return Ok(HashMap::new());
        }

        let mut role_ids: Vec<RoleId> = assignments
            .iter()
            .map(UserRoleAssignment::role_id)
            .collect();
        role_ids.sort();
        role_ids.dedup();

        Ok(self
            .roles
            .roles(&role_ids)
            .await?
            .into_iter()
            .map(|role| (role.id(), role))
            .collect())
    }
}

/// Override carried by the best-ranked assignment, ranked most privileged level first.
fn assignment_override(candidates: &[ActiveRole]) -> Option<PolicyId> {
    let ranking = RoleRanking::default();
    candidates
        .iter()
        .filter(|candidate| candidate.assignment.conflict_policy_id().is_some())
        .min_by(|left, right| ranking.compare(&left.rank_fields(), &right.rank_fields()))
        .and_then(|candidate| candidate.assignment.conflict_policy_id())
}

fn push_skip(notes: &mut Vec<ExplanationNote>, role_id: RoleId, reason: RoleSkipReason) {
    let note = ExplanationNote::RoleSkipped { role_id, reason };
    if !notes.contains(&note) {
        notes.push(note);
    }
}
