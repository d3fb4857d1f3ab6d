//! Merging of per-role permission sets under a conflict policy.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    ConflictPolicy, ConflictStrategy, ExplanationNote, PermissionCode, PolicySelection,
    PriorityDirection, RoleCategory, RoleId,
};

/// Fields that decide which of two roles wins a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankFields {
    /// Role being ranked.
    pub role_id: RoleId,
    /// Role priority.
    pub priority: i32,
    /// Role level.
    pub level: u8,
    /// Grant instant of the assignment that brought the role in.
    pub granted_at: DateTime<Utc>,
}

/// Total order over roles derived from a conflict policy.
///
/// The winner has the best key in the configured direction, then the earliest
/// `granted_at`, then the smallest role id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleRanking {
    use_role_priority: bool,
    direction: PriorityDirection,
}

impl Default for RoleRanking {
    /// Most privileged level first.
    fn default() -> Self {
        Self {
            use_role_priority: false,
            direction: PriorityDirection::Asc,
        }
    }
}

impl RoleRanking {
    /// Builds the ranking configured by `policy`.
    #[must_use]
    pub fn for_policy(policy: &ConflictPolicy) -> Self {
        Self {
            use_role_priority: policy.use_role_priority(),
            direction: policy.effective_direction(),
        }
    }

    /// Builds the ranking used to enforce `max_concurrent_roles`.
    ///
    /// Always keyed on role priority, in the policy's effective direction.
    #[must_use]
    pub fn for_cap(policy: &ConflictPolicy) -> Self {
        Self {
            use_role_priority: true,
            direction: policy.effective_direction(),
        }
    }

    /// Returns the ranking key of a role.
    #[must_use]
    pub fn key(&self, fields: &RankFields) -> i64 {
        if self.use_role_priority {
            i64::from(fields.priority)
        } else {
            i64::from(fields.level)
        }
    }

    /// Orders two roles so that the winner compares as `Less`.
    #[must_use]
    pub fn compare(&self, left: &RankFields, right: &RankFields) -> Ordering {
        let by_key = match self.direction {
            PriorityDirection::Asc => self.key(left).cmp(&self.key(right)),
            PriorityDirection::Desc => self.key(right).cmp(&self.key(left)),
        };

        by_key
            .then_with(|| left.granted_at.cmp(&right.granted_at))
            .then_with(|| left.role_id.cmp(&right.role_id))
    }

    /// Keeps the best `cap` items and returns the dropped ones separately.
    pub fn truncate<T>(
        &self,
        mut items: Vec<T>,
        cap: Option<u32>,
        fields: impl Fn(&T) -> RankFields,
    ) -> (Vec<T>, Vec<T>) {
        let Some(cap) = cap.and_then(|cap| usize::try_from(cap).ok()) else {
            return (items, Vec::new());
        };
        if items.len() <= cap {
            return (items, Vec::new());
        }

        items.sort_by(|left, right| self.compare(&fields(left), &fields(right)));
        let dropped = items.split_off(cap);
        (items, dropped)
    }
}

/// Permissions contributed by one active role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePermissionSet {
    /// Contributing role.
    pub role_id: RoleId,
    /// Role code, kept for explanations.
    pub role_code: String,
    /// Role family.
    pub category: RoleCategory,
    /// Role priority.
    pub priority: i32,
    /// Role level.
    pub level: u8,
    /// Grant instant of the assignment that activated the role.
    pub granted_at: DateTime<Utc>,
    /// Granted permission codes.
    pub permissions: BTreeSet<PermissionCode>,
}

impl RolePermissionSet {
    /// Returns the fields used to rank this set.
    #[must_use]
    pub fn rank_fields(&self) -> RankFields {
        RankFields {
            role_id: self.role_id,
            priority: self.priority,
            level: self.level,
            granted_at: self.granted_at,
        }
    }
}

/// Output of one merge strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Merged permission codes.
    pub permissions: BTreeSet<PermissionCode>,
    /// Roles whose sets shaped the result.
    pub contributing_roles: Vec<RoleId>,
}

/// Merge rule over a non-empty slice of role permission sets.
pub trait MergeStrategy: Send + Sync {
    /// Merges `sets` into one outcome.
    fn merge(&self, sets: &[RolePermissionSet], ranking: &RoleRanking) -> MergeOutcome;
}

/// Intersection of every set.
#[derive(Debug, Clone, Copy, Default)]
pub struct DenyOverride;

impl MergeStrategy for DenyOverride {
    fn merge(&self, sets: &[RolePermissionSet], _ranking: &RoleRanking) -> MergeOutcome {
        let mut iter = sets.iter();
        let Some(first) = iter.next() else {
            return MergeOutcome::default();
        };

        let permissions = iter.fold(first.permissions.clone(), |acc, set| {
            acc.intersection(&set.permissions).cloned().collect()
        });

        MergeOutcome {
            permissions,
            contributing_roles: sets.iter().map(|set| set.role_id).collect(),
        }
    }
}

/// Union of every set.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowUnion;

impl MergeStrategy for AllowUnion {
    fn merge(&self, sets: &[RolePermissionSet], _ranking: &RoleRanking) -> MergeOutcome {
        MergeOutcome {
            permissions: sets
                .iter()
                .flat_map(|set| set.permissions.iter().cloned())
                .collect(),
            contributing_roles: sets.iter().map(|set| set.role_id).collect(),
        }
    }
}

/// The best-ranked role alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityBased;

impl MergeStrategy for PriorityBased {
    fn merge(&self, sets: &[RolePermissionSet], ranking: &RoleRanking) -> MergeOutcome {
        sets.iter()
            .min_by(|left, right| ranking.compare(&left.rank_fields(), &right.rank_fields()))
            .map(single_role_outcome)
            .unwrap_or_default()
    }
}

/// The role granting the fewest permissions, ranked ties.
#[derive(Debug, Clone, Copy, Default)]
pub struct MostRestrictive;

impl MergeStrategy for MostRestrictive {
    fn merge(&self, sets: &[RolePermissionSet], ranking: &RoleRanking) -> MergeOutcome {
        sets.iter()
            .min_by(|left, right| {
                left.permissions
                    .len()
                    .cmp(&right.permissions.len())
                    .then_with(|| ranking.compare(&left.rank_fields(), &right.rank_fields()))
            })
            .map(single_role_outcome)
            .unwrap_or_default()
    }
}

fn single_role_outcome(set: &RolePermissionSet) -> MergeOutcome {
    MergeOutcome {
        permissions: set.permissions.clone(),
        contributing_roles: vec![set.role_id],
    }
}

impl ConflictStrategy {
    /// Returns the strategy object implementing this merge rule.
    #[must_use]
    pub fn merge_strategy(&self) -> &'static dyn MergeStrategy {
        match self {
            Self::DenyOverride => &DenyOverride,
            Self::AllowUnion => &AllowUnion,
            Self::PriorityBased => &PriorityBased,
            Self::MostRestrictive => &MostRestrictive,
        }
    }
}

/// Policy-resolved permissions of one principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Effective permission set.
    pub effective: BTreeSet<PermissionCode>,
    /// Roles whose sets shaped the effective set.
    pub contributing_roles: Vec<RoleId>,
    /// Strategy that actually ran.
    pub strategy_applied: ConflictStrategy,
    /// Notes explaining how the set was produced.
    pub notes: Vec<ExplanationNote>,
}

impl Resolution {
    /// Returns the effective code granting `requested`, honoring `<resource>.manage`.
    #[must_use]
    pub fn matching_permission(&self, requested: &PermissionCode) -> Option<PermissionCode> {
        if self.effective.contains(requested) {
            return Some(requested.clone());
        }

        let manage = requested.manage_code();
        self.effective.contains(&manage).then_some(manage)
    }
}

/// Pure conflict resolution over role permission sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictResolver;

impl ConflictResolver {
    /// Applies the selected policy to `sets`.
    ///
    /// Manager admin sets skip the strategy unless the policy applies it to admins, and
    /// are unioned into the result afterwards.
    #[must_use]
    pub fn resolve(selection: &PolicySelection, sets: Vec<RolePermissionSet>) -> Resolution {
        let policy = selection.policy();
        let strategy = policy.conflict_strategy();
        let mut notes = Vec::new();
        if let Some(fallback) = selection.fallback() {
            notes.push(ExplanationNote::PolicyFallback {
                reason: fallback.clone(),
            });
        }

        if sets.is_empty() {
            notes.push(ExplanationNote::NoActiveRoles);
            return Resolution {
                effective: BTreeSet::new(),
                contributing_roles: Vec::new(),
                strategy_applied: strategy,
                notes,
            };
        }

        let (admins, governed): (Vec<_>, Vec<_>) = if policy.apply_to_admins() {
            (Vec::new(), sets)
        } else {
            sets.into_iter()
                .partition(|set| set.category == RoleCategory::ManagerAdmin)
        };

        let ranking = RoleRanking::for_policy(policy);
        let mut outcome = if governed.is_empty() {
            MergeOutcome::default()
        } else {
            strategy.merge_strategy().merge(&governed, &ranking)
        };

        if !admins.is_empty() {
            notes.push(ExplanationNote::AdminCarveOut {
                roles: admins.iter().map(|set| set.role_id).collect(),
            });
            for admin in admins {
                outcome.permissions.extend(admin.permissions);
                outcome.contributing_roles.push(admin.role_id);
            }
        }

        Resolution {
            effective: outcome.permissions,
            contributing_roles: outcome.contributing_roles,
            strategy_applied: strategy,
            notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    use super::{ConflictResolver, RoleRanking, RolePermissionSet};
    use crate::{
        ConflictPolicy, ConflictPolicyInput, ConflictStrategy, ExplanationNote, PermissionCode,
        PolicyFallback, PolicyId, PolicySelection, PolicySource, PriorityDirection,
        RoleCategory, RoleId,
    };

    fn epoch() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    fn codes(values: &[&str]) -> BTreeSet<PermissionCode> {
        values
            .iter()
            .filter_map(|value| PermissionCode::parse(value).ok())
            .collect()
    }

    fn role_set(id: u128, priority: i32, permissions: &[&str]) -> RolePermissionSet {
        RolePermissionSet {
            role_id: RoleId::from_uuid(Uuid::from_u128(id)),
            role_code: format!("role.{id}"),
            category: RoleCategory::TenantUser,
            priority,
            level: 100,
            granted_at: epoch(),
            permissions: codes(permissions),
        }
    }

    fn selection(
        strategy: ConflictStrategy,
        direction: Option<PriorityDirection>,
    ) -> PolicySelection {
        let policy = ConflictPolicy::new(
            PolicyId::new(),
            ConflictPolicyInput {
                code: "test.policy".to_owned(),
                conflict_strategy: strategy,
                max_concurrent_roles: None,
                use_role_priority: direction.is_some(),
                priority_direction: direction,
                apply_global_rules: true,
                apply_to_admins: false,
                is_system: false,
            },
        );
        let Ok(policy) = policy else {
            panic!("expected a valid policy");
        };
        PolicySelection::configured(policy, PolicySource::Tenant)
    }

    fn reader_and_writer() -> Vec<RolePermissionSet> {
        vec![
            role_set(1, 10, &["orders.read"]),
            role_set(2, 5, &["orders.read", "orders.update"]),
        ]
    }

    #[test]
    fn allow_union_is_union() {
        let resolution = ConflictResolver::resolve(
            &selection(ConflictStrategy::AllowUnion, None),
            reader_and_writer(),
        );
        assert_eq!(
            resolution.effective,
            codes(&["orders.read", "orders.update"])
        );
        assert_eq!(resolution.contributing_roles.len(), 2);
    }

    #[test]
    fn deny_override_is_intersection() {
        let resolution = ConflictResolver::resolve(
            &selection(ConflictStrategy::DenyOverride, None),
            reader_and_writer(),
        );
        assert_eq!(resolution.effective, codes(&["orders.read"]));
    }

    #[test]
    fn priority_based_honors_direction() {
        let ascending = ConflictResolver::resolve(
            &selection(ConflictStrategy::PriorityBased, Some(PriorityDirection::Asc)),
            reader_and_writer(),
        );
        assert_eq!(
            ascending.effective,
            codes(&["orders.read", "orders.update"])
        );

        let descending = ConflictResolver::resolve(
            &selection(ConflictStrategy::PriorityBased, Some(PriorityDirection::Desc)),
            reader_and_writer(),
        );
        assert_eq!(descending.effective, codes(&["orders.read"]));
        assert_eq!(
            descending.contributing_roles,
            vec![RoleId::from_uuid(Uuid::from_u128(1))]
        );
    }

    #[test]
    fn priority_ties_break_on_grant_time_then_role_id() {
        let mut early = role_set(9, 5, &["orders.read"]);
        early.granted_at = epoch() - Duration::days(1);
        let late = role_set(3, 5, &["orders.update"]);
        let sets = vec![late.clone(), early];

        let resolution = ConflictResolver::resolve(
            &selection(ConflictStrategy::PriorityBased, Some(PriorityDirection::Asc)),
            sets,
        );
        assert_eq!(resolution.effective, codes(&["orders.read"]));

        let same_time = vec![role_set(9, 5, &["orders.read"]), late];
        let resolution = ConflictResolver::resolve(
            &selection(ConflictStrategy::PriorityBased, Some(PriorityDirection::Asc)),
            same_time,
        );
        assert_eq!(resolution.effective, codes(&["orders.update"]));
    }

    #[test]
    fn most_restrictive_picks_smallest_set() {
        let resolution = ConflictResolver::resolve(
            &selection(ConflictStrategy::MostRestrictive, None),
            reader_and_writer(),
        );
        assert_eq!(resolution.effective, codes(&["orders.read"]));
    }

    #[test]
    fn empty_input_is_empty_for_every_strategy() {
        for strategy in [
            ConflictStrategy::DenyOverride,
            ConflictStrategy::AllowUnion,
            ConflictStrategy::PriorityBased,
            ConflictStrategy::MostRestrictive,
        ] {
            let resolution = ConflictResolver::resolve(&selection(strategy, None), Vec::new());
            assert!(resolution.effective.is_empty());
            assert!(resolution.notes.contains(&ExplanationNote::NoActiveRoles));
        }
    }

    #[test]
    fn manager_admins_bypass_the_strategy() {
        let mut admin = role_set(7, 1, &["tenants.manage"]);
        admin.category = RoleCategory::ManagerAdmin;
        let mut sets = reader_and_writer();
        sets.push(admin);

        let resolution = ConflictResolver::resolve(
            &selection(ConflictStrategy::DenyOverride, None),
            sets,
        );
        assert_eq!(
            resolution.effective,
            codes(&["orders.read", "tenants.manage"])
        );
        assert!(resolution.notes.iter().any(|note| matches!(
            note,
            ExplanationNote::AdminCarveOut { roles } if roles.len() == 1
        )));
    }

    #[test]
    fn fallback_is_flagged() {
        let fallback = PolicySelection::fail_closed(PolicyFallback::Missing {
            policy_id: PolicyId::new(),
        });
        let resolution = ConflictResolver::resolve(&fallback, reader_and_writer());

        assert_eq!(resolution.strategy_applied, ConflictStrategy::DenyOverride);
        assert_eq!(resolution.effective, codes(&["orders.read"]));
        assert!(
            resolution
                .notes
                .iter()
                .any(|note| matches!(note, ExplanationNote::PolicyFallback { .. }))
        );
    }

    #[test]
    fn manage_permission_matches_every_action() {
        let resolution = ConflictResolver::resolve(
            &selection(ConflictStrategy::AllowUnion, None),
            vec![role_set(1, 1, &["orders.manage"])],
        );
        let Ok(requested) = PermissionCode::parse("orders.delete") else {
            panic!("expected a valid code");
        };
        assert_eq!(
            resolution
                .matching_permission(&requested)
                .map(|code| code.to_string()),
            Some("orders.manage".to_owned())
        );
    }

    #[test]
    fn truncate_keeps_best_ranked_items() {
        let Ok(policy) = ConflictPolicy::new(
            PolicyId::new(),
            ConflictPolicyInput {
                code: "capped".to_owned(),
                conflict_strategy: ConflictStrategy::AllowUnion,
                max_concurrent_roles: Some(1),
                use_role_priority: true,
                priority_direction: Some(PriorityDirection::Asc),
                apply_global_rules: true,
                apply_to_admins: false,
                is_system: false,
            },
        ) else {
            panic!("expected a valid policy");
        };
        let ranking = RoleRanking::for_policy(&policy);

        let (kept, dropped) = ranking.truncate(
            reader_and_writer(),
            policy.max_concurrent_roles(),
            RolePermissionSet::rank_fields,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].priority, 5);
        assert_eq!(dropped.len(), 1);
    }

    #[test]
    fn cap_ranking_keys_on_priority_regardless_of_merge_settings() {
        let Ok(policy) = ConflictPolicy::new(
            PolicyId::new(),
            ConflictPolicyInput {
                code: "test.capped".to_owned(),
                conflict_strategy: ConflictStrategy::AllowUnion,
                max_concurrent_roles: Some(1),
                use_role_priority: false,
                priority_direction: None,
                apply_global_rules: true,
                apply_to_admins: false,
                is_system: false,
            },
        ) else {
            panic!("expected a valid policy");
        };
        let mut sets = reader_and_writer();
        sets[0].level = 20;
        sets[1].granted_at = epoch() + Duration::hours(1);

        let (kept, dropped) = RoleRanking::for_cap(&policy).truncate(
            sets,
            policy.max_concurrent_roles(),
            RolePermissionSet::rank_fields,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].priority, 5);
        assert_eq!(dropped.len(), 1);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        const CODES: &[&str] = &[
            "orders.read",
            "orders.update",
            "orders.delete",
            "invoices.read",
            "invoices.create",
            "users.list",
        ];

        fn arbitrary_sets() -> impl Strategy<Value = Vec<RolePermissionSet>> {
            prop::collection::vec(
                (
                    any::<u16>(),
                    -20i32..20,
                    prop::collection::btree_set(0usize..CODES.len(), 0..CODES.len()),
                    0i64..5,
                ),
                1..6,
            )
            .prop_map(|rows| {
                rows.into_iter()
                    .enumerate()
                    .map(|(index, (id, priority, picked, days))| {
                        let mut set = role_set(
                            (u128::from(id) << 8) | index as u128,
                            priority,
                            &picked.iter().map(|pick| CODES[*pick]).collect::<Vec<_>>(),
                        );
                        set.granted_at = epoch() + Duration::days(days);
                        set
                    })
                    .collect()
            })
        }

        proptest! {
            #[test]
            fn union_contains_every_set(sets in arbitrary_sets()) {
                let resolution = ConflictResolver::resolve(
                    &selection(ConflictStrategy::AllowUnion, None),
                    sets.clone(),
                );
                for set in &sets {
                    prop_assert!(set.permissions.is_subset(&resolution.effective));
                }
            }

            #[test]
            fn intersection_is_inside_every_set(sets in arbitrary_sets()) {
                let resolution = ConflictResolver::resolve(
                    &selection(ConflictStrategy::DenyOverride, None),
                    sets.clone(),
                );
                for set in &sets {
                    prop_assert!(resolution.effective.is_subset(&set.permissions));
                }
            }

            #[test]
            fn most_restrictive_is_a_smallest_input(sets in arbitrary_sets()) {
                let resolution = ConflictResolver::resolve(
                    &selection(ConflictStrategy::MostRestrictive, None),
                    sets.clone(),
                );
                prop_assert!(sets.iter().any(|set| set.permissions == resolution.effective));
                for set in &sets {
                    prop_assert!(resolution.effective.len() <= set.permissions.len());
                }
            }

            #[test]
            fn single_role_strategies_ignore_input_order(sets in arbitrary_sets()) {
                for (strategy, direction) in [
                    (ConflictStrategy::PriorityBased, Some(PriorityDirection::Asc)),
                    (ConflictStrategy::PriorityBased, Some(PriorityDirection::Desc)),
                    (ConflictStrategy::MostRestrictive, None),
                ] {
                    let forward = ConflictResolver::resolve(
                        &selection(strategy, direction),
                        sets.clone(),
                    );
                    let mut reversed_sets = sets.clone();
                    reversed_sets.reverse();
                    let reversed = ConflictResolver::resolve(
                        &selection(strategy, direction),
                        reversed_sets,
                    );
                    prop_assert_eq!(&forward.effective, &reversed.effective);
                    prop_assert_eq!(&forward.contributing_roles, &reversed.contributing_roles);
                }
            }
        }
    }
}
