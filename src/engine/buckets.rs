//! Bucket recompute
//!
//! Pure recomputation of member window counters and badge qualification
//! from the ordered content log. Scoped runs rebuild only the requested
//! members and carry everyone else over untouched.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use crate::state::model::{MemberState, DAY_MS};
use crate::state::store::TenantState;
use crate::types::{BadgeId, MemberId};

/// Which members a recompute rebuilds from zero.
///
/// Member scoping is authoritative. A badge scope only records why the
/// recompute ran; every configured badge is still evaluated so sticky
/// conditions stay consistent across badges.
#[derive(Debug, Clone, Default)]
pub struct RecomputeScope {
    members: Option<BTreeSet<MemberId>>,
    badge: Option<BadgeId>,
}

impl RecomputeScope {
    /// Rebuild every member with tracked content.
    pub fn full() -> Self {
        Self::default()
    }

    /// Rebuild exactly these members.
    pub fn for_members<I: IntoIterator<Item = MemberId>>(members: I) -> Self {
        Self {
            members: Some(members.into_iter().collect()),
            badge: None,
        }
    }

    /// Rebuild a single member.
    pub fn for_member(member_id: MemberId) -> Self {
        Self::for_members([member_id])
    }

    /// Full rebuild prompted by one badge's config change.
    pub fn for_badge(badge_id: BadgeId) -> Self {
        Self {
            members: None,
            badge: Some(badge_id),
        }
    }

    pub fn badge(&self) -> Option<&BadgeId> {
        self.badge.as_ref()
    }

    /// Members rebuilt from zero under this scope.
    fn resolve(&self, state: &TenantState) -> BTreeSet<MemberId> {
        match &self.members {
            Some(members) => members.clone(),
            None => state.content().creators(),
        }
    }
}

impl std::fmt::Display for RecomputeScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.members, &self.badge) {
            (Some(members), _) => write!(f, "members={}", members.len()),
            (None, Some(badge)) => write!(f, "badge={}", badge),
            (None, None) => write!(f, "full"),
        }
    }
}

/// One member's recompute result, paired with the badge set tracked for
/// them before the pass. The pair is what the differ consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedMember {
    /// Badges tracked as assigned before this pass (diff baseline).
    pub previous_badges: BTreeSet<BadgeId>,
    /// Rebuilt (or carried-over) state.
    pub state: MemberState,
}

/// Recompute output keyed by member.
pub type ComputedMembers = BTreeMap<MemberId, ComputedMember>;

/// Rebuild window counters and badge qualification.
///
/// In-scope members are re-derived from zero by walking tracked content
/// oldest to newest. Out-of-scope members are carried over unchanged with
/// `previous_badges` equal to their current set, so the differ sees nothing
/// for them. In-scope members are seeded and diffed even when no content or
/// configuration remains: removing the last config or evicting a member's
/// last post must still surface the revokes. A tenant with no members and
/// no content yields an empty map, which callers treat as nothing to
/// reconcile.
pub fn compute_member_buckets(
    state: &TenantState,
    scope: &RecomputeScope,
    now: DateTime<Utc>,
) -> ComputedMembers {
    let mut computed = ComputedMembers::new();

    let rebuilt = scope.resolve(state);

    for (member_id, member) in state.members() {
        if !rebuilt.contains(member_id) {
            computed.insert(
                member_id.clone(),
                ComputedMember {
                    previous_badges: member.badges.clone(),
                    state: member.clone(),
                },
            );
        }
    }

    for member_id in &rebuilt {
        // Inactive badges are frozen: dropping them from the baseline means
        // the revoke they would otherwise produce never materializes.
        let previous_badges: BTreeSet<BadgeId> = state
            .member_badges(member_id)
            .into_iter()
            .filter(|badge_id| {
                state
                    .badge_config(badge_id)
                    .map(|config| config.active)
                    .unwrap_or(true)
            })
            .collect();

        computed.insert(
            member_id.clone(),
            ComputedMember {
                previous_badges,
                state: MemberState::default(),
            },
        );
    }

    // Single ordered walk. Met conditions are sticky, so items later in the
    // walk cannot unmeet a condition crossed earlier.
    let now_ms = now.timestamp_millis();
    for post in state.content().iter() {
        if !post.is_countable() {
            continue;
        }
        let Some(creator) = post.created_by_id.as_ref() else {
            continue;
        };
        if !rebuilt.contains(creator) {
            continue;
        }
        let Some(entry) = computed.get_mut(creator) else {
            continue;
        };

        for (badge_id, config) in state.app_config() {
            if !config.active {
                continue;
            }
            if entry.state.all_conditions_met(config) {
                continue;
            }

            let age_ms = now_ms - post.published_at.timestamp_millis();
            for (condition_id, condition) in &config.conditions {
                if entry.state.is_met(badge_id, condition_id) {
                    continue;
                }
                if age_ms < condition.window_days() * DAY_MS {
                    let counter = entry.state.increment_bucket(badge_id, condition_id);
                    if counter >= condition.threshold() {
                        entry.state.mark_met(badge_id.clone(), condition_id.clone());
                        entry.state.badges.insert(badge_id.clone());
                    }
                }
            }
        }
    }

    computed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::model::{BadgeCondition, BadgeConfig, Post};
    use crate::types::PostId;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 20, 12, 0, 0).unwrap()
    }

    fn post(id: &str, member: &str, days_ago: i64) -> Post {
        Post {
            id: PostId::new(id),
            title: None,
            published_at: now() - Duration::days(days_ago),
            created_by_id: Some(MemberId::new(member)),
            is_hidden: false,
            is_anonymous: false,
            status: Default::default(),
        }
    }

    fn configured_state(threshold: i64, days: i64) -> (TenantState, BadgeId) {
        let badge_id = BadgeId::new("b1");
        let mut state = TenantState::default();
        state.set_badge_config(BadgeConfig::single_condition(
            badge_id.clone(),
            BadgeCondition::posts_within_days(threshold, days),
        ));
        (state, badge_id)
    }

    #[test]
    fn test_three_posts_in_five_days_earns_badge() {
        let (mut state, badge_id) = configured_state(3, 5);
        state.set_post(post("p1", "m1", 1));
        state.set_post(post("p2", "m1", 2));
        state.set_post(post("p3", "m1", 3));
        // Outside the window, must not count.
        state.set_post(post("p4", "m1", 10));

        let computed = compute_member_buckets(&state, &RecomputeScope::full(), now());
        let member = &computed[&MemberId::new("m1")];

        let condition_id = crate::types::ConditionId::for_badge(&badge_id);
        assert_eq!(member.state.bucket_value(&badge_id, &condition_id), 3);
        assert!(member.state.badges.contains(&badge_id));
        assert!(member.previous_badges.is_empty());
    }

    #[test]
    fn test_two_posts_do_not_earn_badge() {
        let (mut state, badge_id) = configured_state(3, 5);
        state.set_post(post("p1", "m1", 1));
        state.set_post(post("p2", "m1", 2));

        let computed = compute_member_buckets(&state, &RecomputeScope::full(), now());
        let member = &computed[&MemberId::new("m1")];
        assert!(!member.state.badges.contains(&badge_id));
    }

    #[test]
    fn test_hidden_anonymous_and_unpublished_items_are_skipped() {
        let (mut state, badge_id) = configured_state(1, 5);

        let mut hidden = post("p1", "m1", 1);
        hidden.is_hidden = true;
        state.set_post(hidden);

        let mut anonymous = post("p2", "m1", 1);
        anonymous.is_anonymous = true;
        state.set_post(anonymous);

        let mut drafted = post("p3", "m1", 1);
        drafted.status = crate::state::model::PostStatus::Drafted;
        state.set_post(drafted);

        let computed = compute_member_buckets(&state, &RecomputeScope::full(), now());
        let member = &computed[&MemberId::new("m1")];
        assert!(!member.state.badges.contains(&badge_id));
        assert!(member.state.buckets.is_empty());
    }

    #[test]
    fn test_untouched_tenant_has_nothing_to_reconcile() {
        // Config but no content: nobody to rebuild, nobody carried over.
        let (state, _) = configured_state(3, 5);
        assert!(compute_member_buckets(&state, &RecomputeScope::full(), now()).is_empty());

        // Content but no config: the creator is seeded, but with empty
        // baseline and empty result there is nothing for the differ.
        let mut state = TenantState::default();
        state.set_post(post("p1", "m1", 1));
        let computed = compute_member_buckets(&state, &RecomputeScope::full(), now());
        let m1 = &computed[&MemberId::new("m1")];
        assert!(m1.previous_badges.is_empty());
        assert!(m1.state.badges.is_empty());
    }

    #[test]
    fn test_removing_last_config_still_surfaces_revoke_baseline() {
        // No configs at all, but m1 is tracked with a badge and still owns
        // content: the rebuild must keep the baseline so the differ revokes.
        let badge_id = BadgeId::new("b1");
        let mut state = TenantState::default();
        state.set_post(post("p1", "m1", 1));
        let mut m1 = MemberState::default();
        m1.badges.insert(badge_id.clone());
        state.put_member(MemberId::new("m1"), m1);

        let scope = RecomputeScope::for_badge(badge_id.clone());
        let computed = compute_member_buckets(&state, &scope, now());

        let m1 = &computed[&MemberId::new("m1")];
        assert!(m1.previous_badges.contains(&badge_id));
        assert!(m1.state.badges.is_empty());
    }

    #[test]
    fn test_scoped_member_with_no_content_left_still_surfaces_revoke_baseline() {
        // The sweep just evicted m1's last post. The member-scoped rebuild
        // must still seed m1 so the held badge shows up as a revoke.
        let (mut state, badge_id) = configured_state(1, 5);
        let mut m1 = MemberState::default();
        m1.badges.insert(badge_id.clone());
        state.put_member(MemberId::new("m1"), m1);

        let scope = RecomputeScope::for_member(MemberId::new("m1"));
        let computed = compute_member_buckets(&state, &scope, now());

        let m1 = &computed[&MemberId::new("m1")];
        assert!(m1.previous_badges.contains(&badge_id));
        assert!(m1.state.badges.is_empty());
    }

    #[test]
    fn test_scoped_recompute_carries_other_members_over() {
        let (mut state, badge_id) = configured_state(1, 5);
        state.set_post(post("p1", "m1", 1));
        state.set_post(post("p2", "m2", 1));

        // m2 already tracked with the badge.
        let mut m2 = MemberState::default();
        m2.badges.insert(badge_id.clone());
        state.put_member(MemberId::new("m2"), m2);

        let scope = RecomputeScope::for_member(MemberId::new("m1"));
        let computed = compute_member_buckets(&state, &scope, now());

        let m1 = &computed[&MemberId::new("m1")];
        assert!(m1.state.badges.contains(&badge_id));

        // Carried over: baseline equals current, so no diff can arise.
        let m2 = &computed[&MemberId::new("m2")];
        assert_eq!(m2.previous_badges, m2.state.badges);
    }

    #[test]
    fn test_scoped_recompute_resets_member_with_no_remaining_posts() {
        let (mut state, badge_id) = configured_state(1, 5);
        state.set_post(post("p1", "m2", 1));

        // m1 tracked with the badge but owns no tracked content anymore.
        let mut m1 = MemberState::default();
        m1.badges.insert(badge_id.clone());
        m1.set_bucket_value(badge_id.clone(), crate::types::ConditionId::for_badge(&badge_id), 3);
        state.put_member(MemberId::new("m1"), m1);

        let scope = RecomputeScope::for_member(MemberId::new("m1"));
        let computed = compute_member_buckets(&state, &scope, now());

        let m1 = &computed[&MemberId::new("m1")];
        assert!(m1.previous_badges.contains(&badge_id));
        assert!(m1.state.badges.is_empty());
        assert!(m1.state.buckets.is_empty());
    }

    #[test]
    fn test_inactive_badge_is_frozen_not_revoked() {
        let (mut state, badge_id) = configured_state(5, 5);
        state.set_badge_config_active(&badge_id, false);
        state.set_post(post("p1", "m1", 1));

        // Tracked as assigned from before the deactivation.
        let mut m1 = MemberState::default();
        m1.badges.insert(badge_id.clone());
        state.put_member(MemberId::new("m1"), m1);

        let computed = compute_member_buckets(&state, &RecomputeScope::full(), now());
        let m1 = &computed[&MemberId::new("m1")];

        // Dropped from the baseline and never recomputed: frozen.
        assert!(m1.previous_badges.is_empty());
        assert!(m1.state.badges.is_empty());
        assert!(m1.state.buckets.is_empty());
    }

    #[test]
    fn test_badge_without_config_stays_in_baseline() {
        let (mut state, _) = configured_state(1, 5);
        state.set_post(post("p1", "m1", 1));

        // Tracked badge whose config was removed: stays in the baseline so
        // the differ revokes it.
        let stale = BadgeId::new("b-removed");
        let mut m1 = MemberState::default();
        m1.badges.insert(stale.clone());
        state.put_member(MemberId::new("m1"), m1);

        let computed = compute_member_buckets(&state, &RecomputeScope::full(), now());
        let m1 = &computed[&MemberId::new("m1")];
        assert!(m1.previous_badges.contains(&stale));
        assert!(!m1.state.badges.contains(&stale));
    }

    #[test]
    fn test_sticky_condition_cleared_by_scope_recompute() {
        let (mut state, badge_id) = configured_state(2, 5);
        state.set_post(post("p1", "m1", 1));
        state.set_post(post("p2", "m1", 2));

        let computed = compute_member_buckets(&state, &RecomputeScope::full(), now());
        let condition_id = crate::types::ConditionId::for_badge(&badge_id);
        assert!(computed[&MemberId::new("m1")]
            .state
            .is_met(&badge_id, &condition_id));

        // Persist, drop one post, recompute the member from zero: the
        // condition resets with the counters.
        for (member_id, member) in &computed {
            state.put_member(member_id.clone(), member.state.clone());
        }
        state.delete_post(&PostId::new("p2"));

        let scope = RecomputeScope::for_member(MemberId::new("m1"));
        let recomputed = compute_member_buckets(&state, &scope, now());
        let m1 = &recomputed[&MemberId::new("m1")];
        assert!(!m1.state.is_met(&badge_id, &condition_id));
        assert_eq!(m1.state.bucket_value(&badge_id, &condition_id), 1);
        assert!(m1.previous_badges.contains(&badge_id));
        assert!(!m1.state.badges.contains(&badge_id));
    }

    #[test]
    fn test_scope_display() {
        assert_eq!(RecomputeScope::full().to_string(), "full");
        assert_eq!(
            RecomputeScope::for_badge(BadgeId::new("b1")).to_string(),
            "badge=b1"
        );
        assert_eq!(
            RecomputeScope::for_member(MemberId::new("m1")).to_string(),
            "members=1"
        );
    }
}
