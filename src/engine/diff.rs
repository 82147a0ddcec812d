//! Badge reconciliation diff
//!
//! Compares freshly computed badge sets against the previously tracked
//! baseline and groups the resulting assigns and revokes by badge.

use std::collections::{BTreeMap, BTreeSet};

use crate::engine::buckets::ComputedMembers;
use crate::types::{BadgeId, MemberId};

/// Assignments and revocations produced by one reconciliation pass,
/// grouped by badge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BadgeDiff {
    pub assign: BTreeMap<BadgeId, Vec<MemberId>>,
    pub revoke: BTreeMap<BadgeId, Vec<MemberId>>,
}

impl BadgeDiff {
    pub fn is_empty(&self) -> bool {
        self.assign.is_empty() && self.revoke.is_empty()
    }

    /// Number of external calls this diff implies.
    pub fn op_count(&self) -> usize {
        self.assign.values().map(Vec::len).sum::<usize>()
            + self.revoke.values().map(Vec::len).sum::<usize>()
    }
}

/// Diff computed badge sets against their baselines.
///
/// Suspended members keep their revocations but never receive assignments.
/// Their qualification still advances in state, so unsuspension can restore
/// badges without a recompute.
pub fn diff_badges(computed: &ComputedMembers, suspended: &BTreeSet<MemberId>) -> BadgeDiff {
    let mut diff = BadgeDiff::default();

    for (member_id, member) in computed {
        let is_suspended = suspended.contains(member_id);

        for badge_id in member.state.badges.difference(&member.previous_badges) {
            if is_suspended {
                continue;
            }
            diff.assign
                .entry(badge_id.clone())
                .or_default()
                .push(member_id.clone());
        }

        for badge_id in member.previous_badges.difference(&member.state.badges) {
            diff.revoke
                .entry(badge_id.clone())
                .or_default()
                .push(member_id.clone());
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buckets::ComputedMember;
    use crate::state::model::MemberState;

    fn computed(member: &str, previous: &[&str], current: &[&str]) -> (MemberId, ComputedMember) {
        let mut state = MemberState::default();
        for badge in current {
            state.badges.insert(BadgeId::new(*badge));
        }
        (
            MemberId::new(member),
            ComputedMember {
                previous_badges: previous.iter().map(|b| BadgeId::new(*b)).collect(),
                state,
            },
        )
    }

    #[test]
    fn test_assign_and_revoke_are_disjoint_per_badge() {
        let mut members = ComputedMembers::new();
        let (id, member) = computed("m1", &["b-old"], &["b-new"]);
        members.insert(id, member);

        let diff = diff_badges(&members, &BTreeSet::new());

        assert_eq!(diff.assign[&BadgeId::new("b-new")], vec![MemberId::new("m1")]);
        assert_eq!(diff.revoke[&BadgeId::new("b-old")], vec![MemberId::new("m1")]);
        assert!(!diff.assign.contains_key(&BadgeId::new("b-old")));
        assert!(!diff.revoke.contains_key(&BadgeId::new("b-new")));
        assert_eq!(diff.op_count(), 2);
    }

    #[test]
    fn test_second_cycle_without_changes_is_empty() {
        let mut members = ComputedMembers::new();
        let (id, member) = computed("m1", &["b1"], &["b1"]);
        members.insert(id, member);
        let (id, member) = computed("m2", &[], &[]);
        members.insert(id, member);

        let diff = diff_badges(&members, &BTreeSet::new());
        assert!(diff.is_empty());
    }

    #[test]
    fn test_suspended_member_keeps_revokes_but_not_assigns() {
        let mut members = ComputedMembers::new();
        let (id, member) = computed("m1", &["b-old"], &["b-new"]);
        members.insert(id, member);

        let suspended: BTreeSet<MemberId> = [MemberId::new("m1")].into_iter().collect();
        let diff = diff_badges(&members, &suspended);

        assert!(diff.assign.is_empty());
        assert_eq!(diff.revoke[&BadgeId::new("b-old")], vec![MemberId::new("m1")]);
    }

    #[test]
    fn test_ops_grouped_by_badge() {
        let mut members = ComputedMembers::new();
        let (id, member) = computed("m1", &[], &["b1"]);
        members.insert(id, member);
        let (id, member) = computed("m2", &[], &["b1"]);
        members.insert(id, member);
        let (id, member) = computed("m3", &["b1"], &[]);
        members.insert(id, member);

        let diff = diff_badges(&members, &BTreeSet::new());

        assert_eq!(
            diff.assign[&BadgeId::new("b1")],
            vec![MemberId::new("m1"), MemberId::new("m2")]
        );
        assert_eq!(diff.revoke[&BadgeId::new("b1")], vec![MemberId::new("m3")]);
    }
}
