//! Ordered content log
//!
//! Tracks post metadata in ascending publish order so bucket recomputes can
//! walk oldest-to-newest and window eviction can stop at the first item that
//! is still inside the window.

use std::collections::{BTreeSet, HashMap, VecDeque};

use chrono::{DateTime, Utc};

use crate::state::model::Post;
use crate::types::{MemberId, PostId};

/// Post log ordered by publish time.
///
/// The deque holds ids in ascending `published_at` order and the map holds
/// the items themselves. Upserts preserve the order, so the front of the
/// deque is always the oldest tracked item.
#[derive(Debug, Clone, Default)]
pub struct ContentLog {
    order: VecDeque<PostId>,
    items: HashMap<PostId, Post>,
}

impl ContentLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn get(&self, id: &PostId) -> Option<&Post> {
        self.items.get(id)
    }

    /// Oldest tracked item, if any.
    pub fn oldest(&self) -> Option<&Post> {
        self.order.front().and_then(|id| self.items.get(id))
    }

    /// Insert or update an item, keeping publish order.
    ///
    /// An update that changes `published_at` repositions the item; otherwise
    /// it is replaced in place.
    pub fn upsert(&mut self, post: Post) {
        match self.items.get(&post.id) {
            Some(existing) if existing.published_at == post.published_at => {
                self.items.insert(post.id.clone(), post);
            }
            Some(_) => {
                self.remove_from_order(&post.id);
                self.insert_ordered(post);
            }
            None => {
                self.insert_ordered(post);
            }
        }
    }

    /// Remove an item by id.
    pub fn remove(&mut self, id: &PostId) -> Option<Post> {
        let removed = self.items.remove(id);
        if removed.is_some() {
            self.remove_from_order(id);
        }
        removed
    }

    /// Pop every item published at or before the cutoff, oldest first.
    ///
    /// Stops at the first item inside the window; everything behind it is
    /// guaranteed newer by the ordering invariant.
    pub fn pop_expired(&mut self, cutoff: DateTime<Utc>) -> Vec<Post> {
        let mut expired = Vec::new();
        while let Some(front_id) = self.order.front() {
            let keep = self
                .items
                .get(front_id)
                .map(|post| post.published_at > cutoff)
                .unwrap_or(false);
            if keep {
                break;
            }
            let front_id = front_id.clone();
            self.order.pop_front();
            if let Some(post) = self.items.remove(&front_id) {
                expired.push(post);
            }
        }
        expired
    }

    /// Iterate items oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Post> {
        self.order.iter().filter_map(|id| self.items.get(id))
    }

    /// Distinct attributed creators of tracked items.
    pub fn creators(&self) -> BTreeSet<MemberId> {
        self.iter()
            .filter_map(|post| post.created_by_id.clone())
            .collect()
    }

    fn insert_ordered(&mut self, post: Post) {
        // Most arrivals are the newest item, so scan from the back.
        let mut index = self.order.len();
        while index > 0 {
            let newer = self
                .items
                .get(&self.order[index - 1])
                .map(|prev| prev.published_at > post.published_at)
                .unwrap_or(false);
            if !newer {
                break;
            }
            index -= 1;
        }
        self.order.insert(index, post.id.clone());
        self.items.insert(post.id.clone(), post);
    }

    fn remove_from_order(&mut self, id: &PostId) {
        if let Some(position) = self.order.iter().position(|entry| entry == id) {
            self.order.remove(position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post(id: &str, member: &str, published_at: DateTime<Utc>) -> Post {
        Post {
            id: PostId::new(id),
            title: None,
            published_at,
            created_by_id: Some(MemberId::new(member)),
            is_hidden: false,
            is_anonymous: false,
            status: Default::default(),
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_out_of_order_inserts_end_up_sorted() {
        let mut log = ContentLog::new();
        log.upsert(post("p3", "m1", at(3)));
        log.upsert(post("p1", "m1", at(1)));
        log.upsert(post("p2", "m2", at(2)));

        let ids: Vec<&str> = log.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2", "p3"]);
        assert_eq!(log.oldest().unwrap().id.as_str(), "p1");
    }

    #[test]
    fn test_upsert_replaces_in_place_when_timestamp_unchanged() {
        let mut log = ContentLog::new();
        log.upsert(post("p1", "m1", at(1)));
        log.upsert(post("p2", "m1", at(2)));

        let mut updated = post("p1", "m1", at(1));
        updated.is_hidden = true;
        log.upsert(updated);

        assert_eq!(log.len(), 2);
        assert!(log.get(&PostId::new("p1")).unwrap().is_hidden);
        let ids: Vec<&str> = log.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[test]
    fn test_upsert_repositions_when_timestamp_changes() {
        let mut log = ContentLog::new();
        log.upsert(post("p1", "m1", at(1)));
        log.upsert(post("p2", "m1", at(2)));
        log.upsert(post("p3", "m1", at(3)));

        // p1 republished after p3
        log.upsert(post("p1", "m1", at(4)));

        let ids: Vec<&str> = log.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p3", "p1"]);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_pop_expired_stops_at_first_unexpired() {
        let mut log = ContentLog::new();
        log.upsert(post("p1", "m1", at(1)));
        log.upsert(post("p2", "m2", at(2)));
        log.upsert(post("p3", "m1", at(5)));

        let expired = log.pop_expired(at(2));
        let ids: Vec<&str> = expired.iter().map(|p| p.id.as_str()).collect();

        // Boundary is inclusive: the item published exactly at the cutoff goes.
        assert_eq!(ids, vec!["p1", "p2"]);
        assert_eq!(log.len(), 1);
        assert_eq!(log.oldest().unwrap().id.as_str(), "p3");
    }

    #[test]
    fn test_pop_expired_on_fresh_log_is_empty() {
        let mut log = ContentLog::new();
        log.upsert(post("p1", "m1", at(10)));
        assert!(log.pop_expired(at(2)).is_empty());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_creators_are_distinct() {
        let mut log = ContentLog::new();
        log.upsert(post("p1", "m1", at(1)));
        log.upsert(post("p2", "m1", at(2)));
        log.upsert(post("p3", "m2", at(3)));

        let creators = log.creators();
        assert_eq!(creators.len(), 2);
        assert!(creators.contains(&MemberId::new("m1")));
        assert!(creators.contains(&MemberId::new("m2")));
    }
}
