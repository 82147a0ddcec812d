//! Domain model for badge orchestration
//!
//! Wire and in-memory shapes shared across the engine: badge configs as
//! stored in the platform settings blob, the badge catalog, post metadata,
//! and per-member derived state.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{BadgeId, ConditionId, MemberId, PostId};

/// Milliseconds per day, the unit of all window arithmetic.
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

// ============================================================================
// Badge configuration
// ============================================================================

/// What a condition counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionObject {
    NumberOfPosts,
}

/// Comparison operator carried in stored conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionOperator {
    Equals,
    GreaterThanOrEquals,
}

/// Rolling time window a condition counts within.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeWindow {
    Today,
    ThisWeek,
    ThisMonth,
    LastNDays,
}

/// The `if` half of a condition: what is counted and the threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionCheck {
    pub object: ConditionObject,
    pub operator: ConditionOperator,
    pub value: i64,
}

/// The `in` half of a condition: the window the count applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionWindow {
    pub window: TimeWindow,
    pub operator: ConditionOperator,
    pub value: i64,
}

/// One configured rule for a badge.
///
/// The stored shape keeps operator and window kind for round-tripping with
/// the settings UI; only the count-over-last-N-days semantics are evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BadgeCondition {
    #[serde(rename = "if")]
    pub check: ConditionCheck,
    #[serde(rename = "in")]
    pub window: ConditionWindow,
}

impl BadgeCondition {
    /// The one rule the settings UI produces: N posts within the last D days.
    pub fn posts_within_days(threshold: i64, days: i64) -> Self {
        Self {
            check: ConditionCheck {
                object: ConditionObject::NumberOfPosts,
                operator: ConditionOperator::GreaterThanOrEquals,
                value: threshold,
            },
            window: ConditionWindow {
                window: TimeWindow::LastNDays,
                operator: ConditionOperator::Equals,
                value: days,
            },
        }
    }

    /// Count at which the condition is met.
    pub fn threshold(&self) -> i64 {
        self.check.value
    }

    /// Window length in days.
    pub fn window_days(&self) -> i64 {
        self.window.value
    }
}

/// Stored configuration for one badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeConfig {
    pub badge_id: BadgeId,
    pub active: bool,
    pub conditions: BTreeMap<ConditionId, BadgeCondition>,
}

impl BadgeConfig {
    /// Config holding the conventional single condition for a badge.
    pub fn single_condition(badge_id: BadgeId, condition: BadgeCondition) -> Self {
        let mut conditions = BTreeMap::new();
        conditions.insert(ConditionId::for_badge(&badge_id), condition);
        Self {
            badge_id,
            active: true,
            conditions,
        }
    }

    /// A save whose every threshold is zero removes the configuration
    /// instead of storing it.
    pub fn is_removal(&self) -> bool {
        self.conditions.values().all(|c| c.threshold() == 0)
    }
}

/// Per-tenant badge configuration, keyed by badge id.
pub type AppConfig = BTreeMap<BadgeId, BadgeConfig>;

/// The settings blob persisted with the platform.
///
/// This is the only state that survives a restart; everything else is
/// re-derived from fetched content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub config: AppConfig,
}

// ============================================================================
// Badge catalog
// ============================================================================

/// Badge kind as reported by the platform. Only manually-assignable badges
/// can be orchestrated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BadgeKind {
    Manual,
    Automatic,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Platform badge as tracked in the available-badge catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: BadgeId,
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(rename = "type", default)]
    pub kind: BadgeKind,
}

fn default_active() -> bool {
    true
}

// ============================================================================
// Posts
// ============================================================================

/// Post lifecycle status as reported by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostStatus {
    #[default]
    Published,
    Drafted,
    Blocked,
    Deleted,
    #[serde(other)]
    Unknown,
}

/// Post metadata tracked for window counting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub title: Option<String>,
    pub published_at: DateTime<Utc>,
    pub created_by_id: Option<MemberId>,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub is_anonymous: bool,
    #[serde(default)]
    pub status: PostStatus,
}

impl Post {
    /// Whether this item participates in bucket counting.
    /// Hidden, unpublished and anonymous items are tracked but never counted.
    pub fn is_countable(&self) -> bool {
        !self.is_hidden && !self.is_anonymous && self.status == PostStatus::Published
    }
}

/// Loosely-typed post payload as it arrives from webhooks and fetches.
///
/// Platform payloads omit fields freely. `normalize` keeps only items that
/// can participate in window tracking at all.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawPost {
    pub id: Option<PostId>,
    pub title: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub created_by_id: Option<MemberId>,
    pub is_hidden: bool,
    pub is_anonymous: bool,
    pub status: Option<PostStatus>,
}

impl RawPost {
    /// Strictly-typed post, or `None` when the payload is missing the id or
    /// publish timestamp.
    pub fn normalize(self) -> Option<Post> {
        let id = self.id?;
        let published_at = self.published_at?;
        Some(Post {
            id,
            title: self.title,
            published_at,
            created_by_id: self.created_by_id,
            is_hidden: self.is_hidden,
            is_anonymous: self.is_anonymous,
            status: self.status.unwrap_or_default(),
        })
    }
}

// ============================================================================
// Members
// ============================================================================

/// Per-member derived state: rolling counters and the badge set last
/// computed for them.
///
/// Never serialized. Rebuilt from the content log on every scoped recompute
/// and lost on restart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberState {
    /// Window counters, keyed badge id then condition id.
    pub buckets: BTreeMap<BadgeId, BTreeMap<ConditionId, i64>>,
    /// Conditions that crossed their threshold. Sticky within a pass: once
    /// met, later items cannot unmeet them.
    pub met_conditions: BTreeSet<(BadgeId, ConditionId)>,
    /// Badges the member currently qualifies for.
    pub badges: BTreeSet<BadgeId>,
}

impl MemberState {
    /// Current counter for a badge condition (zero when untouched).
    pub fn bucket_value(&self, badge_id: &BadgeId, condition_id: &ConditionId) -> i64 {
        self.buckets
            .get(badge_id)
            .and_then(|bucket| bucket.get(condition_id))
            .copied()
            .unwrap_or(0)
    }

    /// Overwrite a badge condition counter.
    pub fn set_bucket_value(&mut self, badge_id: BadgeId, condition_id: ConditionId, value: i64) {
        self.buckets.entry(badge_id).or_default().insert(condition_id, value);
    }

    /// Bump a badge condition counter and return the new value.
    pub fn increment_bucket(&mut self, badge_id: &BadgeId, condition_id: &ConditionId) -> i64 {
        let counter = self
            .buckets
            .entry(badge_id.clone())
            .or_default()
            .entry(condition_id.clone())
            .or_insert(0);
        *counter += 1;
        *counter
    }

    /// Whether a condition already crossed its threshold this pass.
    pub fn is_met(&self, badge_id: &BadgeId, condition_id: &ConditionId) -> bool {
        self.met_conditions
            .contains(&(badge_id.clone(), condition_id.clone()))
    }

    /// Mark a condition met.
    pub fn mark_met(&mut self, badge_id: BadgeId, condition_id: ConditionId) {
        self.met_conditions.insert((badge_id, condition_id));
    }

    /// Whether every condition of a config is met for this member.
    pub fn all_conditions_met(&self, config: &BadgeConfig) -> bool {
        config
            .conditions
            .keys()
            .all(|condition_id| self.is_met(&config.badge_id, condition_id))
    }
}
