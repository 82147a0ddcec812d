//! Tenant state store
//!
//! In-memory state for every installed community. Tenant entries are
//! created lazily on first touch and destroyed on uninstall. Nothing here
//! is persisted: badge configs round-trip through the platform settings
//! blob, and everything else is re-derived from fetched content.
//!
//! All mutation goes through `TenantState` accessors while holding the
//! tenant's lock, which is also the per-tenant critical section for
//! reconciliation cycles.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::state::content_log::ContentLog;
use crate::state::model::{AppConfig, AppSettings, Badge, BadgeConfig, MemberState, Post};
use crate::types::{BadgeId, ConditionId, MemberId, PostId, TenantId};

/// One tenant's state behind its reconciliation lock.
#[derive(Debug, Default)]
pub struct TenantCell {
    state: Mutex<TenantState>,
}

impl TenantCell {
    /// Enter the tenant's critical section.
    pub async fn lock(&self) -> MutexGuard<'_, TenantState> {
        self.state.lock().await
    }
}

/// All in-memory state for one tenant.
#[derive(Debug, Default)]
pub struct TenantState {
    config: AppConfig,
    available_badges: BTreeMap<BadgeId, Badge>,
    content: ContentLog,
    members: BTreeMap<MemberId, MemberState>,
    suspended: BTreeSet<MemberId>,
    selected_badge: Option<BadgeId>,
}

impl TenantState {
    // ------ badge configuration ------

    pub fn app_config(&self) -> &AppConfig {
        &self.config
    }

    /// Replace the whole config map (install-time seed from the settings blob).
    pub fn set_app_config(&mut self, config: AppConfig) {
        self.config = config;
    }

    pub fn badge_config(&self, badge_id: &BadgeId) -> Option<&BadgeConfig> {
        self.config.get(badge_id)
    }

    pub fn set_badge_config(&mut self, config: BadgeConfig) {
        self.config.insert(config.badge_id.clone(), config);
    }

    /// Flip a config's active flag. Returns false when the badge has no config.
    pub fn set_badge_config_active(&mut self, badge_id: &BadgeId, active: bool) -> bool {
        match self.config.get_mut(badge_id) {
            Some(config) => {
                config.active = active;
                true
            }
            None => false,
        }
    }

    pub fn delete_badge_config(&mut self, badge_id: &BadgeId) -> Option<BadgeConfig> {
        self.config.remove(badge_id)
    }

    /// Current settings blob shape for external persistence.
    pub fn settings_snapshot(&self) -> AppSettings {
        AppSettings {
            config: self.config.clone(),
        }
    }

    // ------ badge catalog ------

    pub fn available_badges(&self) -> &BTreeMap<BadgeId, Badge> {
        &self.available_badges
    }

    /// Replace the catalog (install-time seed).
    pub fn set_available_badges(&mut self, badges: Vec<Badge>) {
        self.available_badges = badges
            .into_iter()
            .map(|badge| (badge.id.clone(), badge))
            .collect();
    }

    pub fn available_badge(&self, badge_id: &BadgeId) -> Option<&Badge> {
        self.available_badges.get(badge_id)
    }

    pub fn set_available_badge(&mut self, badge: Badge) {
        self.available_badges.insert(badge.id.clone(), badge);
    }

    pub fn delete_available_badge(&mut self, badge_id: &BadgeId) -> Option<Badge> {
        self.available_badges.remove(badge_id)
    }

    // ------ content log ------

    pub fn content(&self) -> &ContentLog {
        &self.content
    }

    pub fn post(&self, post_id: &PostId) -> Option<&Post> {
        self.content.get(post_id)
    }

    pub fn set_post(&mut self, post: Post) {
        self.content.upsert(post);
    }

    pub fn delete_post(&mut self, post_id: &PostId) -> Option<Post> {
        self.content.remove(post_id)
    }

    /// Evict tracked items published at or before the cutoff, oldest first.
    pub fn pop_expired_content(&mut self, cutoff: chrono::DateTime<chrono::Utc>) -> Vec<Post> {
        self.content.pop_expired(cutoff)
    }

    // ------ members ------

    pub fn members(&self) -> &BTreeMap<MemberId, MemberState> {
        &self.members
    }

    pub fn member(&self, member_id: &MemberId) -> Option<&MemberState> {
        self.members.get(member_id)
    }

    /// Store a member's freshly computed state, creating the member if new.
    pub fn put_member(&mut self, member_id: MemberId, state: MemberState) {
        self.members.insert(member_id, state);
    }

    /// Badges currently tracked as assigned to a member.
    pub fn member_badges(&self, member_id: &MemberId) -> BTreeSet<BadgeId> {
        self.members
            .get(member_id)
            .map(|member| member.badges.clone())
            .unwrap_or_default()
    }

    pub fn add_member_badge(&mut self, member_id: &MemberId, badge_id: BadgeId) {
        self.members
            .entry(member_id.clone())
            .or_default()
            .badges
            .insert(badge_id);
    }

    pub fn remove_member_badge(&mut self, member_id: &MemberId, badge_id: &BadgeId) -> bool {
        self.members
            .get_mut(member_id)
            .map(|member| member.badges.remove(badge_id))
            .unwrap_or(false)
    }

    pub fn bucket_value(
        &self,
        member_id: &MemberId,
        badge_id: &BadgeId,
        condition_id: &ConditionId,
    ) -> i64 {
        self.members
            .get(member_id)
            .map(|member| member.bucket_value(badge_id, condition_id))
            .unwrap_or(0)
    }

    pub fn set_bucket_value(
        &mut self,
        member_id: &MemberId,
        badge_id: BadgeId,
        condition_id: ConditionId,
        value: i64,
    ) {
        self.members
            .entry(member_id.clone())
            .or_default()
            .set_bucket_value(badge_id, condition_id, value);
    }

    // ------ suspension ------

    pub fn is_member_suspended(&self, member_id: &MemberId) -> bool {
        self.suspended.contains(member_id)
    }

    pub fn add_suspended_member(&mut self, member_id: MemberId) {
        self.suspended.insert(member_id);
    }

    pub fn remove_suspended_member(&mut self, member_id: &MemberId) -> bool {
        self.suspended.remove(member_id)
    }

    pub fn suspended_members(&self) -> &BTreeSet<MemberId> {
        &self.suspended
    }

    // ------ settings UI selection ------

    pub fn selected_badge(&self) -> Option<&BadgeId> {
        self.selected_badge.as_ref()
    }

    pub fn set_selected_badge(&mut self, badge_id: BadgeId) {
        self.selected_badge = Some(badge_id);
    }
}

/// Lazily-created per-tenant state, keyed by network id.
#[derive(Debug, Default)]
pub struct StateStore {
    tenants: DashMap<TenantId, Arc<TenantCell>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a tenant's cell, creating empty state on first touch.
    pub fn tenant(&self, tenant_id: &TenantId) -> Arc<TenantCell> {
        if let Some(cell) = self.tenants.get(tenant_id) {
            return cell.clone();
        }
        debug!(tenant = %tenant_id, "Creating tenant state");
        self.tenants
            .entry(tenant_id.clone())
            .or_insert_with(|| Arc::new(TenantCell::default()))
            .value()
            .clone()
    }

    /// Get a tenant's cell without creating it.
    pub fn get(&self, tenant_id: &TenantId) -> Option<Arc<TenantCell>> {
        self.tenants.get(tenant_id).map(|cell| cell.clone())
    }

    pub fn contains(&self, tenant_id: &TenantId) -> bool {
        self.tenants.contains_key(tenant_id)
    }

    /// Drop a tenant's state entirely. Returns false when none existed.
    pub fn remove(&self, tenant_id: &TenantId) -> bool {
        let removed = self.tenants.remove(tenant_id).is_some();
        if removed {
            info!(tenant = %tenant_id, "Tenant state destroyed");
        }
        removed
    }

    pub fn tenant_count(&self) -> usize {
        self.tenants.len()
    }
}
