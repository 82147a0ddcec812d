//! Scripted platform client shared by unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::PlatformClient;
use crate::state::model::{AppSettings, Badge, Post};
use crate::types::{AccoladeError, BadgeId, MemberId, Result, TenantId};

/// In-memory `PlatformClient` with scriptable fixtures and recorded calls.
#[derive(Default)]
pub struct ScriptedPlatform {
    pub settings: Mutex<AppSettings>,
    pub badges: Mutex<Vec<Badge>>,
    pub posts: Mutex<Vec<Post>>,
    pub installations: Mutex<Vec<TenantId>>,
    /// Badge applies in call order, as `assign:<member>:<badge>` or
    /// `revoke:<member>:<badge>`.
    pub applied: Mutex<Vec<String>>,
    pub settings_updates: Mutex<Vec<AppSettings>>,
    pub settings_fetches: AtomicUsize,
    /// When set, the next badge apply fails once.
    pub fail_next_apply: AtomicBool,
}

impl ScriptedPlatform {
    fn record_apply(&self, verb: &str, member_id: &MemberId, badge_id: &BadgeId) -> Result<()> {
        if self.fail_next_apply.swap(false, Ordering::SeqCst) {
            return Err(AccoladeError::Platform("scripted apply failure".to_string()));
        }
        self.applied
            .lock()
            .unwrap()
            .push(format!("{}:{}:{}", verb, member_id, badge_id));
        Ok(())
    }
}

#[async_trait]
impl PlatformClient for ScriptedPlatform {
    async fn fetch_settings(&self, _tenant_id: &TenantId) -> Result<AppSettings> {
        self.settings_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.settings.lock().unwrap().clone())
    }

    async fn update_settings(&self, _tenant_id: &TenantId, settings: &AppSettings) -> Result<()> {
        self.settings_updates.lock().unwrap().push(settings.clone());
        Ok(())
    }

    async fn fetch_manual_badges(&self, _tenant_id: &TenantId) -> Result<Vec<Badge>> {
        Ok(self.badges.lock().unwrap().clone())
    }

    async fn fetch_recent_posts(
        &self,
        _tenant_id: &TenantId,
        _published_after: DateTime<Utc>,
    ) -> Result<Vec<Post>> {
        Ok(self.posts.lock().unwrap().clone())
    }

    async fn assign_badge(
        &self,
        tenant_id: &TenantId,
        member_id: &MemberId,
        badge_id: &BadgeId,
    ) -> Result<()> {
        let _ = tenant_id;
        self.record_apply("assign", member_id, badge_id)
    }

    async fn revoke_badge(
        &self,
        tenant_id: &TenantId,
        member_id: &MemberId,
        badge_id: &BadgeId,
    ) -> Result<()> {
        let _ = tenant_id;
        self.record_apply("revoke", member_id, badge_id)
    }

    async fn list_installations(&self) -> Result<Vec<TenantId>> {
        Ok(self.installations.lock().unwrap().clone())
    }
}
