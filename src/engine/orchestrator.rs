//! Badge orchestration
//!
//! The controller every surface talks to: tenant lifecycle, platform event
//! handlers, the reconciliation cycle and the nightly sweep. All state
//! mutation happens through tenant accessors inside the tenant's critical
//! section; external applies leave through the sync queue.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::Args;
use crate::engine::buckets::{compute_member_buckets, RecomputeScope};
use crate::engine::diff::diff_badges;
use crate::engine::sweep::{self, SweepScheduler};
use crate::platform::PlatformClient;
use crate::state::model::{AppConfig, AppSettings, Badge, BadgeConfig, Post, DAY_MS};
use crate::state::store::{StateStore, TenantState};
use crate::sync::{ApplyAction, ApplyOp, SyncQueue};
use crate::types::{BadgeId, MemberId, Result, TenantId};

// ============================================================================
// Configuration
// ============================================================================

/// Engine tunables, filled from `Args`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum tracked content window in days.
    pub post_window_days: i64,
    /// UTC hour of the nightly sweep.
    pub sweep_hour_utc: u32,
    /// Pause between install-time platform fetches (rate limits).
    pub fetch_pause: std::time::Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            post_window_days: 31,
            sweep_hour_utc: 0,
            fetch_pause: std::time::Duration::ZERO,
        }
    }
}

impl From<&Args> for EngineConfig {
    fn from(args: &Args) -> Self {
        Self {
            post_window_days: args.post_window_days,
            sweep_hour_utc: args.sweep_hour_utc,
            fetch_pause: std::time::Duration::from_millis(args.fetch_page_delay_ms),
        }
    }
}

/// Snapshot of what the settings UI needs to render.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub selected_badge: Option<BadgeId>,
    pub badges: Vec<Badge>,
    pub config: AppConfig,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Coordinates tenant state, recompute, diffing and external sync.
pub struct BadgeOrchestrator<P: PlatformClient> {
    store: Arc<StateStore>,
    platform: Arc<P>,
    sync: SyncQueue,
    scheduler: Arc<SweepScheduler>,
    config: EngineConfig,
}

impl<P: PlatformClient + 'static> BadgeOrchestrator<P> {
    pub fn new(
        store: Arc<StateStore>,
        platform: Arc<P>,
        sync: SyncQueue,
        scheduler: Arc<SweepScheduler>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            platform,
            sync,
            scheduler,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// One reconciliation cycle inside the tenant's critical section:
    /// recompute, persist, diff, enqueue the external applies.
    fn reconcile_locked(
        &self,
        tenant_id: &TenantId,
        state: &mut TenantState,
        scope: &RecomputeScope,
    ) -> usize {
        let computed = compute_member_buckets(state, scope, Utc::now());
        if computed.is_empty() {
            debug!(tenant = %tenant_id, scope = %scope, "Nothing to reconcile");
            return 0;
        }

        for (member_id, member) in &computed {
            state.put_member(member_id.clone(), member.state.clone());
        }

        let diff = diff_badges(&computed, state.suspended_members());
        if diff.is_empty() {
            debug!(tenant = %tenant_id, scope = %scope, "No badge changes");
            return 0;
        }

        let queued = self.sync.enqueue_diff(tenant_id, &diff);
        info!(
            tenant = %tenant_id,
            scope = %scope,
            ops = diff.op_count(),
            queued,
            "Reconciliation queued"
        );
        queued
    }

    /// Run a reconciliation cycle for a tenant. Returns ops queued.
    pub async fn reconcile(&self, tenant_id: &TenantId, scope: RecomputeScope) -> usize {
        let cell = self.store.tenant(tenant_id);
        let mut state = cell.lock().await;
        self.reconcile_locked(tenant_id, &mut state, &scope)
    }

    // ------ lifecycle ------

    /// Install the app into a network: seed config, badge catalog and
    /// recent post metadata from the platform, reconcile everyone, start
    /// the sweep job. A repeat install for a live tenant is a no-op.
    pub async fn install(self: Arc<Self>, tenant_id: TenantId) -> Result<()> {
        if self.scheduler.is_running(&tenant_id) {
            info!(tenant = %tenant_id, "Already installed, skipping");
            return Ok(());
        }

        info!(tenant = %tenant_id, "Installing app");

        let settings = self.platform.fetch_settings(&tenant_id).await?;
        tokio::time::sleep(self.config.fetch_pause).await;

        let badges = self.platform.fetch_manual_badges(&tenant_id).await?;
        tokio::time::sleep(self.config.fetch_pause).await;

        let cutoff = Utc::now() - ChronoDuration::milliseconds(self.config.post_window_days * DAY_MS);
        let posts = self.platform.fetch_recent_posts(&tenant_id, cutoff).await?;

        {
            let cell = self.store.tenant(&tenant_id);
            let mut state = cell.lock().await;
            state.set_app_config(settings.config);
            state.set_available_badges(badges);

            let mut seeded = 0usize;
            for post in posts {
                if post.is_anonymous || post.created_by_id.is_none() {
                    continue;
                }
                state.set_post(post);
                seeded += 1;
            }

            info!(
                tenant = %tenant_id,
                badges = state.available_badges().len(),
                configs = state.app_config().len(),
                posts = seeded,
                "Seeded tenant state"
            );

            self.reconcile_locked(&tenant_id, &mut state, &RecomputeScope::full());
        }

        Self::spawn_sweep_job(self.clone(), tenant_id.clone());
        info!(tenant = %tenant_id, "Successfully installed");
        Ok(())
    }

    /// Uninstall: stop the sweep job and destroy tenant state. Partial
    /// installs clean up the same way.
    pub async fn uninstall(&self, tenant_id: &TenantId) -> Result<()> {
        info!(tenant = %tenant_id, "Uninstalling app");
        self.scheduler.stop(tenant_id);
        self.store.remove(tenant_id);
        Ok(())
    }

    /// Re-install every network the platform reports at boot. State lives
    /// in memory only, so a restart rebuilds it from the platform.
    pub async fn reinstall_known_networks(self: Arc<Self>) {
        let tenants = match self.platform.list_installations().await {
            Ok(tenants) => tenants,
            Err(e) => {
                warn!(error = %e, "Could not list installations, waiting for webhooks");
                return;
            }
        };

        info!(count = tenants.len(), "Re-installing known networks");
        for tenant_id in tenants {
            if let Err(e) = self.clone().install(tenant_id.clone()).await {
                error!(tenant = %tenant_id, error = %e, "Re-install failed");
            }
        }
    }

    // ------ badge catalog events ------

    /// Badge created: extend the catalog. No recompute.
    pub async fn on_badge_created(&self, tenant_id: &TenantId, badge: Badge) {
        let cell = self.store.tenant(tenant_id);
        let mut state = cell.lock().await;
        info!(tenant = %tenant_id, badge = %badge.id, "Badge created");
        state.set_available_badge(badge);
    }

    /// Badge updated: refresh the catalog entry. An active-flag flip also
    /// updates the stored config and reconciles that badge.
    pub async fn on_badge_updated(&self, tenant_id: &TenantId, badge: Badge) {
        let cell = self.store.tenant(tenant_id);
        let mut state = cell.lock().await;

        // Unknown prior state counts as a toggle: a missed badge.created
        // must not suppress the activate/deactivate reconcile.
        let toggled = state
            .available_badge(&badge.id)
            .map_or(true, |known| known.active != badge.active);
        let badge_id = badge.id.clone();
        let active = badge.active;
        state.set_available_badge(badge);

        if toggled {
            info!(tenant = %tenant_id, badge = %badge_id, active, "Badge active flag changed");
            state.set_badge_config_active(&badge_id, active);
            self.reconcile_locked(tenant_id, &mut state, &RecomputeScope::for_badge(badge_id));
        } else {
            debug!(tenant = %tenant_id, badge = %badge_id, "Badge updated");
        }
    }

    /// Badge deleted: drop it from the catalog. Its config, if any, stays
    /// until removed through the settings UI; no recompute here.
    pub async fn on_badge_deleted(&self, tenant_id: &TenantId, badge_id: &BadgeId) {
        let cell = self.store.tenant(tenant_id);
        let mut state = cell.lock().await;
        if state.delete_available_badge(badge_id).is_some() {
            info!(tenant = %tenant_id, badge = %badge_id, "Badge deleted from catalog");
        }
    }

    // ------ member events ------

    /// Member suspended: record it and revoke their tracked badges
    /// externally. Their counters keep advancing in state so unsuspension
    /// can restore the badges without a recompute.
    pub async fn on_member_suspended(&self, tenant_id: &TenantId, member_id: MemberId) {
        let badges = {
            let cell = self.store.tenant(tenant_id);
            let mut state = cell.lock().await;
            state.add_suspended_member(member_id.clone());
            state.member_badges(&member_id)
        };

        info!(tenant = %tenant_id, member = %member_id, badges = badges.len(), "Member suspended");
        for badge_id in badges {
            self.sync.enqueue(ApplyOp {
                tenant_id: tenant_id.clone(),
                member_id: member_id.clone(),
                badge_id,
                action: ApplyAction::Revoke,
            });
        }
    }

    /// Member unsuspended: clear the flag and re-apply tracked badges.
    pub async fn on_member_unsuspended(&self, tenant_id: &TenantId, member_id: MemberId) {
        let badges = {
            let cell = self.store.tenant(tenant_id);
            let mut state = cell.lock().await;
            state.remove_suspended_member(&member_id);
            state.member_badges(&member_id)
        };

        info!(tenant = %tenant_id, member = %member_id, badges = badges.len(), "Member unsuspended");
        for badge_id in badges {
            self.sync.enqueue(ApplyOp {
                tenant_id: tenant_id.clone(),
                member_id: member_id.clone(),
                badge_id,
                action: ApplyAction::Assign,
            });
        }
    }

    // ------ content events ------

    /// Content changed: upsert into the ordered log and reconcile the
    /// creating member. Deletions and hides arrive as upserts with a
    /// non-countable status, so one path covers every content event.
    pub async fn on_content_changed(&self, tenant_id: &TenantId, post: Post) {
        let Some(member_id) = post.created_by_id.clone() else {
            debug!(tenant = %tenant_id, post = %post.id, "Ignoring content event without creator");
            return;
        };
        if post.is_anonymous {
            debug!(tenant = %tenant_id, post = %post.id, "Ignoring anonymous content event");
            return;
        }

        let cell = self.store.tenant(tenant_id);
        let mut state = cell.lock().await;
        debug!(tenant = %tenant_id, post = %post.id, member = %member_id, "Content changed");
        state.set_post(post);
        self.reconcile_locked(tenant_id, &mut state, &RecomputeScope::for_member(member_id));
    }

    // ------ configuration ------

    /// Badge configuration saved from the settings UI.
    ///
    /// A zero threshold removes the config. The updated blob is persisted
    /// with the platform after the scoped reconciliation is queued.
    pub async fn on_config_saved(&self, tenant_id: &TenantId, config: BadgeConfig) {
        let badge_id = config.badge_id.clone();

        let settings = {
            let cell = self.store.tenant(tenant_id);
            let mut state = cell.lock().await;

            if config.is_removal() {
                info!(tenant = %tenant_id, badge = %badge_id, "Badge config removed");
                state.delete_badge_config(&badge_id);
            } else {
                info!(tenant = %tenant_id, badge = %badge_id, "Badge config saved");
                state.set_badge_config(config);
            }

            self.reconcile_locked(
                tenant_id,
                &mut state,
                &RecomputeScope::for_badge(badge_id.clone()),
            );
            state.settings_snapshot()
        };

        // Config is the only state that survives restarts.
        if let Err(e) = self.platform.update_settings(tenant_id, &settings).await {
            error!(tenant = %tenant_id, error = %e, "Failed to persist settings blob");
        }
    }

    /// Current settings blob for a tenant.
    pub async fn current_settings(&self, tenant_id: &TenantId) -> AppSettings {
        let cell = self.store.tenant(tenant_id);
        let state = cell.lock().await;
        state.settings_snapshot()
    }

    /// Replace the cached config from an externally-edited settings blob.
    /// No recompute: the next cycle picks the new config up.
    pub async fn update_settings_cache(&self, tenant_id: &TenantId, settings: AppSettings) {
        let cell = self.store.tenant(tenant_id);
        let mut state = cell.lock().await;
        info!(tenant = %tenant_id, configs = settings.config.len(), "Settings cache refreshed");
        state.set_app_config(settings.config);
    }

    /// Remember the badge selected in the settings UI.
    pub async fn select_badge(&self, tenant_id: &TenantId, badge_id: BadgeId) {
        let cell = self.store.tenant(tenant_id);
        let mut state = cell.lock().await;
        state.set_selected_badge(badge_id);
    }

    /// Snapshot for rendering the settings block.
    pub async fn settings_view(&self, tenant_id: &TenantId) -> SettingsView {
        let cell = self.store.tenant(tenant_id);
        let state = cell.lock().await;
        SettingsView {
            selected_badge: state.selected_badge().cloned(),
            badges: state.available_badges().values().cloned().collect(),
            config: state.app_config().clone(),
        }
    }

    // ------ nightly sweep ------

    /// Evict expired content and reconcile the members it touched.
    pub async fn run_nightly_sweep(&self, tenant_id: &TenantId) {
        let Some(cell) = self.store.get(tenant_id) else {
            warn!(tenant = %tenant_id, "Sweep fired for unknown tenant");
            return;
        };

        let mut state = cell.lock().await;
        let affected = sweep::evict_expired(&mut state, Utc::now(), self.config.post_window_days);
        if affected.is_empty() {
            debug!(tenant = %tenant_id, "Sweep evicted nothing");
            return;
        }

        info!(tenant = %tenant_id, affected = affected.len(), "Sweep evicted content, reconciling");
        self.reconcile_locked(tenant_id, &mut state, &RecomputeScope::for_members(affected));
    }

    /// Start the tenant's daily sweep loop and register it for shutdown.
    fn spawn_sweep_job(orchestrator: Arc<Self>, tenant_id: TenantId) {
        let hour = orchestrator.config.sweep_hour_utc;
        let handle = {
            let orchestrator = orchestrator.clone();
            let tenant_id = tenant_id.clone();
            tokio::spawn(async move {
                loop {
                    let pause = sweep::duration_until_hour(Utc::now(), hour);
                    debug!(tenant = %tenant_id, seconds = pause.as_secs(), "Next sweep scheduled");
                    tokio::time::sleep(pause).await;
                    orchestrator.run_nightly_sweep(&tenant_id).await;
                }
            })
        };
        orchestrator.scheduler.register(tenant_id, handle);
    }
}
