//! Window expiry sweep
//!
//! Daily per-tenant job that evicts tracked content older than the maximum
//! window and flags the members it touched for a scoped reconciliation.
//! Jobs are registered on install and stopped on uninstall.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::state::model::DAY_MS;
use crate::state::store::TenantState;
use crate::types::{MemberId, TenantId};

/// Evict tracked items whose age reached the maximum window.
///
/// Returns the members whose content was evicted; they need a scoped
/// reconciliation because their counters were derived from items that are
/// now gone.
pub fn evict_expired(
    state: &mut TenantState,
    now: DateTime<Utc>,
    max_window_days: i64,
) -> BTreeSet<MemberId> {
    let cutoff = now - ChronoDuration::milliseconds(max_window_days * DAY_MS);
    let expired = state.pop_expired_content(cutoff);

    let mut affected = BTreeSet::new();
    for post in &expired {
        if let Some(creator) = post.created_by_id.clone() {
            affected.insert(creator);
        }
    }

    if !expired.is_empty() {
        debug!(
            evicted = expired.len(),
            affected = affected.len(),
            "Evicted expired content"
        );
    }

    affected
}

/// Time until the next daily run at the given UTC hour.
pub fn duration_until_hour(now: DateTime<Utc>, hour_utc: u32) -> std::time::Duration {
    let Some(at) = now.date_naive().and_hms_opt(hour_utc, 0, 0) else {
        return std::time::Duration::from_secs(24 * 60 * 60);
    };
    let mut next = at.and_utc();
    if next <= now {
        next += ChronoDuration::days(1);
    }
    (next - now).to_std().unwrap_or_default()
}

/// Registry of per-tenant sweep jobs.
#[derive(Debug, Default)]
pub struct SweepScheduler {
    jobs: DashMap<TenantId, JoinHandle<()>>,
}

impl SweepScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a tenant has a live job.
    pub fn is_running(&self, tenant_id: &TenantId) -> bool {
        self.jobs
            .get(tenant_id)
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Register a tenant's job, aborting any previous one.
    pub fn register(&self, tenant_id: TenantId, handle: JoinHandle<()>) {
        if let Some(previous) = self.jobs.insert(tenant_id.clone(), handle) {
            previous.abort();
        }
        info!(tenant = %tenant_id, "Sweep job registered");
    }

    /// Stop a tenant's job. Returns false when none was running.
    pub fn stop(&self, tenant_id: &TenantId) -> bool {
        match self.jobs.remove(tenant_id) {
            Some((_, handle)) => {
                handle.abort();
                info!(tenant = %tenant_id, "Sweep job stopped");
                true
            }
            None => {
                debug!(tenant = %tenant_id, "No sweep job to stop");
                false
            }
        }
    }

    /// Stop every job (shutdown path). Returns how many were stopped.
    pub fn stop_all(&self) -> usize {
        let tenants: Vec<TenantId> = self.jobs.iter().map(|entry| entry.key().clone()).collect();
        let mut stopped = 0;
        for tenant_id in tenants {
            if self.stop(&tenant_id) {
                stopped += 1;
            }
        }
        stopped
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }
}
