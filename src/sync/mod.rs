//! Outbound badge synchronization
//!
//! Applies reconciliation diffs to the platform through a bounded work
//! queue with a single consumer. Calls are fire-and-forget with a fixed
//! delay between them; failures are logged and dropped, never retried. The
//! next reconciliation cycle re-derives whatever drifted.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::diff::BadgeDiff;
use crate::platform::PlatformClient;
use crate::types::{BadgeId, MemberId, TenantId};

/// Direction of one external badge call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyAction {
    Assign,
    Revoke,
}

impl ApplyAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assign => "assign",
            Self::Revoke => "revoke",
        }
    }
}

/// One queued external badge call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOp {
    pub tenant_id: TenantId,
    pub member_id: MemberId,
    pub badge_id: BadgeId,
    pub action: ApplyAction,
}

/// Producer handle to the sync queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SyncQueue {
    tx: mpsc::Sender<ApplyOp>,
}

impl SyncQueue {
    /// Enqueue one call without blocking.
    ///
    /// A full queue drops the op: the next reconciliation for the tenant
    /// re-derives anything that was lost.
    pub fn enqueue(&self, op: ApplyOp) -> bool {
        match self.tx.try_send(op) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(op)) => {
                warn!(
                    tenant = %op.tenant_id,
                    member = %op.member_id,
                    badge = %op.badge_id,
                    action = op.action.as_str(),
                    "Sync queue full, dropping op"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(op)) => {
                warn!(tenant = %op.tenant_id, "Sync worker gone, dropping op");
                false
            }
        }
    }

    /// Enqueue a whole diff, assigns before revokes. Returns ops queued.
    pub fn enqueue_diff(&self, tenant_id: &TenantId, diff: &BadgeDiff) -> usize {
        let mut queued = 0;

        for (badge_id, members) in &diff.assign {
            for member_id in members {
                if self.enqueue(ApplyOp {
                    tenant_id: tenant_id.clone(),
                    member_id: member_id.clone(),
                    badge_id: badge_id.clone(),
                    action: ApplyAction::Assign,
                }) {
                    queued += 1;
                }
            }
        }

        for (badge_id, members) in &diff.revoke {
            for member_id in members {
                if self.enqueue(ApplyOp {
                    tenant_id: tenant_id.clone(),
                    member_id: member_id.clone(),
                    badge_id: badge_id.clone(),
                    action: ApplyAction::Revoke,
                }) {
                    queued += 1;
                }
            }
        }

        queued
    }

    /// Remaining queue capacity, for health reporting.
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }
}

/// Spawn the single consumer that drains the queue against the platform.
pub fn spawn_sync_worker<P: PlatformClient + 'static>(
    platform: Arc<P>,
    queue_size: usize,
    call_delay: Duration,
) -> (SyncQueue, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<ApplyOp>(queue_size);

    let handle = tokio::spawn(async move {
        info!(
            queue_size,
            delay_ms = call_delay.as_millis() as u64,
            "Badge sync worker started"
        );

        while let Some(op) = rx.recv().await {
            let result = match op.action {
                ApplyAction::Assign => {
                    platform
                        .assign_badge(&op.tenant_id, &op.member_id, &op.badge_id)
                        .await
                }
                ApplyAction::Revoke => {
                    platform
                        .revoke_badge(&op.tenant_id, &op.member_id, &op.badge_id)
                        .await
                }
            };

            match result {
                Ok(()) => debug!(
                    tenant = %op.tenant_id,
                    member = %op.member_id,
                    badge = %op.badge_id,
                    action = op.action.as_str(),
                    "Applied badge op"
                ),
                Err(e) => error!(
                    tenant = %op.tenant_id,
                    member = %op.member_id,
                    badge = %op.badge_id,
                    action = op.action.as_str(),
                    error = %e,
                    "Badge op failed, not retrying"
                ),
            }

            // Platform rate limits: fixed spacing between calls.
            tokio::time::sleep(call_delay).await;
        }

        info!("Badge sync worker stopped");
    });

    (SyncQueue { tx }, handle)
}
