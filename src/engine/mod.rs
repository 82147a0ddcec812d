//! Reconciliation engine
//!
//! - `buckets`: pure recompute of window counters and badge qualification
//! - `diff`: assign/revoke delta between recompute passes
//! - `sweep`: window expiry eviction and the daily scheduler
//! - `orchestrator`: the controller wiring it all to tenants and the platform

pub mod buckets;
pub mod diff;
pub mod orchestrator;
pub mod sweep;

pub use buckets::{compute_member_buckets, ComputedMember, ComputedMembers, RecomputeScope};
pub use diff::{diff_badges, BadgeDiff};
pub use orchestrator::{BadgeOrchestrator, EngineConfig, SettingsView};
pub use sweep::SweepScheduler;
