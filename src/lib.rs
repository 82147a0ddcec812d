//! Accolade - badge orchestration engine for community platforms
//!
//! "Honor to whom honor is owed" - Romans 13:7
//!
//! Accolade listens to community webhooks, keeps a rolling window of each
//! member's published activity in memory, and assigns or revokes configured
//! badges as members cross admin-defined thresholds.
//!
//! ## Services
//!
//! - **Webhook**: HMAC-verified platform event intake (install, content, members, badges)
//! - **Interaction**: settings-block callbacks for badge configuration
//! - **Engine**: per-tenant bucket recomputation and badge reconciliation
//! - **Sweep**: daily expiry of posts that age out of their window
//! - **Sync**: rate-limited fire-and-forget badge mutations back to the platform

pub mod config;
pub mod engine;
pub mod interaction;
pub mod platform;
pub mod routes;
pub mod server;
pub mod state;
pub mod sync;
pub mod types;
pub mod webhook;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{AccoladeError, Result};
