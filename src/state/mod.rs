//! Tenant state: domain model, ordered content log, in-memory store

pub mod content_log;
pub mod model;
pub mod store;

pub use content_log::ContentLog;
pub use model::{
    AppConfig, AppSettings, Badge, BadgeCondition, BadgeConfig, MemberState, Post, RawPost,
};
pub use store::{StateStore, TenantCell, TenantState};
