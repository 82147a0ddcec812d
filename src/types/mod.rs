//! Shared types for Accolade

pub mod error;
pub mod ids;

pub use error::{AccoladeError, Result};
pub use ids::{BadgeId, ConditionId, MemberId, PostId, TenantId};
