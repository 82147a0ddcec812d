//! Community platform client
//!
//! Async-trait seam over the platform's GraphQL API plus the production
//! reqwest implementation. The engine only ever talks to the trait.

pub mod gql;
#[cfg(test)]
pub(crate) mod testing;

pub use gql::GqlPlatform;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::state::model::{AppSettings, Badge, Post};
use crate::types::{BadgeId, MemberId, Result, TenantId};

/// Operations the engine needs from the community platform (allows mocking in tests)
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Fetch the app's settings blob for a network.
    /// A missing or empty blob comes back as defaults.
    async fn fetch_settings(&self, tenant_id: &TenantId) -> Result<AppSettings>;

    /// Persist the settings blob for a network.
    async fn update_settings(&self, tenant_id: &TenantId, settings: &AppSettings) -> Result<()>;

    /// Manually-assignable badges defined in the network.
    async fn fetch_manual_badges(&self, tenant_id: &TenantId) -> Result<Vec<Badge>>;

    /// Post metadata published after the cutoff, ascending by publish time.
    /// Paginated internally; implementations may pace their pages.
    async fn fetch_recent_posts(
        &self,
        tenant_id: &TenantId,
        published_after: DateTime<Utc>,
    ) -> Result<Vec<Post>>;

    /// Assign a badge to a member.
    async fn assign_badge(
        &self,
        tenant_id: &TenantId,
        member_id: &MemberId,
        badge_id: &BadgeId,
    ) -> Result<()>;

    /// Revoke a badge from a member.
    async fn revoke_badge(
        &self,
        tenant_id: &TenantId,
        member_id: &MemberId,
        badge_id: &BadgeId,
    ) -> Result<()>;

    /// Networks the app is currently installed in.
    async fn list_installations(&self) -> Result<Vec<TenantId>>;
}
