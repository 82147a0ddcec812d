//! GraphQL platform client
//!
//! Production `PlatformClient` speaking the platform's GraphQL API over
//! reqwest, authenticated with the app's client credentials.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::config::Args;
use crate::platform::PlatformClient;
use crate::state::model::{AppSettings, Badge, BadgeKind, Post, RawPost};
use crate::types::{AccoladeError, BadgeId, MemberId, Result, TenantId};

/// Upper bound on posts seeded at install time, across all pages.
const MAX_FETCHED_POSTS: usize = 1000;

const NETWORK_SETTINGS_QUERY: &str = r#"
query AppNetworkSettings($appId: ID!, $networkId: ID!) {
  appNetworkSettings(appId: $appId, networkId: $networkId)
}"#;

const UPDATE_NETWORK_SETTINGS_MUTATION: &str = r#"
mutation UpdateAppNetworkSettings($appId: ID!, $networkId: ID!, $settings: String!) {
  updateAppNetworkSettings(appId: $appId, networkId: $networkId, settings: $settings) {
    status
  }
}"#;

const NETWORK_BADGES_QUERY: &str = r#"
query NetworkBadges($networkId: ID!) {
  network(id: $networkId) {
    badges {
      id
      name
      active
      type
    }
  }
}"#;

const RECENT_POSTS_QUERY: &str = r#"
query RecentPosts($networkId: ID!, $limit: Int!, $after: String, $publishedAfter: String!) {
  posts(
    networkId: $networkId
    limit: $limit
    after: $after
    orderByString: "publishedAt"
    reverse: false
    filterBy: [{ key: "publishedAt", operator: gte, value: $publishedAfter }]
  ) {
    nodes {
      id
      title
      publishedAt
      createdById
      isHidden
      isAnonymous
      status
    }
    pageInfo {
      endCursor
      hasNextPage
    }
  }
}"#;

const ASSIGN_BADGE_MUTATION: &str = r#"
mutation AssignBadge($networkId: ID!, $badgeId: ID!, $memberId: ID!) {
  assignBadge(networkId: $networkId, badgeId: $badgeId, memberId: $memberId) {
    status
  }
}"#;

const REVOKE_BADGE_MUTATION: &str = r#"
mutation RevokeBadge($networkId: ID!, $badgeId: ID!, $memberId: ID!) {
  revokeBadge(networkId: $networkId, badgeId: $badgeId, memberId: $memberId) {
    status
  }
}"#;

const APP_INSTALLATIONS_QUERY: &str = r#"
query AppInstallations($appId: ID!) {
  appInstallations(appId: $appId) {
    networkId
  }
}"#;

#[derive(Debug, Deserialize)]
struct GqlEnvelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<GqlError>>,
}

#[derive(Debug, Deserialize)]
struct GqlError {
    #[serde(default)]
    message: String,
}

/// Platform client over the GraphQL endpoint.
pub struct GqlPlatform {
    http: reqwest::Client,
    graphql_url: String,
    authorization: String,
    app_id: String,
    fetch_page_size: usize,
    fetch_page_delay: Duration,
}

impl GqlPlatform {
    pub fn new(args: &Args) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(args.request_timeout_ms))
            .build()
            .expect("Failed to create HTTP client");

        let client_id = args.client_id.clone().unwrap_or_default();
        let client_secret = args.client_secret.clone().unwrap_or_default();
        let token = BASE64.encode(format!("{}:{}", client_id, client_secret));

        Self {
            http,
            graphql_url: args.graphql_url.clone(),
            authorization: format!("Bearer {}", token),
            app_id: args.app_id(),
            fetch_page_size: args.fetch_page_size,
            fetch_page_delay: Duration::from_millis(args.fetch_page_delay_ms),
        }
    }

    /// Run one GraphQL request and unwrap the envelope.
    async fn execute(&self, query: &str, variables: Value) -> Result<Value> {
        let response = self
            .http
            .post(&self.graphql_url)
            .header("Authorization", &self.authorization)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AccoladeError::Platform(format!(
                "GraphQL endpoint returned HTTP {}",
                status
            )));
        }

        let envelope: GqlEnvelope = response.json().await?;

        if let Some(errors) = envelope.errors {
            if !errors.is_empty() {
                let message = errors
                    .iter()
                    .map(|e| e.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ");
                if message.contains("App not found") || message.contains("\"code\":\"110\"") {
                    error!(
                        "App authentication failed - verify CLIENT_ID and CLIENT_SECRET \
                         are correct and the app is registered"
                    );
                }
                return Err(AccoladeError::Platform(message));
            }
        }

        envelope
            .data
            .ok_or_else(|| AccoladeError::Platform("GraphQL response missing data".to_string()))
    }
}

#[async_trait]
impl PlatformClient for GqlPlatform {
    async fn fetch_settings(&self, tenant_id: &TenantId) -> Result<AppSettings> {
        let data = self
            .execute(
                NETWORK_SETTINGS_QUERY,
                json!({ "appId": self.app_id, "networkId": tenant_id }),
            )
            .await?;
        let raw = data["appNetworkSettings"].as_str().unwrap_or_default();
        Ok(parse_settings_blob(raw))
    }

    async fn update_settings(&self, tenant_id: &TenantId, settings: &AppSettings) -> Result<()> {
        let blob = serde_json::to_string(settings)?;
        self.execute(
            UPDATE_NETWORK_SETTINGS_MUTATION,
            json!({ "appId": self.app_id, "networkId": tenant_id, "settings": blob }),
        )
        .await?;
        debug!(tenant = %tenant_id, "Updated app network settings");
        Ok(())
    }

    async fn fetch_manual_badges(&self, tenant_id: &TenantId) -> Result<Vec<Badge>> {
        let data = self
            .execute(NETWORK_BADGES_QUERY, json!({ "networkId": tenant_id }))
            .await?;
        let badges: Vec<Badge> =
            serde_json::from_value(data["network"]["badges"].clone()).unwrap_or_default();
        Ok(badges
            .into_iter()
            .filter(|badge| badge.kind == BadgeKind::Manual)
            .collect())
    }

    async fn fetch_recent_posts(
        &self,
        tenant_id: &TenantId,
        published_after: DateTime<Utc>,
    ) -> Result<Vec<Post>> {
        let mut posts = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let data = self
                .execute(
                    RECENT_POSTS_QUERY,
                    json!({
                        "networkId": tenant_id,
                        "limit": self.fetch_page_size,
                        "after": after,
                        "publishedAfter": published_after.to_rfc3339(),
                    }),
                )
                .await?;

            let nodes: Vec<RawPost> =
                serde_json::from_value(data["posts"]["nodes"].clone()).unwrap_or_default();
            for raw in nodes {
                if let Some(post) = raw.normalize() {
                    posts.push(post);
                }
            }

            let has_next = data["posts"]["pageInfo"]["hasNextPage"]
                .as_bool()
                .unwrap_or(false);
            let end_cursor = data["posts"]["pageInfo"]["endCursor"]
                .as_str()
                .map(str::to_string);

            if !has_next || end_cursor.is_none() || posts.len() >= MAX_FETCHED_POSTS {
                break;
            }
            after = end_cursor;

            // Platform rate limits: pace the pages.
            tokio::time::sleep(self.fetch_page_delay).await;
        }

        debug!(tenant = %tenant_id, count = posts.len(), "Fetched post metadata");
        Ok(posts)
    }

    async fn assign_badge(
        &self,
        tenant_id: &TenantId,
        member_id: &MemberId,
        badge_id: &BadgeId,
    ) -> Result<()> {
        self.execute(
            ASSIGN_BADGE_MUTATION,
            json!({ "networkId": tenant_id, "badgeId": badge_id, "memberId": member_id }),
        )
        .await?;
        Ok(())
    }

    async fn revoke_badge(
        &self,
        tenant_id: &TenantId,
        member_id: &MemberId,
        badge_id: &BadgeId,
    ) -> Result<()> {
        self.execute(
            REVOKE_BADGE_MUTATION,
            json!({ "networkId": tenant_id, "badgeId": badge_id, "memberId": member_id }),
        )
        .await?;
        Ok(())
    }

    async fn list_installations(&self) -> Result<Vec<TenantId>> {
        let data = self
            .execute(APP_INSTALLATIONS_QUERY, json!({ "appId": self.app_id }))
            .await?;
        let installations = data["appInstallations"].as_array().cloned().unwrap_or_default();
        Ok(installations
            .iter()
            .filter_map(|entry| entry["networkId"].as_str())
            .map(TenantId::new)
            .collect())
    }
}

/// Parse the stored settings blob, falling back to defaults on anything
/// unreadable.
fn parse_settings_blob(raw: &str) -> AppSettings {
    if raw.is_empty() {
        return AppSettings::default();
    }
    match serde_json::from_str(raw) {
        Ok(settings) => settings,
        Err(e) => {
            warn!(error = %e, "Settings blob is not valid JSON, starting from defaults");
            AppSettings::default()
        }
    }
}
