//! Webhook dispatch
//!
//! Routes verified platform envelopes into the orchestrator. Every envelope
//! is acknowledged with HTTP 200 and a typed status; handler failures are
//! logged, never surfaced as transport errors.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::engine::BadgeOrchestrator;
use crate::platform::PlatformClient;
use crate::state::model::{AppSettings, Badge, Post, RawPost};
use crate::types::{BadgeId, MemberId};
use crate::webhook::payload::{WebhookData, WebhookEnvelope, WebhookResponse};

/// Route one verified envelope to its handler.
pub async fn dispatch_webhook<P: PlatformClient + 'static>(
    orchestrator: &Arc<BadgeOrchestrator<P>>,
    envelope: WebhookEnvelope,
) -> WebhookResponse {
    info!(kind = %envelope.kind, network = ?envelope.network_id, "Webhook received");

    match envelope.kind.as_str() {
        "TEST" => {
            info!(challenge = ?envelope.data.challenge, "Test webhook received");
            WebhookResponse::succeeded("TEST", json!({ "challenge": envelope.data.challenge }))
        }
        "GET_SETTINGS" => handle_get_settings(orchestrator, &envelope).await,
        "UPDATE_SETTINGS" => handle_update_settings(orchestrator, &envelope).await,
        // Interaction callbacks have their own route; the webhook copy is
        // acknowledged and otherwise ignored.
        "INTERACTION" => WebhookResponse::succeeded("INTERACTION", json!({})),
        "SUBSCRIPTION" => handle_subscription(orchestrator, &envelope).await,
        "APP_INSTALLED" => handle_app_installed(orchestrator, &envelope).await,
        "APP_UNINSTALLED" => handle_app_uninstalled(orchestrator, &envelope).await,
        other => {
            warn!(kind = %other, "Unknown webhook type");
            WebhookResponse::failed("UNKNOWN", "UNKNOWN_TYPE", "Unknown webhook type")
        }
    }
}

async fn handle_get_settings<P: PlatformClient + 'static>(
    orchestrator: &Arc<BadgeOrchestrator<P>>,
    envelope: &WebhookEnvelope,
) -> WebhookResponse {
    let Some(tenant_id) = envelope.network_id.clone() else {
        warn!("GET_SETTINGS webhook missing networkId");
        return WebhookResponse::failed(
            "GET_SETTINGS",
            "MISSING_NETWORK_ID",
            "Missing networkId in webhook body",
        );
    };

    let settings = orchestrator.current_settings(&tenant_id).await;
    match serde_json::to_value(&settings) {
        Ok(data) => WebhookResponse::succeeded("GET_SETTINGS", data),
        Err(e) => {
            error!(tenant = %tenant_id, error = %e, "Failed to serialize settings");
            WebhookResponse::failed("GET_SETTINGS", "SERIALIZATION_ERROR", e.to_string())
        }
    }
}

async fn handle_update_settings<P: PlatformClient + 'static>(
    orchestrator: &Arc<BadgeOrchestrator<P>>,
    envelope: &WebhookEnvelope,
) -> WebhookResponse {
    let Some(tenant_id) = envelope.network_id.clone() else {
        warn!("UPDATE_SETTINGS webhook missing networkId");
        return WebhookResponse::failed(
            "UPDATE_SETTINGS",
            "MISSING_NETWORK_ID",
            "Missing networkId in webhook body",
        );
    };

    let settings = match &envelope.data.settings {
        Some(value) => match serde_json::from_value::<AppSettings>(value.clone()) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(tenant = %tenant_id, error = %e, "Unparseable settings blob");
                return WebhookResponse::failed(
                    "UPDATE_SETTINGS",
                    "INVALID_SETTINGS",
                    e.to_string(),
                );
            }
        },
        None => AppSettings::default(),
    };

    orchestrator.update_settings_cache(&tenant_id, settings).await;
    WebhookResponse::succeeded(
        "UPDATE_SETTINGS",
        envelope.data.settings.clone().unwrap_or_else(|| json!({})),
    )
}

async fn handle_subscription<P: PlatformClient + 'static>(
    orchestrator: &Arc<BadgeOrchestrator<P>>,
    envelope: &WebhookEnvelope,
) -> WebhookResponse {
    // Subscription events are always acknowledged as succeeded; a lost
    // event corrects itself on the next recompute touching that member.
    let ack = WebhookResponse::succeeded("SUBSCRIPTION", json!({}));

    let Some(tenant_id) = envelope.network_id.clone() else {
        warn!(event = ?envelope.data.name, "Subscription webhook missing networkId");
        return ack;
    };

    let event = envelope.data.name.as_deref().unwrap_or_default();
    match event {
        "badge.created" => match object_badge(&envelope.data) {
            Some(badge) => orchestrator.on_badge_created(&tenant_id, badge).await,
            None => warn!(tenant = %tenant_id, event, "Badge event without a parseable badge"),
        },
        "badge.updated" => match object_badge(&envelope.data) {
            Some(badge) => orchestrator.on_badge_updated(&tenant_id, badge).await,
            None => warn!(tenant = %tenant_id, event, "Badge event without a parseable badge"),
        },
        "badge.deleted" => match object_id(&envelope.data) {
            Some(id) => {
                orchestrator
                    .on_badge_deleted(&tenant_id, &BadgeId::new(id))
                    .await
            }
            None => warn!(tenant = %tenant_id, event, "Badge event without an id"),
        },
        "member.deleted" | "sso_membership.deleted" | "member.suspended" => {
            match object_id(&envelope.data) {
                Some(id) => {
                    orchestrator
                        .on_member_suspended(&tenant_id, MemberId::new(id))
                        .await
                }
                None => warn!(tenant = %tenant_id, event, "Member event without an id"),
            }
        }
        "member.unsuspended" => match object_id(&envelope.data) {
            Some(id) => {
                orchestrator
                    .on_member_unsuspended(&tenant_id, MemberId::new(id))
                    .await
            }
            None => warn!(tenant = %tenant_id, event, "Member event without an id"),
        },
        "post.published" | "post.unhidden" | "post.hidden" | "post.unpublished"
        | "post.deleted" => match object_post(&envelope.data) {
            Some(post) => orchestrator.on_content_changed(&tenant_id, post).await,
            None => {
                debug!(tenant = %tenant_id, event, "Content event without usable post metadata")
            }
        },
        other => debug!(tenant = %tenant_id, event = %other, "Unhandled subscription event"),
    }

    ack
}

async fn handle_app_installed<P: PlatformClient + 'static>(
    orchestrator: &Arc<BadgeOrchestrator<P>>,
    envelope: &WebhookEnvelope,
) -> WebhookResponse {
    let Some(tenant_id) = envelope.network_id.clone() else {
        warn!("APP_INSTALLED webhook missing networkId");
        return WebhookResponse::succeeded("APP_INSTALLED", json!({}));
    };

    if let Err(e) = orchestrator.clone().install(tenant_id.clone()).await {
        error!(tenant = %tenant_id, error = %e, "Install failed");
    }
    WebhookResponse::succeeded("APP_INSTALLED", json!({}))
}

async fn handle_app_uninstalled<P: PlatformClient + 'static>(
    orchestrator: &Arc<BadgeOrchestrator<P>>,
    envelope: &WebhookEnvelope,
) -> WebhookResponse {
    let Some(tenant_id) = envelope.network_id.clone() else {
        warn!("APP_UNINSTALLED webhook missing networkId");
        return WebhookResponse::failed(
            "APP_UNINSTALLED",
            "MISSING_NETWORK_ID",
            "Missing networkId in webhook body",
        );
    };

    match orchestrator.uninstall(&tenant_id).await {
        Ok(()) => WebhookResponse::succeeded("APP_UNINSTALLED", json!({})),
        Err(e) => {
            error!(tenant = %tenant_id, error = %e, "Uninstall failed");
            WebhookResponse::failed("APP_UNINSTALLED", "CLEANUP_ERROR", e.to_string())
        }
    }
}

fn object_badge(data: &WebhookData) -> Option<Badge> {
    serde_json::from_value(data.object.clone()?).ok()
}

fn object_id(data: &WebhookData) -> Option<String> {
    Some(data.object.as_ref()?.get("id")?.as_str()?.to_string())
}

fn object_post(data: &WebhookData) -> Option<Post> {
    let raw: RawPost = serde_json::from_value(data.object.clone()?).ok()?;
    raw.normalize()
}
