//! Settings-block interactions
//!
//! Handles the app settings UI callbacks: badge selection, config saves and
//! the initial render. Responses are interaction lists the platform replays
//! against the block (`SHOW`, `RELOAD`, `OPEN_TOAST`).

use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::engine::BadgeOrchestrator;
use crate::platform::PlatformClient;
use crate::state::model::{BadgeCondition, BadgeConfig};
use crate::types::BadgeId;
use crate::webhook::payload::{ResponseStatus, WebhookEnvelope};

/// Callback prefix for badge selection; the badge id follows after `_`.
pub const SELECT_BADGE: &str = "select-badge";
/// Callback id of the config form's save button.
pub const SAVE_BADGE_CONFIG: &str = "save-badge-config";

const INTERACTION_KIND: &str = "INTERACTION";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionType {
    Show,
    Reload,
    OpenToast,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: InteractionType,
    pub props: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionData {
    pub app_id: String,
    pub interaction_id: String,
    pub interactions: Vec<Interaction>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: ResponseStatus,
    pub data: InteractionData,
}

/// Handle one settings-block request: a callback if one is named, the
/// initial render otherwise.
pub async fn handle_interaction<P: PlatformClient + 'static>(
    orchestrator: &BadgeOrchestrator<P>,
    envelope: &WebhookEnvelope,
) -> InteractionResponse {
    let app_id = envelope.data.app_id.clone().unwrap_or_default();
    let interaction_id = envelope.data.interaction_id.clone().unwrap_or_default();

    let Some(tenant_id) = envelope.network_id.clone() else {
        return error_toast(&app_id, &interaction_id, "Missing networkId in request");
    };

    match envelope.data.callback_id.as_deref() {
        None => {
            let view = orchestrator.settings_view(&tenant_id).await;
            let props = serde_json::to_value(&view).unwrap_or_else(|_| json!({}));
            respond(
                &app_id,
                &interaction_id,
                vec![Interaction {
                    id: interaction_id.clone(),
                    kind: InteractionType::Show,
                    props,
                }],
            )
        }
        Some(callback_id) if callback_id.starts_with(SELECT_BADGE) => {
            let badge_id = callback_id
                .strip_prefix(SELECT_BADGE)
                .and_then(|rest| rest.strip_prefix('_'))
                .unwrap_or_default();
            if badge_id.is_empty() {
                return error_toast(&app_id, &interaction_id, "Missing badge in selection");
            }

            orchestrator
                .select_badge(&tenant_id, BadgeId::new(badge_id))
                .await;
            respond(
                &app_id,
                &interaction_id,
                vec![reload_interaction(&interaction_id)],
            )
        }
        Some(SAVE_BADGE_CONFIG) => {
            save_badge_config(
                orchestrator,
                &tenant_id,
                &app_id,
                &interaction_id,
                envelope.data.inputs.as_ref(),
            )
            .await
        }
        Some(other) => {
            warn!(callback = %other, "Unknown interaction callback");
            InteractionResponse {
                kind: INTERACTION_KIND.to_string(),
                status: ResponseStatus::Failed,
                data: InteractionData {
                    app_id,
                    interaction_id,
                    interactions: Vec::new(),
                },
            }
        }
    }
}

async fn save_badge_config<P: PlatformClient + 'static>(
    orchestrator: &BadgeOrchestrator<P>,
    tenant_id: &crate::types::TenantId,
    app_id: &str,
    interaction_id: &str,
    inputs: Option<&Value>,
) -> InteractionResponse {
    let Some(inputs) = inputs else {
        return error_toast(app_id, interaction_id, "Missing form data");
    };

    let fields = (
        string_input(inputs, "badge-id"),
        string_input(inputs, "badge-name"),
        integer_input(inputs, "if-value"),
        integer_input(inputs, "in-value"),
    );
    let (Some(badge_id), Some(badge_name), Some(threshold), Some(window_days)) = fields else {
        return error_toast(app_id, interaction_id, "Invalid form data");
    };

    let limit = orchestrator.config().post_window_days;
    if threshold < 0 || window_days < 1 || window_days > limit {
        return error_toast(app_id, interaction_id, "Invalid form data");
    }

    // A zero threshold removes the config downstream.
    let config = BadgeConfig::single_condition(
        BadgeId::new(badge_id),
        BadgeCondition::posts_within_days(threshold, window_days),
    );
    orchestrator.on_config_saved(tenant_id, config).await;

    respond(
        app_id,
        interaction_id,
        vec![
            Interaction {
                id: format!("{}-toast", interaction_id),
                kind: InteractionType::OpenToast,
                props: json!({
                    "status": "success",
                    "title": "Badge Configuration Saved",
                    "description": format!(
                        "Successfully saved badge configuration for \"{}\"",
                        badge_name
                    )
                }),
            },
            reload_interaction(interaction_id),
        ],
    )
}

/// Integer form input: the platform sends numbers or numeric strings
/// depending on the input widget.
fn integer_input(inputs: &Value, key: &str) -> Option<i64> {
    match inputs.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string_input(inputs: &Value, key: &str) -> Option<String> {
    let value = inputs.get(key)?.as_str()?.trim();
    if value.is_empty() {
        return None;
    }
    Some(value.to_string())
}

fn respond(app_id: &str, interaction_id: &str, interactions: Vec<Interaction>) -> InteractionResponse {
    InteractionResponse {
        kind: INTERACTION_KIND.to_string(),
        status: ResponseStatus::Succeeded,
        data: InteractionData {
            app_id: app_id.to_string(),
            interaction_id: interaction_id.to_string(),
            interactions,
        },
    }
}

fn reload_interaction(interaction_id: &str) -> Interaction {
    Interaction {
        id: interaction_id.to_string(),
        kind: InteractionType::Reload,
        props: json!({ "dynamicBlockKeys": [interaction_id] }),
    }
}

/// The platform renders toasts only from SUCCEEDED responses, so validation
/// errors ride a succeeded response with an error toast.
fn error_toast(app_id: &str, interaction_id: &str, message: &str) -> InteractionResponse {
    respond(
        app_id,
        interaction_id,
        vec![Interaction {
            id: format!("{}-error-toast", interaction_id),
            kind: InteractionType::OpenToast,
            props: json!({
                "title": "Error",
                "description": message,
                "status": "error"
            }),
        }],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineConfig, SweepScheduler};
    use crate::platform::testing::ScriptedPlatform;
    use crate::state::model::{Badge, BadgeKind};
    use crate::state::StateStore;
    use crate::sync::spawn_sync_worker;
    use crate::types::TenantId;
    use std::sync::Arc;

    fn orchestrator() -> (Arc<BadgeOrchestrator<ScriptedPlatform>>, Arc<StateStore>) {
        let platform = Arc::new(ScriptedPlatform::default());
        let store = Arc::new(StateStore::new());
        let scheduler = Arc::new(SweepScheduler::new());
        let (sync, _worker) = spawn_sync_worker(platform.clone(), 64, std::time::Duration::ZERO);
        let orchestrator = Arc::new(BadgeOrchestrator::new(
            store.clone(),
            platform,
            sync,
            scheduler,
            EngineConfig::default(),
        ));
        (orchestrator, store)
    }

    fn envelope(raw: Value) -> WebhookEnvelope {
        serde_json::from_value(raw).unwrap()
    }

    fn save_envelope(inputs: Value) -> WebhookEnvelope {
        envelope(json!({
            "type": "INTERACTION",
            "networkId": "net-1",
            "data": {
                "appId": "app-1",
                "interactionId": "ix-1",
                "callbackId": "save-badge-config",
                "inputs": inputs
            }
        }))
    }

    fn toast_description(response: &InteractionResponse) -> String {
        response.data.interactions[0].props["description"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    }

    #[tokio::test]
    async fn test_select_badge_callback_reloads_block() {
        let (orchestrator, store) = orchestrator();
        let response = handle_interaction(
            &orchestrator,
            &envelope(json!({
                "type": "INTERACTION",
                "networkId": "net-1",
                "data": {
                    "appId": "app-1",
                    "interactionId": "ix-1",
                    "callbackId": "select-badge_b1"
                }
            })),
        )
        .await;

        assert_eq!(response.status, ResponseStatus::Succeeded);
        assert_eq!(response.data.interactions.len(), 1);
        assert_eq!(response.data.interactions[0].kind, InteractionType::Reload);
        assert_eq!(
            response.data.interactions[0].props["dynamicBlockKeys"],
            json!(["ix-1"])
        );

        let cell = store.tenant(&TenantId::new("net-1"));
        let state = cell.lock().await;
        assert_eq!(state.selected_badge(), Some(&BadgeId::new("b1")));
    }

    #[tokio::test]
    async fn test_save_valid_config() {
        let (orchestrator, store) = orchestrator();
        let response = handle_interaction(
            &orchestrator,
            &save_envelope(json!({
                "badge-id": "b1",
                "badge-name": "Helper",
                "if-value": "3",
                "in-value": 5
            })),
        )
        .await;

        assert_eq!(response.status, ResponseStatus::Succeeded);
        assert_eq!(response.data.interactions.len(), 2);
        assert_eq!(
            response.data.interactions[0].kind,
            InteractionType::OpenToast
        );
        assert_eq!(
            response.data.interactions[0].props["title"],
            "Badge Configuration Saved"
        );
        assert!(toast_description(&response).contains("\"Helper\""));
        assert_eq!(response.data.interactions[1].kind, InteractionType::Reload);

        let cell = store.tenant(&TenantId::new("net-1"));
        let state = cell.lock().await;
        let config = state.badge_config(&BadgeId::new("b1")).unwrap();
        assert!(config.active);
        assert_eq!(config.conditions.len(), 1);
    }

    #[tokio::test]
    async fn test_save_rejects_bad_numbers() {
        let (orchestrator, store) = orchestrator();

        for inputs in [
            json!({"badge-id": "b1", "badge-name": "Helper", "if-value": "abc", "in-value": 5}),
            json!({"badge-id": "b1", "badge-name": "Helper", "if-value": 3, "in-value": 0}),
            json!({"badge-id": "b1", "badge-name": "Helper", "if-value": 3, "in-value": 45}),
            json!({"badge-id": "b1", "badge-name": "Helper", "if-value": -1, "in-value": 5}),
            json!({"badge-id": "", "badge-name": "Helper", "if-value": 3, "in-value": 5}),
        ] {
            let response = handle_interaction(&orchestrator, &save_envelope(inputs)).await;
            assert_eq!(response.status, ResponseStatus::Succeeded);
            assert_eq!(
                response.data.interactions[0].props["status"], "error",
                "expected an error toast"
            );
        }

        let cell = store.tenant(&TenantId::new("net-1"));
        let state = cell.lock().await;
        assert!(state.app_config().is_empty());
    }

    #[tokio::test]
    async fn test_zero_threshold_removes_config() {
        let (orchestrator, store) = orchestrator();

        handle_interaction(
            &orchestrator,
            &save_envelope(json!({
                "badge-id": "b1", "badge-name": "Helper", "if-value": 3, "in-value": 5
            })),
        )
        .await;
        {
            let cell = store.tenant(&TenantId::new("net-1"));
            let state = cell.lock().await;
            assert_eq!(state.app_config().len(), 1);
        }

        handle_interaction(
            &orchestrator,
            &save_envelope(json!({
                "badge-id": "b1", "badge-name": "Helper", "if-value": 0, "in-value": 5
            })),
        )
        .await;
        let cell = store.tenant(&TenantId::new("net-1"));
        let state = cell.lock().await;
        assert!(state.app_config().is_empty());
    }

    #[tokio::test]
    async fn test_render_returns_settings_view() {
        let (orchestrator, store) = orchestrator();
        {
            let cell = store.tenant(&TenantId::new("net-1"));
            let mut state = cell.lock().await;
            state.set_available_badge(Badge {
                id: BadgeId::new("b1"),
                name: "Helper".to_string(),
                active: true,
                kind: BadgeKind::Manual,
            });
            state.set_selected_badge(BadgeId::new("b1"));
        }

        let response = handle_interaction(
            &orchestrator,
            &envelope(json!({
                "type": "INTERACTION",
                "networkId": "net-1",
                "data": {"appId": "app-1", "interactionId": "ix-1"}
            })),
        )
        .await;

        assert_eq!(response.data.interactions[0].kind, InteractionType::Show);
        let props = &response.data.interactions[0].props;
        assert_eq!(props["selectedBadge"], "b1");
        assert_eq!(props["badges"][0]["name"], "Helper");
    }

    #[tokio::test]
    async fn test_unknown_callback_fails() {
        let (orchestrator, _store) = orchestrator();
        let response = handle_interaction(
            &orchestrator,
            &envelope(json!({
                "type": "INTERACTION",
                "networkId": "net-1",
                "data": {
                    "appId": "app-1",
                    "interactionId": "ix-1",
                    "callbackId": "does-not-exist"
                }
            })),
        )
        .await;

        assert_eq!(response.status, ResponseStatus::Failed);
        assert!(response.data.interactions.is_empty());
    }

    #[tokio::test]
    async fn test_missing_network_yields_error_toast() {
        let (orchestrator, _store) = orchestrator();
        let response = handle_interaction(
            &orchestrator,
            &envelope(json!({
                "type": "INTERACTION",
                "data": {"appId": "app-1", "interactionId": "ix-1"}
            })),
        )
        .await;

        assert_eq!(response.status, ResponseStatus::Succeeded);
        assert_eq!(
            response.data.interactions[0].id,
            "ix-1-error-toast"
        );
        assert_eq!(response.data.interactions[0].props["status"], "error");
    }
}
