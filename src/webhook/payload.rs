//! Webhook envelope and acknowledgement shapes
//!
//! The platform posts one envelope shape for every event family and expects
//! a typed acknowledgement back with HTTP 200, even for failures.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::TenantId;

/// Inbound webhook envelope. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEnvelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub network_id: Option<TenantId>,
    #[serde(default)]
    pub data: WebhookData,
    /// Settings blob the platform currently holds, sent with GET_SETTINGS.
    #[serde(default)]
    pub current_settings: Option<Value>,
}

/// Payload section of an envelope. Which fields are present depends on the
/// envelope type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookData {
    /// Event name on SUBSCRIPTION envelopes (`post.published`, ...).
    #[serde(default)]
    pub name: Option<String>,
    /// Echo token on TEST envelopes.
    #[serde(default)]
    pub challenge: Option<String>,
    /// Settings blob on UPDATE_SETTINGS envelopes.
    #[serde(default)]
    pub settings: Option<Value>,
    /// Event subject: the badge, member or post the event is about.
    #[serde(default)]
    pub object: Option<Value>,
    #[serde(default)]
    pub interaction_id: Option<String>,
    #[serde(default)]
    pub callback_id: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    /// Form inputs on interaction callbacks.
    #[serde(default)]
    pub inputs: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Succeeded,
    Failed,
}

/// Outbound webhook acknowledgement.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl WebhookResponse {
    pub fn succeeded(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            status: ResponseStatus::Succeeded,
            data: Some(data),
            error_code: None,
            error_message: None,
        }
    }

    pub fn failed(
        kind: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            status: ResponseStatus::Failed,
            data: None,
            error_code: Some(code.into()),
            error_message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscription_envelope_parses() {
        let raw = json!({
            "type": "SUBSCRIPTION",
            "networkId": "net-1",
            "data": {
                "name": "post.published",
                "object": {"id": "p1", "publishedAt": "2026-08-19T12:00:00Z"},
                "extra": "ignored"
            }
        });

        let envelope: WebhookEnvelope = serde_json::from_value(raw).unwrap();
        assert_eq!(envelope.kind, "SUBSCRIPTION");
        assert_eq!(envelope.network_id, Some(TenantId::new("net-1")));
        assert_eq!(envelope.data.name.as_deref(), Some("post.published"));
        assert!(envelope.data.object.is_some());
    }

    #[test]
    fn test_minimal_envelope_parses() {
        let envelope: WebhookEnvelope = serde_json::from_str(r#"{"type":"TEST"}"#).unwrap();
        assert_eq!(envelope.kind, "TEST");
        assert!(envelope.network_id.is_none());
        assert!(envelope.data.challenge.is_none());
    }

    #[test]
    fn test_response_serialization() {
        let ok = WebhookResponse::succeeded("TEST", json!({"challenge": "abc"}));
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"type": "TEST", "status": "SUCCEEDED", "data": {"challenge": "abc"}})
        );

        let failed = WebhookResponse::failed("UNKNOWN", "UNKNOWN_TYPE", "Unknown webhook type");
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({
                "type": "UNKNOWN",
                "status": "FAILED",
                "errorCode": "UNKNOWN_TYPE",
                "errorMessage": "Unknown webhook type"
            })
        );
    }
}
