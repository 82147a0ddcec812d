//! Platform webhook surface
//!
//! - `signature`: HMAC verification of inbound requests, signing helpers
//! - `payload`: envelope and acknowledgement shapes
//! - `handler`: dispatch into the orchestrator

pub mod handler;
pub mod payload;
pub mod signature;

pub use handler::dispatch_webhook;
pub use payload::{ResponseStatus, WebhookEnvelope, WebhookResponse};
pub use signature::{verify_signature, SIGNATURE_HEADER, TIMESTAMP_HEADER};
