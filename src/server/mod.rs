//! HTTP server
//!
//! Hyper-based surface: signature-gated webhook and interaction posts
//! plus liveness probes.

pub mod http;

pub use http::{run, AppState};
