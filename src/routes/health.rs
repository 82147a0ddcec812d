//! Health and version endpoints
//!
//! - /health, /healthz - liveness probe (is the service running?)
//! - /version - build information for deployment verification
//!
//! Liveness always returns 200 while the process is up; the body carries
//! tenant and sync-queue gauges for dashboards.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::platform::PlatformClient;
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall health status (true if service is running)
    pub healthy: bool,
    /// Service version
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    /// Current timestamp
    pub timestamp: String,
    /// Operating mode
    pub mode: String,
    /// Node identifier
    pub node_id: String,
    /// Tenant gauges
    pub tenants: TenantHealth,
    /// Sync queue gauges
    pub sync: SyncHealth,
}

#[derive(Serialize)]
pub struct TenantHealth {
    /// Networks with live state
    pub installed: usize,
    /// Running daily sweep jobs
    pub sweep_jobs: usize,
}

#[derive(Serialize)]
pub struct SyncHealth {
    /// Maximum queued badge operations
    pub queue_capacity: usize,
}

/// Handle liveness probe (/health, /healthz)
///
/// Returns 200 OK whenever the service is running. Badge sync is
/// fire-and-forget, so there is no readiness gate beyond the process
/// itself being up.
pub fn health_check<P: PlatformClient>(state: Arc<AppState<P>>) -> Response<Full<Bytes>> {
    let response = HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode {
            "development".to_string()
        } else {
            "production".to_string()
        },
        node_id: state.args.node_id.to_string(),
        tenants: TenantHealth {
            installed: state.store.tenant_count(),
            sweep_jobs: state.scheduler.job_count(),
        },
        sync: SyncHealth {
            queue_capacity: state.sync.capacity(),
        },
    };

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"healthy":true,"error":"Serialization failed"}"#.to_string());

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Version information for deployment verification
#[derive(Serialize)]
pub struct VersionResponse {
    /// Cargo package version
    pub version: &'static str,
    /// Git commit hash (short)
    pub commit: &'static str,
    /// Git commit hash (full)
    pub commit_full: &'static str,
    /// Build timestamp
    pub build_time: &'static str,
    /// Service name
    pub service: &'static str,
}

/// Handle version endpoint (/version)
pub fn version_info() -> Response<Full<Bytes>> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        commit_full: option_env!("GIT_COMMIT_FULL").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "accolade",
    };

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"version":"unknown","commit":"unknown"}"#.to_string());

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Handle GET / - service identity and exposed routes.
pub fn root_info<P: PlatformClient>(state: &AppState<P>) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "service": "accolade",
        "description": "Badge orchestration engine for community platforms",
        "version": env!("CARGO_PKG_VERSION"),
        "node_id": state.args.node_id.to_string(),
        "endpoints": {
            "health": "GET /health",
            "version": "GET /version",
            "webhook": "POST /webhook",
            "interaction": "POST /interaction"
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
