//! HTTP server implementation
//!
//! Hyper http1 with TokioIo for async handling. Two POST surfaces
//! (/webhook, /interaction) are signature-gated; everything else is
//! unauthenticated read-only plumbing.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::engine::{BadgeOrchestrator, SweepScheduler};
use crate::interaction;
use crate::platform::PlatformClient;
use crate::routes;
use crate::state::StateStore;
use crate::sync::SyncQueue;
use crate::types::AccoladeError;
use crate::webhook::{self, WebhookEnvelope, WebhookResponse};

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState<P: PlatformClient> {
    pub args: Args,
    /// Per-tenant badge state
    pub store: Arc<StateStore>,
    /// Reconciliation engine behind the webhook and interaction surfaces
    pub orchestrator: Arc<BadgeOrchestrator<P>>,
    /// Daily window sweep jobs
    pub scheduler: Arc<SweepScheduler>,
    /// Outbound badge mutation queue
    pub sync: SyncQueue,
    /// Process start, for uptime reporting
    pub started_at: std::time::Instant,
}

impl<P: PlatformClient> AppState<P> {
    pub fn new(
        args: Args,
        store: Arc<StateStore>,
        orchestrator: Arc<BadgeOrchestrator<P>>,
        scheduler: Arc<SweepScheduler>,
        sync: SyncQueue,
    ) -> Self {
        Self {
            args,
            store,
            orchestrator,
            scheduler,
            sync,
            started_at: std::time::Instant::now(),
        }
    }
}

/// Run the HTTP server
pub async fn run<P: PlatformClient + 'static>(
    state: Arc<AppState<P>>,
) -> Result<(), AccoladeError> {
    let addr: SocketAddr = state.args.listen;
    let listener = TcpListener::bind(addr).await?;

    info!(
        "Accolade listening on {} as node {}",
        addr, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - webhook signature verification disabled");
    }

    loop {
        let (stream, remote) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let state = Arc::clone(&state);

        tokio::spawn(async move {
            let service = service_fn(move |req| handle_request(Arc::clone(&state), remote, req));

            if let Err(e) = http1::Builder::new()
                .preserve_header_case(true)
                .title_case_headers(true)
                .serve_connection(io, service)
                .await
            {
                error!("Connection error from {}: {:?}", remote, e);
            }
        });
    }
}

/// Route an incoming request
async fn handle_request<P: PlatformClient + 'static>(
    state: Arc<AppState<P>>,
    remote: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", remote, method, path);

    // Body-consuming routes return early; the rest share the tail below.
    if method == Method::POST && path == "/webhook" {
        return Ok(to_boxed(handle_webhook(&state, req).await));
    }
    if method == Method::POST && path == "/interaction" {
        return Ok(to_boxed(handle_interaction_request(&state, req).await));
    }

    let response = match (method, path.as_str()) {
        (Method::GET, "/") => routes::root_info(&state),
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state))
        }
        (Method::GET, "/version") => routes::version_info(),
        (Method::OPTIONS, _) => preflight_response(),
        _ => not_found_response(&path),
    };

    Ok(to_boxed(response))
}

/// POST /webhook - platform event intake.
///
/// Every parseable envelope gets HTTP 200; failures travel in the response
/// status field so the platform does not retry what it cannot fix.
async fn handle_webhook<P: PlatformClient + 'static>(
    state: &Arc<AppState<P>>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let body = match verified_body(state, req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Malformed webhook payload: {}", e);
            return json_response(
                StatusCode::OK,
                &WebhookResponse::failed("UNKNOWN", "INVALID_PAYLOAD", e.to_string()),
            );
        }
    };

    let response = webhook::dispatch_webhook(&state.orchestrator, envelope).await;
    json_response(StatusCode::OK, &response)
}

/// POST /interaction - settings block callbacks.
async fn handle_interaction_request<P: PlatformClient + 'static>(
    state: &Arc<AppState<P>>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let body = match verified_body(state, req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => return bad_request_response(&format!("Invalid interaction payload: {}", e)),
    };

    let response = interaction::handle_interaction(&state.orchestrator, &envelope).await;
    json_response(StatusCode::OK, &response)
}

/// Collect the request body, enforcing the HMAC signature outside dev mode.
///
/// Signature headers are captured before the body is consumed.
async fn verified_body<P: PlatformClient>(
    state: &Arc<AppState<P>>,
    req: Request<Incoming>,
) -> Result<Bytes, Response<Full<Bytes>>> {
    let signature = header_value(&req, webhook::SIGNATURE_HEADER);
    let timestamp = header_value(&req, webhook::TIMESTAMP_HEADER);

    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => return Err(bad_request_response(&format!("Failed to read body: {}", e))),
    };

    if state.args.dev_mode {
        return Ok(body);
    }

    let (Some(signature), Some(timestamp)) = (signature, timestamp) else {
        return Err(forbidden_response("Missing headers"));
    };

    if !webhook::verify_signature(&state.args.signing_secret(), &body, &timestamp, &signature) {
        return Err(forbidden_response("Invalid signature"));
    }

    Ok(body)
}

fn header_value(req: &Request<Incoming>, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

/// Convert Full<Bytes> response to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// Serialize a value as a JSON response
fn json_response<T: serde::Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_string(value)
        .unwrap_or_else(|_| r#"{"error":"Serialization failed"}"#.to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| {
            let mut response = Response::new(Full::new(Bytes::from("Internal error")));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        })
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "*")
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

/// 404 response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| {
            let mut response = Response::new(Full::new(Bytes::from("Not found")));
            *response.status_mut() = StatusCode::NOT_FOUND;
            response
        })
}

/// 400 response
fn bad_request_response(message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Bad request",
        "message": message,
    });

    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| {
            let mut response = Response::new(Full::new(Bytes::from("Bad request")));
            *response.status_mut() = StatusCode::BAD_REQUEST;
            response
        })
}

/// 403 response for signature failures
fn forbidden_response(message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Forbidden",
        "message": message,
    });

    Response::builder()
        .status(StatusCode::FORBIDDEN)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| {
            let mut response = Response::new(Full::new(Bytes::from("Forbidden")));
            *response.status_mut() = StatusCode::FORBIDDEN;
            response
        })
}
