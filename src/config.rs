//! Configuration for Accolade
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Accolade - badge orchestration engine for community platforms
///
/// "Badges earned, not given"
#[derive(Parser, Debug, Clone)]
#[command(name = "accolade")]
#[command(about = "Badge orchestration engine for community platforms")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// GraphQL endpoint of the community platform
    #[arg(long, env = "GRAPHQL_URL", default_value = "http://localhost:4000/graphql")]
    pub graphql_url: String,

    /// App identifier registered with the platform (required in production)
    #[arg(long, env = "APP_ID")]
    pub app_id: Option<String>,

    /// OAuth client id for platform API calls (required in production)
    #[arg(long, env = "CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth client secret for platform API calls (required in production)
    #[arg(long, env = "CLIENT_SECRET")]
    pub client_secret: Option<String>,

    /// Shared secret for webhook signature verification (required in production)
    #[arg(long, env = "SIGNING_SECRET")]
    pub signing_secret: Option<String>,

    /// Enable development mode (disables signature checks, relaxes credential requirements)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Maximum tracked content window in days
    /// Posts older than this are evicted by the nightly sweep; badge
    /// conditions cannot look further back than this.
    #[arg(long, env = "POST_WINDOW_DAYS", default_value = "31")]
    pub post_window_days: i64,

    /// UTC hour at which the nightly window sweep runs
    #[arg(long, env = "SWEEP_HOUR_UTC", default_value = "0")]
    pub sweep_hour_utc: u32,

    /// Fixed delay between consecutive outbound badge calls in milliseconds
    #[arg(long, env = "SYNC_DELAY_MS", default_value = "1000")]
    pub sync_delay_ms: u64,

    /// Capacity of the outbound badge work queue
    #[arg(long, env = "SYNC_QUEUE_SIZE", default_value = "1000")]
    pub sync_queue_size: usize,

    /// Page size for post metadata fetches at install time
    #[arg(long, env = "FETCH_PAGE_SIZE", default_value = "10")]
    pub fetch_page_size: usize,

    /// Delay between post metadata pages in milliseconds (platform rate limits)
    #[arg(long, env = "FETCH_PAGE_DELAY_MS", default_value = "2000")]
    pub fetch_page_delay_ms: u64,

    /// Request timeout in milliseconds for platform API calls
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Get effective signing secret (uses default in dev mode)
    pub fn signing_secret(&self) -> String {
        if self.dev_mode {
            self.signing_secret
                .clone()
                .unwrap_or_else(|| "dev-only-insecure-secret".to_string())
        } else {
            self.signing_secret
                .clone()
                .expect("SIGNING_SECRET is required in production mode")
        }
    }

    /// Get effective app id (placeholder in dev mode)
    pub fn app_id(&self) -> String {
        if self.dev_mode {
            self.app_id.clone().unwrap_or_else(|| "dev-app".to_string())
        } else {
            self.app_id.clone().expect("APP_ID is required in production mode")
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            if self.signing_secret.is_none() {
                return Err("SIGNING_SECRET is required in production mode".to_string());
            }
            if self.app_id.is_none() {
                return Err("APP_ID is required in production mode".to_string());
            }
            if self.client_id.is_none() || self.client_secret.is_none() {
                return Err(
                    "CLIENT_ID and CLIENT_SECRET are required in production mode".to_string()
                );
            }
        }

        if self.post_window_days < 1 {
            return Err("POST_WINDOW_DAYS must be at least 1".to_string());
        }

        if self.sweep_hour_utc > 23 {
            return Err("SWEEP_HOUR_UTC must be between 0 and 23".to_string());
        }

        if self.sync_queue_size == 0 {
            return Err("SYNC_QUEUE_SIZE must be at least 1".to_string());
        }

        Ok(())
    }
}
