//! Accolade - badge orchestration engine for community platforms
//!
//! "Honor to whom honor is owed" - Romans 13:7

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use accolade::{
    config::Args,
    engine::{BadgeOrchestrator, EngineConfig, SweepScheduler},
    platform::GqlPlatform,
    server,
    state::StateStore,
    sync::spawn_sync_worker,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("accolade={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Accolade - Badge Orchestration");
    info!("  \"Honor to whom honor is owed\"");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Platform GraphQL: {}", args.graphql_url);
    info!("Post window: {} days", args.post_window_days);
    info!("Sweep hour: {:02}:00 UTC", args.sweep_hour_utc);
    info!(
        "Sync queue: {} ops, {}ms between platform calls",
        args.sync_queue_size, args.sync_delay_ms
    );
    info!("======================================");

    let platform = Arc::new(GqlPlatform::new(&args));
    let store = Arc::new(StateStore::new());
    let scheduler = Arc::new(SweepScheduler::new());
    let (sync, _sync_worker) = spawn_sync_worker(
        Arc::clone(&platform),
        args.sync_queue_size,
        std::time::Duration::from_millis(args.sync_delay_ms),
    );

    let orchestrator = Arc::new(BadgeOrchestrator::new(
        Arc::clone(&store),
        platform,
        sync.clone(),
        Arc::clone(&scheduler),
        EngineConfig::from(&args),
    ));

    // State lives in memory only. Spawn re-installation of known networks
    // with a 5s delay (platform readiness); webhooks arriving meanwhile are
    // absorbed by install idempotence.
    {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(5)).await;
            orchestrator.reinstall_known_networks().await;
        });
    }

    let state = Arc::new(server::AppState::new(
        args,
        store,
        orchestrator,
        scheduler,
        sync,
    ));

    // Run the server
    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
