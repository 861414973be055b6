use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use encodefleet_core::{
    load_config, validate_config, FfprobeProber, HardwareAcceleratorService, InMemoryJobStore,
    InMemoryProfileRepository, NodeRegistry, ProcessRunner, TranscodeOrchestrator,
};
use encodefleet_server::api::create_router;
use encodefleet_server::local_node;
use encodefleet_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("ENCODEFLEET_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!(version = VERSION, "Configuration loaded successfully");
    info!("ffmpeg: {:?}, ffprobe: {:?}", config.ffmpeg.ffmpeg_path, config.ffmpeg.ffprobe_path);

    // Hardware inventory (probed lazily, once)
    let hardware = Arc::new(HardwareAcceleratorService::from_config(
        &config.ffmpeg,
        &config.hardware,
    ));
    let accelerators = hardware.list_accelerators().await;
    info!("Detected {} hardware accelerator(s)", accelerators.len());

    // Wire the orchestrator
    let registry = Arc::new(NodeRegistry::new(&config.registry));
    let orchestrator = Arc::new(TranscodeOrchestrator::new(
        &config,
        Arc::clone(&registry),
        Arc::new(InMemoryProfileRepository::with_builtin().await),
        Arc::clone(&hardware),
        Arc::new(FfprobeProber::new(config.ffmpeg.ffprobe_path.clone())),
        Arc::new(ProcessRunner::new()),
        Arc::new(InMemoryJobStore::new()),
    ));
    orchestrator.start();

    // Register this host as an encoder node
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let heartbeat_handle = if config.local_node.enabled {
        local_node::register(&registry, &config.local_node)
            .await
            .context("Failed to register local encoder node")?;
        Some(tokio::spawn(local_node::run_heartbeat(
            Arc::clone(&registry),
            config.local_node.clone(),
            config.registry.heartbeat_interval(),
            shutdown_tx.subscribe(),
        )))
    } else {
        info!("Local encoder node disabled");
        None
    };

    let addr = SocketAddr::new(config.server.host, config.server.port);

    // Create app state and router
    let state = Arc::new(AppState::new(
        config,
        Arc::clone(&orchestrator),
        hardware,
    ));
    let app = create_router(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    let _ = shutdown_tx.send(());
    if let Some(handle) = heartbeat_handle {
        let _ = handle.await;
    }
    orchestrator.stop();

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
