mod broadcaster;
mod config;
mod discovery;
mod osc_listener;
mod registry;
mod status;
mod transport;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use crate::broadcaster::BroadcastCtx;
use crate::config::Config;
use crate::discovery::DiscoveryCtx;
use crate::registry::PeerRegistry;

#[derive(Parser, Debug)]
#[command(name = "tally-host", about = "TallyNet OSC tally broadcaster")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/tally.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // Load configuration — any failure here is fatal
    let config_str = tokio::fs::read_to_string(&args.config).await.map_err(|e| {
        error!("Failed to read config file {:?}: {}", args.config, e);
        e
    })?;

    let config = Config::from_toml(&config_str).map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    info!(
        update_rate_ms = config.sender.update_rate_ms,
        discovery = config.discovery.enabled,
        custom_port = config.custom_port.enabled,
        "TallyNet host starting"
    );

    let params = Arc::new(config.parameter_table()?);
    let registry = Arc::new(PeerRegistry::new());
    let (status_tx, status_rx) = status::channel();

    // Static destination (custom-port mode)
    if config.custom_port.enabled {
        let dest = SocketAddr::new(config.custom_host()?, config.custom_port.port);
        registry.add_static(dest).await?;
    }

    let ctx = Arc::new(BroadcastCtx {
        params: Arc::clone(&params),
        registry: Arc::clone(&registry),
        status: status_tx,
        send_failures: Arc::new(AtomicU64::new(0)),
    });

    // Spawn discovery (and eviction sweep if a staleness window is set)
    let mut handles = Vec::new();

    if config.discovery.enabled {
        let stale_after = match config.discovery.stale_after_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let discovery_ctx = Arc::new(DiscoveryCtx {
            registry: Arc::clone(&registry),
            http: reqwest::Client::builder()
                .timeout(Duration::from_millis(config.discovery.probe_timeout_ms))
                .build()
                .unwrap_or_default(),
            capability_marker: config.discovery.capability_marker.clone(),
            stale_after,
        });

        handles.push(tokio::spawn(async move {
            if let Err(e) = discovery::run(discovery_ctx).await {
                error!("Discovery error: {}", e);
            }
        }));

        if let Some(max_age) = stale_after {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(discovery::run_eviction(registry, max_age)));
        }
    }

    // Spawn the two broadcast timers
    {
        let ctx = Arc::clone(&ctx);
        let update_rate_ms = config.sender.update_rate_ms;
        handles.push(tokio::spawn(broadcaster::run_update(ctx, update_rate_ms)));
    }
    {
        let ctx = Arc::clone(&ctx);
        handles.push(tokio::spawn(broadcaster::run_heartbeat(ctx)));
    }

    // Spawn the upstream OSC state listener
    if config.listener.enabled {
        let params = Arc::clone(&params);
        let port = config.listener.port;
        handles.push(tokio::spawn(async move {
            if let Err(e) = osc_listener::run(params, port).await {
                error!("OSC listener error: {}", e);
            }
        }));
    }

    // Built-in status observer (logs receiver-count transitions)
    handles.push(tokio::spawn(status::run_logger(status_rx)));

    info!("TallyNet host running");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    // Abort all tasks; destination sockets close when the registry drops
    for handle in handles {
        handle.abort();
    }

    Ok(())
}
