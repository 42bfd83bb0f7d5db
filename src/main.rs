//! Request gateway.
//!
//! ```text
//!     Client ──POST /{service}/{method}──▶ http server
//!                                              │
//!                                              ▼
//!                                         dispatcher ──▶ timeout policy
//!                                              │
//!                                              ▼
//!                                          registry
//!                                              │
//!                                              ▼
//!                                      breaker ─▶ invoker ─────────▶ Backend
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use gateway::config::{load_config, GatewayConfig};
use gateway::lifecycle::{signals, Gateway, Shutdown};
use gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "gateway")]
#[command(about = "Request gateway with per-service timeouts and circuit breakers", long_about = None)]
struct Args {
    /// TOML configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        services = config.services.len(),
        trip_threshold = config.breaker.trip_threshold,
        cool_down_secs = config.breaker.cool_down_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let gateway = Gateway::from_config(&config)?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    gateway
        .into_server(config.listener.max_body_bytes)
        .run(listener, shutdown.subscribe())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
