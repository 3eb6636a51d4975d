//! # Server Binary Entry Point
//!
//! Thin wrapper that starts the relay server and stops it on Ctrl-C or SIGTERM.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin server -- 5000
//! cargo run --bin server -- --config config/relay.toml
//! ```

use clap::Parser;
use log::{error, info};

use chat_relay::common::config::{parse_port, RelayConfig, DEFAULT_PORT};
use chat_relay::common::logging::init_logger;
use chat_relay::RelayServer;

/// Command-line arguments for the server binary
#[derive(Parser, Debug)]
#[command(author, version, about = "Multi-client TCP chat relay server", long_about = None)]
struct Args {
    /// TCP port to listen on (default: 5000). Invalid values fall back to the default.
    port: Option<String>,

    /// Optional TOML configuration file with a `[server]` section
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let args = Args::parse();

    let mut config = RelayConfig::load_or_default(args.config.as_deref()).server;
    if let Some(raw) = args.port.as_deref() {
        config.port = parse_port(raw, DEFAULT_PORT);
    }

    let server = RelayServer::new(config);
    if let Err(e) = server.start().await {
        error!("❌ {}", e);
        return Err(e.into());
    }

    shutdown_signal().await;
    info!("⏹️  Shutdown requested");
    server.stop().await;

    Ok(())
}

/// Resolve on Ctrl-C, or on SIGTERM where available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("❌ Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("❌ Failed to listen for SIGTERM: {}", e);
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
