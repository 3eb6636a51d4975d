//! # Client Binary Entry Point
//!
//! Thin wrapper that connects a [`ChatClient`] and sends each line typed on
//! stdin. Type `/quit` to leave.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin client -- localhost 5000 Alice
//! cargo run --bin client -- --config config/relay.toml
//! ```

use clap::Parser;
use log::error;
use tokio::io::{AsyncBufReadExt, BufReader};

use chat_relay::client::{ChatClient, InputAction};
use chat_relay::common::config::{parse_port, RelayConfig, DEFAULT_PORT};
use chat_relay::common::logging::init_logger;

/// Command-line arguments for the client binary
#[derive(Parser, Debug)]
#[command(author, version, about = "Interactive client for the chat relay", long_about = None)]
struct Args {
    /// Server hostname or IP (default: localhost)
    host: Option<String>,

    /// Server port (default: 5000). Invalid values fall back to the default.
    port: Option<String>,

    /// Display name shown with each message (default: Client)
    name: Option<String>,

    /// Optional TOML configuration file with a `[client]` section
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let args = Args::parse();

    let mut config = RelayConfig::load_or_default(args.config.as_deref()).client;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(raw) = args.port.as_deref() {
        config.port = parse_port(raw, DEFAULT_PORT);
    }
    if let Some(name) = args.name {
        config.name = name;
    }

    let mut client =
        ChatClient::new(config).on_message(|message| println!("[Received] {}", message));

    if let Err(e) = client.connect().await {
        error!("❌ Could not connect: {}", e);
        return Err(e.into());
    }

    println!(
        "Connected as {}. Type a message and press Enter. Type /quit to exit.",
        client.name()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match InputAction::parse(&line) {
                    InputAction::Quit => break,
                    InputAction::Skip => continue,
                    InputAction::Send(text) => {
                        // Errors are already logged; keep reading so the operator can /quit.
                        let _ = client.send(&text).await;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.disconnect().await;
    Ok(())
}
