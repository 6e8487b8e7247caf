//! Relay daemon
//!
//! Run with: relayd [BIND_ADDR]
//!
//! Configuration comes from `RELAY_*` environment variables; a bind address
//! on the command line overrides `RELAY_BIND`.
//!
//!   RELAY_BIND               stream listener (default 0.0.0.0:5000)
//!   RELAY_ADMIN_BIND         HTTP admin surface (disabled when unset)
//!   RELAY_MAX_CONNECTIONS    0 = unlimited
//!   RELAY_ECHO_MODE          all | exclude-sender
//!   RELAY_RETENTION_SECS     history window per producer
//!   RELAY_CAPACITY           history points per producer
//!   RELAY_UNIT_INTERVAL      only store values in [0, 1]
//!   RELAY_WRITE_TIMEOUT_MS   per-peer broadcast write timeout
//!
//! Log filtering follows `RUST_LOG`.

use std::net::SocketAddr;

use telemetry_relay::{RelayServer, ServerConfig};

fn print_usage() {
    eprintln!("Usage: relayd [BIND_ADDR]");
    eprintln!();
    eprintln!("  BIND_ADDR  host:port for the stream listener (default 0.0.0.0:5000)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("telemetry_relay=info".parse()?)
                .add_directive("relayd=info".parse()?),
        )
        .init();

    let mut config = ServerConfig::from_env()?;
    if let Some(addr) = args.get(1) {
        config.bind_addr = match addr.parse::<SocketAddr>() {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: invalid bind address {addr}: {e}");
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        };
    }

    let server = RelayServer::new(config);
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
