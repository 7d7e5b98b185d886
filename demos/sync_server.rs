//! Clipboard sync server example with an in-memory store
//!
//! Run with: cargo run --example sync_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example sync_server                    # binds to 0.0.0.0:8080
//!   cargo run --example sync_server localhost          # binds to 127.0.0.1:8080
//!   cargo run --example sync_server 127.0.0.1:9000     # binds to 127.0.0.1:9000
//!
//! Tokens are HS256 JWTs signed with `CLIPSYNC_JWT_SECRET`. On startup the
//! server prints a token for two demo users so any WebSocket client can
//! connect:
//!
//!   websocat "ws://localhost:8080/ws?token=<TOKEN>"
//!
//! Then send:
//!
//!   {"content_type":"text","content":"hello","source_device":"laptop"}
//!
//! Every connection using the same user's token receives the stored record.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clipsync_hub::{JwtAuthenticator, MemoryStore, OwnerId, ServerConfig, SyncServer};

const DEFAULT_PORT: u16 = 8080;
const SECRET_ENV: &str = "CLIPSYNC_JWT_SECRET";

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:8080
/// - "localhost:9000" -> 127.0.0.1:9000
/// - "127.0.0.1" -> 127.0.0.1:8080
/// - "0.0.0.0:9000" -> 0.0.0.0:9000
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: sync_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR  Address to bind to (default: 0.0.0.0:{})", DEFAULT_PORT);
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  {}  Token signing secret", SECRET_ENV);
    eprintln!("  RUST_LOG             Log filter (e.g. clipsync_hub=trace)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let config = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => ServerConfig::with_addr(addr),
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => ServerConfig::default(),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("clipsync_hub=debug".parse()?)
                .add_directive("sync_server=debug".parse()?),
        )
        .init();

    let secret = match std::env::var(SECRET_ENV) {
        Ok(secret) if !secret.is_empty() => secret,
        _ => {
            tracing::warn!("{} not set, using an insecure development secret", SECRET_ENV);
            "clipsync-development-secret".to_string()
        }
    };

    let auth = JwtAuthenticator::new(secret.as_bytes());

    println!("Starting sync server on {}", config.bind_addr);
    println!();
    for user in [1, 2] {
        let token = auth.issue_token(OwnerId::new(user))?;
        println!("User {} token: {}", user, token);
    }
    println!();

    let server = Arc::new(SyncServer::new(config, auth, MemoryStore::new()));

    // Periodic stats
    let stats_server = Arc::clone(&server);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(30));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let stats = stats_server.stats();
            println!(
                "Stats: active={} total={} frames={} ignored={} delivered={} evicted={}",
                stats.connections_active,
                stats.connections_total,
                stats.frames_received,
                stats.frames_ignored,
                stats.deliveries,
                stats.evictions,
            );
        }
    });

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        println!("\nShutting down...");
    };

    if let Err(e) = server.run_until(shutdown).await {
        eprintln!("Server error: {}", e);
    }

    Ok(())
}
