//! Fan-out relay server
//!
//! Run with: cargo run --example relay_server [INGEST_ADDR] [VIEWER_ADDR]
//!
//! Examples:
//!   cargo run --example relay_server                                 # 0.0.0.0:7350 / 0.0.0.0:7351
//!   cargo run --example relay_server 127.0.0.1:9000 127.0.0.1:9001
//!
//! Publish a test stream with the `synthetic_producer` example, then attach
//! any number of viewers to the viewer port. Per-scanout counters are logged
//! every five seconds.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use scanout_fanout::{FanoutServer, RegistryConfig, ScanoutRegistry, ServerConfig};

fn parse_addr(arg: Option<&String>, default: SocketAddr) -> Result<SocketAddr, String> {
    match arg {
        Some(s) => s
            .parse()
            .map_err(|e| format!("Invalid address '{}': {}", s, e)),
        None => Ok(default),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let defaults = ServerConfig::default();

    let config = ServerConfig::default()
        .ingest_addr(parse_addr(args.get(1), defaults.ingest_addr)?)
        .viewer_addr(parse_addr(args.get(2), defaults.viewer_addr)?);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("scanout_fanout=info".parse()?)
                .add_directive("relay_server=info".parse()?),
        )
        .init();

    let registry = Arc::new(ScanoutRegistry::with_config(RegistryConfig::default()));
    let server = FanoutServer::with_registry(config, Arc::clone(&registry));

    println!("Ingest:  {}", server.config().ingest_addr);
    println!("Viewers: {}", server.config().viewer_addr);
    println!("Press Ctrl+C to stop");

    let reporter = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(5));
        loop {
            ticker.tick().await;
            for stats in registry.all_stats().await {
                tracing::info!(
                    scanout = %stats.scanout_id,
                    closed = stats.closed,
                    subscribers = stats.subscriber_count,
                    received = stats.frames_received,
                    dispatched = stats.frames_dispatched,
                    inbound_dropped = stats.inbound_dropped,
                    gop_frames = stats.gop_frames,
                    gop_duration = stats.gop_duration,
                    evicted_slow = stats.evictions.slow_consumer,
                    evicted_write = stats.evictions.write_failed,
                    kbps = stats.bitrate() / 1000,
                    "Scanout stats"
                );
            }
        }
    });

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    reporter.abort();
    Ok(())
}
