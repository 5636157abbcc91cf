//! ringkv Server Binary
//!
//! Replays the append-only log, then serves clients over TCP.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use ringkv::network::Server;
use ringkv::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// ringkv Server
#[derive(Parser, Debug)]
#[command(name = "ringkv-server")]
#[command(about = "Redis-compatible key-value server with a segmented append-only log")]
#[command(version)]
struct Args {
    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:6379")]
    listen: String,

    /// Base path of the AOF segments ({path}_{id}.aof)
    #[arg(short, long, default_value = "./ringkv_data/appendonly")]
    aof_path: String,

    /// Run without persistence
    #[arg(long)]
    no_aof: bool,

    /// Seconds between persistence cycles
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u64).range(1..))]
    aof_interval: u64,

    /// Seconds before the first persistence cycle
    #[arg(long, default_value = "10")]
    aof_initial_delay: u64,

    /// Segment size as a power of two (26 = 64 MiB)
    #[arg(long, default_value = "26")]
    segment_shift: u32,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "10000")]
    max_connections: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ringkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("ringkv Server v{}", ringkv::VERSION);
    tracing::info!("AOF: {}", if args.no_aof { "disabled" } else { args.aof_path.as_str() });
    tracing::info!("Listen address: {}", args.listen);

    let config = Config::builder()
        .listen_addr(&args.listen)
        .aof_enabled(!args.no_aof)
        .aof_path(&args.aof_path)
        .aof_interval(Duration::from_secs(args.aof_interval))
        .aof_initial_delay(Duration::from_secs(args.aof_initial_delay))
        .segment_shift(args.segment_shift)
        .max_connections(args.max_connections)
        .build();

    // Open engine (replays the log before any client connects)
    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    let server = match Server::bind(config, Arc::clone(&engine)) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
    }

    if let Err(e) = engine.close() {
        tracing::error!("Engine close failed: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}
