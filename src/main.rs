//! Limen server binary.
//!
//! # Usage
//!
//! ```bash
//! limen 9001
//! limen 9001 --max-connections 1024 --tick-ms 5000 --log-level debug
//! ```

use clap::Parser;
use limen::{Config, EchoConn, Error, Reactor};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use std::process;
use std::time::Duration;

/// Event-driven TCP front end with idle-connection eviction
#[derive(Parser, Debug)]
#[command(name = "limen")]
#[command(about = "Event-driven TCP front end with idle-connection eviction")]
#[command(version)]
struct Args {
    /// TCP port to listen on
    port: u16,

    /// Maximum concurrent connections
    #[arg(long, default_value = "65536")]
    max_connections: usize,

    /// Eviction tick in milliseconds (idle deadline is three ticks)
    #[arg(long, default_value = "5000")]
    tick_ms: u64,

    /// Worker threads
    #[arg(long, default_value = "8")]
    workers: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Missing or invalid arguments print usage and exit 1.
            let _ = e.print();
            process::exit(1);
        }
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let config = Config::new(args.port)
        .max_connections(args.max_connections)
        .tick(Duration::from_millis(args.tick_ms))
        .workers(args.workers);

    let mut reactor = match Reactor::<EchoConn>::bind(config) {
        Ok(reactor) => reactor,
        Err(Error::Pool(e)) => {
            tracing::error!(error = %e, "failed to construct worker pool");
            process::exit(1);
        }
        Err(e) => {
            // Startup/environment fault: fail fast.
            tracing::error!(error = %e, "setup failed");
            process::abort();
        }
    };

    match reactor.local_addr() {
        Ok(addr) => tracing::info!(%addr, "listening"),
        Err(e) => tracing::warn!(error = %e, "listening address unavailable"),
    }

    if let Err(e) = reactor.run() {
        tracing::error!(error = %e, "reactor loop failed");
        process::exit(1);
    }
}
