//! Trading runtime entry point.
//!
//! Loads configuration, wires the paper venues, the execution core, and
//! the bundled strategies together, and runs until Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: paper venue, demo strategies, synthetic ticks
//! cargo run --release
//!
//! # Explicit config file
//! cargo run --release -- --config config/default.toml
//!
//! # Or via environment
//! TRADING_CONFIG=config/default.toml cargo run --release
//! ```

mod app;

use std::time::Duration;

use anyhow::Result;
use common::RuntimeConfig;
use tracing::{error, info};

use crate::app::TradingApp;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(60);

fn print_usage() {
    eprintln!("Usage: trading-runtime [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>   Configuration file (TOML)");
    eprintln!("  --help            Show this help message");
    eprintln!();
    eprintln!("Environment variables:");
    eprintln!("  TRADING_CONFIG    Configuration file path");
    eprintln!("  RUST_LOG          Log filter (default: info)");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before anything reads the environment.
    match dotenvy::dotenv() {
        Ok(path) => eprintln!("Loaded environment from: {}", path.display()),
        Err(dotenvy::Error::Io(_)) => {}
        Err(e) => eprintln!("Warning: failed to load .env file: {e}"),
    }

    common::init_logging();

    let mut config_path: Option<String> = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                config_path = args.next();
                if config_path.is_none() {
                    eprintln!("--config requires a path");
                    print_usage();
                    std::process::exit(1);
                }
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other => {
                eprintln!("Unknown option: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
    }

    let config = match config_path {
        Some(path) => RuntimeConfig::from_file(path)?,
        None => RuntimeConfig::load()?,
    };

    info!(
        exchanges = config.exchanges.len(),
        strategies = config.strategies.len(),
        buffer = config.engine.event_buffer_size,
        "starting trading runtime"
    );

    let mut app = TradingApp::build(&config)?;
    if let Err(e) = app.start().await {
        error!(error = %e, "failed to start");
        app.stop().await;
        return Err(e);
    }

    // Periodic health line until shutdown.
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received Ctrl+C, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut health = tokio::time::interval(HEALTH_LOG_INTERVAL);
    health.tick().await; // first tick fires immediately
    loop {
        tokio::select! {
            _ = health.tick() => app.log_health(),
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    app.stop().await;

    let snapshot = app.core().metrics().snapshot();
    println!("\n{snapshot}");
    info!("shutdown complete");
    Ok(())
}
