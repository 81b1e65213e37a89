use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

mod analyzer;
mod api;
mod config;
mod engine;
mod models;
mod stats;

use analyzer::Analyzer;
use api::AppState;
use config::{Command, Config};
use stats::{source_for, start_stats_reloader, StatsCache};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    // Load player statistics. A missing table is not fatal: every player
    // falls back to the default rates.
    let source = source_for(&config.stats_source)?;
    let cache = StatsCache::default();
    if let Err(e) = cache.load(source.as_ref()).await {
        warn!(
            "Could not load statistics from {}: {:#}. Using default rates for all players.",
            source.name(),
            e
        );
    }

    let analyzer = Arc::new(Analyzer::new(
        cache.clone(),
        config.build_simulator()?,
        config.default_rates()?,
    ));
    let sim = analyzer.simulator();
    info!(
        "Simulator: {} trials (max {}), {} worker(s), pressure x{:.2}{}",
        sim.options().trials,
        sim.options().max_trials,
        sim.options().workers,
        sim.classifier().multiplier(),
        sim.options()
            .seed
            .map(|s| format!(", seed {}", s))
            .unwrap_or_default()
    );

    match &config.command {
        Command::Evaluate(args) => {
            let request = args.to_request(config.min_stake)?;
            let worker = Arc::clone(&analyzer);
            let report =
                tokio::task::spawn_blocking(move || worker.analyze(&request)).await??;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report);
            }
        }
        Command::Players(args) => {
            let players = cache.players(args.surface, args.tour);
            if players.is_empty() {
                warn!("No players with statistics for {} {}", args.tour, args.surface);
            }
            for name in players {
                println!("{}", name);
            }
        }
        Command::Serve(args) => {
            let _reloader = start_stats_reloader(
                cache.clone(),
                Arc::clone(&source),
                Duration::from_secs(args.reload_secs),
            );

            let app = api::router(AppState { analyzer });
            let addr: SocketAddr = args.addr.parse()?;
            info!("Evaluation API listening on http://{}", addr);
            let listener = tokio::net::TcpListener::bind(addr).await?;

            // Run API server (blocks until shutdown)
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
