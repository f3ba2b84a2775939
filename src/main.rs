mod collectors;
mod config;
mod http;
mod metrics;
mod sink;
mod state;

use axum::serve;
use clap::Parser;
use collectors::Sampler;
use config::Config;
use metrics::Metrics;
use sink::{emit, LogSink};
use state::State;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tokio::sync::{watch, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "edgeprobe")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "./config.yaml")]
    config: String,
    #[arg(long)]
    print_default_config: bool,
    /// Collect a single snapshot, print it as JSON and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match Config::load_from_file(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let sampler = match Sampler::new(cfg.sources.clone()) {
        Ok(s) => Arc::new(s),
        Err(err) => {
            error!(error = %err, "invalid source configuration");
            std::process::exit(1);
        }
    };

    if cli.once {
        let snapshot = sampler.collect();
        match serde_json::to_string_pretty(&snapshot) {
            Ok(text) => println!("{text}"),
            Err(err) => {
                error!(error = %err, "failed to render snapshot");
                std::process::exit(1);
            }
        }
        return;
    }

    info!(
        listen = %cfg.listen,
        interval_secs = cfg.interval_secs,
        thermal_paths = sampler.sources().thermal.paths.len(),
        scalars = sampler.sources().scalars.len(),
        storage = sampler.sources().storage.is_some(),
        "starting edgeprobe"
    );

    let shared_state = Arc::new(RwLock::new(State::new(now_unix(), cfg.measurement.clone())));
    let metrics = match Metrics::new() {
        Ok(m) => m,
        Err(err) => {
            error!(error = %err, "failed to initialize metrics");
            std::process::exit(1);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_task = {
        let cfg = cfg.clone();
        let metrics = metrics.clone();
        let http_state = shared_state.clone();
        let mut shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let app = http::build_router(metrics, http_state);
            let addr: SocketAddr = match cfg.listen.parse() {
                Ok(addr) => addr,
                Err(err) => {
                    error!(error = %err, listen = %cfg.listen, "invalid listen address");
                    return;
                }
            };

            let listener = match TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(err) => {
                    error!(error = %err, "failed to start HTTP server");
                    return;
                }
            };

            let server = serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            });

            if let Err(err) = server.await {
                error!(error = %err, "HTTP server error");
            }
        })
    };

    let collector_task = {
        let cfg = cfg.clone();
        let metrics = metrics.clone();
        let shared_state = shared_state.clone();
        let sampler = sampler.clone();
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(cfg.interval_secs));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        info!("shutdown signal received, stopping collection loop");
                        break;
                    }
                    _ = ticker.tick() => {
                        let sampler = sampler.clone();
                        let snapshot = match tokio::task::spawn_blocking(move || sampler.collect()).await {
                            Ok(snapshot) => snapshot,
                            Err(err) => {
                                error!(error = %err, "collection task panicked");
                                continue;
                            }
                        };

                        emit(&snapshot, &cfg.measurement, &LogSink);
                        emit(&snapshot, &cfg.measurement, metrics.as_ref());
                        metrics.inc_collect_cycle();

                        let state = {
                            let mut guard = shared_state.write().await;
                            guard.update_collected(now_unix(), snapshot);
                            guard.clone()
                        };
                        metrics.update_from_state(&state);
                    }
                }
            }
        })
    };

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to wait for Ctrl+C");
    }
    info!("Ctrl+C received, shutting down");

    let _ = shutdown_tx.send(true);

    let _ = collector_task.await;
    let _ = http_task.await;
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
