//! Relief Ledger gateway: entry point.
//!
//! Restores the lifecycle engine from the SQLite mirror, starts a background
//! recorder that persists every lifecycle event, and exposes the beneficiary,
//! verifier and donor REST API.

mod api;
mod config;
mod db;
mod errors;
mod recorder;
mod records;
mod seed;

use std::sync::Arc;

use relief_engine::{MemoryStore, ReliefEngine};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;

    // Rebuild in-memory state from the mirror.
    let incidents = db::load_incidents(&pool).await?;
    let donations = db::load_donations(&pool).await?;
    info!(
        "Restoring {} incidents and {} donations",
        incidents.len(),
        donations.len()
    );
    let store = MemoryStore::restore(incidents, donations)?;

    // ─── Background recorder ──────────────────────────────
    let (sink, rx) = recorder::channel();
    let shutdown = CancellationToken::new();
    let recorder = tokio::spawn(recorder::run(pool.clone(), rx, shutdown.clone()));

    let engine = Arc::new(
        ReliefEngine::new(store)
            .with_policy(config.funding_policy)
            .with_event_sink(Arc::new(sink)),
    );
    info!("Funding policy: {:?}", engine.policy());

    if config.seed_demo_data {
        seed::load_demo(&*engine)?;
    }

    // ─── REST API ─────────────────────────────────────────
    let app = api::router(Arc::new(api::ApiState { engine, pool }));

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    // The router (and with it the engine and its sink) is gone; let the
    // recorder flush what is still queued.
    shutdown.cancel();
    recorder.await?;

    Ok(())
}
