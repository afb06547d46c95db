mod attendance;
mod ballot;
mod config;
mod entities;
mod error;
mod http;
mod live;
mod models;
mod proxy;
mod state;
mod store;
mod validation;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{ApiConfig, StorageBackend};
use crate::live::LiveVoteCache;
use crate::state::AppState;
use crate::store::{MemoryStore, PostgresStore, VotingStore};
use anyhow::{Context, Result};
use axum::Router;
use migration::MigratorTrait;
use sea_orm::ConnectOptions;
use sea_orm::Database;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = ApiConfig::load().context("Failed to load configuration")?;
    let store = open_store(&config).await?;

    let app_state = AppState::new(store, &config);

    let listener = TcpListener::bind(config.server.address())
        .await
        .context("Failed to bind HTTP listener")?;
    let local_addr = listener
        .local_addr()
        .context("Failed to obtain listener address")?;
    info!("Assembly API listening on {local_addr}");

    let router: Router = http::router(app_state.clone());
    let server = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    );
    server
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&app_state.live)))
        .await
        .context("HTTP server exited with error")?;

    let stats = app_state.live.stats();
    info!(
        motions = stats.motions,
        cached_votes = stats.cached_votes,
        "Assembly API stopped"
    );
    Ok(())
}

fn init_tracing() {
    let default_filter = "info";
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    assert!(!filter.is_empty(), "Tracing filter must not be empty");
    assert!(filter.len() < 256, "Tracing filter length exceeds bounds");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .compact()
        .init();
}

async fn open_store(config: &ApiConfig) -> Result<Arc<dyn VotingStore>> {
    match config.database.backend {
        StorageBackend::Postgres => {
            let database = connect_database(config).await?;
            run_migrations(&database).await?;
            Ok(Arc::new(PostgresStore::new(database)))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn connect_database(config: &ApiConfig) -> Result<sea_orm::DatabaseConnection> {
    let mut options = ConnectOptions::new(config.database.url.clone());
    options
        .max_connections(config.database.max_connections)
        .sqlx_logging(true)
        .sqlx_logging_level(tracing::log::LevelFilter::Debug)
        .acquire_timeout(Duration::from_secs(10));

    if let Some(min) = config.database.min_connections {
        options.min_connections(min);
    }

    Database::connect(options)
        .await
        .context("Failed to connect to PostgreSQL")
}

async fn run_migrations(database: &sea_orm::DatabaseConnection) -> Result<()> {
    migration::Migrator::up(database, None)
        .await
        .context("Database migrations failed")
}

// Live streams never end on their own; close them so graceful shutdown can finish.
async fn shutdown_signal(live: Arc<LiveVoteCache>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {err}");
        return;
    }
    let closed = live.disconnect_all();
    info!(closed, "Shutdown signal dispatched");
}
