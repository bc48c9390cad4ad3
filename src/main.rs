use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

mod analysis;
mod config;
mod dashboard;
mod db;
mod error;
mod ingest;
mod store;

use config::{Backend, Command, Config};
use dashboard::AppState;
use db::Database;
use store::{CachedStore, PoolStore, SupabaseClient};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let store = open_store(&config)?;
    info!("Using {} backend", store.name());

    match &config.command {
        Command::Serve { addr } => serve(store, addr).await,
        Command::Ingest { workbook, season } => {
            let report = ingest::run(store.as_ref(), workbook, *season).await?;
            for w in &report.warnings {
                warn!("{}", w);
            }
            info!(
                "Season {}: {} users, {} weeks, {} games ({} skipped), {} picks",
                report.season,
                report.users,
                report.weeks,
                report.games,
                report.skipped_games,
                report.picks
            );
            Ok(())
        }
    }
}

fn open_store(config: &Config) -> Result<Arc<dyn PoolStore>> {
    let store: Arc<dyn PoolStore> = match config.backend {
        Backend::Sqlite => {
            let db = Database::open(&config.database_path)
                .with_context(|| format!("Failed to open database {}", config.database_path))?;
            info!("Database opened: {}", config.database_path);
            Arc::new(CachedStore::new(db))
        }
        Backend::Supabase => {
            let url = config.supabase_url.as_deref().unwrap_or_default();
            let key = config.supabase_key.as_deref().unwrap_or_default();
            Arc::new(CachedStore::new(SupabaseClient::new(url, key)?))
        }
    };
    Ok(store)
}

async fn serve(store: Arc<dyn PoolStore>, addr: &str) -> Result<()> {
    let app = dashboard::router(AppState { store });
    let addr: SocketAddr = addr.parse()?;
    info!("Dashboard listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
