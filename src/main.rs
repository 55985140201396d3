use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use trailstory::config::AppConfig;
use trailstory::db::{self, postgres::PgStore};
use trailstory::ids::IdMasker;
use trailstory::service::{JourneyService, Page};
use trailstory::storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting Trailstory ({} profile)...", config.profile);

    // Init DB
    let pool = db::init_pool(&config.database_url, config.db_max_connections).await?;
    db::ping(&pool).await.context("database is unreachable")?;
    db::apply_schema(&pool).await?;
    info!("Connected to database");

    // Init storage
    let media = storage::from_config(&config)?;
    media.init().await?;
    media
        .health_check()
        .await
        .context("media storage is not writable")?;
    info!("Media storage ready");

    let ids = Arc::new(IdMasker::new(&config.id_salt));
    let store = Arc::new(PgStore::new(pool));
    let journeys = JourneyService::new(store, media, ids);

    // One bounded page exercises the codec and hydration path end to end.
    let feed = journeys
        .list_public_journeys(Page::default())
        .await
        .context("public feed query failed")?;
    info!("Ready: {} journeys on the first public page", feed.len());

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}
