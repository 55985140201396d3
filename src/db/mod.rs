use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use tracing::info;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod postgres;
pub mod queries;
mod rows;
pub mod schema;

pub type DbPool = Pool<Postgres>;

pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Round-trips a trivial query to confirm the pool can reach the server.
pub async fn ping(pool: &DbPool) -> Result<()> {
    sqlx::query_scalar::<_, i32>(queries::PING)
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Creates the PostGIS extension and tables if they do not exist yet.
pub async fn apply_schema(pool: &DbPool) -> Result<()> {
    let mut tx = pool.begin().await?;
    for statement in schema::STATEMENTS {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    info!("Schema up to date ({} statements)", schema::STATEMENTS.len());
    Ok(())
}
