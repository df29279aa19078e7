//! Database bootstrap: create the database if needed, connect, migrate.

use sqlx::migrate::{MigrateDatabase, Migrator};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};
use tracing::info;

use crate::config::Config;
use crate::error::StoreResult;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Create the target database when it does not exist yet.
///
/// Returns whether it was created.
pub async fn ensure_database(database_url: &str) -> StoreResult<bool> {
    if Postgres::database_exists(database_url).await? {
        info!("Database already exists");
        return Ok(false);
    }

    Postgres::create_database(database_url).await?;
    info!("Database created");
    Ok(true)
}

pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> StoreResult<()> {
    MIGRATOR.run(pool).await?;
    info!("Migrations applied");
    Ok(())
}

/// Everything the scraper needs before its first cycle.
pub async fn prepare(config: &Config) -> StoreResult<PgPool> {
    ensure_database(&config.database_url).await?;
    let pool = connect(&config.database_url, config.max_connections).await?;
    migrate(&pool).await?;
    Ok(pool)
}
