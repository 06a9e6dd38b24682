//! Database setup and initialization

use anyhow::{Context, Result};
use skatehub_core::MediaConfig;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Migrations embedded from `crates/skatehub-db/migrations`
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Open a connection pool sized from configuration.
pub async fn connect(config: &MediaConfig) -> Result<PgPool> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set")?;

    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(
        max_connections = config.db_max_connections,
        "Database connected successfully"
    );

    Ok(pool)
}

/// Setup database connection pool and run migrations
pub async fn setup_database(config: &MediaConfig) -> Result<PgPool> {
    let pool = connect(config).await?;

    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}
