//! Drops and recreates the schema. Development tool; everything in the
//! database is lost.

use anyhow::{Context, Result};
use diesel::{Connection, PgConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use converse_backend::config::Config;
use converse_backend::logging::init_subscriber;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_subscriber();

    let config = Config::load().context("Failed to load configuration")?;
    let database_url = config.effective_database_url();
    let mut conn =
        PgConnection::establish(&database_url).context("Failed to connect to database")?;

    tracing::info!("Reverting all migrations...");
    conn.revert_all_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("Failed to revert migrations: {e}"))?;

    tracing::info!("Re-running migrations...");
    let versions = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {e}"))?;

    tracing::info!("Database reset complete. Applied: {versions:?}");
    Ok(())
}
