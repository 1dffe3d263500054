use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use deadpool_diesel::Runtime as DeadpoolRuntime;
use deadpool_diesel::postgres::Manager as DeadpoolManager;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use converse_backend::PgPool;
use converse_backend::auth::otp::{OtpStore, spawn_sweeper};
use converse_backend::config::Config;
use converse_backend::llm::ollama::OllamaClient;
use converse_backend::logging::init_subscriber;
use converse_backend::routes;
use converse_backend::services::email_service::LoggingEmailService;
use converse_backend::services::entitlements::FreeTierEntitlements;
use converse_backend::state::AppState;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_subscriber();

    let config = Config::load().context("Failed to load configuration")?;
    tracing::info!(?config, "Starting converse backend server...");

    let database_url = config.effective_database_url();
    tracing::info!("Connecting to database...");
    let manager = DeadpoolManager::new(database_url, DeadpoolRuntime::Tokio1);
    let pool: PgPool = PgPool::builder(manager)
        .runtime(DeadpoolRuntime::Tokio1)
        .build()
        .context("Failed to create DB pool")?;
    tracing::info!("Database connection pool established.");

    run_migrations(&pool).await?;

    let config = Arc::new(config);

    // Expiring OTP store plus its periodic eviction task.
    let otp_store = Arc::new(OtpStore::new(Duration::from_secs(config.otp_ttl_seconds)));
    let _sweeper = spawn_sweeper(
        otp_store.clone(),
        Duration::from_secs(config.otp_sweep_interval_seconds),
    );

    let gateway = Arc::new(
        OllamaClient::new(
            config.ollama_url.clone(),
            Duration::from_secs(config.ollama_timeout_seconds),
        )
        .context("Failed to build inference client")?,
    );

    let app_state = AppState {
        pool: pool.clone(),
        config: config.clone(),
        gateway,
        otp_store,
        email: Arc::new(LoggingEmailService),
        entitlements: Arc::new(FreeTierEntitlements),
    };

    let app = Router::new()
        .nest("/api", routes::api_router())
        .with_state(app_state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port)
        .parse()
        .context("Invalid address format")?;
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_migrations(pool: &PgPool) -> Result<()> {
    tracing::info!("Attempting to run database migrations...");
    let conn = pool
        .get()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to get connection for migration: {}", e))?;
    conn.interact(|conn| match conn.run_pending_migrations(MIGRATIONS) {
        Ok(versions) => {
            if versions.is_empty() {
                tracing::info!("No pending migrations found.");
            } else {
                tracing::info!("Successfully ran migrations: {:?}", versions);
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Failed to run database migrations: {:?}", e);
            Err(anyhow::anyhow!("Migration diesel error: {:?}", e))
        }
    })
    .await
    .map_err(|e| anyhow::anyhow!("Migration interact task failed: {}", e))??;
    Ok(())
}
