use anyhow::Context;
use postlock::bootstrap;
use postlock::config::Config;
use postlock::infrastructure::http::router::build_router;
use postlock::infrastructure::observability;
use postlock::infrastructure::persistence::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing and metrics
    let _guard = observability::init(&config)
        .map_err(|e| anyhow::anyhow!("failed to initialize observability: {}", e))?;
    tracing::info!("Configuration loaded");

    // Initialize database connection
    let db = Database::connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    db.run_migrations()
        .await
        .context("failed to apply database migrations")?;
    tracing::info!("Database migrations applied");

    let state = bootstrap::build_app_state(db, &config).await?;
    let app = build_router(state);

    let addr = config.server_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
