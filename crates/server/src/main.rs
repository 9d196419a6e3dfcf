use agency_import::StatementExtractor;
use agency_server::config::ServerConfig;
use agency_server::{router, telemetry, AppState};
use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load()?;
    telemetry::init(config.log_format);

    let deadline_policy = config.deadline_policy()?;

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
    }
    let db = agency_storage::create_db(&config.database_path)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;
    tracing::info!("Database ready: {}", config.database_path.display());

    let extractor = StatementExtractor::new(config.import.clone())?;
    let state = AppState::new(db, extractor, deadline_policy)
        .with_stale_import_after(config.stale_import_after());
    let app = router(state, config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    tracing::info!("Listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
