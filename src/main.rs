//! Library loans API server

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;

use library_loans::{
    api, config::AppConfig, repository::Repository, services::Services, telemetry, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    telemetry::init_tracing(&config.logging)?;

    tracing::info!("Starting library-loans v{}", env!("CARGO_PKG_VERSION"));

    let repository = Repository::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&repository.pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations completed");

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    let state = AppState {
        services: Arc::new(Services::new(repository)),
    };
    let app = api::create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = library_loans::services::notifier::shutdown_signal().await {
                tracing::error!("{}", e);
            }
        })
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
