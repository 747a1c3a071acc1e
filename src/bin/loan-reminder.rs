//! One-shot expiry sweep: publishes an event for every loan that expires
//! today or within the next two days, then exits

use std::sync::Arc;

use anyhow::Context;

use library_loans::{
    config::AppConfig,
    repository::Repository,
    services::{channel::RedisEventChannel, scanner::ExpiryScanner},
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    telemetry::init_tracing(&config.logging)?;

    let repository = Repository::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    let channel = RedisEventChannel::connect(&config.redis)
        .await
        .context("Failed to connect to Redis")?;

    let scanner = ExpiryScanner::new(
        Arc::new(repository.loans.clone()),
        Arc::new(channel),
        config.scanner.clone(),
    );

    let report = scanner.run().await.context("Expiry scan failed")?;
    tracing::info!(
        processed = report.processed,
        published = report.published,
        failed = report.failed,
        "Expiry scan finished"
    );

    Ok(())
}
