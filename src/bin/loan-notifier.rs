//! Long-running consumer: emails borrowers about expiring and expired loans
//! until SIGINT/SIGTERM, then finishes the emails already in progress

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;

use library_loans::{
    config::AppConfig,
    repository::Repository,
    services::{
        channel::RedisEventChannel,
        email::SmtpMailer,
        notifier::{shutdown_signal, Notifier},
    },
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
    let mailer = SmtpMailer::new(&config.email).context("Failed to configure SMTP")?;

    let notifier = Arc::new(Notifier::new(
        Arc::new(channel),
        Arc::new(repository.loans.clone()),
        Arc::new(mailer),
        &config.email,
        &config.notifier,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let running = tokio::spawn(notifier.run(shutdown_rx));

    tracing::info!(
        stream = %config.redis.stream,
        group = %config.redis.group,
        consumer = %config.redis.consumer,
        "Waiting for loan events, press Ctrl+C to exit"
    );

    if let Err(e) = shutdown_signal().await {
        tracing::error!("{}", e);
    }
    tracing::info!("Shutdown requested");
    let _ = shutdown_tx.send(true);

    running.await.context("Notifier task failed")?;
    Ok(())
}
