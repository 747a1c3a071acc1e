//! Tracing subscriber set-up shared by the binaries

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
    config::LoggingConfig,
    error::{AppError, AppResult},
};

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> AppResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter(&config.level).into());
    let json = config.format.eq_ignore_ascii_case("json");

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .try_init()
        .map_err(|e| AppError::Internal(format!("Failed to initialize tracing: {}", e)))
}

fn default_filter(level: &str) -> String {
    format!("library_loans={},tower_http=debug", level)
}
