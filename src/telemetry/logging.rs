use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

use crate::config::LoggingConfig;
use crate::error::Error;
use crate::telemetry::Logger;

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Build a logger from configuration without touching global state
pub fn build_logger(config: &LoggingConfig) -> Logger {
    let filter = EnvFilter::from_default_env().add_directive(parse_level(&config.level).into());

    if config.json {
        let subscriber = Registry::default()
            .with(filter)
            .with(fmt::layer().with_target(true).json());
        Logger::from_subscriber(subscriber)
    } else {
        let subscriber = Registry::default()
            .with(filter)
            .with(fmt::layer().with_target(true).with_ansi(true));
        Logger::from_subscriber(subscriber)
    }
}

/// Initialize the logging system and return the installed logger
pub fn init_logging(config: &LoggingConfig) -> Result<Logger, Error> {
    let logger = build_logger(config);
    logger.install_global()?;
    Ok(logger)
}
