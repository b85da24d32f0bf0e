use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::time::Duration;
use tracing::{debug, info};

use crate::deploy::{TaskPoller, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT};
use crate::error::Error;
use crate::types::Result;

/// Environment variable naming the settings file
pub const CONFIG_PATH_ENV: &str = "CERTDEPLOY_CONFIG";

/// Prefix of environment overrides (`CERTDEPLOY__POLLER__INTERVAL_SECS=2`)
pub const ENV_PREFIX: &str = "CERTDEPLOY";

/// Top-level settings of a deployment host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Task poller configuration
    #[serde(default)]
    pub poller: PollerConfig,

    /// Configured deployment targets
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Emit JSON records instead of text
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Poll loop configuration for asynchronous vendor deployments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Delay between two task reads (seconds)
    pub interval_secs: u64,

    /// Upper bound on the whole wait (seconds), 0 disables it
    pub timeout_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            timeout_secs: DEFAULT_POLL_TIMEOUT.as_secs(),
        }
    }
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    /// Task poller with these settings
    pub fn poller(&self) -> TaskPoller {
        TaskPoller::new(self.interval()).with_timeout(self.timeout())
    }
}

/// One deployment target handed to the provider registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Operator-facing name
    pub name: String,

    /// Provider discriminator
    pub provider: String,

    /// Provider-specific settings
    #[serde(default)]
    pub settings: serde_json::Value,
}

impl Settings {
    /// Parse settings from a YAML document and validate them
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Look up a target by name
    pub fn target(&self, name: &str) -> Option<&TargetConfig> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.poller.interval_secs == 0 {
            return Err(Error::Config("poller interval cannot be zero".into()));
        }

        let mut names = HashSet::new();
        for target in &self.targets {
            if target.name.is_empty() {
                return Err(Error::Config("target name cannot be empty".into()));
            }
            if target.provider.is_empty() {
                return Err(Error::Config(format!(
                    "target '{}' has no provider",
                    target.name
                )));
            }
            if !names.insert(target.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate target name: {}",
                    target.name
                )));
            }
        }

        Ok(())
    }
}

/// Load settings from the file named by `CERTDEPLOY_CONFIG` plus environment overrides
pub fn load_config() -> Result<Settings> {
    let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config/certdeploy.yaml".to_string());
    load_config_from(&path)
}

/// Load settings from `path` plus environment overrides
pub fn load_config_from(path: &str) -> Result<Settings> {
    use config::{Config as ConfigBuilder, Environment, File};

    debug!("Loading configuration from {}", path);

    let settings: Settings = ConfigBuilder::builder()
        .add_source(File::with_name(path))
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()?;

    settings.validate()?;

    info!(targets = settings.targets.len(), "Configuration loaded successfully");
    Ok(settings)
}
