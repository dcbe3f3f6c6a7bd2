use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::adapters::DEFAULT_BESTDORI_URL;
use crate::domain::{Region, TrackedTiers};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    /// Per-region tier lists replacing the built-in defaults
    #[serde(default)]
    pub tiers: BTreeMap<Region, Vec<u32>>,
    /// Region order used when a caller does not name one
    #[serde(default = "default_region_priority")]
    pub region_priority: Vec<Region>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the Bestdori API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    DEFAULT_BESTDORI_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    concat!("tierwatch/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// How long a fetched payload is served before refetching
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_ttl_secs() -> u64 {
    60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastConfig {
    /// Trend window behind the newest sample, in seconds
    #[serde(default = "default_lookback_secs")]
    pub lookback_secs: i64,
}

fn default_lookback_secs() -> i64 {
    24 * 3600
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            lookback_secs: default_lookback_secs(),
        }
    }
}

fn default_region_priority() -> Vec<Region> {
    vec![Region::Cn, Region::Jp, Region::Tw, Region::En, Region::Kr]
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig::default(),
            cache: CacheConfig::default(),
            forecast: ForecastConfig::default(),
            tiers: BTreeMap::new(),
            region_priority: default_region_priority(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("upstream.base_url", DEFAULT_BESTDORI_URL)?
            .set_default("upstream.timeout_secs", default_timeout_secs())?
            .set_default("cache.ttl_secs", default_ttl_secs())?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("TIERWATCH_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (TIERWATCH__UPSTREAM__BASE_URL, etc.)
            .add_source(
                Environment::with_prefix("TIERWATCH")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Built-in tier lists with configured regions replaced.
    pub fn tracked_tiers(&self) -> TrackedTiers {
        self.tiers
            .iter()
            .fold(TrackedTiers::default(), |acc, (region, tiers)| {
                acc.with_region(*region, tiers.clone())
            })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if url::Url::parse(&self.upstream.base_url).is_err() {
            errors.push(format!(
                "upstream.base_url is not a valid URL: {}",
                self.upstream.base_url
            ));
        }

        if self.upstream.timeout_secs == 0 {
            errors.push("upstream.timeout_secs must be positive".to_string());
        }

        if self.forecast.lookback_secs <= 0 {
            errors.push("forecast.lookback_secs must be positive".to_string());
        }

        for (region, tiers) in &self.tiers {
            if tiers.is_empty() {
                errors.push(format!("tiers.{region} must list at least one tier"));
            }
        }

        if self.region_priority.is_empty() {
            errors.push("region_priority must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
