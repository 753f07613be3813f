//! # Configuration (ambient stack)
//!
//! Hierarchical configuration loading via `figment`, matching the teacher's
//! layering: a base `config.toml`, a git-ignored `config.local.toml`
//! override, then `FACTGRAPH_`-prefixed environment variables (nested
//! sections split on `__`, e.g. `FACTGRAPH_VALIDATOR__CONNECTIVITY=warn`).

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::ConnectivityMode;

/// Validator settings (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    /// How a disconnected label graph is handled.
    #[serde(default)]
    pub connectivity: ConnectivityMode,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            connectivity: ConnectivityMode::default(),
        }
    }
}

/// Inverter settings (§4.5): bounds on the bounded-reordering ("shake")
/// pass, so pathological specifications terminate rather than loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InverterConfig {
    /// Per-position reordering attempt cap (`N` in the shake-tree pass).
    #[serde(default = "default_shake_position_cap")]
    pub shake_position_cap: usize,

    /// Global reordering-swap cap across the whole pass (`N²`).
    #[serde(default = "default_shake_global_cap")]
    pub shake_global_cap: usize,
}

fn default_shake_position_cap() -> usize {
    8
}

fn default_shake_global_cap() -> usize {
    64
}

impl Default for InverterConfig {
    fn default() -> Self {
        Self {
            shake_position_cap: default_shake_position_cap(),
            shake_global_cap: default_shake_global_cap(),
        }
    }
}

/// Feed pagination settings (§6.2/6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Default page size for `Storage::feed` when a caller doesn't specify
    /// one.
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
}

fn default_page_size() -> usize {
    100
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
        }
    }
}

/// Structured-logging settings, consumed by `tracing-subscriber`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `"info"` or
    /// `"factgraph=debug,warn"`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `"text"` (human-readable) or `"json"` (structured).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Top-level configuration for the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub validator: ValidatorConfig,
    #[serde(default)]
    pub inverter: InverterConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CoreConfig {
    /// Load from the default location set: `config.toml`, then
    /// `config.local.toml`, then `FACTGRAPH_`-prefixed environment
    /// variables, each layer overriding the last.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("FACTGRAPH_").split("__"))
            .extract()
    }

    /// Load from a specific file plus environment overrides, e.g. for
    /// tests or alternate deployments.
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("FACTGRAPH_").split("__"))
            .extract()
    }

    /// Initialize the global `tracing` subscriber from `self.logging`.
    /// Call once at process startup; safe to skip in tests.
    pub fn init_tracing(&self) {
        let filter = tracing_subscriber::EnvFilter::try_new(&self.logging.level)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
        if self.logging.format == "json" {
            let _ = subscriber.json().try_init();
        } else {
            let _ = subscriber.try_init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_error_connectivity_mode() {
        let config = CoreConfig::default();
        assert_eq!(config.validator.connectivity, ConnectivityMode::Error);
        assert_eq!(config.feed.default_page_size, 100);
        assert_eq!(config.inverter.shake_global_cap, 64);
    }

    #[test]
    fn loads_overrides_from_environment() {
        std::env::set_var("FACTGRAPH_VALIDATOR__CONNECTIVITY", "warn");
        std::env::set_var("FACTGRAPH_FEED__DEFAULT_PAGE_SIZE", "25");

        let config: CoreConfig = Figment::new()
            .merge(Env::prefixed("FACTGRAPH_").split("__"))
            .join(figment::providers::Serialized::defaults(CoreConfig::default()))
            .extract()
            .unwrap();

        assert_eq!(config.validator.connectivity, ConnectivityMode::Warn);
        assert_eq!(config.feed.default_page_size, 25);

        std::env::remove_var("FACTGRAPH_VALIDATOR__CONNECTIVITY");
        std::env::remove_var("FACTGRAPH_FEED__DEFAULT_PAGE_SIZE");
    }
}
