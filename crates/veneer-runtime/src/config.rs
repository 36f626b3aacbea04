//! Runtime configuration.
//!
//! Loaded from a YAML file; every knob has a serde default so an empty
//! config is a valid config.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,

    /// TTL for the catalog cache lease
    #[serde(default = "default_catalog_cache_ttl_secs")]
    pub catalog_cache_ttl_secs: u64,

    /// TTL window for request deduplication
    #[serde(default = "default_dedup_ttl_secs")]
    pub dedup_ttl_secs: u64,

    /// Webhook delivery attempts per subscription
    #[serde(default = "default_webhook_retry_attempts")]
    pub webhook_retry_attempts: u32,

    /// Base delay for webhook retry backoff (doubles each attempt)
    #[serde(default = "default_webhook_retry_delay_ms")]
    pub webhook_retry_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            catalog_cache_ttl_secs: default_catalog_cache_ttl_secs(),
            dedup_ttl_secs: default_dedup_ttl_secs(),
            webhook_retry_attempts: default_webhook_retry_attempts(),
            webhook_retry_delay_ms: default_webhook_retry_delay_ms(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    pub fn catalog_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_cache_ttl_secs)
    }

    pub fn dedup_ttl(&self) -> Duration {
        Duration::from_secs(self.dedup_ttl_secs)
    }

    pub fn webhook_retry_delay(&self) -> Duration {
        Duration::from_millis(self.webhook_retry_delay_ms)
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_catalog_cache_ttl_secs() -> u64 {
    60
}

fn default_dedup_ttl_secs() -> u64 {
    60
}

fn default_webhook_retry_attempts() -> u32 {
    3
}

fn default_webhook_retry_delay_ms() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.listen.port, 4000);
        assert_eq!(config.catalog_cache_ttl_secs, 60);
        assert_eq!(config.dedup_ttl_secs, 60);
        assert_eq!(config.webhook_retry_attempts, 3);
        assert_eq!(config.webhook_retry_delay_ms, 1000);
    }

    #[test]
    fn test_partial_config() {
        let yaml = r#"
listen:
  port: 8088
dedup_ttl_secs: 30
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.listen.port, 8088);
        assert_eq!(config.listen.host, "0.0.0.0");
        assert_eq!(config.dedup_ttl(), Duration::from_secs(30));
        assert_eq!(config.webhook_retry_delay(), Duration::from_millis(1000));
    }
}
