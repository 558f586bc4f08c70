//! Controller configuration
//!
//! Connection settings for the resource store and the resync schedule.

use std::time::Duration;

/// Controller configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Resource store base URL (e.g., "http://localhost:8001")
    pub store_url: String,

    /// Bearer token for the store, if it requires one
    pub token: Option<String>,

    /// Namespace whose invocations are reconciled
    pub namespace: String,

    /// How often every invocation is re-delivered to the reconciler
    pub resync_interval: Duration,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(store_url: String, namespace: String) -> Self {
        Self {
            store_url,
            token: None,
            namespace,
            resync_interval: Duration::from_secs(10),
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.store_url.is_empty() {
            anyhow::bail!("store_url cannot be empty");
        }

        if !self.store_url.starts_with("http://") && !self.store_url.starts_with("https://") {
            anyhow::bail!("store_url must start with http:// or https://");
        }

        if self.namespace.is_empty() {
            anyhow::bail!("namespace cannot be empty");
        }

        if self.resync_interval.is_zero() {
            anyhow::bail!("resync_interval must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("http://localhost:8001".to_string(), "default".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.resync_interval, Duration::from_secs(10));
        assert!(config.token.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.store_url = "localhost:8001".to_string();
        assert!(config.validate().is_err());
        config.store_url = "https://store.internal".to_string();
        assert!(config.validate().is_ok());

        config.namespace = String::new();
        assert!(config.validate().is_err());
        config.namespace = "ci".to_string();

        config.resync_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
