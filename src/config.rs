use crate::error::{Result, StartupError};
use crate::infra::slack_client::DEFAULT_SLACK_API_URL;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub introspection: IntrospectionConfig,
    pub slack: SlackConfig,
    pub relay: RelayConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    pub log_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
            log_dir: "logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    Couchdb,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub seed_file: Option<String>,
    pub url: Option<String>,
    pub database: String,
    pub timeout_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            seed_file: None,
            url: None,
            database: "slack_service_instances".to_string(),
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntrospectionConfig {
    pub url: String,
    pub timeout_seconds: u64,
}

impl Default for IntrospectionConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9090".to_string(),
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    pub api_url: String,
    pub timeout_seconds: u64,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_SLACK_API_URL.to_string(),
            timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Post the raw payload for sources without a dedicated translator
    pub forward_unknown_sources: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9898,
        }
    }
}

impl Config {
    /// Reads `path` if it exists, then applies environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let config_content = fs::read_to_string(path).map_err(|e| {
                StartupError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
            })?;
            toml::from_str(&config_content)?
        } else {
            Config::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// `lookup` is injected so tests need not touch the process environment
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("SLACK_RELAY_PORT") {
            self.server.port = parse_port("SLACK_RELAY_PORT", &port)?;
        }
        if let Some(url) = lookup("SLACK_RELAY_STORE_URL") {
            self.store.kind = StoreKind::Couchdb;
            self.store.url = Some(url);
        }
        if let Some(url) = lookup("SLACK_RELAY_INTROSPECTION_URL") {
            self.introspection.url = url;
        }
        if let Some(url) = lookup("SLACK_RELAY_SLACK_API_URL") {
            self.slack.api_url = url;
        }
        if let Some(port) = lookup("SLACK_RELAY_METRICS_PORT") {
            self.metrics.enabled = true;
            self.metrics.port = parse_port("SLACK_RELAY_METRICS_PORT", &port)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(StartupError::Config("server.port must be non-zero".to_string()));
        }
        if self.store.kind == StoreKind::Couchdb
            && self.store.url.as_deref().map_or(true, |u| u.trim().is_empty())
        {
            return Err(StartupError::Config(
                "store.url is required when store.kind = \"couchdb\"".to_string(),
            ));
        }
        if self.introspection.url.trim().is_empty() {
            return Err(StartupError::Config("introspection.url must be set".to_string()));
        }
        if self.slack.api_url.trim().is_empty() {
            return Err(StartupError::Config("slack.api_url must be set".to_string()));
        }
        Ok(())
    }
}

impl StoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl IntrospectionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl SlackConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

fn parse_port(key: &str, value: &str) -> Result<u16> {
    value
        .trim()
        .parse()
        .map_err(|_| StartupError::Config(format!("{} is not a valid port: '{}'", key, value)))
}
