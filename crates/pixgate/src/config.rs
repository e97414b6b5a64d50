//! Configuration loading

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub limit: LimitConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Cache freshness configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Freshness TTL in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

/// Body storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// "local" (disk) or "memory"
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub local: LocalStorageConfig,
}

/// Local storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LocalStorageConfig {
    #[serde(default = "default_local_path")]
    pub path: String,
}

/// Per-client admission control configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LimitConfig {
    /// Sliding window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Maximum admitted requests per identity within the window
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
}

/// Upstream origin configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the upstream image host
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Referer sent with upstream requests
    #[serde(default = "default_referer")]
    pub referer: String,
    /// Hard timeout for one outbound request, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Serve a cached body on upstream 4xx/5xx (other than 429)
    #[serde(default = "default_stale_if_error")]
    pub stale_if_error: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_ttl_secs() -> u64 {
    300
}

fn default_backend() -> String {
    "local".to_string()
}

fn default_local_path() -> String {
    "./data/cache".to_string()
}

fn default_window_secs() -> u64 {
    10
}

fn default_max_requests() -> usize {
    6
}

fn default_base_url() -> String {
    "https://i.imgur.com".to_string()
}

fn default_referer() -> String {
    "https://imgur.com/".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_stale_if_error() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            local: LocalStorageConfig::default(),
        }
    }
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            path: default_local_path(),
        }
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_requests: default_max_requests(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            referer: default_referer(),
            timeout_secs: default_timeout_secs(),
            stale_if_error: default_stale_if_error(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &str) -> Result<Self> {
        let config_path = Path::new(path);

        if !config_path.exists() {
            info!("Config file not found at {}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        info!("Loaded configuration from {}", path);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_policy() {
        let config = Config::default();

        assert_eq!(config.limit.window_secs, 10);
        assert_eq!(config.limit.max_requests, 6);
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.upstream.timeout_secs, 10);
        assert!(config.upstream.stale_if_error);
        assert_eq!(config.upstream.base_url, "https://i.imgur.com");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            port = 9090

            [upstream]
            base_url = "https://images.example.net"
            stale_if_error = false
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.upstream.base_url, "https://images.example.net");
        assert!(!config.upstream.stale_if_error);
        assert_eq!(config.limit.max_requests, 6);
        assert_eq!(config.storage.backend, "local");
    }
}
