//! Configuration file support for stakescope.
//!
//! Loads optional TOML config from `~/.config/stakescope/config.toml`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::policy::NegativeDurationPolicy;

/// Application configuration loaded from TOML file.
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Server bind address (e.g., "127.0.0.1:8080")
    pub bind: Option<String>,
    /// Cache TTL in seconds (default: 300)
    pub cache_ttl_seconds: Option<u64>,
    /// Simulated latency of the demonstration event source (default: 2000)
    pub mock_latency_ms: Option<u64>,
    /// How to treat events that end before they start (default: pass-through)
    pub negative_duration_policy: Option<NegativeDurationPolicy>,
    /// JSON file of exported staking events; the demonstration source is used when unset
    pub events_file: Option<PathBuf>,
    /// Rate limit in requests per minute per IP
    pub rate_limit_rpm: Option<u32>,
    /// Allowed CORS origins (None/empty = allow any)
    pub allowed_origins: Option<Vec<String>>,
    /// API keys for authentication (None/empty = no auth)
    pub api_keys: Option<Vec<String>>,
}

impl Config {
    /// Default location of the config file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_default()
            .join("stakescope")
            .join("config.toml")
    }

    /// Load config from the default path, falling back to defaults on any error.
    pub fn load() -> Self {
        Self::load_from(&Self::default_path())
    }

    /// Load config from `path`, falling back to defaults on any error.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "loaded config");
                    config
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config file not found, using defaults");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read config, using defaults");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_full_config() {
        let config: Config = toml::from_str(
            r#"
            bind = "0.0.0.0:9000"
            cache_ttl_seconds = 60
            mock_latency_ms = 0
            negative_duration_policy = "reject"
            events_file = "/tmp/events.json"
            rate_limit_rpm = 10
            api_keys = ["k1"]
            "#,
        )
        .unwrap();
        assert_eq!(config.bind.as_deref(), Some("0.0.0.0:9000"));
        assert_eq!(config.cache_ttl_seconds, Some(60));
        assert_eq!(config.mock_latency_ms, Some(0));
        assert_eq!(
            config.negative_duration_policy,
            Some(NegativeDurationPolicy::Reject)
        );
        assert_eq!(config.events_file, Some(PathBuf::from("/tmp/events.json")));
        assert_eq!(config.api_keys, Some(vec!["k1".to_string()]));
        assert!(config.allowed_origins.is_none());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load_from(Path::new("/nonexistent/stakescope/config.toml"));
        assert!(config.bind.is_none());
        assert!(config.cache_ttl_seconds.is_none());
    }

    #[test]
    fn test_invalid_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"cache_ttl_seconds = \"soon\"").unwrap();
        let config = Config::load_from(file.path());
        assert!(config.cache_ttl_seconds.is_none());
    }
}
