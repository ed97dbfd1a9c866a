//! Configuration management
//!
//! Handles:
//! - API endpoint and bearer token
//! - Polling cadences (data, catalog, heatmap)
//! - Buffer capacity and heatmap resolution
//! - Fallback and stale-response policies
//! - Cross-platform storage (TOML in the OS config dir)

use crate::error::ConfigError;
use crate::scheduler::Cadence;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "GAMESEC_MONITOR_CONFIG";
/// Environment variable overriding the API bearer token
pub const API_TOKEN_ENV: &str = "GAMESEC_API_TOKEN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MonitorConfig {
    pub api: ApiConfig,
    pub polling: PollingConfig,
    pub buffers: BufferConfig,
    pub heatmap: HeatmapConfig,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Data loop cadence; one of 1, 5, 10, 30
    pub cadence_secs: u64,
    pub catalog_interval_secs: u64,
    pub heatmap_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Samples/alerts kept per device per feed
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PolicyConfig {
    pub fallback: FallbackPolicy,
    pub stale_responses: StaleResponsePolicy,
}

/// How fetch failures surface in state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// No invented data; failed feeds are flagged and the verdict is marked degraded
    #[default]
    Degraded,
    /// Substitute locally synthesized data for every failed fetch
    Synthetic,
}

/// What to do with a response whose device is no longer selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StaleResponsePolicy {
    #[default]
    Discard,
    FileUnderOrigin,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            token: None,
            request_timeout_secs: 10,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            cadence_secs: 5,
            catalog_interval_secs: 30,
            heatmap_interval_secs: 10,
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { capacity: 500 }
    }
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        // 1/10 scale of a 1920x1080 surface
        Self { width: 192, height: 108 }
    }
}

impl PollingConfig {
    pub fn cadence(&self) -> Result<Cadence, ConfigError> {
        Ok(Cadence::try_from(self.cadence_secs)?)
    }

    pub fn catalog_interval(&self) -> Duration {
        Duration::from_secs(self.catalog_interval_secs.max(1))
    }

    pub fn heatmap_interval(&self) -> Duration {
        Duration::from_secs(self.heatmap_interval_secs.max(1))
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl MonitorConfig {
    /// Load config from `GAMESEC_MONITOR_CONFIG` or the OS-specific location
    pub async fn load() -> Result<Self, ConfigError> {
        let path = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => Self::config_file_path()?,
        };

        let mut config = Self::load_from(&path).await?;
        config.apply_env();
        Ok(config)
    }

    /// Load config from an explicit path; a missing file yields defaults
    pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: MonitorConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save config to the given location
    pub async fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|source| ConfigError::Io {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await.map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Get OS-specific config file path
    pub fn config_file_path() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        path.push("gamesec-monitor");
        path.push("config.toml");
        Ok(path)
    }

    /// Token from the environment wins over the file
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var(API_TOKEN_ENV) {
            if !token.trim().is_empty() {
                self.api.token = Some(token);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.polling.cadence()?;
        if self.buffers.capacity == 0 {
            return Err(ConfigError::Invalid("buffers.capacity must be at least 1".into()));
        }
        if self.heatmap.width == 0 || self.heatmap.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "heatmap resolution {}x{} is empty",
                self.heatmap.width, self.heatmap.height
            )));
        }
        if self.api.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api.base_url is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.polling.cadence().unwrap(), Cadence::Every5s);
        assert_eq!(config.polling.catalog_interval(), Duration::from_secs(30));
        assert_eq!(config.buffers.capacity, 500);
        assert_eq!((config.heatmap.width, config.heatmap.height), (192, 108));
        assert_eq!(config.policy.fallback, FallbackPolicy::Degraded);
        assert_eq!(config.policy.stale_responses, StaleResponsePolicy::Discard);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_path() {
        let path = MonitorConfig::config_file_path().unwrap();
        assert!(path.to_string_lossy().contains("gamesec-monitor"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: MonitorConfig = toml::from_str(
            r#"
            [polling]
            cadence_secs = 10

            [policy]
            fallback = "synthetic"
            stale_responses = "file_under_origin"
            "#,
        )
        .unwrap();

        assert_eq!(config.polling.cadence().unwrap(), Cadence::Every10s);
        assert_eq!(config.polling.heatmap_interval_secs, 10);
        assert_eq!(config.policy.fallback, FallbackPolicy::Synthetic);
        assert_eq!(config.policy.stale_responses, StaleResponsePolicy::FileUnderOrigin);
        assert_eq!(config.api.base_url, "http://127.0.0.1:5000");
    }

    #[test]
    fn test_invalid_cadence_rejected() {
        let mut config = MonitorConfig::default();
        config.polling.cadence_secs = 7;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_env_token_override() {
        std::env::set_var(API_TOKEN_ENV, "from-env");
        let mut config = MonitorConfig::default();
        config.api.token = Some("from-file".into());
        config.apply_env();
        std::env::remove_var(API_TOKEN_ENV);
        assert_eq!(config.api.token.as_deref(), Some("from-env"));
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = MonitorConfig::default();
        config.api.base_url = "http://monitor.local:8080".into();
        config.buffers.capacity = 64;
        config.save_to(&path).await.unwrap();

        let loaded = MonitorConfig::load_from(&path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = MonitorConfig::load_from(&dir.path().join("absent.toml")).await.unwrap();
        assert_eq!(loaded, MonitorConfig::default());
    }

    #[tokio::test]
    async fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, "[polling\ncadence_secs = ").await.unwrap();
        assert!(matches!(
            MonitorConfig::load_from(&path).await,
            Err(ConfigError::Parse { .. })
        ));
    }
}
