use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::prometheus::ClientOptions;
use crate::query::LabelFilters;
use crate::time_range::{TimeRangeError, TimeRangeSpec};
use crate::usage::ProjectIndex;

const APP_NAME: &str = "ccpulse";
const CONFIG_NAME: &str = "config";

/// Overrides the config file location
pub const CONFIG_PATH_ENV: &str = "CCPULSE_CONFIG";
pub const PROMETHEUS_URL_ENV: &str = "CCPULSE_PROMETHEUS_URL";
pub const REFRESH_SECS_ENV: &str = "CCPULSE_REFRESH_SECS";
pub const STATS_FILE_ENV: &str = "CCPULSE_STATS_FILE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub dashboard: DashboardConfig,
    pub stats: StatsConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Prometheus base URL
    pub url: String,
    pub request_timeout_secs: u64,
    /// 0 disables response caching
    pub cache_ttl_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9090".to_string(),
            request_timeout_secs: 10,
            cache_ttl_secs: 5,
        }
    }
}

impl BackendConfig {
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: Duration::from_secs(self.request_timeout_secs.max(1)),
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub refresh_interval_secs: u64,
    /// Preset such as "1h", "1d" or "1w"
    pub default_range: String,
    pub filters: FilterConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 30,
            default_range: "1d".to_string(),
            filters: FilterConfig::default(),
        }
    }
}

impl DashboardConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    /// Configured default range, falling back to the last day if it does not parse
    pub fn default_range(&self) -> TimeRangeSpec {
        self.default_range
            .parse()
            .unwrap_or(TimeRangeSpec::Preset(crate::time_range::TimeRangePreset::LastDay))
    }

    /// `range`, or `start`/`end`, or the configured default
    pub fn resolve_range(
        &self,
        range: Option<&str>,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<TimeRangeSpec, TimeRangeError> {
        TimeRangeSpec::from_inputs(range, start, end, self.default_range())
    }
}

/// Label equality filters applied to every dashboard query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
}

impl FilterConfig {
    pub fn label_filters(&self) -> LabelFilters {
        let mut filters = LabelFilters::new();
        let pairs = [
            ("terminal_type", &self.terminal_type),
            ("model", &self.model),
            ("app_version", &self.app_version),
        ];
        for (label, value) in pairs {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                filters.insert(label.to_string(), value.to_string());
            }
        }
        filters
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Claude Code's stats summary; `~` is expanded
    pub cache_path: String,
    /// Transcript root used to map sessions to projects
    pub projects_dir: String,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            cache_path: "~/.claude/stats-cache.json".to_string(),
            projects_dir: "~/.claude/projects".to_string(),
        }
    }
}

impl StatsConfig {
    pub fn cache_path(&self) -> PathBuf {
        expand(&self.cache_path)
    }

    /// Configured transcript root; blank means the default location
    pub fn projects_dir(&self) -> PathBuf {
        if self.projects_dir.trim().is_empty() {
            if let Some(root) = ProjectIndex::default_root() {
                return root;
            }
        }
        expand(&self.projects_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 31517 }
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

/// Location of the config file
pub fn config_path() -> Result<PathBuf> {
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Ok(expand(path.trim()));
        }
    }
    confy::get_configuration_file_path(APP_NAME, CONFIG_NAME)
        .context("Failed to determine config file path")
}

/// Load configuration from file (created with defaults on first use), then
/// apply environment overrides.
pub fn load_config() -> Result<Config> {
    let mut config = load_config_file()?;
    config.apply_env_overrides();
    Ok(config)
}

/// Configuration as stored on disk, without environment overrides
pub fn load_config_file() -> Result<Config> {
    let path = config_path()?;
    confy::load_path(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Save configuration to file
pub fn save_config(config: &Config) -> Result<()> {
    let path = config_path()?;
    confy::store_path(&path, config)
        .with_context(|| format!("Failed to save config to {}", path.display()))?;
    Ok(())
}

impl Config {
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var(PROMETHEUS_URL_ENV) {
            if !url.trim().is_empty() {
                self.backend.url = url.trim().to_string();
            }
        }
        if let Ok(secs) = env::var(REFRESH_SECS_ENV) {
            if let Ok(value) = secs.trim().parse::<u64>() {
                self.dashboard.refresh_interval_secs = value;
            }
        }
        if let Ok(path) = env::var(STATS_FILE_ENV) {
            if !path.trim().is_empty() {
                self.stats.cache_path = path.trim().to_string();
            }
        }
    }
}
