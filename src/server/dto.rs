use serde::{Deserialize, Serialize};

use crate::config::{Config, FilterConfig};
use crate::prometheus::{BuildInfo, ErrorKind, MetricsError};
use crate::time_range::{TimeRangeError, TimeRangeSpec};

/// Generic API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// `?range=` or `?start=&end=` (RFC 3339)
#[derive(Debug, Default, Deserialize)]
pub struct RangeParams {
    pub range: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

impl RangeParams {
    pub fn resolve(&self, config: &Config) -> Result<TimeRangeSpec, TimeRangeError> {
        config.dashboard.resolve_range(
            self.range.as_deref(),
            self.start.as_deref(),
            self.end.as_deref(),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct InsightsParams {
    pub days: Option<u32>,
    /// YYYY-MM-DD, defaults to the local date
    pub today: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MetricsParams {
    #[serde(rename = "match")]
    pub pattern: Option<String>,
}

/// Result of a connectivity probe
#[derive(Serialize)]
pub struct ConnectionDto {
    pub url: String,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionDto {
    pub fn from_result(url: &str, result: Result<BuildInfo, MetricsError>) -> Self {
        match result {
            Ok(build) => Self {
                url: url.to_string(),
                connected: true,
                build: Some(build),
                error_kind: None,
                error: None,
            },
            Err(e) => Self {
                url: url.to_string(),
                connected: false,
                build: None,
                error_kind: Some(e.kind()),
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Serialize)]
pub struct ConfigDto {
    pub backend_url: String,
    pub request_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub refresh_interval_secs: u64,
    pub default_range: String,
    pub filters: FilterConfig,
    pub stats_path: String,
    pub projects_dir: String,
    pub port: u16,
}

impl From<&Config> for ConfigDto {
    fn from(config: &Config) -> Self {
        Self {
            backend_url: config.backend.url.clone(),
            request_timeout_secs: config.backend.request_timeout_secs,
            cache_ttl_secs: config.backend.cache_ttl_secs,
            refresh_interval_secs: config.dashboard.refresh_interval_secs,
            default_range: config.dashboard.default_range.clone(),
            filters: config.dashboard.filters.clone(),
            stats_path: config.stats.cache_path().to_string_lossy().to_string(),
            projects_dir: config.stats.projects_dir().to_string_lossy().to_string(),
            port: config.server.port,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_omits_data() {
        let json = serde_json::to_value(ApiResponse::<u32>::error("boom")).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "boom");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn test_connection_dto_carries_error_kind() {
        let dto = ConnectionDto::from_result(
            "http://prom:9090/",
            Err(MetricsError::Http { status: 503 }),
        );
        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["connected"], false);
        assert_eq!(json["error_kind"], "http_status");
        assert!(json.get("build").is_none());
    }

    #[test]
    fn test_metrics_params_use_match_key() {
        let params: MetricsParams = serde_json::from_str(r#"{"match":"token"}"#).unwrap();
        assert_eq!(params.pattern.as_deref(), Some("token"));
    }
}
