use chrono::{DateTime, Utc};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::cache::ResponseCache;
use super::error::MetricsError;
use super::types::{
    ApiEnvelope, BuildInfo, ErrorEnvelope, MetricSample, QueryData, RawTargets, Series,
    TargetsSummary,
};
use crate::query::Query;

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CACHE_TTL_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Whole-request timeout applied by the HTTP client
    pub timeout: Duration,
    /// How long a successful response may be reused. Zero disables caching.
    pub cache_ttl: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }
}

/// Client for the Prometheus HTTP API.
///
/// Cheap to share behind an `Arc`; the response cache is the only mutable
/// state and is internally synchronised.
#[derive(Debug)]
pub struct PrometheusClient {
    http: Client,
    base_url: Url,
    cache: ResponseCache,
}

impl PrometheusClient {
    pub fn new(base_url: &str) -> Result<Self, MetricsError> {
        Self::with_options(base_url, ClientOptions::default())
    }

    pub fn with_options(base_url: &str, options: ClientOptions) -> Result<Self, MetricsError> {
        let base_url = parse_base_url(base_url)?;
        let http = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| MetricsError::InvalidRequest(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            cache: ResponseCache::new(options.cache_ttl),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Liveness and version probe. Never served from cache.
    pub async fn check_connection(&self) -> Result<BuildInfo, MetricsError> {
        let url = self.endpoint("api/v1/status/buildinfo", &[])?;
        self.fetch(url, false).await
    }

    /// Instant query, evaluated at `at` or at the backend's current time
    pub async fn query(
        &self,
        query: &Query,
        at: Option<DateTime<Utc>>,
    ) -> Result<Vec<MetricSample>, MetricsError> {
        let mut params = vec![("query", query.render())];
        if let Some(at) = at {
            params.push(("time", epoch_seconds(at)));
        }
        let url = self.endpoint("api/v1/query", &params)?;
        let data: QueryData = self.fetch(url, true).await?;
        data.into_samples()
    }

    /// Range query over `[start, end]` sampled every `step_secs` seconds
    pub async fn query_range(
        &self,
        query: &Query,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step_secs: u64,
    ) -> Result<Vec<Series>, MetricsError> {
        if end <= start {
            return Err(MetricsError::InvalidRequest(
                "range end must be after start".to_string(),
            ));
        }
        if step_secs == 0 {
            return Err(MetricsError::InvalidRequest(
                "range step must be positive".to_string(),
            ));
        }

        let params = [
            ("query", query.render()),
            ("start", start.timestamp().to_string()),
            ("end", end.timestamp().to_string()),
            ("step", step_secs.to_string()),
        ];
        let url = self.endpoint("api/v1/query_range", &params)?;
        let data: QueryData = self.fetch(url, true).await?;
        data.into_series()
    }

    /// Metric names containing `matching`, case-insensitively, sorted
    pub async fn discover_metric_names(&self, matching: &str) -> Result<Vec<String>, MetricsError> {
        let url = self.endpoint("api/v1/label/__name__/values", &[])?;
        let names: Vec<String> = self.fetch(url, true).await?;

        let needle = matching.to_lowercase();
        let mut matched: Vec<String> = names
            .into_iter()
            .filter(|name| name.to_lowercase().contains(&needle))
            .collect();
        matched.sort();
        Ok(matched)
    }

    /// Scrape target health summary
    pub async fn targets(&self) -> Result<TargetsSummary, MetricsError> {
        let url = self.endpoint("api/v1/targets", &[("state", "active".to_string())])?;
        let raw: RawTargets = self.fetch(url, true).await?;
        Ok(raw.into())
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url, MetricsError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| MetricsError::InvalidRequest(format!("invalid endpoint {}: {}", path, e)))?;
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    async fn fetch<T: DeserializeOwned>(&self, url: Url, cacheable: bool) -> Result<T, MetricsError> {
        let key = url.to_string();

        if cacheable {
            if let Some(body) = self.cache.get(&key).await {
                debug!(url = %key, "prometheus cache hit");
                return decode_envelope(&body);
            }
        }

        debug!(url = %key, "prometheus request");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(MetricsError::from_reqwest)?;
        let status = response.status();
        let body = response.text().await.map_err(MetricsError::from_reqwest)?;

        if !status.is_success() {
            // Prometheus reports bad queries as 400/422 with an error envelope
            if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
                if let Some(err) = envelope.into_error() {
                    return Err(err);
                }
            }
            return Err(MetricsError::Http {
                status: status.as_u16(),
            });
        }

        let data = decode_envelope(&body)?;
        if cacheable {
            self.cache.insert(key, Arc::from(body)).await;
        }
        Ok(data)
    }
}

fn decode_envelope<T: DeserializeOwned>(body: &str) -> Result<T, MetricsError> {
    let envelope: ApiEnvelope<T> =
        serde_json::from_str(body).map_err(|e| MetricsError::Decode(e.to_string()))?;
    envelope.into_data()
}

fn parse_base_url(raw: &str) -> Result<Url, MetricsError> {
    let trimmed = raw.trim();
    let mut url = Url::parse(trimmed)
        .map_err(|e| MetricsError::InvalidRequest(format!("invalid backend URL {:?}: {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(MetricsError::InvalidRequest(format!(
            "unsupported URL scheme {:?}",
            url.scheme()
        )));
    }

    // Keep any path prefix (e.g. behind a reverse proxy) when joining endpoints
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    Ok(url)
}

fn epoch_seconds(at: DateTime<Utc>) -> String {
    format!("{:.3}", at.timestamp_millis() as f64 / 1000.0)
}
