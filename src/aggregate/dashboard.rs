use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

use super::sessions::{TokenBreakdown, TokenType};
use super::{
    finite, settle, sum_values, to_count, to_counts, to_usd, AggregateError, PartialFailure,
    QueryFailure,
};
use crate::prometheus::{MetricSample, MetricsError, PrometheusClient, Series, SeriesPoint};
use crate::query::catalogue::{self, MODEL_LABEL, TYPE_LABEL};
use crate::query::{LabelFilters, Query};
use crate::time_range::{BucketGranularity, TimeRangeSpec};

/// Instant plus range queries issued per dashboard refresh
const DASHBOARD_QUERY_COUNT: usize = 13;

/// Headline usage figures for one time range
#[derive(Debug, Clone, Serialize)]
pub struct DashboardMetrics {
    pub range: String,
    pub step_secs: u64,
    pub granularity: BucketGranularity,

    pub total_tokens: u64,
    pub total_cost_usd: Decimal,
    pub active_time_secs: f64,
    pub session_count: u64,
    pub lines_added: u64,
    pub lines_removed: u64,
    pub commit_count: u64,
    pub pull_request_count: u64,

    pub tokens_by_type: TokenBreakdown,
    pub tokens_by_model: BTreeMap<String, u64>,
    pub cost_by_model: BTreeMap<String, Decimal>,

    /// Tokens per second, one point per step
    pub token_rate: Vec<SeriesPoint>,
    /// USD per second, one point per step
    pub cost_rate: Vec<SeriesPoint>,

    pub failed_queries: Vec<QueryFailure>,
    pub warning: Option<PartialFailure>,
}

impl DashboardMetrics {
    pub fn is_partial(&self) -> bool {
        !self.failed_queries.is_empty()
    }
}

fn by_label_counts(samples: &[MetricSample], label: &str) -> BTreeMap<String, u64> {
    let mut raw: BTreeMap<String, f64> = BTreeMap::new();
    for sample in samples {
        if let Some(key) = sample.label(label).filter(|k| !k.is_empty()) {
            *raw.entry(key.to_string()).or_default() += finite(sample.value);
        }
    }
    to_counts(raw)
}

fn by_label_cost(samples: &[MetricSample], label: &str) -> BTreeMap<String, Decimal> {
    let mut raw: BTreeMap<String, f64> = BTreeMap::new();
    for sample in samples {
        if let Some(key) = sample.label(label).filter(|k| !k.is_empty()) {
            if sample.value.is_finite() {
                *raw.entry(key.to_string()).or_default() += sample.value;
            }
        }
    }
    raw.into_iter().map(|(k, v)| (k, to_usd(v))).collect()
}

fn breakdown(samples: &[MetricSample]) -> TokenBreakdown {
    let mut raw: BTreeMap<TokenType, f64> = BTreeMap::new();
    for sample in samples {
        if let Some(kind) = sample.label(TYPE_LABEL).and_then(TokenType::from_label) {
            *raw.entry(kind).or_default() += finite(sample.value);
        }
    }
    to_counts(raw).into_iter().collect()
}

/// `sum(...)` range queries come back as a single series
fn single_series(series: Vec<Series>) -> Vec<SeriesPoint> {
    series.into_iter().next().map(|s| s.points).unwrap_or_default()
}

/// Fetch every dashboard query concurrently and assemble the result.
///
/// Failed queries leave their field at zero and are listed in
/// `failed_queries`. Fails only when the backend could not be reached for any
/// of them.
pub async fn fetch_dashboard(
    client: &PrometheusClient,
    spec: &TimeRangeSpec,
    filters: &LabelFilters,
    now: DateTime<Utc>,
) -> Result<DashboardMetrics, AggregateError> {
    let resolution = spec.resolve();
    let range = resolution.range.as_str();
    let at = spec.evaluation_time();
    let (start, end) = spec.window(now);
    let step = resolution.step_secs;

    let instant = |query: Query| async move { client.query(&query, at).await };
    let ranged = |query: Query| async move { client.query_range(&query, start, end, step).await };

    let (
        total_tokens,
        total_cost,
        active_time,
        session_count,
        lines_added,
        lines_removed,
        commits,
        pull_requests,
        tokens_by_model,
        tokens_by_type,
        cost_by_model,
        token_rate,
        cost_rate,
    ) = tokio::join!(
        instant(catalogue::total_tokens(range, filters)),
        instant(catalogue::total_cost(range, filters)),
        instant(catalogue::active_time(range, filters)),
        instant(catalogue::session_count(range, filters)),
        instant(catalogue::lines_added(range, filters)),
        instant(catalogue::lines_removed(range, filters)),
        instant(catalogue::commits(range, filters)),
        instant(catalogue::pull_requests(range, filters)),
        instant(catalogue::tokens_by_model(range, filters)),
        instant(catalogue::tokens_by_type(range, filters)),
        instant(catalogue::cost_by_model(range, filters)),
        ranged(catalogue::token_rate(spec.rate_window(), filters)),
        ranged(catalogue::cost_rate(spec.rate_window(), filters)),
    );

    let outcomes: [(&str, Option<&MetricsError>); DASHBOARD_QUERY_COUNT] = [
        ("total_tokens", total_tokens.as_ref().err()),
        ("total_cost", total_cost.as_ref().err()),
        ("active_time", active_time.as_ref().err()),
        ("session_count", session_count.as_ref().err()),
        ("lines_added", lines_added.as_ref().err()),
        ("lines_removed", lines_removed.as_ref().err()),
        ("commits", commits.as_ref().err()),
        ("pull_requests", pull_requests.as_ref().err()),
        ("tokens_by_model", tokens_by_model.as_ref().err()),
        ("tokens_by_type", tokens_by_type.as_ref().err()),
        ("cost_by_model", cost_by_model.as_ref().err()),
        ("token_rate", token_rate.as_ref().err()),
        ("cost_rate", cost_rate.as_ref().err()),
    ];
    if outcomes
        .iter()
        .all(|(_, err)| err.map(MetricsError::is_transport).unwrap_or(false))
    {
        let message = outcomes
            .iter()
            .find_map(|(_, err)| err.map(|e| e.to_string()))
            .unwrap_or_default();
        return Err(AggregateError::Disconnected(message));
    }

    let mut failures = Vec::new();
    let f = &mut failures;

    let metrics = DashboardMetrics {
        range: resolution.range.clone(),
        step_secs: step,
        granularity: resolution.granularity,
        total_tokens: to_count(sum_values(&settle(f, "total_tokens", total_tokens))),
        total_cost_usd: to_usd(sum_values(&settle(f, "total_cost", total_cost))),
        active_time_secs: sum_values(&settle(f, "active_time", active_time)).max(0.0),
        session_count: to_count(sum_values(&settle(f, "session_count", session_count))),
        lines_added: to_count(sum_values(&settle(f, "lines_added", lines_added))),
        lines_removed: to_count(sum_values(&settle(f, "lines_removed", lines_removed))),
        commit_count: to_count(sum_values(&settle(f, "commits", commits))),
        pull_request_count: to_count(sum_values(&settle(f, "pull_requests", pull_requests))),
        tokens_by_model: by_label_counts(&settle(f, "tokens_by_model", tokens_by_model), MODEL_LABEL),
        tokens_by_type: breakdown(&settle(f, "tokens_by_type", tokens_by_type)),
        cost_by_model: by_label_cost(&settle(f, "cost_by_model", cost_by_model), MODEL_LABEL),
        token_rate: single_series(settle(f, "token_rate", token_rate)),
        cost_rate: single_series(settle(f, "cost_rate", cost_rate)),
        warning: None,
        failed_queries: Vec::new(),
    };

    let warning = if failures.is_empty() {
        None
    } else {
        Some(PartialFailure::new(&failures, DASHBOARD_QUERY_COUNT))
    };

    info!(
        range = %metrics.range,
        failed = failures.len(),
        "dashboard refreshed"
    );

    Ok(DashboardMetrics {
        failed_queries: failures,
        warning,
        ..metrics
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prometheus::Labels;

    fn sample(label: &str, key: &str, value: f64) -> MetricSample {
        let mut labels = Labels::new();
        labels.insert(label.to_string(), key.to_string());
        MetricSample {
            timestamp: 0.0,
            value,
            labels,
        }
    }

    #[test]
    fn test_breakdown_ignores_unknown_types() {
        let samples = vec![
            sample("type", "input", 10.0),
            sample("type", "cacheCreation", 5.0),
            sample("type", "reasoning", 99.0),
        ];
        let b = breakdown(&samples);
        assert_eq!(b.input, 10);
        assert_eq!(b.cache_creation, 5);
        assert_eq!(b.total(), 15);
    }

    #[test]
    fn test_breakdown_rounds_after_summing() {
        let samples = vec![
            sample("type", "input", 1.4),
            sample("type", "input", 1.4),
            sample("type", "input", f64::NAN),
            sample("type", "output", 0.3),
            sample("type", "output", 0.3),
        ];
        let b = breakdown(&samples);
        assert_eq!(b.input, 3);
        assert_eq!(b.output, 1);
        assert_eq!(b.total(), 4);
    }

    #[test]
    fn test_by_label_merges_duplicate_keys() {
        let samples = vec![
            sample("model", "opus", 1.4),
            sample("model", "opus", 1.4),
            sample("model", "", 7.0),
        ];
        let counts = by_label_counts(&samples, "model");
        assert_eq!(counts.len(), 1);
        assert_eq!(counts["opus"], 3);
    }

    #[test]
    fn test_cost_by_label_skips_nan() {
        let samples = vec![
            sample("model", "haiku", 0.25),
            sample("model", "haiku", f64::NAN),
        ];
        let cost = by_label_cost(&samples, "model");
        assert_eq!(cost["haiku"], Decimal::new(25, 2));
    }
}
