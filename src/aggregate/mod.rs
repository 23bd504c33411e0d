//! Concurrent fan-out over the query catalogue and fan-in into value objects.

pub mod dashboard;
pub mod refresh;
pub mod sessions;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

use crate::prometheus::{ErrorKind, MetricSample, MetricsError};

pub use dashboard::{fetch_dashboard, DashboardMetrics};
pub use refresh::{spawn_refresh_loop, RefreshHandle};
pub use sessions::{
    merge_sessions, SessionRecord, SessionSources, SessionsEngine, SessionsOutcome,
    TokenBreakdown, TokenType,
};

#[derive(Debug, Error)]
pub enum AggregateError {
    /// Every query failed before reaching the backend
    #[error("not connected to metrics backend: {0}")]
    Disconnected(String),
}

/// One query of a fan-out that did not produce data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryFailure {
    pub query: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl QueryFailure {
    fn new(query: &str, err: &MetricsError) -> Self {
        Self {
            query: query.to_string(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Some, but not all, queries of a fan-out failed; the data is still usable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartialFailure {
    pub failed: usize,
    pub total: usize,
    pub queries: Vec<String>,
    pub message: String,
}

impl PartialFailure {
    pub fn new(failures: &[QueryFailure], total: usize) -> Self {
        let queries: Vec<String> = failures.iter().map(|f| f.query.clone()).collect();
        let message = format!(
            "partial data: {}/{} queries failed ({})",
            failures.len(),
            total,
            queries.join(", ")
        );
        Self {
            failed: failures.len(),
            total,
            queries,
            message,
        }
    }
}

/// Unwrap one fan-out result, recording and logging the failure if any
fn settle<T: Default>(
    failures: &mut Vec<QueryFailure>,
    query: &str,
    result: Result<T, MetricsError>,
) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(query = query, error = %e, "query failed, continuing with partial data");
            failures.push(QueryFailure::new(query, &e));
            T::default()
        }
    }
}

/// Sum of the finite sample values
fn sum_values(samples: &[MetricSample]) -> f64 {
    samples
        .iter()
        .map(|s| s.value)
        .filter(|v| v.is_finite())
        .sum()
}

/// Non-finite sample values count as zero
fn finite(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Round per-key sums once every sample has been added
fn to_counts<K: Ord>(raw: BTreeMap<K, f64>) -> BTreeMap<K, u64> {
    raw.into_iter().map(|(k, v)| (k, to_count(v))).collect()
}

/// Counter value as a whole count; negative or non-finite becomes zero
fn to_count(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

/// Non-negative USD amount; non-finite becomes zero
fn to_usd(value: f64) -> Decimal {
    if !value.is_finite() || value <= 0.0 {
        return Decimal::ZERO;
    }
    Decimal::from_f64(value)
        .map(|d| d.round_dp(6))
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_partial_failure_message() {
        let failures = vec![QueryFailure::new(
            "active_time",
            &MetricsError::Http { status: 503 },
        )];
        let warning = PartialFailure::new(&failures, 4);
        assert_eq!(warning.failed, 1);
        assert_eq!(
            warning.message,
            "partial data: 1/4 queries failed (active_time)"
        );
    }

    #[test]
    fn test_to_count_clamps() {
        assert_eq!(to_count(99.6), 100);
        assert_eq!(to_count(-3.0), 0);
        assert_eq!(to_count(f64::NAN), 0);
        assert_eq!(to_count(f64::INFINITY), 0);
    }

    #[test]
    fn test_to_counts_rounds_each_sum() {
        let raw = BTreeMap::from([("a", 0.4 + 0.4 + 0.4), ("b", 2.49), ("c", f64::NAN)]);
        let counts = to_counts(raw);
        assert_eq!(counts["a"], 1);
        assert_eq!(counts["b"], 2);
        assert_eq!(counts["c"], 0);
    }

    #[test]
    fn test_to_usd_never_negative() {
        assert_eq!(to_usd(-0.5), Decimal::ZERO);
        assert_eq!(to_usd(f64::NAN), Decimal::ZERO);
        assert_eq!(to_usd(1.25), Decimal::from_str("1.25").unwrap());
    }
}
