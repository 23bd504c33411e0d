//! Prometheus HTTP API access: client, response cache, wire types and the
//! backend's own health snapshot.

mod cache;
mod client;
mod error;
pub mod health;
mod types;

pub use cache::ResponseCache;
pub use client::{ClientOptions, PrometheusClient};
pub use error::{ErrorKind, MetricsError};
pub use health::{fetch_backend_health, BackendHealth};
pub use types::{
    format_sample_value, parse_sample_value, BuildInfo, Labels, MetricSample, Series,
    SeriesPoint, TargetIssue, TargetsSummary,
};
