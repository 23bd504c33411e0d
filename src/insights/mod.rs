//! Analytics over the local stats file. Never touches the network.

pub mod activity;
pub mod collector;
pub mod stats_cache;
pub mod trends;

pub use collector::{InsightsReport, PeakActivity};
pub use stats_cache::{StatsCache, StatsCacheError, StatsCacheStore};
pub use trends::{
    compare_periods, percent_change, trend_series, MetricComparison, TrendMetric, MAX_INSIGHT_DAYS,
};
