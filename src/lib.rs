//! Claude Code usage metrics: PromQL construction, concurrent aggregation
//! over a Prometheus backend, and analytics over the local stats file.

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod insights;
pub mod logging;
pub mod prometheus;
pub mod query;
pub mod server;
pub mod time_range;
pub mod usage;
