use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use super::client::PrometheusClient;
use super::error::MetricsError;
use super::types::{SeriesPoint, TargetsSummary};
use crate::query::Query;
use crate::time_range::TimeRangeSpec;

/// Self-monitoring snapshot of the metrics backend.
///
/// Every gauge is fetched independently; one that fails stays `None` and its
/// name is listed in `failed`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BackendHealth {
    pub is_ready: bool,
    pub version: Option<String>,
    pub go_version: Option<String>,
    pub uptime_secs: Option<f64>,

    // TSDB
    pub storage_blocks_bytes: Option<f64>,
    pub wal_bytes: Option<f64>,
    pub retention_limit_bytes: Option<f64>,
    pub retention_limit_secs: Option<f64>,
    pub head_series: Option<f64>,

    // Process
    pub resident_memory_bytes: Option<f64>,
    pub heap_inuse_bytes: Option<f64>,
    pub goroutines: Option<f64>,
    pub cpu_usage: Option<f64>,

    pub samples_per_sec: Option<f64>,
    pub compactions_failed: Option<f64>,
    pub wal_corruptions: Option<f64>,
    pub config_reload_ok: Option<bool>,

    pub targets: Option<TargetsSummary>,

    pub memory_series: Vec<SeriesPoint>,
    pub ingestion_series: Vec<SeriesPoint>,

    pub failed: Vec<String>,
}

impl BackendHealth {
    /// Blocks plus WAL, when at least one of them is known
    pub fn total_storage_bytes(&self) -> Option<f64> {
        match (self.storage_blocks_bytes, self.wal_bytes) {
            (None, None) => None,
            (blocks, wal) => Some(blocks.unwrap_or(0.0) + wal.unwrap_or(0.0)),
        }
    }
}

const INGESTION_WINDOW: &str = "1m";

fn ingestion_rate() -> Query {
    Query::new("prometheus_tsdb_head_samples_appended_total").rate(INGESTION_WINDOW)
}

/// First finite value of an instant query, summed when several series match
async fn gauge(client: &PrometheusClient, query: Query) -> Result<Option<f64>, MetricsError> {
    let samples = client.query(&query, None).await?;
    let values: Vec<f64> = samples
        .iter()
        .map(|s| s.value)
        .filter(|v| v.is_finite())
        .collect();
    if values.is_empty() {
        Ok(None)
    } else {
        Ok(Some(values.iter().sum()))
    }
}

async fn first_series(
    client: &PrometheusClient,
    query: Query,
    spec: &TimeRangeSpec,
    now: DateTime<Utc>,
) -> Result<Vec<SeriesPoint>, MetricsError> {
    let (start, end) = spec.window(now);
    let series = client.query_range(&query, start, end, spec.step_secs()).await?;
    Ok(series
        .into_iter()
        .next()
        .map(|s| s.points)
        .unwrap_or_default())
}

fn absorb<T: Default>(failed: &mut Vec<String>, name: &str, result: Result<T, MetricsError>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(item = name, error = %e, "backend health item unavailable");
            failed.push(name.to_string());
            T::default()
        }
    }
}

/// Collect the backend health snapshot; all items are requested concurrently.
pub async fn fetch_backend_health(
    client: &PrometheusClient,
    spec: &TimeRangeSpec,
    now: DateTime<Utc>,
) -> BackendHealth {
    let (
        build_info,
        start_time,
        blocks,
        wal,
        retention_bytes,
        retention_secs,
        head_series,
        resident,
        heap,
        goroutines,
        cpu,
        samples,
        compactions_failed,
        wal_corruptions,
        reload_ok,
        targets,
        memory_series,
        ingestion_series,
    ) = tokio::join!(
        client.check_connection(),
        gauge(client, Query::new("process_start_time_seconds")),
        gauge(client, Query::new("prometheus_tsdb_storage_blocks_bytes")),
        gauge(client, Query::new("prometheus_tsdb_wal_storage_size_bytes")),
        gauge(client, Query::new("prometheus_tsdb_retention_limit_bytes")),
        gauge(client, Query::new("prometheus_tsdb_retention_limit_seconds")),
        gauge(client, Query::new("prometheus_tsdb_head_series")),
        gauge(client, Query::new("process_resident_memory_bytes")),
        gauge(client, Query::new("go_memstats_heap_inuse_bytes")),
        gauge(client, Query::new("go_goroutines")),
        gauge(client, Query::new("process_cpu_seconds_total").rate(INGESTION_WINDOW)),
        gauge(client, ingestion_rate()),
        gauge(client, Query::new("prometheus_tsdb_compactions_failed_total")),
        gauge(client, Query::new("prometheus_tsdb_wal_corruptions_total")),
        gauge(client, Query::new("prometheus_config_last_reload_successful")),
        client.targets(),
        first_series(client, Query::new("process_resident_memory_bytes"), spec, now),
        first_series(client, ingestion_rate(), spec, now),
    );

    let mut failed = Vec::new();
    let mut health = BackendHealth::default();

    match build_info {
        Ok(info) => {
            health.is_ready = true;
            health.version = Some(info.version).filter(|v| !v.is_empty());
            health.go_version = Some(info.go_version).filter(|v| !v.is_empty());
        }
        Err(e) => {
            warn!(error = %e, "backend build info unavailable");
            failed.push("build_info".to_string());
        }
    }

    let now_secs = now.timestamp_millis() as f64 / 1000.0;
    health.uptime_secs = absorb(&mut failed, "uptime", start_time)
        .map(|started| (now_secs - started).max(0.0));
    health.storage_blocks_bytes = absorb(&mut failed, "storage_blocks", blocks);
    health.wal_bytes = absorb(&mut failed, "wal_size", wal);
    health.retention_limit_bytes = absorb(&mut failed, "retention_bytes", retention_bytes);
    health.retention_limit_secs = absorb(&mut failed, "retention_time", retention_secs);
    health.head_series = absorb(&mut failed, "head_series", head_series);
    health.resident_memory_bytes = absorb(&mut failed, "resident_memory", resident);
    health.heap_inuse_bytes = absorb(&mut failed, "heap_inuse", heap);
    health.goroutines = absorb(&mut failed, "goroutines", goroutines);
    health.cpu_usage = absorb(&mut failed, "cpu", cpu);
    health.samples_per_sec = absorb(&mut failed, "ingestion_rate", samples);
    health.compactions_failed = absorb(&mut failed, "compactions_failed", compactions_failed);
    health.wal_corruptions = absorb(&mut failed, "wal_corruptions", wal_corruptions);
    health.config_reload_ok = absorb(&mut failed, "config_reload", reload_ok).map(|v| v >= 1.0);
    health.targets = absorb(&mut failed, "targets", targets.map(Some));
    health.memory_series = absorb(&mut failed, "memory_series", memory_series);
    health.ingestion_series = absorb(&mut failed, "ingestion_series", ingestion_series);

    health.failed = failed;
    health
}
