use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{Local, Utc};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::debug;

use crate::aggregate::{fetch_dashboard, DashboardMetrics, SessionsEngine, SessionsOutcome};
use crate::config::Config;
use crate::insights::{InsightsReport, StatsCacheStore};
use crate::prometheus::{fetch_backend_health, BackendHealth, MetricsError, PrometheusClient};
use crate::time_range::parse_date;
use crate::usage::ProjectIndex;

use super::dto::*;

const DEFAULT_INSIGHT_DAYS: u32 = 7;
const DEFAULT_METRIC_MATCH: &str = "claude_code";

/// Shared application state
pub struct AppState {
    pub config: RwLock<Config>,
    pub client: Arc<PrometheusClient>,
    pub sessions: Mutex<SessionsEngine>,
    pub stats: StatsCacheStore,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, MetricsError> {
        let client = Arc::new(PrometheusClient::with_options(
            &config.backend.url,
            config.backend.client_options(),
        )?);
        let index = ProjectIndex::scan(&config.stats.projects_dir());
        debug!(projects = index.len(), "indexed session transcripts");
        let sessions = SessionsEngine::new(Arc::clone(&client)).with_history(Arc::new(index));
        let stats = StatsCacheStore::new(config.stats.cache_path());

        Ok(Self {
            config: RwLock::new(config),
            client,
            sessions: Mutex::new(sessions),
            stats,
        })
    }

    fn config(&self) -> Config {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Probe the metrics backend
pub async fn connection(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let result = state.client.check_connection().await;
    Json(ApiResponse::success(ConnectionDto::from_result(
        state.client.base_url(),
        result,
    )))
}

/// Dashboard totals and rates for a range
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> impl IntoResponse {
    let config = state.config();
    let spec = match params.resolve(&config) {
        Ok(spec) => spec,
        Err(e) => return Json(ApiResponse::<DashboardMetrics>::error(e.to_string())),
    };
    let filters = config.dashboard.filters.label_filters();

    match fetch_dashboard(&state.client, &spec, &filters, Utc::now()).await {
        Ok(metrics) => Json(ApiResponse::success(metrics)),
        Err(e) => Json(ApiResponse::<DashboardMetrics>::error(e.to_string())),
    }
}

/// Per-session breakdown; the outcome's `status` tells data from fallback
pub async fn sessions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> impl IntoResponse {
    let config = state.config();
    let spec = match params.resolve(&config) {
        Ok(spec) => spec,
        Err(e) => return Json(ApiResponse::<SessionsOutcome>::error(e.to_string())),
    };

    let mut engine = state.sessions.lock().await;
    Json(ApiResponse::success(engine.fetch(&spec).await))
}

/// Insights from the cached stats snapshot
pub async fn insights(
    State(state): State<Arc<AppState>>,
    Query(params): Query<InsightsParams>,
) -> impl IntoResponse {
    build_insights(&state, &params, false)
}

/// Re-read the stats file, then answer like `insights`
pub async fn refresh_insights(
    State(state): State<Arc<AppState>>,
    Query(params): Query<InsightsParams>,
) -> impl IntoResponse {
    build_insights(&state, &params, true)
}

fn build_insights(
    state: &AppState,
    params: &InsightsParams,
    reload: bool,
) -> Json<ApiResponse<InsightsReport>> {
    let today = match params.today.as_deref() {
        Some(raw) => match parse_date(raw) {
            Ok(date) => date,
            Err(e) => return Json(ApiResponse::error(e.to_string())),
        },
        None => Local::now().date_naive(),
    };
    let loaded = if reload {
        state.stats.refresh()
    } else {
        state.stats.load()
    };

    match loaded {
        Ok(cache) => {
            let days = params.days.unwrap_or(DEFAULT_INSIGHT_DAYS);
            Json(ApiResponse::success(InsightsReport::build(&cache, days, today)))
        }
        Err(e) => Json(ApiResponse::error(e.to_string())),
    }
}

/// Health of the metrics backend
pub async fn backend_health(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> impl IntoResponse {
    let config = state.config();
    match params.resolve(&config) {
        Ok(spec) => Json(ApiResponse::success(
            fetch_backend_health(&state.client, &spec, Utc::now()).await,
        )),
        Err(e) => Json(ApiResponse::<BackendHealth>::error(e.to_string())),
    }
}

/// Metric names matching `?match=` (defaults to `claude_code`)
pub async fn metrics(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MetricsParams>,
) -> impl IntoResponse {
    let pattern = params.pattern.as_deref().unwrap_or(DEFAULT_METRIC_MATCH);
    match state.client.discover_metric_names(pattern).await {
        Ok(names) => Json(ApiResponse::success(names)),
        Err(e) => Json(ApiResponse::<Vec<String>>::error(e.to_string())),
    }
}

/// Get current configuration
pub async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = state.config();
    Json(ApiResponse::success(ConfigDto::from(&config)))
}
