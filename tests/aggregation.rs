use std::collections::HashMap;
use std::net::TcpListener;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use ccpulse::aggregate::{
    fetch_dashboard, merge_sessions, AggregateError, SessionSources, SessionsEngine,
    SessionsOutcome,
};
use ccpulse::prometheus::{fetch_backend_health, ClientOptions, ErrorKind, PrometheusClient};
use ccpulse::query::catalogue;
use ccpulse::query::{LabelFilters, Query};
use ccpulse::time_range::{TimeRangePreset, TimeRangeSpec};
use ccpulse::usage::SessionHistory;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LAST_DAY: TimeRangeSpec = TimeRangeSpec::Preset(TimeRangePreset::LastDay);

fn vector(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": "success",
        "data": { "resultType": "vector", "result": result }
    }))
}

fn matrix(values: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "status": "success",
        "data": {
            "resultType": "matrix",
            "result": [{ "metric": {}, "values": values }]
        }
    }))
}

fn uncached(server: &MockServer) -> Arc<PrometheusClient> {
    let options = ClientOptions {
        cache_ttl: Duration::ZERO,
        ..Default::default()
    };
    Arc::new(PrometheusClient::with_options(&server.uri(), options).unwrap())
}

/// Base URL of a port nothing listens on
fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

async fn mount_instant(server: &MockServer, query: String, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .and(query_param("query", query))
        .respond_with(response)
        .with_priority(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_dashboard_keeps_data_when_one_query_fails() {
    let server = MockServer::start().await;
    let filters = LabelFilters::new();
    let range = LAST_DAY.range_literal();

    mount_instant(
        &server,
        catalogue::total_cost(&range, &filters).render(),
        ResponseTemplate::new(422).set_body_json(json!({
            "status": "error",
            "errorType": "execution",
            "error": "query timed out"
        })),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(vector(json!([
            { "metric": { "model": "claude-opus-4", "type": "input" }, "value": [1700000000.0, "10"] }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query_range"))
        .respond_with(matrix(json!([[1700000000.0, "0.5"], [1700003600.0, "1.5"]])))
        .mount(&server)
        .await;

    let client = uncached(&server);
    let metrics = fetch_dashboard(&client, &LAST_DAY, &filters, Utc::now())
        .await
        .unwrap();

    assert_eq!(metrics.total_tokens, 10);
    assert_eq!(metrics.session_count, 10);
    assert_eq!(metrics.total_cost_usd, Decimal::ZERO);
    assert_eq!(metrics.tokens_by_type.input, 10);
    assert_eq!(metrics.tokens_by_model.get("claude-opus-4"), Some(&10));
    assert_eq!(
        metrics.cost_by_model.get("claude-opus-4"),
        Some(&Decimal::from_str("10").unwrap())
    );
    assert_eq!(metrics.token_rate.len(), 2);

    assert!(metrics.is_partial());
    assert_eq!(metrics.failed_queries.len(), 1);
    assert_eq!(metrics.failed_queries[0].query, "total_cost");
    assert_eq!(metrics.failed_queries[0].kind, ErrorKind::Query);
    let warning = metrics.warning.unwrap();
    assert_eq!(warning.failed, 1);
    assert_eq!(warning.total, 13);
    assert!(warning.message.contains("total_cost"));
}

#[tokio::test]
async fn test_dashboard_with_all_http_errors_is_not_disconnected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = uncached(&server);
    let metrics = fetch_dashboard(&client, &LAST_DAY, &LabelFilters::new(), Utc::now())
        .await
        .unwrap();
    assert_eq!(metrics.failed_queries.len(), 13);
    assert_eq!(metrics.total_tokens, 0);
}

#[tokio::test]
async fn test_dashboard_unreachable_backend_is_disconnected() {
    let client = PrometheusClient::new(&closed_port_url()).unwrap();
    let result = fetch_dashboard(&client, &LAST_DAY, &LabelFilters::new(), Utc::now()).await;
    assert!(matches!(result, Err(AggregateError::Disconnected(_))));
}

struct FixedHistory(HashMap<String, String>);

impl SessionHistory for FixedHistory {
    fn project_path(&self, session_id: &str) -> Option<String> {
        self.0.get(session_id).cloned()
    }
}

#[tokio::test]
async fn test_sessions_engine_merges_and_enriches() {
    let server = MockServer::start().await;
    let range = LAST_DAY.range_literal();

    mount_instant(
        &server,
        catalogue::cost_by_session(&range).render(),
        vector(json!([
            { "metric": { "session_id": "A" }, "value": [1700000000.0, "0.5"] }
        ])),
    )
    .await;
    mount_instant(
        &server,
        catalogue::tokens_by_session_and_type(&range).render(),
        vector(json!([
            { "metric": { "session_id": "A", "type": "input" }, "value": [1700000000.0, "100"] },
            { "metric": { "session_id": "A", "type": "output" }, "value": [1700000000.0, "50"] }
        ])),
    )
    .await;
    mount_instant(
        &server,
        catalogue::tokens_by_session_and_model(&range).render(),
        vector(json!([
            { "metric": { "session_id": "A", "model": "claude-sonnet-4" }, "value": [1700000000.0, "150"] }
        ])),
    )
    .await;
    mount_instant(
        &server,
        catalogue::active_time_by_session(&range).render(),
        vector(json!([
            { "metric": { "session_id": "C" }, "value": [1700000000.0, "30"] }
        ])),
    )
    .await;

    let mut paths = HashMap::new();
    paths.insert("A".to_string(), "/home/dev/project-a".to_string());
    let mut engine =
        SessionsEngine::new(uncached(&server)).with_history(Arc::new(FixedHistory(paths)));

    let (sessions, warning) = match engine.fetch(&LAST_DAY).await {
        SessionsOutcome::Sessions { sessions, warning } => (sessions, warning),
        other => panic!("expected sessions, got {:?}", other),
    };
    assert!(warning.is_none());
    assert_eq!(sessions.len(), 2);

    let a = &sessions[0];
    assert_eq!(a.session_id, "A");
    assert_eq!(a.total_cost_usd, Decimal::from_str("0.5").unwrap());
    assert_eq!(a.total_tokens, 150);
    assert_eq!(a.tokens_by_model.get("claude-sonnet-4"), Some(&150));
    assert_eq!(a.project_path.as_deref(), Some("/home/dev/project-a"));

    let c = &sessions[1];
    assert_eq!(c.session_id, "C");
    assert_eq!(c.total_cost_usd, Decimal::ZERO);
    assert_eq!(c.total_tokens, 0);
    assert_eq!(c.active_time_secs, 30.0);
    assert_eq!(c.project_path, None);

    assert_eq!(engine.last_merged().map(|s| s.len()), Some(2));
}

#[tokio::test]
async fn test_sessions_engine_no_sessions() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(vector(json!([])))
        .mount(&server)
        .await;

    let mut engine = SessionsEngine::new(uncached(&server));
    assert_eq!(engine.fetch(&LAST_DAY).await, SessionsOutcome::NoSessions);
    assert!(engine.last_merged().is_none());
}

#[tokio::test]
async fn test_sessions_engine_unreachable_backend() {
    let client = Arc::new(PrometheusClient::new(&closed_port_url()).unwrap());
    let mut engine = SessionsEngine::new(client);
    match engine.fetch(&LAST_DAY).await {
        SessionsOutcome::Disconnected { fallback, .. } => assert!(fallback.is_none()),
        other => panic!("expected disconnected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_backend_falls_back_to_last_merge() {
    let range = LAST_DAY.range_literal();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(vector(json!([
            { "metric": { "session_id": "A", "type": "input", "model": "claude-opus-4" }, "value": [1700000000.0, "12"] }
        ])))
        .mount(&server)
        .await;
    let live = uncached(&server);
    let mut engine = SessionsEngine::new(live);
    let previous = match engine.fetch(&LAST_DAY).await {
        SessionsOutcome::Sessions { sessions, .. } => sessions,
        other => panic!("expected sessions, got {:?}", other),
    };
    assert_eq!(previous[0].session_id, "A");

    let dead = PrometheusClient::new(&closed_port_url()).unwrap();
    let sources = SessionSources {
        cost: dead.query(&catalogue::cost_by_session(&range), None).await,
        tokens_by_type: dead
            .query(&catalogue::tokens_by_session_and_type(&range), None)
            .await,
        tokens_by_model: dead
            .query(&catalogue::tokens_by_session_and_model(&range), None)
            .await,
        active_time: dead
            .query(&catalogue::active_time_by_session(&range), None)
            .await,
    };
    assert!(sources.cost.as_ref().unwrap_err().is_transport());

    match merge_sessions(sources, Some(&previous)) {
        SessionsOutcome::Disconnected { message, fallback } => {
            assert!(!message.is_empty());
            assert_eq!(fallback, Some(previous));
        }
        other => panic!("expected disconnected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_backend_health_collects_available_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/status/buildinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": { "version": "2.53.0", "goVersion": "go1.22.4" }
        })))
        .mount(&server)
        .await;
    mount_instant(
        &server,
        Query::new("go_goroutines").render(),
        vector(json!([{ "metric": {}, "value": [1700000000.0, "42"] }])),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(vector(json!([
            { "metric": {}, "value": [1700000000.0, "1"] }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/query_range"))
        .respond_with(matrix(json!([[1700000000.0, "1024"]])))
        .mount(&server)
        .await;

    let client = uncached(&server);
    let health = fetch_backend_health(&client, &LAST_DAY, Utc::now()).await;

    assert!(health.is_ready);
    assert_eq!(health.version.as_deref(), Some("2.53.0"));
    assert_eq!(health.goroutines, Some(42.0));
    assert_eq!(health.config_reload_ok, Some(true));
    assert_eq!(health.memory_series.len(), 1);
    // No targets endpoint mounted
    assert_eq!(health.targets, None);
    assert_eq!(health.failed, vec!["targets".to_string()]);
}
