use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::{finite, settle, to_counts, to_usd, PartialFailure, QueryFailure};
use crate::prometheus::{MetricSample, MetricsError, PrometheusClient};
use crate::query::catalogue::{self, MODEL_LABEL, SESSION_LABEL, TYPE_LABEL};
use crate::time_range::TimeRangeSpec;
use crate::usage::SessionHistory;

const COST_SOURCE: &str = "cost_by_session";
const TYPE_SOURCE: &str = "tokens_by_session_and_type";
const MODEL_SOURCE: &str = "tokens_by_session_and_model";
const ACTIVE_SOURCE: &str = "active_time_by_session";
const SOURCE_COUNT: usize = 4;

/// Model label used when a token sample carries none
const UNKNOWN_MODEL: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Input,
    Output,
    CacheRead,
    CacheCreation,
}

impl TokenType {
    pub const ALL: [TokenType; 4] = [
        TokenType::Input,
        TokenType::Output,
        TokenType::CacheRead,
        TokenType::CacheCreation,
    ];

    /// Map a `type` label value; the exporter uses camelCase, some
    /// collectors rewrite it to snake_case.
    pub fn from_label(value: &str) -> Option<Self> {
        match value {
            "input" => Some(TokenType::Input),
            "output" => Some(TokenType::Output),
            "cacheRead" | "cache_read" => Some(TokenType::CacheRead),
            "cacheCreation" | "cache_creation" => Some(TokenType::CacheCreation),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TokenType::Input => "input",
            TokenType::Output => "output",
            TokenType::CacheRead => "cache read",
            TokenType::CacheCreation => "cache creation",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenBreakdown {
    pub input: u64,
    pub output: u64,
    pub cache_read: u64,
    pub cache_creation: u64,
}

impl TokenBreakdown {
    pub fn get(&self, kind: TokenType) -> u64 {
        match kind {
            TokenType::Input => self.input,
            TokenType::Output => self.output,
            TokenType::CacheRead => self.cache_read,
            TokenType::CacheCreation => self.cache_creation,
        }
    }

    pub fn add(&mut self, kind: TokenType, amount: u64) {
        let slot = match kind {
            TokenType::Input => &mut self.input,
            TokenType::Output => &mut self.output,
            TokenType::CacheRead => &mut self.cache_read,
            TokenType::CacheCreation => &mut self.cache_creation,
        };
        *slot = slot.saturating_add(amount);
    }

    pub fn total(&self) -> u64 {
        self.input
            .saturating_add(self.output)
            .saturating_add(self.cache_read)
            .saturating_add(self.cache_creation)
    }
}

impl FromIterator<(TokenType, u64)> for TokenBreakdown {
    fn from_iter<I: IntoIterator<Item = (TokenType, u64)>>(iter: I) -> Self {
        let mut out = TokenBreakdown::default();
        for (kind, amount) in iter {
            out.add(kind, amount);
        }
        out
    }
}

/// One session's usage, merged from every per-session query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub total_cost_usd: Decimal,
    /// Always `tokens_by_type.total()`
    pub total_tokens: u64,
    pub tokens_by_type: TokenBreakdown,
    pub tokens_by_model: BTreeMap<String, u64>,
    pub active_time_secs: f64,
    pub project_path: Option<String>,
}

/// Results of the four per-session queries
#[derive(Debug)]
pub struct SessionSources {
    pub cost: Result<Vec<MetricSample>, MetricsError>,
    pub tokens_by_type: Result<Vec<MetricSample>, MetricsError>,
    pub tokens_by_model: Result<Vec<MetricSample>, MetricsError>,
    pub active_time: Result<Vec<MetricSample>, MetricsError>,
}

impl SessionSources {
    /// Every source empty and successful
    pub fn empty() -> Self {
        Self {
            cost: Ok(Vec::new()),
            tokens_by_type: Ok(Vec::new()),
            tokens_by_model: Ok(Vec::new()),
            active_time: Ok(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionsOutcome {
    Sessions {
        sessions: Vec<SessionRecord>,
        warning: Option<PartialFailure>,
    },
    /// Queries succeeded but no session reported any data
    NoSessions,
    /// The backend is unreachable; `fallback` is the last good merge, if any
    Disconnected {
        message: String,
        fallback: Option<Vec<SessionRecord>>,
    },
    Failed {
        failures: Vec<QueryFailure>,
    },
}

#[derive(Default)]
struct Accumulator {
    cost: f64,
    tokens: BTreeMap<TokenType, f64>,
    by_model: BTreeMap<String, f64>,
    active_secs: f64,
}

fn session_id(sample: &MetricSample) -> Option<&str> {
    sample.label(SESSION_LABEL).filter(|id| !id.is_empty())
}

/// Merge the per-session query results into one record per session id.
///
/// `previous` is the last successfully merged list, returned as a fallback
/// when the backend turns out to be unreachable.
pub fn merge_sessions(
    sources: SessionSources,
    previous: Option<&[SessionRecord]>,
) -> SessionsOutcome {
    let mut failures = Vec::new();
    let mut transport_failures = 0;
    let mut track = |name: &str, result: Result<Vec<MetricSample>, MetricsError>| {
        if let Err(e) = &result {
            if e.is_transport() {
                transport_failures += 1;
            }
        }
        settle(&mut failures, name, result)
    };

    let cost = track(COST_SOURCE, sources.cost);
    let by_type = track(TYPE_SOURCE, sources.tokens_by_type);
    let by_model = track(MODEL_SOURCE, sources.tokens_by_model);
    let active = track(ACTIVE_SOURCE, sources.active_time);

    if failures.len() == SOURCE_COUNT {
        if transport_failures == SOURCE_COUNT {
            let message = failures
                .first()
                .map(|f| f.message.clone())
                .unwrap_or_default();
            return SessionsOutcome::Disconnected {
                message,
                fallback: previous.map(<[SessionRecord]>::to_vec),
            };
        }
        return SessionsOutcome::Failed { failures };
    }

    let mut merged: BTreeMap<String, Accumulator> = BTreeMap::new();

    for sample in &cost {
        if let Some(id) = session_id(sample) {
            merged.entry(id.to_string()).or_default().cost += finite(sample.value);
        }
    }

    for sample in &by_type {
        if let Some(id) = session_id(sample) {
            let acc = merged.entry(id.to_string()).or_default();
            match sample.label(TYPE_LABEL).and_then(TokenType::from_label) {
                Some(kind) => *acc.tokens.entry(kind).or_default() += finite(sample.value),
                None => debug!(session = id, "token sample without a known type"),
            }
        }
    }

    for sample in &by_model {
        if let Some(id) = session_id(sample) {
            let model = sample
                .label(MODEL_LABEL)
                .filter(|m| !m.is_empty())
                .unwrap_or(UNKNOWN_MODEL);
            let acc = merged.entry(id.to_string()).or_default();
            *acc.by_model.entry(model.to_string()).or_default() += finite(sample.value);
        }
    }

    for sample in &active {
        if let Some(id) = session_id(sample) {
            merged.entry(id.to_string()).or_default().active_secs += finite(sample.value);
        }
    }

    if merged.is_empty() {
        return SessionsOutcome::NoSessions;
    }

    // BTreeMap iteration keeps the output sorted by session id
    let sessions: Vec<SessionRecord> = merged
        .into_iter()
        .map(|(session_id, acc)| {
            let tokens: TokenBreakdown = to_counts(acc.tokens).into_iter().collect();
            SessionRecord {
                session_id,
                total_cost_usd: to_usd(acc.cost),
                total_tokens: tokens.total(),
                tokens_by_type: tokens,
                tokens_by_model: to_counts(acc.by_model),
                active_time_secs: acc.active_secs.max(0.0),
                project_path: None,
            }
        })
        .collect();

    let warning = if failures.is_empty() {
        None
    } else {
        Some(PartialFailure::new(&failures, SOURCE_COUNT))
    };

    SessionsOutcome::Sessions { sessions, warning }
}

/// Attach project paths from a transcript index
pub fn enrich_project_paths(sessions: &mut [SessionRecord], history: &dyn SessionHistory) {
    for session in sessions.iter_mut() {
        if session.project_path.is_none() {
            session.project_path = history.project_path(&session.session_id);
        }
    }
}

/// Session view with a memory of the last good merge, for the disconnected
/// fallback.
pub struct SessionsEngine {
    client: Arc<PrometheusClient>,
    history: Option<Arc<dyn SessionHistory>>,
    last_merged: Option<Vec<SessionRecord>>,
}

impl SessionsEngine {
    pub fn new(client: Arc<PrometheusClient>) -> Self {
        Self {
            client,
            history: None,
            last_merged: None,
        }
    }

    pub fn with_history(mut self, history: Arc<dyn SessionHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn last_merged(&self) -> Option<&[SessionRecord]> {
        self.last_merged.as_deref()
    }

    /// Run the four per-session queries concurrently and merge them
    pub async fn fetch(&mut self, spec: &TimeRangeSpec) -> SessionsOutcome {
        let range = spec.range_literal();
        let at = spec.evaluation_time();
        let client = &self.client;

        let cost_query = catalogue::cost_by_session(&range);
        let type_query = catalogue::tokens_by_session_and_type(&range);
        let model_query = catalogue::tokens_by_session_and_model(&range);
        let active_query = catalogue::active_time_by_session(&range);

        let (cost, tokens_by_type, tokens_by_model, active_time) = tokio::join!(
            client.query(&cost_query, at),
            client.query(&type_query, at),
            client.query(&model_query, at),
            client.query(&active_query, at),
        );

        let sources = SessionSources {
            cost,
            tokens_by_type,
            tokens_by_model,
            active_time,
        };

        let mut outcome = merge_sessions(sources, self.last_merged.as_deref());

        if let SessionsOutcome::Sessions { sessions, .. } = &mut outcome {
            if let Some(history) = &self.history {
                enrich_project_paths(sessions, history.as_ref());
            }
            info!(count = sessions.len(), range = %range, "merged sessions");
            self.last_merged = Some(sessions.clone());
        }

        outcome
    }
}
