//! Named queries over the Claude Code OpenTelemetry metrics.
//!
//! Callers go through these constructors rather than assembling PromQL by
//! hand. Dashboard totals accept the configured label filters; per-session
//! breakdowns do not.

use super::builder::{AggregationOp, LabelFilters, Query};

pub const TOKEN_USAGE: &str = "claude_code_token_usage_tokens_total";
pub const COST_USAGE: &str = "claude_code_cost_usage_USD_total";
pub const ACTIVE_TIME: &str = "claude_code_active_time_seconds_total";
pub const SESSION_COUNT: &str = "claude_code_session_count_total";
pub const LINES_OF_CODE: &str = "claude_code_lines_of_code_count_total";
pub const COMMIT_COUNT: &str = "claude_code_commit_count_total";
pub const PULL_REQUEST_COUNT: &str = "claude_code_pull_request_count_total";

/// Prefix shared by every Claude Code metric name
pub const METRIC_PREFIX: &str = "claude_code_";

pub const SESSION_LABEL: &str = "session_id";
pub const MODEL_LABEL: &str = "model";
pub const TYPE_LABEL: &str = "type";

fn total(metric: &str, range: &str, filters: &LabelFilters) -> Query {
    Query::new(metric).filters_from(filters).increase(range).sum()
}

fn total_by(metric: &str, range: &str, filters: &LabelFilters, labels: &[&str]) -> Query {
    Query::new(metric)
        .filters_from(filters)
        .increase(range)
        .aggregate_by(AggregationOp::Sum, labels.iter().copied())
}

pub fn total_tokens(range: &str, filters: &LabelFilters) -> Query {
    total(TOKEN_USAGE, range, filters)
}

pub fn total_cost(range: &str, filters: &LabelFilters) -> Query {
    total(COST_USAGE, range, filters)
}

pub fn active_time(range: &str, filters: &LabelFilters) -> Query {
    total(ACTIVE_TIME, range, filters)
}

pub fn session_count(range: &str, filters: &LabelFilters) -> Query {
    total(SESSION_COUNT, range, filters)
}

pub fn lines_added(range: &str, filters: &LabelFilters) -> Query {
    total(
        LINES_OF_CODE,
        range,
        &with_label(filters, TYPE_LABEL, "added"),
    )
}

pub fn lines_removed(range: &str, filters: &LabelFilters) -> Query {
    total(
        LINES_OF_CODE,
        range,
        &with_label(filters, TYPE_LABEL, "removed"),
    )
}

pub fn commits(range: &str, filters: &LabelFilters) -> Query {
    total(COMMIT_COUNT, range, filters)
}

pub fn pull_requests(range: &str, filters: &LabelFilters) -> Query {
    total(PULL_REQUEST_COUNT, range, filters)
}

pub fn tokens_by_model(range: &str, filters: &LabelFilters) -> Query {
    total_by(TOKEN_USAGE, range, filters, &[MODEL_LABEL])
}

pub fn tokens_by_type(range: &str, filters: &LabelFilters) -> Query {
    total_by(TOKEN_USAGE, range, filters, &[TYPE_LABEL])
}

pub fn cost_by_model(range: &str, filters: &LabelFilters) -> Query {
    total_by(COST_USAGE, range, filters, &[MODEL_LABEL])
}

/// Per-second token rate, for range queries
pub fn token_rate(window: &str, filters: &LabelFilters) -> Query {
    Query::new(TOKEN_USAGE).filters_from(filters).rate(window).sum()
}

/// Per-second cost rate, for range queries
pub fn cost_rate(window: &str, filters: &LabelFilters) -> Query {
    Query::new(COST_USAGE).filters_from(filters).rate(window).sum()
}

pub fn cost_by_session(range: &str) -> Query {
    total_by(COST_USAGE, range, &LabelFilters::new(), &[SESSION_LABEL])
}

pub fn tokens_by_session_and_type(range: &str) -> Query {
    total_by(
        TOKEN_USAGE,
        range,
        &LabelFilters::new(),
        &[SESSION_LABEL, TYPE_LABEL],
    )
}

pub fn tokens_by_session_and_model(range: &str) -> Query {
    total_by(
        TOKEN_USAGE,
        range,
        &LabelFilters::new(),
        &[SESSION_LABEL, MODEL_LABEL],
    )
}

pub fn active_time_by_session(range: &str) -> Query {
    total_by(ACTIVE_TIME, range, &LabelFilters::new(), &[SESSION_LABEL])
}

fn with_label(filters: &LabelFilters, label: &str, value: &str) -> LabelFilters {
    let mut merged = filters.clone();
    merged.insert(label.to_string(), value.to_string());
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_tokens_unfiltered() {
        assert_eq!(
            total_tokens("1d", &LabelFilters::new()).render(),
            "sum(increase(claude_code_token_usage_tokens_total[1d]))"
        );
    }

    #[test]
    fn test_total_cost_with_filters() {
        let mut filters = LabelFilters::new();
        filters.insert("terminal_type".to_string(), "vscode".to_string());
        filters.insert("app_version".to_string(), "2.0.1".to_string());
        assert_eq!(
            total_cost("1h", &filters).render(),
            r#"sum(increase(claude_code_cost_usage_USD_total{app_version="2.0.1",terminal_type="vscode"}[1h]))"#
        );
    }

    #[test]
    fn test_lines_added_and_removed() {
        let filters = LabelFilters::new();
        assert_eq!(
            lines_added("1w", &filters).render(),
            r#"sum(increase(claude_code_lines_of_code_count_total{type="added"}[1w]))"#
        );
        assert_eq!(
            lines_removed("1w", &filters).render(),
            r#"sum(increase(claude_code_lines_of_code_count_total{type="removed"}[1w]))"#
        );
    }

    #[test]
    fn test_cost_per_session() {
        assert_eq!(
            cost_by_session("1d").render(),
            "sum by (session_id) (increase(claude_code_cost_usage_USD_total[1d]))"
        );
    }

    #[test]
    fn test_tokens_by_session_and_type() {
        assert_eq!(
            tokens_by_session_and_type("12h").render(),
            "sum by (session_id,type) (increase(claude_code_token_usage_tokens_total[12h]))"
        );
    }

    #[test]
    fn test_token_rate() {
        assert_eq!(
            token_rate("5m", &LabelFilters::new()).render(),
            "sum(rate(claude_code_token_usage_tokens_total[5m]))"
        );
    }
}
