use chrono::{Duration, NaiveDate};
use serde::Serialize;

use super::stats_cache::StatsCache;

/// A value for the current period next to the one before it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricComparison {
    pub current: f64,
    pub previous: f64,
    /// `None` when there is nothing to compare against
    pub percent_change: Option<f64>,
}

impl MetricComparison {
    pub fn new(current: f64, previous: f64) -> Self {
        Self {
            current,
            previous,
            percent_change: percent_change(previous, current),
        }
    }
}

/// Period-over-period comparison of the daily activity counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodComparison {
    pub period_label: String,
    pub comparison_label: String,
    pub messages: MetricComparison,
    pub sessions: MetricComparison,
    pub tool_calls: MetricComparison,
    pub tokens: MetricComparison,
}

/// Which daily counter a trend series tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMetric {
    Messages,
    Sessions,
    ToolCalls,
    Tokens,
}

impl TrendMetric {
    fn value_on(&self, cache: &StatsCache, date: NaiveDate) -> u64 {
        if let TrendMetric::Tokens = self {
            return cache.tokens_on(date);
        }
        cache
            .activity_on(date)
            .map(|a| match self {
                TrendMetric::Messages => a.message_count,
                TrendMetric::Sessions => a.session_count,
                TrendMetric::ToolCalls => a.tool_call_count,
                TrendMetric::Tokens => 0,
            })
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub value: u64,
}

/// Longest window, in days, that comparisons and trends cover
pub const MAX_INSIGHT_DAYS: u32 = 3650;

/// Calculate percentage change between previous and current values.
/// Returns `None` if the previous value is zero.
pub fn percent_change(previous: f64, current: f64) -> Option<f64> {
    if previous.abs() < f64::EPSILON {
        None
    } else {
        Some(((current - previous) / previous) * 100.0)
    }
}

#[derive(Default)]
struct WindowTotals {
    messages: u64,
    sessions: u64,
    tool_calls: u64,
    tokens: u64,
}

/// Sum the counters over `[first, last]`, inclusive
fn window_totals(cache: &StatsCache, first: NaiveDate, last: NaiveDate) -> WindowTotals {
    let mut totals = WindowTotals::default();
    for day in cache
        .daily_activity
        .iter()
        .filter(|d| d.date >= first && d.date <= last)
    {
        totals.messages += day.message_count;
        totals.sessions += day.session_count;
        totals.tool_calls += day.tool_call_count;
    }
    totals.tokens = cache
        .daily_model_tokens
        .iter()
        .filter(|d| d.date >= first && d.date <= last)
        .map(|d| d.total())
        .sum();
    totals
}

/// Compare the `current_days` ending `today` with the `previous_days`
/// immediately before them.
pub fn compare_periods(
    cache: &StatsCache,
    current_days: u32,
    previous_days: u32,
    today: NaiveDate,
) -> PeriodComparison {
    let current_days = current_days.clamp(1, MAX_INSIGHT_DAYS);
    let previous_days = previous_days.clamp(1, MAX_INSIGHT_DAYS);

    let current_first = today - Duration::days(i64::from(current_days) - 1);
    let previous_last = current_first - Duration::days(1);
    let previous_first = previous_last - Duration::days(i64::from(previous_days) - 1);

    let current = window_totals(cache, current_first, today);
    let previous = window_totals(cache, previous_first, previous_last);

    PeriodComparison {
        period_label: format!("Last {} days", current_days),
        comparison_label: format!("vs previous {} days", previous_days),
        messages: MetricComparison::new(current.messages as f64, previous.messages as f64),
        sessions: MetricComparison::new(current.sessions as f64, previous.sessions as f64),
        tool_calls: MetricComparison::new(current.tool_calls as f64, previous.tool_calls as f64),
        tokens: MetricComparison::new(current.tokens as f64, previous.tokens as f64),
    }
}

/// Exactly `days` chronological points ending `today`, capped at
/// [`MAX_INSIGHT_DAYS`]; days without data are zero
pub fn trend_series(
    cache: &StatsCache,
    metric: TrendMetric,
    days: u32,
    today: NaiveDate,
) -> Vec<TrendPoint> {
    (0..i64::from(days.min(MAX_INSIGHT_DAYS)))
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            TrendPoint {
                date,
                value: metric.value_on(cache, date),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insights::stats_cache::{DailyActivity, DailyModelTokens};
    use std::collections::BTreeMap;

    fn day(date: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap()
    }

    fn activity(date: &str, messages: u64, sessions: u64) -> DailyActivity {
        DailyActivity {
            date: day(date),
            message_count: messages,
            session_count: sessions,
            tool_call_count: messages / 2,
        }
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(100.0, 150.0), Some(50.0));
        assert_eq!(percent_change(100.0, 50.0), Some(-50.0));
        assert_eq!(percent_change(0.0, 100.0), None);
        assert_eq!(percent_change(0.0, 0.0), None);
    }

    #[test]
    fn test_compare_periods_uses_adjacent_windows() {
        let cache = StatsCache {
            daily_activity: vec![
                // previous window: Mar 4..=Mar 6
                activity("2026-03-04", 50, 1),
                activity("2026-03-06", 50, 1),
                // current window: Mar 7..=Mar 9
                activity("2026-03-08", 100, 2),
                activity("2026-03-09", 50, 1),
                // outside both
                activity("2026-03-01", 999, 9),
            ],
            daily_model_tokens: vec![DailyModelTokens {
                date: day("2026-03-09"),
                tokens_by_model: BTreeMap::from([("opus".to_string(), 400)]),
            }],
            ..Default::default()
        };

        let cmp = compare_periods(&cache, 3, 3, day("2026-03-09"));
        assert_eq!(cmp.messages.current, 150.0);
        assert_eq!(cmp.messages.previous, 100.0);
        assert_eq!(cmp.messages.percent_change, Some(50.0));
        assert_eq!(cmp.sessions.percent_change, Some(50.0));
        assert_eq!(cmp.tokens.current, 400.0);
        assert_eq!(cmp.tokens.percent_change, None);
        assert_eq!(cmp.period_label, "Last 3 days");
    }

    #[test]
    fn test_trend_series_is_fixed_length_and_zero_filled() {
        let cache = StatsCache {
            daily_activity: vec![activity("2026-03-07", 10, 1), activity("2026-03-09", 30, 2)],
            ..Default::default()
        };
        let series = trend_series(&cache, TrendMetric::Messages, 7, day("2026-03-09"));
        assert_eq!(series.len(), 7);
        assert_eq!(series[0].date, day("2026-03-03"));
        assert_eq!(series[6].date, day("2026-03-09"));
        let values: Vec<u64> = series.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![0, 0, 0, 0, 10, 0, 30]);
    }

    #[test]
    fn test_oversized_windows_are_capped() {
        let cache = StatsCache {
            daily_activity: vec![activity("2016-03-13", 10, 1), activity("2016-03-11", 99, 9)],
            ..Default::default()
        };
        let cmp = compare_periods(&cache, u32::MAX, u32::MAX, day("2026-03-09"));
        assert_eq!(cmp.period_label, "Last 3650 days");
        assert_eq!(cmp.comparison_label, "vs previous 3650 days");
        assert_eq!(cmp.messages.current, 10.0);
        assert_eq!(cmp.messages.previous, 99.0);

        let series = trend_series(&cache, TrendMetric::Messages, u32::MAX, day("2026-03-09"));
        assert_eq!(series.len(), MAX_INSIGHT_DAYS as usize);
        assert_eq!(series[0].date, day("2016-03-12"));
    }

    #[test]
    fn test_trend_series_tokens() {
        let cache = StatsCache {
            daily_model_tokens: vec![DailyModelTokens {
                date: day("2026-03-09"),
                tokens_by_model: BTreeMap::from([
                    ("a".to_string(), 1),
                    ("b".to_string(), 2),
                ]),
            }],
            ..Default::default()
        };
        let series = trend_series(&cache, TrendMetric::Tokens, 2, day("2026-03-09"));
        assert_eq!(series[1].value, 3);
    }
}
