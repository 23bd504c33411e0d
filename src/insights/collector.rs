use chrono::NaiveDate;
use serde::Serialize;

use super::activity::{
    busiest_day, current_streak, derived_rates, longest_streak, model_shares, peak_hour,
    DerivedRates, ModelShare,
};
use super::stats_cache::StatsCache;
use super::trends::{
    compare_periods, trend_series, PeriodComparison, TrendMetric, TrendPoint, MAX_INSIGHT_DAYS,
};

/// Everything the insights view shows, derived from one stats snapshot
#[derive(Debug, Clone, Serialize)]
pub struct InsightsReport {
    pub days: u32,
    pub today: NaiveDate,
    pub total_sessions: u64,
    pub total_messages: u64,
    pub comparison: PeriodComparison,
    pub messages_trend: Vec<TrendPoint>,
    pub sessions_trend: Vec<TrendPoint>,
    pub tokens_trend: Vec<TrendPoint>,
    pub peak: PeakActivity,
    pub rates: DerivedRates,
    pub models: Vec<ModelShare>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeakActivity {
    pub most_active_hour: Option<u8>,
    pub longest_session_minutes: Option<u64>,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub busiest_day: Option<NaiveDate>,
    pub busiest_day_messages: u64,
    pub member_since: Option<NaiveDate>,
}

impl InsightsReport {
    /// Compare the last `days` with the `days` before them and build the
    /// `days`-long trend series ending `today`. `days` is kept within
    /// `1..=MAX_INSIGHT_DAYS`.
    pub fn build(cache: &StatsCache, days: u32, today: NaiveDate) -> Self {
        let days = days.clamp(1, MAX_INSIGHT_DAYS);
        let busiest = busiest_day(cache);

        let peak = PeakActivity {
            most_active_hour: peak_hour(cache),
            longest_session_minutes: cache
                .longest_session
                .as_ref()
                .map(|s| s.duration / 60_000),
            current_streak: current_streak(cache, today),
            longest_streak: longest_streak(cache),
            busiest_day: busiest.map(|(date, _)| date),
            busiest_day_messages: busiest.map(|(_, n)| n).unwrap_or(0),
            member_since: cache.member_since(),
        };

        InsightsReport {
            days,
            today,
            total_sessions: cache.total_sessions,
            total_messages: cache.total_messages,
            comparison: compare_periods(cache, days, days, today),
            messages_trend: trend_series(cache, TrendMetric::Messages, days, today),
            sessions_trend: trend_series(cache, TrendMetric::Sessions, days, today),
            tokens_trend: trend_series(cache, TrendMetric::Tokens, days, today),
            peak,
            rates: derived_rates(cache),
            models: model_shares(cache),
        }
    }
}
