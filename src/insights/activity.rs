use chrono::{Duration, NaiveDate};
use serde::Serialize;

use super::stats_cache::StatsCache;

fn is_active_on(cache: &StatsCache, date: NaiveDate) -> bool {
    cache
        .activity_on(date)
        .map(|d| d.is_active())
        .unwrap_or(false)
}

/// Consecutive active days ending today, or ending yesterday when today has
/// no activity yet.
pub fn current_streak(cache: &StatsCache, today: NaiveDate) -> u32 {
    let mut cursor = if is_active_on(cache, today) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut streak = 0;
    while is_active_on(cache, cursor) {
        streak += 1;
        cursor -= Duration::days(1);
    }
    streak
}

/// Longest run of consecutive active days anywhere in the history
pub fn longest_streak(cache: &StatsCache) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;

    for day in cache.daily_activity.iter().filter(|d| d.is_active()) {
        run = match previous {
            Some(prev) if day.date - prev == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(day.date);
    }
    longest
}

/// Busiest hour of day; ties go to the earliest hour, `None` if nothing was recorded
pub fn peak_hour(cache: &StatsCache) -> Option<u8> {
    let hours = cache.hour_histogram();
    let mut best: Option<(usize, u64)> = None;
    for (hour, &count) in hours.iter().enumerate() {
        if count == 0 {
            continue;
        }
        match best {
            Some((_, top)) if count <= top => {}
            _ => best = Some((hour, count)),
        }
    }
    best.map(|(hour, _)| hour as u8)
}

/// Day with the most messages; the earliest wins a tie
pub fn busiest_day(cache: &StatsCache) -> Option<(NaiveDate, u64)> {
    let mut best: Option<(NaiveDate, u64)> = None;
    for day in &cache.daily_activity {
        if day.message_count == 0 {
            continue;
        }
        match best {
            Some((_, top)) if day.message_count <= top => {}
            _ => best = Some((day.date, day.message_count)),
        }
    }
    best
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivedRates {
    pub messages_per_session: Option<f64>,
    pub tool_calls_per_message: Option<f64>,
    /// Cache reads over all input-side tokens, 0..=1
    pub cache_hit_rate: Option<f64>,
    pub output_input_ratio: Option<f64>,
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator > 0.0 {
        Some(numerator / denominator)
    } else {
        None
    }
}

pub fn derived_rates(cache: &StatsCache) -> DerivedRates {
    let tool_calls: u64 = cache.daily_activity.iter().map(|d| d.tool_call_count).sum();
    let activity_messages: u64 = cache.daily_activity.iter().map(|d| d.message_count).sum();

    let mut input = 0u64;
    let mut output = 0u64;
    let mut cache_read = 0u64;
    let mut cache_creation = 0u64;
    for usage in cache.model_usage.values() {
        input += usage.input_tokens;
        output += usage.output_tokens;
        cache_read += usage.cache_read_input_tokens;
        cache_creation += usage.cache_creation_input_tokens;
    }

    DerivedRates {
        messages_per_session: ratio(cache.total_messages as f64, cache.total_sessions as f64),
        tool_calls_per_message: ratio(tool_calls as f64, activity_messages as f64),
        cache_hit_rate: ratio(
            cache_read as f64,
            (input + cache_read + cache_creation) as f64,
        ),
        output_input_ratio: ratio(output as f64, input as f64),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelShare {
    pub model: String,
    pub total_tokens: u64,
    /// 0..=1 of all tokens across models
    pub share: f64,
}

/// Per-model token totals, largest first
pub fn model_shares(cache: &StatsCache) -> Vec<ModelShare> {
    let grand_total: u64 = cache.model_usage.values().map(|u| u.total()).sum();
    let mut shares: Vec<ModelShare> = cache
        .model_usage
        .iter()
        .map(|(model, usage)| ModelShare {
            model: model.clone(),
            total_tokens: usage.total(),
            share: ratio(usage.total() as f64, grand_total as f64).unwrap_or(0.0),
        })
        .collect();
    shares.sort_by(|a, b| {
        b.total_tokens
            .cmp(&a.total_tokens)
            .then_with(|| a.model.cmp(&b.model))
    });
    shares
}
