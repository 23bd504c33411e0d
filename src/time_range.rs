//! Time range selection and sampling policy.
//!
//! Every preset keeps `duration / step` between 10 and 200 points so a chart
//! never asks the backend for thousands of samples or renders a single dot.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const MINUTE_SECS: u64 = 60;
pub const FIVE_MINUTES_SECS: u64 = 5 * MINUTE_SECS;
pub const HOUR_SECS: u64 = 60 * MINUTE_SECS;
pub const DAY_SECS: u64 = 24 * HOUR_SECS;
pub const WEEK_SECS: u64 = 7 * DAY_SECS;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeRangeError {
    #[error("unknown time range: {0} (expected one of 15m, 1h, 12h, 1d, 1w, 2w, 30d, 90d)")]
    UnknownPreset(String),
    #[error("custom range end must be after start")]
    EmptyCustomRange,
    #[error("custom range must span at least one second")]
    SubSecondCustomRange,
    #[error("invalid timestamp (expected RFC 3339): {0}")]
    InvalidTimestamp(String),
    #[error("invalid date (expected YYYY-MM-DD): {0}")]
    InvalidDate(String),
}

/// Display resolution used to label and group chart points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketGranularity {
    Minute,
    Hour,
    Day,
}

/// Recommended sampling step for a range of the given length.
///
/// `< 12h` → 60s, `12h..24h` → 300s, `24h..7d` → 3600s, `≥ 7d` → 86400s.
pub fn step_for_duration(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if secs < 12 * HOUR_SECS {
        MINUTE_SECS
    } else if secs < DAY_SECS {
        FIVE_MINUTES_SECS
    } else if secs < WEEK_SECS {
        HOUR_SECS
    } else {
        DAY_SECS
    }
}

pub fn granularity_for_step(step_secs: u64) -> BucketGranularity {
    if step_secs < HOUR_SECS {
        BucketGranularity::Minute
    } else if step_secs < DAY_SECS {
        BucketGranularity::Hour
    } else {
        BucketGranularity::Day
    }
}

/// Named range presets offered by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRangePreset {
    Last15Minutes,
    LastHour,
    Last12Hours,
    LastDay,
    LastWeek,
    LastTwoWeeks,
    LastMonth,
    LastThreeMonths,
}

impl TimeRangePreset {
    pub const ALL: [TimeRangePreset; 8] = [
        TimeRangePreset::Last15Minutes,
        TimeRangePreset::LastHour,
        TimeRangePreset::Last12Hours,
        TimeRangePreset::LastDay,
        TimeRangePreset::LastWeek,
        TimeRangePreset::LastTwoWeeks,
        TimeRangePreset::LastMonth,
        TimeRangePreset::LastThreeMonths,
    ];

    pub fn duration_secs(&self) -> u64 {
        match self {
            TimeRangePreset::Last15Minutes => 15 * MINUTE_SECS,
            TimeRangePreset::LastHour => HOUR_SECS,
            TimeRangePreset::Last12Hours => 12 * HOUR_SECS,
            TimeRangePreset::LastDay => DAY_SECS,
            TimeRangePreset::LastWeek => WEEK_SECS,
            TimeRangePreset::LastTwoWeeks => 2 * WEEK_SECS,
            TimeRangePreset::LastMonth => 30 * DAY_SECS,
            TimeRangePreset::LastThreeMonths => 90 * DAY_SECS,
        }
    }

    /// PromQL range literal. Fixed per preset; Prometheus has no month unit,
    /// so the month presets are spelled in days.
    pub fn range_literal(&self) -> &'static str {
        match self {
            TimeRangePreset::Last15Minutes => "15m",
            TimeRangePreset::LastHour => "1h",
            TimeRangePreset::Last12Hours => "12h",
            TimeRangePreset::LastDay => "1d",
            TimeRangePreset::LastWeek => "1w",
            TimeRangePreset::LastTwoWeeks => "2w",
            TimeRangePreset::LastMonth => "30d",
            TimeRangePreset::LastThreeMonths => "90d",
        }
    }

    /// Sampling step. The one-week preset samples hourly (168 points) rather
    /// than daily, which would leave only 7 points.
    pub fn step_secs(&self) -> u64 {
        match self {
            TimeRangePreset::Last15Minutes | TimeRangePreset::LastHour => MINUTE_SECS,
            TimeRangePreset::Last12Hours => FIVE_MINUTES_SECS,
            TimeRangePreset::LastDay | TimeRangePreset::LastWeek => HOUR_SECS,
            TimeRangePreset::LastTwoWeeks
            | TimeRangePreset::LastMonth
            | TimeRangePreset::LastThreeMonths => DAY_SECS,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeRangePreset::Last15Minutes => "Last 15 minutes",
            TimeRangePreset::LastHour => "Last hour",
            TimeRangePreset::Last12Hours => "Last 12 hours",
            TimeRangePreset::LastDay => "Last 24 hours",
            TimeRangePreset::LastWeek => "Last 7 days",
            TimeRangePreset::LastTwoWeeks => "Last 14 days",
            TimeRangePreset::LastMonth => "Last 30 days",
            TimeRangePreset::LastThreeMonths => "Last 90 days",
        }
    }
}

impl FromStr for TimeRangePreset {
    type Err = TimeRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "15m" => Ok(TimeRangePreset::Last15Minutes),
            "1h" => Ok(TimeRangePreset::LastHour),
            "12h" => Ok(TimeRangePreset::Last12Hours),
            "1d" | "24h" => Ok(TimeRangePreset::LastDay),
            "7d" | "1w" => Ok(TimeRangePreset::LastWeek),
            "14d" | "2w" => Ok(TimeRangePreset::LastTwoWeeks),
            "30d" | "1mo" => Ok(TimeRangePreset::LastMonth),
            "90d" | "3mo" => Ok(TimeRangePreset::LastThreeMonths),
            other => Err(TimeRangeError::UnknownPreset(other.to_string())),
        }
    }
}

impl fmt::Display for TimeRangePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Resolved query parameters for a range
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeResolution {
    pub range: String,
    pub step_secs: u64,
    pub granularity: BucketGranularity,
}

/// A time range selection: a preset relative to now, or explicit bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRangeSpec {
    Preset(TimeRangePreset),
    Custom {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl TimeRangeSpec {
    /// Ranges are queried at whole-second resolution, so `end` must be at
    /// least one second after `start`.
    pub fn custom(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TimeRangeError> {
        if end <= start {
            return Err(TimeRangeError::EmptyCustomRange);
        }
        if (end - start).num_seconds() < 1 {
            return Err(TimeRangeError::SubSecondCustomRange);
        }
        Ok(TimeRangeSpec::Custom { start, end })
    }

    /// Explicit `start`/`end` bounds win, then a preset name, then `default`.
    pub fn from_inputs(
        range: Option<&str>,
        start: Option<&str>,
        end: Option<&str>,
        default: TimeRangeSpec,
    ) -> Result<Self, TimeRangeError> {
        if let (Some(start), Some(end)) = (start, end) {
            return TimeRangeSpec::custom(parse_instant(start)?, parse_instant(end)?);
        }
        match range {
            Some(range) => range.parse(),
            None => Ok(default),
        }
    }

    pub fn duration_secs(&self) -> u64 {
        match self {
            TimeRangeSpec::Preset(p) => p.duration_secs(),
            TimeRangeSpec::Custom { start, end } => (*end - *start).num_seconds().max(0) as u64,
        }
    }

    pub fn range_literal(&self) -> String {
        match self {
            TimeRangeSpec::Preset(p) => p.range_literal().to_string(),
            TimeRangeSpec::Custom { .. } => format!("{}s", self.duration_secs()),
        }
    }

    pub fn step_secs(&self) -> u64 {
        match self {
            TimeRangeSpec::Preset(p) => p.step_secs(),
            TimeRangeSpec::Custom { .. } => {
                step_for_duration(Duration::from_secs(self.duration_secs()))
            }
        }
    }

    pub fn granularity(&self) -> BucketGranularity {
        granularity_for_step(self.step_secs())
    }

    pub fn resolve(&self) -> RangeResolution {
        RangeResolution {
            range: self.range_literal(),
            step_secs: self.step_secs(),
            granularity: self.granularity(),
        }
    }

    /// Window for `rate()` in time-series queries, wide enough to always
    /// span several scrapes.
    pub fn rate_window(&self) -> &'static str {
        match self.granularity() {
            BucketGranularity::Minute => "5m",
            BucketGranularity::Hour => "1h",
            BucketGranularity::Day => "1d",
        }
    }

    /// Absolute `(start, end)` bounds; presets end at `now`.
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        match self {
            TimeRangeSpec::Preset(p) => (now - ChronoDuration::seconds(p.duration_secs() as i64), now),
            TimeRangeSpec::Custom { start, end } => (*start, *end),
        }
    }

    /// Instant at which totals are evaluated: the backend's "now" for
    /// presets, the explicit end for custom ranges.
    pub fn evaluation_time(&self) -> Option<DateTime<Utc>> {
        match self {
            TimeRangeSpec::Preset(_) => None,
            TimeRangeSpec::Custom { end, .. } => Some(*end),
        }
    }

    pub fn expected_points(&self) -> u64 {
        self.duration_secs() / self.step_secs().max(1)
    }

    pub fn label(&self) -> String {
        match self {
            TimeRangeSpec::Preset(p) => p.label().to_string(),
            TimeRangeSpec::Custom { start, end } => format!(
                "{} → {}",
                start.format("%Y-%m-%d %H:%M"),
                end.format("%Y-%m-%d %H:%M")
            ),
        }
    }
}

impl From<TimeRangePreset> for TimeRangeSpec {
    fn from(preset: TimeRangePreset) -> Self {
        TimeRangeSpec::Preset(preset)
    }
}

impl FromStr for TimeRangeSpec {
    type Err = TimeRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<TimeRangePreset>().map(TimeRangeSpec::Preset)
    }
}

/// RFC 3339 timestamp, normalised to UTC
pub fn parse_instant(raw: &str) -> Result<DateTime<Utc>, TimeRangeError> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| TimeRangeError::InvalidTimestamp(raw.to_string()))
}

/// Calendar date as `YYYY-MM-DD`
pub fn parse_date(raw: &str) -> Result<NaiveDate, TimeRangeError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| TimeRangeError::InvalidDate(raw.to_string()))
}
