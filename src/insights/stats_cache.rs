use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum StatsCacheError {
    #[error("stats file not found at {0} (use Claude Code to generate usage data)")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse stats file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// `null` and missing both mean "empty"
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyActivity {
    pub date: NaiveDate,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub session_count: u64,
    #[serde(default)]
    pub tool_call_count: u64,
}

impl DailyActivity {
    pub fn is_active(&self) -> bool {
        self.message_count > 0 || self.session_count > 0 || self.tool_call_count > 0
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyModelTokens {
    pub date: NaiveDate,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tokens_by_model: BTreeMap<String, u64>,
}

impl DailyModelTokens {
    pub fn total(&self) -> u64 {
        self.tokens_by_model.values().sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
}

impl ModelUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens
            + self.output_tokens
            + self.cache_read_input_tokens
            + self.cache_creation_input_tokens
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LongestSession {
    #[serde(default)]
    pub session_id: Option<String>,
    /// Milliseconds
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Parsed `~/.claude/stats-cache.json`, written by Claude Code itself.
///
/// Daily entries are kept in chronological order once loaded.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsCache {
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub last_computed_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub daily_activity: Vec<DailyActivity>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub daily_model_tokens: Vec<DailyModelTokens>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub model_usage: BTreeMap<String, ModelUsage>,
    #[serde(default)]
    pub total_sessions: u64,
    #[serde(default)]
    pub total_messages: u64,
    #[serde(default)]
    pub longest_session: Option<LongestSession>,
    #[serde(default)]
    pub first_session_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hour_counts: HashMap<String, u64>,
}

impl StatsCache {
    pub fn from_json(raw: &str) -> Result<Self, StatsCacheError> {
        let mut cache: StatsCache = serde_json::from_str(raw)?;
        cache.daily_activity.sort_by_key(|d| d.date);
        cache.daily_model_tokens.sort_by_key(|d| d.date);
        Ok(cache)
    }

    pub fn load(path: &Path) -> Result<Self, StatsCacheError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StatsCacheError::NotFound(path.to_path_buf())
            } else {
                StatsCacheError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        Self::from_json(&raw)
    }

    /// Hour-of-day counts; keys outside "0".."23" are ignored
    pub fn hour_histogram(&self) -> [u64; 24] {
        let mut hours = [0u64; 24];
        for (key, count) in &self.hour_counts {
            if let Ok(hour) = key.trim().parse::<usize>() {
                if let Some(slot) = hours.get_mut(hour) {
                    *slot += count;
                }
            }
        }
        hours
    }

    pub fn activity_on(&self, date: NaiveDate) -> Option<&DailyActivity> {
        self.daily_activity
            .binary_search_by_key(&date, |d| d.date)
            .ok()
            .map(|i| &self.daily_activity[i])
    }

    pub fn tokens_on(&self, date: NaiveDate) -> u64 {
        self.daily_model_tokens
            .binary_search_by_key(&date, |d| d.date)
            .map(|i| self.daily_model_tokens[i].total())
            .unwrap_or(0)
    }

    /// Date part of `firstSessionDate`, which is an RFC 3339 timestamp
    pub fn member_since(&self) -> Option<NaiveDate> {
        let raw = self.first_session_date.as_deref()?;
        let date = raw.get(..10)?;
        NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
    }
}

/// Loads the stats file once and hands out the same snapshot until refreshed
#[derive(Debug)]
pub struct StatsCacheStore {
    path: PathBuf,
    cached: RwLock<Option<Arc<StatsCache>>>,
}

impl StatsCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cached: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached snapshot, reading the file on first use
    pub fn load(&self) -> Result<Arc<StatsCache>, StatsCacheError> {
        {
            let cached = self.cached.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cache) = cached.as_ref() {
                return Ok(Arc::clone(cache));
            }
        }
        self.refresh()
    }

    /// Re-read the file, replacing the cached snapshot on success
    pub fn refresh(&self) -> Result<Arc<StatsCache>, StatsCacheError> {
        let cache = Arc::new(StatsCache::load(&self.path)?);
        info!(
            path = %self.path.display(),
            days = cache.daily_activity.len(),
            "loaded stats cache"
        );
        let mut cached = self.cached.write().unwrap_or_else(|e| e.into_inner());
        *cached = Some(Arc::clone(&cache));
        Ok(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "version": 2,
        "lastComputedDate": "2026-03-10",
        "dailyActivity": [
            {"date": "2026-03-09", "messageCount": 40, "sessionCount": 3, "toolCallCount": 12},
            {"date": "2026-03-07", "messageCount": 10, "sessionCount": 1, "toolCallCount": 2}
        ],
        "dailyModelTokens": [
            {"date": "2026-03-09", "tokensByModel": {"claude-opus-4": 1000, "claude-haiku-4": 500}}
        ],
        "modelUsage": {
            "claude-opus-4": {"inputTokens": 10, "outputTokens": 20, "cacheReadInputTokens": 30, "cacheCreationInputTokens": 40}
        },
        "totalSessions": 4,
        "totalMessages": 50,
        "longestSession": {"sessionId": "s-1", "duration": 5400000, "messageCount": 80, "timestamp": "2026-03-09T10:00:00Z"},
        "firstSessionDate": "2025-11-02T08:15:00.000Z",
        "hourCounts": {"9": 5, "14": 7, "24": 100, "x": 1}
    }"#;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_parse_sorts_daily_activity() {
        let cache = StatsCache::from_json(SAMPLE).unwrap();
        assert_eq!(cache.daily_activity[0].date, date("2026-03-07"));
        assert_eq!(cache.daily_activity[1].date, date("2026-03-09"));
        assert_eq!(cache.total_messages, 50);
        assert_eq!(cache.model_usage["claude-opus-4"].total(), 100);
    }

    #[test]
    fn test_lookups() {
        let cache = StatsCache::from_json(SAMPLE).unwrap();
        assert_eq!(cache.activity_on(date("2026-03-09")).unwrap().message_count, 40);
        assert!(cache.activity_on(date("2026-03-08")).is_none());
        assert_eq!(cache.tokens_on(date("2026-03-09")), 1500);
        assert_eq!(cache.tokens_on(date("2026-03-07")), 0);
        assert_eq!(cache.member_since(), Some(date("2025-11-02")));
    }

    #[test]
    fn test_hour_histogram_ignores_bad_keys() {
        let cache = StatsCache::from_json(SAMPLE).unwrap();
        let hours = cache.hour_histogram();
        assert_eq!(hours[9], 5);
        assert_eq!(hours[14], 7);
        assert_eq!(hours.iter().sum::<u64>(), 12);
    }

    #[test]
    fn test_nulls_and_missing_fields() {
        let cache =
            StatsCache::from_json(r#"{"dailyModelTokens": null, "hourCounts": null}"#).unwrap();
        assert!(cache.daily_activity.is_empty());
        assert!(cache.daily_model_tokens.is_empty());
        assert_eq!(cache.hour_histogram(), [0; 24]);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = StatsCache::load(&tmp.path().join("stats-cache.json")).unwrap_err();
        assert!(matches!(err, StatsCacheError::NotFound(_)));
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let err = StatsCache::from_json("{not json").unwrap_err();
        assert!(matches!(err, StatsCacheError::Parse(_)));
    }

    #[test]
    fn test_store_caches_until_refresh() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("stats-cache.json");
        std::fs::write(&path, r#"{"totalMessages": 1}"#).unwrap();

        let store = StatsCacheStore::new(&path);
        assert_eq!(store.load().unwrap().total_messages, 1);

        std::fs::write(&path, r#"{"totalMessages": 2}"#).unwrap();
        assert_eq!(store.load().unwrap().total_messages, 1);
        assert_eq!(store.refresh().unwrap().total_messages, 2);
        assert_eq!(store.load().unwrap().total_messages, 2);
    }

    #[test]
    fn test_failed_refresh_keeps_previous_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("stats-cache.json");
        std::fs::write(&path, r#"{"totalMessages": 7}"#).unwrap();

        let store = StatsCacheStore::new(&path);
        store.load().unwrap();
        std::fs::write(&path, "garbage").unwrap();
        assert!(store.refresh().is_err());
        assert_eq!(store.load().unwrap().total_messages, 7);
    }
}
