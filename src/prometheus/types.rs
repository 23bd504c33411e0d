use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error::MetricsError;

/// Label name → value, as reported by the backend
pub type Labels = BTreeMap<String, String>;

/// Envelope shared by every Prometheus HTTP API response
#[derive(Debug, Deserialize)]
pub(crate) struct ApiEnvelope<T> {
    pub status: String,
    pub data: Option<T>,
    #[serde(default, rename = "errorType")]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn into_data(self) -> Result<T, MetricsError> {
        if self.status != "success" {
            return Err(MetricsError::Query {
                error_type: self.error_type.unwrap_or_else(|| "unknown".to_string()),
                message: self.error.unwrap_or_else(|| format!("status {}", self.status)),
            });
        }
        self.data
            .ok_or_else(|| MetricsError::Decode("success response without data".to_string()))
    }
}

/// Only the error fields, used to classify non-2xx bodies
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub status: String,
    #[serde(default, rename = "errorType")]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorEnvelope {
    pub fn into_error(self) -> Option<MetricsError> {
        if self.status != "error" {
            return None;
        }
        Some(MetricsError::Query {
            error_type: self.error_type.unwrap_or_else(|| "unknown".to_string()),
            message: self.error.unwrap_or_default(),
        })
    }
}

type RawPoint = (f64, String);

#[derive(Debug, Deserialize)]
pub(crate) struct RawVectorSample {
    #[serde(default)]
    pub metric: Labels,
    pub value: RawPoint,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSeries {
    #[serde(default)]
    pub metric: Labels,
    #[serde(default)]
    pub values: Vec<RawPoint>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub(crate) enum QueryData {
    Vector(Vec<RawVectorSample>),
    Matrix(Vec<RawSeries>),
    Scalar(RawPoint),
    String(RawPoint),
}

impl QueryData {
    pub fn into_samples(self) -> Result<Vec<MetricSample>, MetricsError> {
        match self {
            QueryData::Vector(raw) => raw
                .into_iter()
                .map(|s| {
                    Ok(MetricSample {
                        timestamp: s.value.0,
                        value: parse_sample_value(&s.value.1)?,
                        labels: s.metric,
                    })
                })
                .collect(),
            QueryData::Scalar((ts, v)) | QueryData::String((ts, v)) => Ok(vec![MetricSample {
                timestamp: ts,
                value: parse_sample_value(&v)?,
                labels: Labels::new(),
            }]),
            QueryData::Matrix(_) => Err(MetricsError::Decode(
                "expected an instant vector, got a matrix".to_string(),
            )),
        }
    }

    pub fn into_series(self) -> Result<Vec<Series>, MetricsError> {
        match self {
            QueryData::Matrix(raw) => raw
                .into_iter()
                .map(|s| {
                    let points = s
                        .values
                        .into_iter()
                        .map(|(ts, v)| {
                            Ok(SeriesPoint {
                                timestamp: ts,
                                value: parse_sample_value(&v)?,
                            })
                        })
                        .collect::<Result<Vec<_>, MetricsError>>()?;
                    Ok(Series {
                        labels: s.metric,
                        points,
                    })
                })
                .collect(),
            _ => Err(MetricsError::Decode(
                "expected a range matrix".to_string(),
            )),
        }
    }
}

/// Decode the backend's string-encoded sample value.
///
/// `"NaN"`, `"+Inf"` and `"-Inf"` are legitimate results of arithmetic over
/// series and decode to the matching special values.
pub fn parse_sample_value(raw: &str) -> Result<f64, MetricsError> {
    match raw {
        "NaN" => Ok(f64::NAN),
        "+Inf" | "Inf" => Ok(f64::INFINITY),
        "-Inf" => Ok(f64::NEG_INFINITY),
        other => other
            .parse::<f64>()
            .map_err(|_| MetricsError::Decode(format!("invalid sample value {:?}", other))),
    }
}

/// Inverse of [`parse_sample_value`]
pub fn format_sample_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

/// Serde adapter keeping special float values intact through JSON
mod sample_value {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_sample_value(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_sample_value(&raw).map_err(serde::de::Error::custom)
    }
}

/// One value of an instant query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Unix seconds
    pub timestamp: f64,
    #[serde(with = "sample_value")]
    pub value: f64,
    pub labels: Labels,
}

impl MetricSample {
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels.get(name).map(String::as_str)
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis((self.timestamp * 1000.0) as i64)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub timestamp: f64,
    #[serde(with = "sample_value")]
    pub value: f64,
}

/// One series of a range query, with its own label set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub labels: Labels,
    pub points: Vec<SeriesPoint>,
}

/// `/api/v1/status/buildinfo`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub revision: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default)]
    pub build_date: String,
    #[serde(default)]
    pub go_version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawTargets {
    #[serde(default)]
    pub active_targets: Vec<RawTarget>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawTarget {
    #[serde(default)]
    pub labels: Labels,
    #[serde(default)]
    pub scrape_url: String,
    #[serde(default)]
    pub health: String,
    #[serde(default)]
    pub last_error: String,
}

/// Scrape target that is not reporting as healthy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetIssue {
    pub job: String,
    pub scrape_url: String,
    pub health: String,
    pub last_error: String,
}

/// Condensed view of `/api/v1/targets`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TargetsSummary {
    pub active: usize,
    pub healthy: usize,
    pub issues: Vec<TargetIssue>,
}

impl From<RawTargets> for TargetsSummary {
    fn from(raw: RawTargets) -> Self {
        let active = raw.active_targets.len();
        let mut healthy = 0;
        let mut issues = Vec::new();
        for target in raw.active_targets {
            if target.health == "up" {
                healthy += 1;
            } else {
                issues.push(TargetIssue {
                    job: target.labels.get("job").cloned().unwrap_or_default(),
                    scrape_url: target.scrape_url,
                    health: target.health,
                    last_error: target.last_error,
                });
            }
        }
        TargetsSummary {
            active,
            healthy,
            issues,
        }
    }
}
