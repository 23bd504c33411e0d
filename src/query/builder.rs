use std::collections::BTreeMap;
use std::fmt;

/// Range-vector function applied to a selector: `fn(selector[window])`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeFunction {
    Rate,
    Increase,
    LastOverTime,
    MaxOverTime,
}

impl RangeFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeFunction::Rate => "rate",
            RangeFunction::Increase => "increase",
            RangeFunction::LastOverTime => "last_over_time",
            RangeFunction::MaxOverTime => "max_over_time",
        }
    }
}

/// A range function together with its window literal (e.g. `5m`, `1d`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeTransform {
    pub function: RangeFunction,
    pub window: String,
}

impl RangeTransform {
    pub fn new(function: RangeFunction, window: impl Into<String>) -> Self {
        Self {
            function,
            window: window.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregationOp {
    Sum,
    Avg,
}

impl AggregationOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationOp::Sum => "sum",
            AggregationOp::Avg => "avg",
        }
    }
}

/// Outer aggregation. `by` keeps the caller's order since it shapes the
/// grouping of the result, not the identity of the query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Aggregation {
    pub op: AggregationOp,
    pub by: Vec<String>,
}

impl Aggregation {
    pub fn new(op: AggregationOp) -> Self {
        Self { op, by: Vec::new() }
    }

    pub fn by<I, S>(op: AggregationOp, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            op,
            by: labels.into_iter().map(Into::into).collect(),
        }
    }
}

/// Label-equality filters. Backed by a `BTreeMap` so rendering is always in
/// sorted key order regardless of insertion order.
pub type LabelFilters = BTreeMap<String, String>;

/// Immutable description of a single PromQL expression.
///
/// ```
/// use ccpulse::query::{Query, AggregationOp};
///
/// let q = Query::new("claude_code_cost_usage_USD_total")
///     .filter("model", "claude-sonnet-4-5")
///     .increase("1d")
///     .aggregate_by(AggregationOp::Sum, ["session_id"]);
/// assert_eq!(
///     q.render(),
///     r#"sum by (session_id) (increase(claude_code_cost_usage_USD_total{model="claude-sonnet-4-5"}[1d]))"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    metric: String,
    filters: LabelFilters,
    transform: Option<RangeTransform>,
    aggregation: Option<Aggregation>,
}

impl Query {
    pub fn new(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            filters: LabelFilters::new(),
            transform: None,
            aggregation: None,
        }
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn filters(&self) -> &LabelFilters {
        &self.filters
    }

    /// Add a label-equality filter. A repeated key replaces the earlier value.
    pub fn filter(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(label.into(), value.into());
        self
    }

    pub fn filters_from(mut self, filters: &LabelFilters) -> Self {
        for (label, value) in filters {
            self.filters.insert(label.clone(), value.clone());
        }
        self
    }

    pub fn transform(mut self, transform: RangeTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn rate(self, window: impl Into<String>) -> Self {
        self.transform(RangeTransform::new(RangeFunction::Rate, window))
    }

    pub fn increase(self, window: impl Into<String>) -> Self {
        self.transform(RangeTransform::new(RangeFunction::Increase, window))
    }

    pub fn last_over_time(self, window: impl Into<String>) -> Self {
        self.transform(RangeTransform::new(RangeFunction::LastOverTime, window))
    }

    pub fn max_over_time(self, window: impl Into<String>) -> Self {
        self.transform(RangeTransform::new(RangeFunction::MaxOverTime, window))
    }

    pub fn aggregate(mut self, op: AggregationOp) -> Self {
        self.aggregation = Some(Aggregation::new(op));
        self
    }

    pub fn aggregate_by<I, S>(mut self, op: AggregationOp, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aggregation = Some(Aggregation::by(op, labels));
        self
    }

    pub fn sum(self) -> Self {
        self.aggregate(AggregationOp::Sum)
    }

    pub fn render(&self) -> String {
        build(
            &self.metric,
            &self.filters,
            self.transform.as_ref(),
            self.aggregation.as_ref(),
        )
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Render a query from its parts. Pure string construction.
pub fn build(
    metric: &str,
    filters: &LabelFilters,
    transform: Option<&RangeTransform>,
    aggregation: Option<&Aggregation>,
) -> String {
    let mut expr = selector(metric, filters);

    if let Some(t) = transform {
        expr = format!("{}({}[{}])", t.function.as_str(), expr, t.window);
    }

    if let Some(agg) = aggregation {
        expr = if agg.by.is_empty() {
            format!("{}({})", agg.op.as_str(), expr)
        } else {
            format!("{} by ({}) ({})", agg.op.as_str(), agg.by.join(","), expr)
        };
    }

    expr
}

fn selector(metric: &str, filters: &LabelFilters) -> String {
    if filters.is_empty() {
        return metric.to_string();
    }

    let matchers: Vec<String> = filters
        .iter()
        .map(|(label, value)| format!("{}=\"{}\"", label, escape_label_value(value)))
        .collect();
    format!("{}{{{}}}", metric, matchers.join(","))
}

fn escape_label_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
