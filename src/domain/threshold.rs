//! Pass/fail assertions over run metrics.
//!
//! Expressions follow the k6 threshold syntax: `p(95)<2000`, `rate<0.10`,
//! `avg <= 300`, `count>0`.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::LoadError;
use crate::metrics::{MetricKind, MetricRegistry, MetricSummary};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregate {
    Percentile(f64),
    Avg,
    Min,
    Max,
    Med,
    Count,
    Rate,
}

impl Aggregate {
    fn applies_to(self, kind: MetricKind) -> bool {
        match self {
            Aggregate::Percentile(_)
            | Aggregate::Avg
            | Aggregate::Min
            | Aggregate::Max
            | Aggregate::Med => kind == MetricKind::Trend,
            Aggregate::Count => kind == MetricKind::Counter,
            Aggregate::Rate => matches!(kind, MetricKind::Counter | MetricKind::Rate),
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregate::Percentile(p) => write!(f, "p({p})"),
            Aggregate::Avg => write!(f, "avg"),
            Aggregate::Min => write!(f, "min"),
            Aggregate::Max => write!(f, "max"),
            Aggregate::Med => write!(f, "med"),
            Aggregate::Count => write!(f, "count"),
            Aggregate::Rate => write!(f, "rate"),
        }
    }
}

impl FromStr for Aggregate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avg" => Ok(Aggregate::Avg),
            "min" => Ok(Aggregate::Min),
            "max" => Ok(Aggregate::Max),
            "med" => Ok(Aggregate::Med),
            "count" => Ok(Aggregate::Count),
            "rate" => Ok(Aggregate::Rate),
            _ => {
                let inner = s
                    .strip_prefix("p(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .ok_or_else(|| format!("unknown aggregate '{s}'"))?;
                let p: f64 = inner
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid percentile '{inner}'"))?;
                if !(0.0..=100.0).contains(&p) {
                    return Err(format!("percentile {p} outside 0..=100"));
                }
                Ok(Aggregate::Percentile(p))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Comparison {
    #[strum(serialize = "<")]
    Lt,
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">")]
    Gt,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "==")]
    Eq,
    #[strum(serialize = "!=")]
    Ne,
}

impl Comparison {
    pub fn holds(self, observed: f64, bound: f64) -> bool {
        match self {
            Comparison::Lt => observed < bound,
            Comparison::Le => observed <= bound,
            Comparison::Gt => observed > bound,
            Comparison::Ge => observed >= bound,
            Comparison::Eq => observed == bound,
            Comparison::Ne => observed != bound,
        }
    }
}

/// One parsed expression, e.g. `p(95)<2000`.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdExpr {
    pub aggregate: Aggregate,
    pub comparison: Comparison,
    pub bound: f64,
}

impl ThresholdExpr {
    pub fn parse(input: &str) -> Result<Self, String> {
        // Two-character operators first so "<=" is not read as "<".
        const OPERATORS: [(&str, Comparison); 6] = [
            ("<=", Comparison::Le),
            (">=", Comparison::Ge),
            ("==", Comparison::Eq),
            ("!=", Comparison::Ne),
            ("<", Comparison::Lt),
            (">", Comparison::Gt),
        ];

        let (position, token, comparison) = OPERATORS
            .iter()
            .filter_map(|(token, cmp)| input.find(token).map(|pos| (pos, *token, *cmp)))
            .min_by_key(|(pos, token, _)| (*pos, std::cmp::Reverse(token.len())))
            .ok_or_else(|| "missing comparison operator".to_string())?;

        let aggregate: Aggregate = input[..position].trim().parse()?;
        let bound_str = input[position + token.len()..].trim();
        let bound: f64 = bound_str
            .parse()
            .map_err(|_| format!("unparsable bound '{bound_str}'"))?;

        Ok(Self {
            aggregate,
            comparison,
            bound,
        })
    }

    /// Observed value of this expression's aggregate, if the metric has data.
    pub fn observe(&self, summary: &MetricSummary, elapsed: Duration) -> Option<f64> {
        match (self.aggregate, summary) {
            (Aggregate::Percentile(p), MetricSummary::Trend(trend)) => trend.percentile(p),
            (Aggregate::Avg, MetricSummary::Trend(trend)) => trend.avg(),
            (Aggregate::Min, MetricSummary::Trend(trend)) => trend.min(),
            (Aggregate::Max, MetricSummary::Trend(trend)) => trend.max(),
            (Aggregate::Med, MetricSummary::Trend(trend)) => trend.med(),
            (Aggregate::Count, MetricSummary::Counter { count }) => Some(*count as f64),
            (Aggregate::Rate, MetricSummary::Counter { count }) => {
                let secs = elapsed.as_secs_f64();
                (secs > 0.0).then(|| *count as f64 / secs)
            }
            (Aggregate::Rate, MetricSummary::Rate { .. }) => summary.rate(),
            _ => None,
        }
    }
}

impl fmt::Display for ThresholdExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.aggregate, self.comparison, self.bound)
    }
}

/// All expressions attached to one metric.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: String,
    pub expressions: Vec<ThresholdExpr>,
}

impl Threshold {
    pub fn parse<S: AsRef<str>>(metric: &str, expressions: &[S]) -> Result<Self, LoadError> {
        let expressions = expressions
            .iter()
            .map(|expr| {
                ThresholdExpr::parse(expr.as_ref()).map_err(|reason| LoadError::InvalidThreshold {
                    metric: metric.to_string(),
                    expr: expr.as_ref().to_string(),
                    reason,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            metric: metric.to_string(),
            expressions,
        })
    }

    /// Check the metric exists in the run and every aggregate fits its kind.
    pub fn validate(&self, registry: &MetricRegistry) -> Result<(), LoadError> {
        let kind = registry
            .kind_of(&self.metric)
            .ok_or_else(|| LoadError::UnknownMetric(self.metric.clone()))?;
        for expr in &self.expressions {
            if !expr.aggregate.applies_to(kind) {
                return Err(LoadError::InvalidThreshold {
                    metric: self.metric.clone(),
                    expr: expr.to_string(),
                    reason: format!("aggregate {} does not apply to a {kind} metric", expr.aggregate),
                });
            }
        }
        Ok(())
    }

    /// Evaluate every expression. A metric without samples cannot breach a
    /// threshold, so such expressions pass with no observed value.
    pub fn evaluate(&self, summary: Option<&MetricSummary>, elapsed: Duration) -> Vec<ThresholdOutcome> {
        self.expressions
            .iter()
            .map(|expr| {
                let observed = summary.and_then(|s| expr.observe(s, elapsed));
                ThresholdOutcome {
                    metric: self.metric.clone(),
                    expression: expr.to_string(),
                    observed,
                    passed: observed.map_or(true, |value| expr.comparison.holds(value, expr.bound)),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdOutcome {
    pub metric: String,
    pub expression: String,
    pub observed: Option<f64>,
    pub passed: bool,
}
