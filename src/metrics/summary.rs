//! Point-in-time summaries of the in-memory metric series.

use serde::Serialize;
use std::collections::BTreeMap;

use super::MetricKind;

/// Sorted samples of a trend metric, in milliseconds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrendSummary {
    sorted: Vec<f64>,
}

impl TrendSummary {
    pub fn from_samples(mut samples: Vec<f64>) -> Self {
        samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        Self { sorted: samples }
    }

    pub fn count(&self) -> usize {
        self.sorted.len()
    }

    pub fn min(&self) -> Option<f64> {
        self.sorted.first().copied()
    }

    pub fn max(&self) -> Option<f64> {
        self.sorted.last().copied()
    }

    pub fn avg(&self) -> Option<f64> {
        if self.sorted.is_empty() {
            return None;
        }
        Some(self.sorted.iter().sum::<f64>() / self.sorted.len() as f64)
    }

    pub fn med(&self) -> Option<f64> {
        self.percentile(50.0)
    }

    /// Percentile with linear interpolation between the closest ranks.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        if self.sorted.is_empty() {
            return None;
        }
        let p = p.clamp(0.0, 100.0);
        let rank = p / 100.0 * (self.sorted.len() - 1) as f64;
        let lo = rank.floor() as usize;
        let hi = rank.ceil() as usize;
        let (low, high) = (self.sorted[lo], self.sorted[hi]);
        Some(low + (high - low) * (rank - lo as f64))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetricSummary {
    Trend(TrendSummary),
    Counter { count: u64 },
    Rate { hits: u64, total: u64 },
}

impl MetricSummary {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricSummary::Trend(_) => MetricKind::Trend,
            MetricSummary::Counter { .. } => MetricKind::Counter,
            MetricSummary::Rate { .. } => MetricKind::Rate,
        }
    }

    /// Trend sample count, counter value, or number of rate samples.
    pub fn count(&self) -> u64 {
        match self {
            MetricSummary::Trend(trend) => trend.count() as u64,
            MetricSummary::Counter { count } => *count,
            MetricSummary::Rate { total, .. } => *total,
        }
    }

    pub fn rate(&self) -> Option<f64> {
        match self {
            MetricSummary::Rate { hits, total } if *total > 0 => Some(*hits as f64 / *total as f64),
            _ => None,
        }
    }

    /// Flattened view used for reporting.
    pub fn report_line(&self) -> MetricReport {
        match self {
            MetricSummary::Trend(trend) => MetricReport {
                kind: MetricKind::Trend,
                count: trend.count() as u64,
                avg: trend.avg(),
                min: trend.min(),
                med: trend.med(),
                max: trend.max(),
                p90: trend.percentile(90.0),
                p95: trend.percentile(95.0),
                rate: None,
            },
            MetricSummary::Counter { count } => MetricReport {
                kind: MetricKind::Counter,
                count: *count,
                ..MetricReport::empty(MetricKind::Counter)
            },
            MetricSummary::Rate { total, .. } => MetricReport {
                kind: MetricKind::Rate,
                count: *total,
                rate: self.rate(),
                ..MetricReport::empty(MetricKind::Rate)
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricReport {
    pub kind: MetricKind,
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub med: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p90: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p95: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
}

impl MetricReport {
    fn empty(kind: MetricKind) -> Self {
        Self {
            kind,
            count: 0,
            avg: None,
            min: None,
            med: None,
            max: None,
            p90: None,
            p95: None,
            rate: None,
        }
    }
}

/// All metric summaries of a run, keyed by metric name.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    metrics: BTreeMap<String, MetricSummary>,
}

impl MetricsSnapshot {
    pub fn new(metrics: BTreeMap<String, MetricSummary>) -> Self {
        Self { metrics }
    }

    pub fn get(&self, name: &str) -> Option<&MetricSummary> {
        self.metrics.get(name)
    }

    pub fn count(&self, name: &str) -> u64 {
        self.metrics.get(name).map(MetricSummary::count).unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricSummary)> {
        self.metrics.iter().map(|(name, summary)| (name.as_str(), summary))
    }
}
