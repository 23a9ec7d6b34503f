use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{HTTP_REQS, HTTP_REQ_DURATION, HTTP_REQ_FAILED, ITERATIONS};
use crate::error::LoadError;

/// Kind of a metric, deciding how samples are stored and which threshold
/// aggregates apply to it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MetricKind {
    /// Distribution of numeric samples, queried by percentile.
    Trend,
    /// Monotonically increasing count.
    Counter,
    /// Fraction of boolean samples that were `true`.
    Rate,
}

/// Metrics declared for a run. Frozen once handed to a sink.
#[derive(Debug, Clone, Default)]
pub struct MetricRegistry {
    metrics: BTreeMap<String, MetricKind>,
}

impl MetricRegistry {
    /// Registry holding the request and iteration metrics every run produces.
    pub fn with_builtins() -> Self {
        let mut metrics = BTreeMap::new();
        metrics.insert(HTTP_REQ_DURATION.to_string(), MetricKind::Trend);
        metrics.insert(HTTP_REQ_FAILED.to_string(), MetricKind::Rate);
        metrics.insert(HTTP_REQS.to_string(), MetricKind::Counter);
        metrics.insert(ITERATIONS.to_string(), MetricKind::Counter);
        Self { metrics }
    }

    pub fn declare(&mut self, name: impl Into<String>, kind: MetricKind) -> Result<(), LoadError> {
        let name = name.into();
        if self.metrics.contains_key(&name) {
            return Err(LoadError::DuplicateMetric(name));
        }
        self.metrics.insert(name, kind);
        Ok(())
    }

    pub fn kind_of(&self, name: &str) -> Option<MetricKind> {
        self.metrics.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, MetricKind)> {
        self.metrics.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_declared() {
        let registry = MetricRegistry::with_builtins();
        assert_eq!(registry.kind_of(HTTP_REQ_DURATION), Some(MetricKind::Trend));
        assert_eq!(registry.kind_of(HTTP_REQ_FAILED), Some(MetricKind::Rate));
        assert_eq!(registry.kind_of(ITERATIONS), Some(MetricKind::Counter));
        assert_eq!(registry.kind_of("burn_latency"), None);
    }

    #[test]
    fn test_duplicate_declaration_rejected() {
        let mut registry = MetricRegistry::with_builtins();
        registry.declare("burn_errors", MetricKind::Counter).unwrap();
        assert!(matches!(
            registry.declare("burn_errors", MetricKind::Counter),
            Err(LoadError::DuplicateMetric(name)) if name == "burn_errors"
        ));
    }

    #[test]
    fn test_metric_kind_from_str() {
        assert_eq!("trend".parse::<MetricKind>().unwrap(), MetricKind::Trend);
        assert_eq!(MetricKind::Counter.to_string(), "counter");
    }
}
