use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::warn;

use super::{MetricKind, MetricRegistry, MetricSummary, MetricsSnapshot, TrendSummary};

/// Capability set an iteration uses to publish measurements.
///
/// Implementations must accept concurrent calls from every virtual user
/// without losing updates.
#[cfg_attr(test, mockall::automock)]
pub trait MetricsSink: Send + Sync {
    /// Append a sample (in milliseconds) to a trend metric.
    fn record_duration(&self, name: &str, value: Duration);

    /// Add `delta` to a counter metric.
    fn increment(&self, name: &str, delta: u64);

    /// Add one boolean sample to a rate metric.
    fn record_rate(&self, name: &str, hit: bool);
}

enum Series {
    Trend(Mutex<Vec<f64>>),
    Counter(AtomicU64),
    Rate { hits: AtomicU64, total: AtomicU64 },
}

impl Series {
    fn new(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Trend => Series::Trend(Mutex::new(Vec::new())),
            MetricKind::Counter => Series::Counter(AtomicU64::new(0)),
            MetricKind::Rate => Series::Rate {
                hits: AtomicU64::new(0),
                total: AtomicU64::new(0),
            },
        }
    }

    fn kind(&self) -> MetricKind {
        match self {
            Series::Trend(_) => MetricKind::Trend,
            Series::Counter(_) => MetricKind::Counter,
            Series::Rate { .. } => MetricKind::Rate,
        }
    }

    fn summarize(&self) -> MetricSummary {
        match self {
            Series::Trend(samples) => MetricSummary::Trend(TrendSummary::from_samples(samples.lock().clone())),
            Series::Counter(count) => MetricSummary::Counter {
                count: count.load(Ordering::Acquire),
            },
            Series::Rate { hits, total } => MetricSummary::Rate {
                hits: hits.load(Ordering::Acquire),
                total: total.load(Ordering::Acquire),
            },
        }
    }
}

/// Process-local sink backing every metric declared in a [`MetricRegistry`].
///
/// The set of series is fixed at construction; each series synchronizes
/// itself, so recording never takes a sink-wide lock.
pub struct InMemorySink {
    series: HashMap<String, Series>,
}

impl InMemorySink {
    pub fn new(registry: &MetricRegistry) -> Self {
        let series = registry
            .iter()
            .map(|(name, kind)| (name.to_string(), Series::new(kind)))
            .collect();
        Self { series }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let metrics: BTreeMap<String, MetricSummary> = self
            .series
            .iter()
            .map(|(name, series)| (name.clone(), series.summarize()))
            .collect();
        MetricsSnapshot::new(metrics)
    }

    fn series(&self, name: &str, expected: MetricKind) -> Option<&Series> {
        match self.series.get(name) {
            Some(series) if series.kind() == expected => Some(series),
            Some(series) => {
                warn!(metric = name, declared = %series.kind(), recorded = %expected, "metric kind mismatch; sample dropped");
                None
            }
            None => {
                warn!(metric = name, "undeclared metric; sample dropped");
                None
            }
        }
    }
}

impl MetricsSink for InMemorySink {
    fn record_duration(&self, name: &str, value: Duration) {
        if let Some(Series::Trend(samples)) = self.series(name, MetricKind::Trend) {
            samples.lock().push(value.as_secs_f64() * 1000.0);
        }
    }

    fn increment(&self, name: &str, delta: u64) {
        if let Some(Series::Counter(count)) = self.series(name, MetricKind::Counter) {
            count.fetch_add(delta, Ordering::AcqRel);
        }
    }

    fn record_rate(&self, name: &str, hit: bool) {
        if let Some(Series::Rate { hits, total }) = self.series(name, MetricKind::Rate) {
            if hit {
                hits.fetch_add(1, Ordering::AcqRel);
            }
            total.fetch_add(1, Ordering::AcqRel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{HTTP_REQ_FAILED, ITERATIONS};
    use std::sync::Arc;

    fn sink() -> InMemorySink {
        let mut registry = MetricRegistry::with_builtins();
        registry.declare("burn_latency", MetricKind::Trend).unwrap();
        registry.declare("burn_errors", MetricKind::Counter).unwrap();
        InMemorySink::new(&registry)
    }

    #[test]
    fn test_records_each_kind() {
        let sink = sink();
        sink.record_duration("burn_latency", Duration::from_millis(120));
        sink.record_duration("burn_latency", Duration::from_millis(80));
        sink.increment("burn_errors", 2);
        sink.record_rate(HTTP_REQ_FAILED, true);
        sink.record_rate(HTTP_REQ_FAILED, false);

        let snapshot = sink.snapshot();
        match snapshot.get("burn_latency") {
            Some(MetricSummary::Trend(trend)) => {
                assert_eq!(trend.count(), 2);
                assert_eq!(trend.max(), Some(120.0));
            }
            other => panic!("unexpected summary: {other:?}"),
        }
        assert_eq!(snapshot.count("burn_errors"), 2);
        assert_eq!(snapshot.get(HTTP_REQ_FAILED).and_then(MetricSummary::rate), Some(0.5));
    }

    #[test]
    fn test_undeclared_and_mismatched_samples_are_dropped() {
        let sink = sink();
        sink.increment("not_declared", 1);
        sink.increment("burn_latency", 1);
        sink.record_duration(ITERATIONS, Duration::from_millis(5));

        let snapshot = sink.snapshot();
        assert!(snapshot.get("not_declared").is_none());
        assert_eq!(snapshot.count("burn_latency"), 0);
        assert_eq!(snapshot.count(ITERATIONS), 0);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let sink = Arc::new(sink());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sink = Arc::clone(&sink);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        sink.record_duration("burn_latency", Duration::from_millis(1));
                        sink.increment("burn_errors", 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = sink.snapshot();
        assert_eq!(snapshot.count("burn_latency"), 8000);
        assert_eq!(snapshot.count("burn_errors"), 8000);
    }
}
