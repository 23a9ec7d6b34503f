use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{LoadProfile, ProfileKind, ThresholdOutcome};
use crate::metrics::{MetricReport, MetricsSnapshot};

/// Exit code used when the run completed but a threshold was crossed.
pub const THRESHOLDS_FAILED_EXIT_CODE: i32 = 99;

/// Outcome of a finished (or interrupted) run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub profile: ProfileKind,
    pub target: String,
    pub elapsed: Duration,
    pub interrupted: bool,
    pub metrics: MetricsSnapshot,
    pub thresholds: Vec<ThresholdOutcome>,
}

impl RunSummary {
    pub fn new(
        run_id: Uuid,
        profile: &LoadProfile,
        target: String,
        elapsed: Duration,
        interrupted: bool,
        metrics: MetricsSnapshot,
    ) -> Self {
        let thresholds = profile
            .thresholds
            .iter()
            .flat_map(|threshold| threshold.evaluate(metrics.get(&threshold.metric), elapsed))
            .collect();
        Self {
            run_id,
            profile: profile.kind,
            target,
            elapsed,
            interrupted,
            metrics,
            thresholds,
        }
    }

    pub fn passed(&self) -> bool {
        self.thresholds.iter().all(|outcome| outcome.passed)
    }

    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            THRESHOLDS_FAILED_EXIT_CODE
        }
    }

    pub fn report(&self) -> RunReport {
        RunReport {
            run_id: self.run_id,
            profile: self.profile,
            target: self.target.clone(),
            elapsed_ms: self.elapsed.as_millis() as u64,
            interrupted: self.interrupted,
            passed: self.passed(),
            metrics: self
                .metrics
                .iter()
                .map(|(name, summary)| (name.to_string(), summary.report_line()))
                .collect(),
            thresholds: self.thresholds.clone(),
        }
    }

    /// Emit the end-of-run summary: one line per metric, one per threshold.
    pub fn log(&self) {
        info!(
            run_id = %self.run_id,
            profile = %self.profile,
            target_url = %self.target,
            elapsed_ms = self.elapsed.as_millis() as u64,
            interrupted = self.interrupted,
            "run finished"
        );
        for (name, summary) in self.metrics.iter() {
            let line = summary.report_line();
            info!(
                metric = name,
                kind = %line.kind,
                count = line.count,
                avg = ?line.avg,
                min = ?line.min,
                med = ?line.med,
                max = ?line.max,
                p90 = ?line.p90,
                p95 = ?line.p95,
                rate = ?line.rate,
                "metric summary"
            );
        }
        for outcome in &self.thresholds {
            if outcome.passed {
                info!(metric = %outcome.metric, expression = %outcome.expression, observed = ?outcome.observed, "threshold passed");
            } else {
                warn!(metric = %outcome.metric, expression = %outcome.expression, observed = ?outcome.observed, "threshold crossed");
            }
        }
    }
}

/// Serializable form of a [`RunSummary`].
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub profile: ProfileKind,
    pub target: String,
    pub elapsed_ms: u64,
    pub interrupted: bool,
    pub passed: bool,
    pub metrics: BTreeMap<String, MetricReport>,
    pub thresholds: Vec<ThresholdOutcome>,
}
