use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::checks::{body_preview, check_response, CheckLimits, CheckOutcome};
use super::{HttpProbe, ProbeResponse};
use crate::metrics::{MetricsSink, BURN_ERRORS, BURN_LATENCY};

#[derive(Debug, Clone)]
pub struct IterationSettings {
    /// Fixed pause after each request, before the VU loops again.
    pub pause: Duration,
    /// Response validation limits; `None` disables validation entirely.
    pub validation: Option<CheckLimits>,
    pub body_preview_chars: usize,
}

impl Default for IterationSettings {
    fn default() -> Self {
        Self {
            pause: Duration::from_millis(50),
            validation: Some(CheckLimits::default()),
            body_preview_chars: 100,
        }
    }
}

/// What one iteration observed. Consumed by callers that want more than the
/// metrics, typically tests.
#[derive(Debug, Clone)]
pub struct IterationOutcome {
    pub status: u16,
    pub latency: Duration,
    pub checks: Option<CheckOutcome>,
    /// The diagnostic line logged when validation failed.
    pub diagnostic: Option<String>,
}

impl IterationOutcome {
    pub fn is_error(&self) -> bool {
        self.checks.is_some_and(|checks| !checks.passed())
    }
}

/// The work unit every virtual user repeats: one timed GET against the burn
/// endpoint, optional validation, then a fixed pause.
pub struct BurnIteration {
    target: String,
    probe: Arc<dyn HttpProbe>,
    sink: Arc<dyn MetricsSink>,
    settings: IterationSettings,
}

impl BurnIteration {
    pub fn new(
        target: impl Into<String>,
        probe: Arc<dyn HttpProbe>,
        sink: Arc<dyn MetricsSink>,
        settings: IterationSettings,
    ) -> Self {
        Self {
            target: target.into(),
            probe,
            sink,
            settings,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Full iteration including the trailing pause.
    pub async fn run(&self) -> IterationOutcome {
        let outcome = self.execute().await;
        tokio::time::sleep(self.settings.pause).await;
        outcome
    }

    /// Request, latency sample and validation, without the pause.
    pub async fn execute(&self) -> IterationOutcome {
        let start = Instant::now();
        let response = match self.probe.get(&self.target).await {
            Ok(response) => response,
            Err(err) => {
                debug!(target_url = %self.target, error = %err, "burn request failed");
                ProbeResponse::transport_failure(err.duration)
            }
        };
        let latency = start.elapsed();
        self.sink.record_duration(BURN_LATENCY, latency);

        let Some(limits) = &self.settings.validation else {
            return IterationOutcome {
                status: response.status,
                latency,
                checks: None,
                diagnostic: None,
            };
        };

        let checks = check_response(&response, limits);
        let diagnostic = if checks.passed() {
            None
        } else {
            self.sink.increment(BURN_ERRORS, 1);
            let line = format!(
                "burn check failed: status={} body={}",
                response.status,
                body_preview(&response.body, self.settings.body_preview_chars)
            );
            warn!(
                status = response.status,
                failed_checks = ?checks.failures(),
                duration_ms = response.duration.as_millis() as u64,
                "{line}"
            );
            Some(line)
        };

        IterationOutcome {
            status: response.status,
            latency,
            checks: Some(checks),
            diagnostic,
        }
    }
}
