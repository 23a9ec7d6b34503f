use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{LoadScript, Ramp};
use crate::metrics::{MetricsSink, ITERATIONS};

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    /// How often the controller re-evaluates the desired VU count.
    pub tick: Duration,
    /// Time VUs get to finish their current iteration once the run ends.
    pub graceful_stop: Duration,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            graceful_stop: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub elapsed: Duration,
    pub interrupted: bool,
    pub peak_vus: usize,
}

struct VirtualUser {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Drives a [`LoadScript`] along a [`Ramp`], one tokio task per VU.
pub struct Runner {
    ramp: Ramp,
    settings: RunnerSettings,
    sink: Arc<dyn MetricsSink>,
}

impl Runner {
    pub fn new(ramp: Ramp, settings: RunnerSettings, sink: Arc<dyn MetricsSink>) -> Self {
        Self { ramp, settings, sink }
    }

    /// Run setup, the full ramp, then teardown. Cancelling `shutdown` ends
    /// the ramp early; teardown still runs.
    pub async fn run<S: LoadScript>(
        &self,
        script: Arc<S>,
        shutdown: CancellationToken,
    ) -> anyhow::Result<RunStats> {
        script.setup().await?;

        let all_vus = shutdown.child_token();
        let start = Instant::now();
        let mut active: Vec<VirtualUser> = Vec::new();
        let mut retiring: Vec<JoinHandle<()>> = Vec::new();
        let mut next_id = 0u64;
        let mut peak_vus = 0usize;
        let mut current_stage = None;

        let mut ticker = interval(self.settings.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let interrupted = loop {
            tokio::select! {
                _ = shutdown.cancelled() => break true,
                _ = ticker.tick() => {}
            }

            let elapsed = start.elapsed();
            if self.ramp.is_finished(elapsed) {
                break false;
            }

            let stage = self.ramp.stage_index_at(elapsed);
            if stage != current_stage {
                if let Some(index) = stage {
                    info!(stage = index, elapsed_ms = elapsed.as_millis() as u64, "entering stage");
                }
                current_stage = stage;
            }

            let desired = self.ramp.target_at(elapsed) as usize;
            while active.len() < desired {
                let token = all_vus.child_token();
                let handle = tokio::spawn(vu_loop(
                    next_id,
                    Arc::clone(&script),
                    token.clone(),
                    Arc::clone(&self.sink),
                ));
                active.push(VirtualUser { token, handle });
                next_id += 1;
            }
            while active.len() > desired {
                if let Some(vu) = active.pop() {
                    vu.token.cancel();
                    retiring.push(vu.handle);
                }
            }
            retiring.retain(|handle| !handle.is_finished());
            peak_vus = peak_vus.max(active.len());
        };

        if interrupted {
            warn!(active_vus = active.len(), "run interrupted; stopping virtual users");
        }
        all_vus.cancel();

        let handles: Vec<JoinHandle<()>> = active
            .into_iter()
            .map(|vu| vu.handle)
            .chain(retiring)
            .collect();
        let aborts: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        if timeout(self.settings.graceful_stop, join_all(handles)).await.is_err() {
            warn!(
                graceful_stop_ms = self.settings.graceful_stop.as_millis() as u64,
                "virtual users did not stop in time; aborting"
            );
            for abort in aborts {
                abort.abort();
            }
        }

        let elapsed = start.elapsed();
        script.teardown().await;

        Ok(RunStats {
            elapsed,
            interrupted,
            peak_vus,
        })
    }
}

async fn vu_loop<S: LoadScript>(
    id: u64,
    script: Arc<S>,
    token: CancellationToken,
    sink: Arc<dyn MetricsSink>,
) {
    debug!(vu = id, "virtual user started");
    while !token.is_cancelled() {
        script.iteration().await;
        sink.increment(ITERATIONS, 1);
    }
    debug!(vu = id, "virtual user stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Stage;
    use crate::metrics::{InMemorySink, MetricRegistry};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingScript {
        iterations: AtomicU64,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        setup_called: AtomicBool,
        teardown_called: AtomicBool,
    }

    #[async_trait]
    impl LoadScript for CountingScript {
        async fn setup(&self) -> anyhow::Result<()> {
            self.setup_called.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn iteration(&self) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.iterations.fetch_add(1, Ordering::SeqCst);
        }

        async fn teardown(&self) {
            self.teardown_called.store(true, Ordering::SeqCst);
        }
    }

    fn runner(stages: &[Stage]) -> (Runner, Arc<InMemorySink>) {
        let sink = Arc::new(InMemorySink::new(&MetricRegistry::with_builtins()));
        let runner = Runner::new(Ramp::new(stages), RunnerSettings::default(), sink.clone());
        (runner, sink)
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_ramp_counts_every_iteration() {
        let (runner, sink) = runner(&[
            Stage::new(Duration::from_secs(1), 4),
            Stage::new(Duration::from_secs(1), 4),
            Stage::new(Duration::from_secs(1), 0),
        ]);
        let script = Arc::new(CountingScript::default());

        let stats = runner.run(script.clone(), CancellationToken::new()).await.unwrap();

        assert!(!stats.interrupted);
        assert_eq!(stats.peak_vus, 4);
        assert!(stats.elapsed >= Duration::from_secs(3));
        assert!(script.setup_called.load(Ordering::SeqCst));
        assert!(script.teardown_called.load(Ordering::SeqCst));
        assert!(script.max_in_flight.load(Ordering::SeqCst) <= 4);

        let iterations = script.iterations.load(Ordering::SeqCst);
        assert!(iterations > 0);
        assert_eq!(sink.snapshot().count(ITERATIONS), iterations);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_run() {
        let (runner, _sink) = runner(&[Stage::new(Duration::from_secs(600), 10)]);
        let script = Arc::new(CountingScript::default());
        let shutdown = CancellationToken::new();

        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let stats = runner.run(script.clone(), shutdown).await.unwrap();

        assert!(stats.interrupted);
        assert!(stats.elapsed < Duration::from_secs(600));
        assert!(script.teardown_called.load(Ordering::SeqCst));
        assert_eq!(script.in_flight.load(Ordering::SeqCst), 0);
    }

    struct FailingSetup;

    #[async_trait]
    impl LoadScript for FailingSetup {
        async fn setup(&self) -> anyhow::Result<()> {
            anyhow::bail!("target unreachable")
        }

        async fn iteration(&self) {}
    }

    #[tokio::test]
    async fn test_setup_failure_aborts_before_load() {
        let (runner, sink) = runner(&[Stage::new(Duration::from_secs(1), 1)]);
        let result = runner.run(Arc::new(FailingSetup), CancellationToken::new()).await;
        assert!(result.is_err());
        assert_eq!(sink.snapshot().count(ITERATIONS), 0);
    }
}
