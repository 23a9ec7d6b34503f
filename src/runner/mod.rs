//! Thin execution adapter: ramps virtual users over a [`LoadScript`] and turns
//! the collected metrics into a [`RunSummary`].

pub mod instrumented;
pub mod ramp;
pub mod report;
pub mod scheduler;

pub use instrumented::*;
pub use ramp::*;
pub use report::*;
pub use scheduler::*;

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::domain::LoadProfile;
use crate::driver::{BurnIteration, BurnScript, HttpProbe, IterationSettings};
use crate::metrics::InMemorySink;

/// Hooks invoked by the [`Runner`].
#[async_trait]
pub trait LoadScript: Send + Sync + 'static {
    /// Runs once before any VU starts. An error aborts the run.
    async fn setup(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// One loop of one VU. Must not fail; per-request problems are metrics.
    async fn iteration(&self);

    /// Runs once after every VU has stopped.
    async fn teardown(&self) {}
}

/// Everything needed to execute one run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub profile: LoadProfile,
    pub target: String,
    pub iteration: IterationSettings,
    pub runner: RunnerSettings,
}

/// Execute `plan` against `probe` and summarize the result.
pub async fn execute(
    plan: RunPlan,
    probe: Arc<dyn HttpProbe>,
    shutdown: CancellationToken,
) -> anyhow::Result<RunSummary> {
    plan.profile.validate()?;

    let run_id = Uuid::new_v4();
    let sink = Arc::new(InMemorySink::new(&plan.profile.registry()?));
    let probe: Arc<dyn HttpProbe> = Arc::new(InstrumentedProbe::new(probe, sink.clone()));

    let iteration = BurnIteration::new(plan.target.clone(), probe, sink.clone(), plan.iteration.clone());
    let script = Arc::new(BurnScript::new(run_id, iteration));

    let ramp = Ramp::new(&plan.profile.stages);
    info!(
        %run_id,
        profile = %plan.profile.kind,
        stages = plan.profile.stages.len(),
        peak_vus = ramp.peak(),
        duration_ms = ramp.total_duration().as_millis() as u64,
        "starting run"
    );

    let runner = Runner::new(ramp, plan.runner.clone(), sink.clone());
    let stats = runner.run(script, shutdown).await?;

    Ok(RunSummary::new(
        run_id,
        &plan.profile,
        plan.target,
        stats.elapsed,
        stats.interrupted,
        sink.snapshot(),
    ))
}
