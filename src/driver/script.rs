use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use super::BurnIteration;
use crate::runner::LoadScript;

/// Burn iteration wired into the runner's lifecycle hooks.
pub struct BurnScript {
    run_id: Uuid,
    iteration: BurnIteration,
}

impl BurnScript {
    pub fn new(run_id: Uuid, iteration: BurnIteration) -> Self {
        Self { run_id, iteration }
    }
}

#[async_trait]
impl LoadScript for BurnScript {
    async fn setup(&self) -> anyhow::Result<()> {
        info!(run_id = %self.run_id, target_url = %self.iteration.target(), "load test targeting burn endpoint");
        Ok(())
    }

    async fn iteration(&self) {
        self.iteration.run().await;
    }

    async fn teardown(&self) {
        info!(run_id = %self.run_id, "load test complete");
    }
}
