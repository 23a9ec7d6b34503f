use std::time::Duration;

use crate::domain::Stage;

/// Piecewise-linear virtual-user ramp over wall-clock time.
///
/// Starts at 0 VUs; each stage interpolates from the previous stage's target
/// to its own. After the last stage the ramp is 0.
#[derive(Debug, Clone)]
pub struct Ramp {
    stages: Vec<Stage>,
    total: Duration,
}

impl Ramp {
    pub fn new(stages: &[Stage]) -> Self {
        Self {
            stages: stages.to_vec(),
            total: stages.iter().map(|stage| stage.duration).sum(),
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.total
    }

    pub fn is_finished(&self, elapsed: Duration) -> bool {
        elapsed >= self.total
    }

    /// Highest VU count reached at any point of the ramp.
    pub fn peak(&self) -> u64 {
        self.stages.iter().map(|stage| stage.target).max().unwrap_or(0)
    }

    /// Desired number of VUs at `elapsed` since the start of the run.
    pub fn target_at(&self, elapsed: Duration) -> u64 {
        let mut from = 0u64;
        let mut stage_start = Duration::ZERO;

        for stage in &self.stages {
            let stage_end = stage_start + stage.duration;
            if elapsed < stage_end {
                let progress = (elapsed - stage_start).as_secs_f64() / stage.duration.as_secs_f64();
                let value = from as f64 + (stage.target as f64 - from as f64) * progress;
                return value.round().max(0.0) as u64;
            }
            from = stage.target;
            stage_start = stage_end;
        }

        0
    }

    /// Index of the stage active at `elapsed`, if the run is still going.
    pub fn stage_index_at(&self, elapsed: Duration) -> Option<usize> {
        let mut stage_end = Duration::ZERO;
        self.stages.iter().position(|stage| {
            stage_end += stage.duration;
            elapsed < stage_end
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::default_stages;
    use proptest::prelude::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_default_ramp_boundaries() {
        let ramp = Ramp::new(&default_stages());

        assert_eq!(ramp.total_duration(), secs(210));
        assert_eq!(ramp.peak(), 200);
        assert_eq!(ramp.target_at(Duration::ZERO), 0);
        assert_eq!(ramp.target_at(secs(15)), 5);
        assert_eq!(ramp.target_at(secs(30)), 10);
        assert_eq!(ramp.target_at(secs(60)), 30);
        assert_eq!(ramp.target_at(secs(90)), 50);
        assert_eq!(ramp.target_at(secs(150)), 200);
        assert_eq!(ramp.target_at(secs(180)), 50);
        assert_eq!(ramp.target_at(secs(195)), 25);
        assert_eq!(ramp.target_at(secs(210)), 0);
        assert!(ramp.is_finished(secs(210)));
    }

    #[test]
    fn test_stage_index() {
        let ramp = Ramp::new(&default_stages());
        assert_eq!(ramp.stage_index_at(secs(0)), Some(0));
        assert_eq!(ramp.stage_index_at(secs(30)), Some(1));
        assert_eq!(ramp.stage_index_at(secs(209)), Some(4));
        assert_eq!(ramp.stage_index_at(secs(210)), None);
    }

    #[test]
    fn test_zero_length_stage_jumps() {
        let ramp = Ramp::new(&[Stage::new(Duration::ZERO, 20), Stage::new(secs(10), 20)]);
        assert_eq!(ramp.target_at(Duration::ZERO), 20);
        assert_eq!(ramp.target_at(secs(5)), 20);
    }

    #[test]
    fn test_empty_ramp_is_idle() {
        let ramp = Ramp::new(&[]);
        assert_eq!(ramp.target_at(Duration::ZERO), 0);
        assert!(ramp.is_finished(Duration::ZERO));
    }

    proptest! {
        #[test]
        fn prop_target_stays_between_stage_endpoints(
            from in 0u64..500,
            to in 0u64..500,
            duration_ms in 1u64..120_000,
            at_ms in 0u64..120_000,
        ) {
            let ramp = Ramp::new(&[
                Stage::new(Duration::from_millis(1), from),
                Stage::new(Duration::from_millis(duration_ms), to),
            ]);
            let elapsed = Duration::from_millis(1 + at_ms.min(duration_ms - 1));
            let value = ramp.target_at(elapsed);
            prop_assert!(value >= from.min(to) && value <= from.max(to));
        }

        #[test]
        fn prop_target_monotone_within_rising_stage(
            to in 1u64..1000,
            duration_ms in 1u64..60_000,
            a in 0u64..60_000,
            b in 0u64..60_000,
        ) {
            let ramp = Ramp::new(&[Stage::new(Duration::from_millis(duration_ms), to)]);
            let (lo, hi) = (a.min(b).min(duration_ms - 1), a.max(b).min(duration_ms - 1));
            prop_assert!(ramp.target_at(Duration::from_millis(lo)) <= ramp.target_at(Duration::from_millis(hi)));
        }
    }
}
