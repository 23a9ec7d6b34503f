use axum::{extract::Query, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::error::ServerError;
use crate::driver::checks::BURNED_STATUS;

const DEFAULT_SECONDS: f64 = 5.0;
const DEFAULT_WORK: i64 = 1;
const MIN_SECONDS: f64 = 0.1;
const DEFAULT_BUSY: Duration = Duration::from_secs(5);
const LIGHT_WORK_NAP: Duration = Duration::from_millis(10);

#[derive(Debug, Default, Deserialize)]
pub struct BurnParams {
    pub seconds: Option<String>,
    pub work: Option<String>,
}

/// Parsed `/burn` request. If either parameter fails to parse, or `seconds`
/// cannot be expressed as a duration, both fall back to their defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurnRequest {
    pub seconds: f64,
    pub work: i64,
}

impl BurnRequest {
    pub fn from_params(params: &BurnParams) -> Self {
        let seconds = params
            .seconds
            .as_deref()
            .map_or(Ok(DEFAULT_SECONDS), |s| s.trim().parse::<f64>());
        let work = params
            .work
            .as_deref()
            .map_or(Ok(DEFAULT_WORK), |w| w.trim().parse::<i64>());

        match (seconds, work) {
            (Ok(seconds), Ok(work)) if seconds.is_finite() && busy_duration(seconds).is_some() => {
                Self { seconds, work }
            }
            _ => Self {
                seconds: DEFAULT_SECONDS,
                work: DEFAULT_WORK,
            },
        }
    }

    /// How long the endpoint actually keeps the CPU busy.
    pub fn busy_for(&self) -> Duration {
        busy_duration(self.seconds).unwrap_or(DEFAULT_BUSY)
    }

    pub fn heavy(&self) -> bool {
        self.work != 0
    }
}

fn busy_duration(seconds: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(seconds.max(MIN_SECONDS)).ok()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BurnResponse {
    pub status: String,
    pub seconds: f64,
    pub work: i64,
    pub timestamp: DateTime<Utc>,
}

/// Keep the calling thread busy until `duration` has elapsed. Heavy work
/// churns floating-point math; light work naps in short slices.
pub fn burn_cpu(duration: Duration, heavy: bool) -> f64 {
    let end = Instant::now() + duration;
    let mut x = 0.0001f64;
    while Instant::now() < end {
        if heavy {
            x = std::hint::black_box((x * 1.000001).powf(1.000001));
        } else {
            std::thread::sleep(LIGHT_WORK_NAP);
        }
    }
    x
}

/// GET /burn - consume CPU for the requested time
pub async fn burn(Query(params): Query<BurnParams>) -> Result<Json<BurnResponse>, ServerError> {
    let request = BurnRequest::from_params(&params);
    let started = Instant::now();

    tokio::task::spawn_blocking(move || burn_cpu(request.busy_for(), request.heavy()))
        .await
        .map_err(|e| ServerError::Internal(format!("burn task failed: {e}")))?;

    tracing::debug!(
        seconds = request.seconds,
        work = request.work,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "burn completed"
    );

    Ok(Json(BurnResponse {
        status: BURNED_STATUS.to_string(),
        seconds: request.seconds,
        work: request.work,
        timestamp: Utc::now(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn params(seconds: Option<&str>, work: Option<&str>) -> BurnParams {
        BurnParams {
            seconds: seconds.map(str::to_string),
            work: work.map(str::to_string),
        }
    }

    #[rstest]
    #[case(None, None, 5.0, 1)]
    #[case(Some("3"), Some("1"), 3.0, 1)]
    #[case(Some("0.5"), Some("0"), 0.5, 0)]
    #[case(Some("2"), None, 2.0, 1)]
    #[case(Some("abc"), Some("0"), 5.0, 1)]
    #[case(Some("2"), Some("1.5"), 5.0, 1)]
    #[case(Some("inf"), Some("0"), 5.0, 1)]
    #[case(Some("NaN"), Some("0"), 5.0, 1)]
    #[case(Some("1e300"), Some("0"), 5.0, 1)]
    fn test_from_params(
        #[case] seconds: Option<&str>,
        #[case] work: Option<&str>,
        #[case] expected_seconds: f64,
        #[case] expected_work: i64,
    ) {
        let request = BurnRequest::from_params(&params(seconds, work));
        assert_eq!(request, BurnRequest { seconds: expected_seconds, work: expected_work });
    }

    #[test]
    fn test_busy_time_is_clamped() {
        let request = BurnRequest { seconds: 0.0, work: 1 };
        assert_eq!(request.busy_for(), Duration::from_millis(100));

        let request = BurnRequest { seconds: -3.0, work: 0 };
        assert_eq!(request.busy_for(), Duration::from_millis(100));
        assert!(!request.heavy());

        let request = BurnRequest { seconds: 1e300, work: 0 };
        assert_eq!(request.busy_for(), Duration::from_secs(5));
    }

    #[test]
    fn test_burn_cpu_runs_for_duration() {
        let start = Instant::now();
        burn_cpu(Duration::from_millis(30), true);
        assert!(start.elapsed() >= Duration::from_millis(30));

        let start = Instant::now();
        burn_cpu(Duration::from_millis(30), false);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
