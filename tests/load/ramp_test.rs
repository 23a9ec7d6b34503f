#![cfg(test)]
//! Ramp Tests Against the In-Process Burn Server
//!
//! Runs compressed versions of the load profiles against a real burn server
//! bound to an ephemeral port:
//! - Every completed iteration yields exactly one burn_latency sample
//! - A light burn keeps the validated profile inside its thresholds
//! - A burn longer than the duration check is counted as an error

use std::sync::Arc;
use std::time::Duration;

use burn_load::config::{Config, ServerConfig};
use burn_load::domain::{ProfileKind, Stage};
use burn_load::driver::ReqwestProbe;
use burn_load::metrics::{BURN_ERRORS, BURN_LATENCY, ITERATIONS};
use burn_load::runner::{execute, RunPlan};
use burn_load::server::router;
use tokio_util::sync::CancellationToken;

async fn spawn_burn_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(&ServerConfig::default());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn compressed_plan(base: &str, query: &str) -> RunPlan {
    let mut cfg = Config::default();
    cfg.runner.tick_ms = 50;
    cfg.profile.stages = Some(vec![
        Stage::new(Duration::from_secs(5), 5),
        Stage::new(Duration::from_secs(10), 20),
        Stage::new(Duration::from_secs(5), 0),
    ]);
    let target = format!("{base}/burn?{query}");
    cfg.run_plan(Some(ProfileKind::Validated), Some(&target)).unwrap()
}

fn probe() -> Arc<ReqwestProbe> {
    Arc::new(ReqwestProbe::new(Duration::from_secs(30), "burn-load-ramp-test").unwrap())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn test_light_burn_stays_within_thresholds() {
    let base = spawn_burn_server().await;

    let summary = execute(compressed_plan(&base, "seconds=0.1&work=0"), probe(), CancellationToken::new())
        .await
        .unwrap();

    println!("{}", serde_json::to_string_pretty(&summary.report()).unwrap());
    let iterations = summary.metrics.count(ITERATIONS);
    assert!(iterations > 100, "only {iterations} iterations");
    assert_eq!(summary.metrics.count(BURN_LATENCY), iterations);
    assert_eq!(summary.metrics.count(BURN_ERRORS), 0);
    assert!(summary.passed(), "thresholds: {:?}", summary.thresholds);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
#[ignore]
async fn test_overlong_burn_counts_errors() {
    let base = spawn_burn_server().await;
    let mut plan = compressed_plan(&base, "seconds=0.3&work=0");
    if let Some(limits) = plan.iteration.validation.as_mut() {
        limits.max_duration = Duration::from_millis(200);
    }

    let summary = execute(plan, probe(), CancellationToken::new()).await.unwrap();

    let iterations = summary.metrics.count(ITERATIONS);
    assert!(iterations > 0);
    assert_eq!(summary.metrics.count(BURN_ERRORS), iterations);
}
