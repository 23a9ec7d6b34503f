//! CPU burn service used as the target of a run.

pub mod burn;
pub mod error;
pub mod health;

use axum::{routing::get, Router};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::config::ServerConfig;

pub fn router(cfg: &ServerConfig) -> Router {
    Router::new()
        .route("/burn", get(burn::burn))
        .route("/health", get(health::health_check))
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(TimeoutLayer::new(Duration::from_secs(cfg.request_timeout_secs))),
        )
        .layer(TraceLayer::new_for_http())
}

#[cfg(feature = "metrics")]
pub fn with_metrics(app: Router) -> Router {
    use axum_prometheus::PrometheusMetricLayer;
    let (layer, handle) = PrometheusMetricLayer::pair();

    let metrics_router = Router::new().route("/metrics", get(move || async move { handle.render() }));

    app.layer(layer).merge(metrics_router)
}

/// Bind and serve until `shutdown` is cancelled.
pub async fn serve(cfg: &ServerConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    #[allow(unused_mut)]
    let mut app = router(cfg);

    #[cfg(feature = "metrics")]
    {
        app = with_metrics(app);
    }

    let addr = cfg.socket_addr()?;
    if cfg.host == "0.0.0.0" {
        warn!("burn server binding to 0.0.0.0 - reachable from the network");
    }
    info!(%addr, "starting burn server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    warn!("burn server stopped");
    Ok(())
}
