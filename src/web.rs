//! HTTP surface: `/metrics` in Prometheus text format and a small
//! `/api/stats` JSON endpoint, scoped to this pipeline's own counters and
//! correlation cache occupancy.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::MetricsConfig;
use crate::correlate::CorrelationCache;
use crate::metrics::{render_metrics, PipelineMetrics};

#[derive(Clone)]
struct AppState {
    metrics: Arc<PipelineMetrics>,
    cache: Arc<CorrelationCache>,
}

pub async fn run(config: MetricsConfig, metrics: Arc<PipelineMetrics>, cache: Arc<CorrelationCache>) -> anyhow::Result<()> {
    if !config.enabled {
        info!("metrics HTTP surface disabled");
        return Ok(());
    }

    let state = AppState { metrics, cache };
    let app = Router::new()
        .route("/metrics", get(metrics_endpoint))
        .route("/api/stats", get(stats_endpoint))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.address, config.port);
    info!(addr, "metrics HTTP surface listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    render_metrics(&state.metrics, state.cache.stats())
}

async fn stats_endpoint(State(state): State<AppState>) -> Json<serde_json::Value> {
    let cache_stats = state.cache.stats();
    Json(serde_json::json!({
        "ingested_total": state.metrics.ingested_total.load(std::sync::atomic::Ordering::Relaxed),
        "envelope_dropped_total": state.metrics.envelope_dropped_total.load(std::sync::atomic::Ordering::Relaxed),
        "malformed_total": state.metrics.malformed_total.load(std::sync::atomic::Ordering::Relaxed),
        "filtered_total": state.metrics.filtered_total.load(std::sync::atomic::Ordering::Relaxed),
        "correlation_cache": {
            "entries": cache_stats.entries,
            "hits": cache_stats.hits,
            "misses": cache_stats.misses,
            "expired": cache_stats.expired,
        },
    }))
}
