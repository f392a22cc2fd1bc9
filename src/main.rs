//! Entry point: load config, wire the ingress transport, the correlation
//! cache sweep, the sink fan-out, the HTTP surface, and the pipeline worker
//! together, then run until the ingress socket closes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dnstap_pipeline::config::{Config, SinkConfig};
use dnstap_pipeline::correlate::run_sweep_loop;
use dnstap_pipeline::enrich::{CompositeGeoipDatabase, GeoipDatabase, NullGeoipDatabase};
use dnstap_pipeline::ingress;
use dnstap_pipeline::metrics::PipelineMetrics;
use dnstap_pipeline::pipeline::DnstapProcessor;
use dnstap_pipeline::sink::{BoundedSink, JsonSink, Sink, TextSink};
use dnstap_pipeline::web;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dnstap_pipeline=info")))
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "dnstap-pipeline.toml".to_string());
    let config = Config::load(&config_path)?;
    info!(config_path, "configuration loaded");

    let geoip = build_geoip(&config);
    let sinks = build_sinks(&config).await?;
    let metrics = Arc::new(PipelineMetrics::new());

    let processor = Arc::new(DnstapProcessor::new(config.clone(), geoip, sinks, Arc::clone(&metrics))?);

    tokio::spawn(run_sweep_loop(processor.cache(), Duration::from_secs(config.cache.query_timeout)));
    tokio::spawn({
        let metrics_config = config.metrics.clone();
        let cache = processor.cache();
        let metrics = Arc::clone(&metrics);
        async move {
            if let Err(e) = web::run(metrics_config, metrics, cache).await {
                error!(error = %e, "metrics HTTP surface exited");
            }
        }
    });

    let (tx, rx) = mpsc::channel(config.ingress.capacity);
    let ingress_socket_path = config.ingress.unix_socket_path.clone();
    tokio::spawn(async move {
        if let Err(e) = ingress::run(&ingress_socket_path, tx).await {
            error!(error = %e, "ingress transport exited");
        }
    });

    processor.run(rx).await;
    Ok(())
}

/// A database is only built when at least one `geoip.db_*` path is
/// configured; otherwise lookups always miss cleanly via the null database.
/// A configured path that fails to load is non-fatal (spec §7 taxonomy
/// item 3): `CompositeGeoipDatabase::load` logs it and degrades to an
/// empty table rather than aborting startup.
fn build_geoip(config: &Config) -> Arc<dyn GeoipDatabase> {
    if config.geoip.db_city_path.is_none() && config.geoip.db_asn_path.is_none() {
        return Arc::new(NullGeoipDatabase);
    }
    Arc::new(CompositeGeoipDatabase::load(&config.geoip))
}

/// Builds one `BoundedSink` per configured sink entry, each wrapping the
/// concrete writer named in `SinkConfig` with its own egress channel at
/// its configured capacity.
async fn build_sinks(config: &Config) -> anyhow::Result<Vec<Arc<dyn Sink>>> {
    let mut sinks: Vec<Arc<dyn Sink>> = Vec::with_capacity(config.sinks.len());
    for sink_config in &config.sinks {
        let sink: Arc<dyn Sink> = match sink_config {
            SinkConfig::Text { path, capacity } => {
                let file = tokio::fs::File::create(path)
                    .await
                    .map_err(|e| anyhow::anyhow!("failed to open text sink '{}': {}", path, e))?;
                let inner: Arc<dyn Sink> = Arc::new(TextSink::new(format!("text:{}", path), file));
                Arc::new(BoundedSink::spawn(inner, *capacity))
            }
            SinkConfig::Json { path, capacity } => {
                let file = tokio::fs::File::create(path)
                    .await
                    .map_err(|e| anyhow::anyhow!("failed to open json sink '{}': {}", path, e))?;
                let inner: Arc<dyn Sink> = Arc::new(JsonSink::new(format!("json:{}", path), file));
                Arc::new(BoundedSink::spawn(inner, *capacity))
            }
        };
        sinks.push(sink);
    }
    Ok(sinks)
}
