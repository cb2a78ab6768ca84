// src/metrics.rs
use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder with its own HTTP listener (`GET /metrics`).
/// Without a listen address the `metrics` macros stay no-ops.
/// Must be called from inside the tokio runtime.
pub fn install_exporter(listen: Option<&str>) -> Result<Option<SocketAddr>> {
    let Some(raw) = listen.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let addr: SocketAddr = raw
        .parse()
        .with_context(|| format!("invalid metrics listen address {raw:?}"))?;
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("prometheus: install exporter")?;
    tracing::info!(%addr, "prometheus exporter listening");
    Ok(Some(addr))
}
