//! Prometheus textfile export
//!
//! The CLI exits after one command, so nothing could scrape an endpoint.
//! Instead the counters recorded by `session_client::metrics` are rendered
//! into a file for node_exporter's textfile collector:
//!
//! - `session_requests_total` (counter): labels `method`, `status`
//! - `session_renewals_total` (counter): label `outcome`
//! - `session_renewal_waiters_total` (counter)

use std::path::Path;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and return a handle for rendering.
pub fn install_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Render everything recorded so far into `path`, replacing its contents.
///
/// Written to a sibling temp file first, then renamed into place.
pub fn write_textfile(handle: &PrometheusHandle, path: &Path) -> Result<()> {
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, handle.render())
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to move metrics into {}", path.display()))?;
    Ok(())
}
