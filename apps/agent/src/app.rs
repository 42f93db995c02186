//! Application orchestrator: sampler, collector and stdout sink.

use std::io::Write;
use std::sync::Arc;

use hostmetrics_protocol::HostSnapshot;
use hostmetrics_telemetry::{Collector, HostSampler};

use crate::config::Config;

/// Runs the agent until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let sampler = Arc::new(HostSampler::native(&config.sampler_config()));

    let collector = Collector::new(Arc::clone(&sampler), Box::new(emit));
    collector.set_disk_paths(config.disk_paths.clone()).await;
    if config.include_host_info {
        collector.enable_host_info().await;
    }
    collector.start(config.interval_sec).await;

    tracing::info!("agent ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("SIGINT received, shutting down");

    collector.stop().await;
    if let Some(source) = sampler.temperature_source().await {
        tracing::info!(source = %source, "last temperature source");
    }

    Ok(())
}

/// Writes one snapshot as a JSON line on stdout.
fn emit(snapshot: HostSnapshot) {
    let line = match serde_json::to_string(&snapshot) {
        Ok(line) => line,
        Err(e) => {
            tracing::error!("failed to encode snapshot: {e}");
            return;
        }
    };

    let mut out = std::io::stdout().lock();
    if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
        tracing::warn!("failed to write snapshot: {e}");
    }
}
