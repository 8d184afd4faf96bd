//! `framerelay` binary: serves a synthetic camera feed until Ctrl-C.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use framerelay::encode::JpegEncoder;
use framerelay::sources::TestPatternSource;
use framerelay::types::PixelFormat;
use framerelay::{FrameRelay, RelayConfig, config::Overrides, logging};

/// Relay a live camera feed to WebSocket viewers
#[derive(Debug, Parser)]
#[command(name = "framerelay", version, about)]
struct Cli {
    /// YAML configuration file
    #[arg(long, env = "FRAMERELAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    /// Log filter, e.g. `debug` or `framerelay=trace` (RUST_LOG wins)
    #[arg(long)]
    log: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log.as_deref());

    let config = match &cli.config {
        Some(path) => RelayConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => RelayConfig::default(),
    };
    let config = config.with_overrides(&cli.overrides).context("invalid configuration")?;

    let capture = &config.capture;
    let source = TestPatternSource::new(capture.width, capture.height, PixelFormat::Nv21, capture.fps as f64)
        .context("creating capture source")?;

    let relay = FrameRelay::start(&config, source, JpegEncoder)
        .await
        .with_context(|| format!("starting relay on {}", config.server.socket_addr()))?;

    info!(
        "Serving ws://{addr}/live and ws://{addr}/chat, press Ctrl-C to stop",
        addr = relay.local_addr()
    );

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("Shutting down");

    let stats = relay.stats();
    let report = relay.shutdown().await.context("shutting down")?;
    info!(
        captured = report.frames_captured,
        published = report.frames_published,
        encode_failures = report.encode_failures,
        sessions = stats.total_sessions,
        frames_sent = stats.frames_sent,
        "Done"
    );
    Ok(())
}
