//! Live camera frame relay: one capture pipeline, many WebSocket viewers.
//!
//! A single producer captures raw frames, encodes them, and publishes each
//! result into a [`FrameSlot`] that only ever holds the newest frame. Any
//! number of WebSocket clients read from the slot independently; a slow client
//! skips straight to the latest frame instead of queueing old ones, and never
//! slows the producer or other clients down.
//!
//! # Features
//!
//! - **Single-slot hand-off**: publish is a pointer swap, readers share `Arc<Frame>`
//! - **Collapse-to-latest**: per-client memory stays at one frame regardless of lag
//! - **Echo protocol**: a text round trip on `/chat` for connectivity checks
//! - **Pluggable pipeline**: any [`CaptureSource`] into any [`FrameEncoder`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use framerelay::{FrameRelay, RelayConfig};
//! use framerelay::encode::JpegEncoder;
//! use framerelay::sources::TestPatternSource;
//! use framerelay::types::PixelFormat;
//!
//! #[tokio::main]
//! async fn main() -> framerelay::Result<()> {
//!     let config = RelayConfig::default();
//!     let source = TestPatternSource::new(640, 480, PixelFormat::Rgb8, 15.0)?;
//!     let relay = FrameRelay::start(&config, source, JpegEncoder).await?;
//!
//!     println!("Viewers connect to ws://{}/live", relay.local_addr());
//!     tokio::signal::ctrl_c().await?;
//!
//!     let report = relay.shutdown().await?;
//!     println!("Published {} frames", report.frames_published);
//!     Ok(())
//! }
//! ```

mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Producer side
pub mod capture;
pub mod driver;
pub mod encode;
pub mod slot;
pub mod sources;

// Network side
pub mod server;
pub mod session;
pub mod stream;

pub mod config;
pub mod logging;

pub use capture::CaptureSource;
pub use config::{CaptureConfig, RelayConfig, ServerConfig};
pub use driver::{Driver, DriverHandle, DriverReport};
pub use encode::FrameEncoder;
pub use error::*;
pub use server::{RelayServer, RelayStats, SessionInfo, ShutdownHandle};
pub use slot::{FrameSlot, FrameSubscriber};
pub use types::*;

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use server::{RelayMetrics, SessionRegistry};

/// Entry point that wires the producer and the server around one slot.
pub struct FrameRelay;

impl FrameRelay {
    /// Start a relay.
    ///
    /// Creates the [`FrameSlot`], binds the endpoint, then starts the producer
    /// and the server. A bind failure is returned before anything is spawned.
    ///
    /// # Errors
    ///
    /// - [`RelayError::Config`] if `config` does not validate
    /// - [`RelayError::Bind`] if the endpoint cannot be opened
    pub async fn start<S, E>(config: &RelayConfig, source: S, encoder: E) -> Result<RunningRelay>
    where
        S: CaptureSource,
        E: FrameEncoder,
    {
        config.validate()?;

        let slot = FrameSlot::new();
        let server = RelayServer::bind(&config.server, slot.clone()).await?;
        let metrics = server.metrics();
        let registry = server.registry();

        let driver = Driver::spawn(source, encoder, slot.clone(), config.capture.quality);
        let server = server.spawn();

        info!(
            local_addr = %server.local_addr(),
            quality = %config.capture.quality,
            "Frame relay started"
        );

        Ok(RunningRelay {
            local_addr: server.local_addr(),
            slot,
            metrics,
            registry,
            driver: Some(driver),
            server: Some(server),
        })
    }
}

/// A started relay. Dropping it cancels the producer and every session.
pub struct RunningRelay {
    local_addr: SocketAddr,
    slot: FrameSlot,
    metrics: Arc<RelayMetrics>,
    registry: Arc<SessionRegistry>,
    driver: Option<DriverHandle>,
    server: Option<ShutdownHandle>,
}

impl RunningRelay {
    /// Address the relay is listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn slot(&self) -> &FrameSlot {
        &self.slot
    }

    /// Current counters, as served on `/status`
    pub fn stats(&self) -> RelayStats {
        self.metrics.snapshot(self.slot.current_version())
    }

    /// Sessions currently connected
    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.registry.sessions()
    }

    /// Stop the producer, then shut the server down and release the endpoint.
    pub async fn shutdown(mut self) -> Result<DriverReport> {
        let report = match self.driver.take() {
            Some(driver) => driver.stop().await?,
            None => DriverReport::default(),
        };
        if let Some(server) = self.server.take() {
            server.shutdown().await?;
        }
        info!(
            published = report.frames_published,
            encode_failures = report.encode_failures,
            "Frame relay stopped"
        );
        Ok(report)
    }
}

impl Drop for RunningRelay {
    fn drop(&mut self) {
        if let Some(driver) = &self.driver {
            driver.cancel.cancel();
        }
        if let Some(server) = &self.server {
            server.trigger();
        }
    }
}
