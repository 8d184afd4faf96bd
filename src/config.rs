//! Relay configuration
//!
//! Defaults reproduce the camera app the relay was built for: port 8080,
//! 720x1280 capture at quality 20. A YAML file may override any field, and
//! command line flags override the file.
//!
//! ```yaml
//! server:
//!   port: 9000
//!   send_timeout_ms: 2000
//! capture:
//!   fps: 15
//!   quality: 40
//! ```

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use crate::types::{Quality, frame_period};
use crate::{RelayError, Result};

/// Complete relay configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    pub server: ServerConfig,
    pub capture: CaptureConfig,
}

/// Network endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    /// Upper bound on a single outbound WebSocket send
    pub send_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: 8080, send_timeout_ms: 5000 }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

/// Capture and encoding settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub quality: Quality,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { width: 720, height: 1280, fps: 30, quality: Quality::default() }
    }
}

impl RelayConfig {
    /// Load a YAML configuration file; missing fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| RelayError::config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the relay cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.capture.fps == 0 {
            return Err(RelayError::config("capture.fps must be greater than zero"));
        }
        if frame_period(self.capture.fps as f64).is_none() {
            return Err(RelayError::config(format!("capture.fps {} is too high", self.capture.fps)));
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(RelayError::config(format!(
                "capture size {}x{} must be non-zero",
                self.capture.width, self.capture.height
            )));
        }
        if self.server.send_timeout_ms == 0 {
            return Err(RelayError::config("server.send_timeout_ms must be greater than zero"));
        }
        Ok(())
    }

    /// Apply command line overrides, then validate the result
    pub fn with_overrides(mut self, overrides: &Overrides) -> Result<Self> {
        if let Some(bind) = overrides.bind {
            self.server.bind = bind;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(fps) = overrides.fps {
            self.capture.fps = fps;
        }
        if let Some(width) = overrides.width {
            self.capture.width = width;
        }
        if let Some(height) = overrides.height {
            self.capture.height = height;
        }
        if let Some(quality) = overrides.quality {
            self.capture.quality = Quality::new(quality);
        }
        self.validate()?;
        Ok(self)
    }
}

/// Command line flags that override configuration values
#[derive(Debug, Clone, Default, clap::Args)]
pub struct Overrides {
    /// Address to listen on
    #[arg(long, env = "FRAMERELAY_BIND")]
    pub bind: Option<IpAddr>,

    /// Port to listen on (0 picks a free port)
    #[arg(long, env = "FRAMERELAY_PORT")]
    pub port: Option<u16>,

    /// Capture frame rate
    #[arg(long)]
    pub fps: Option<u32>,

    /// Capture width in pixels
    #[arg(long)]
    pub width: Option<u32>,

    /// Capture height in pixels
    #[arg(long)]
    pub height: Option<u32>,

    /// JPEG quality, 1 to 100
    #[arg(long)]
    pub quality: Option<u8>,
}
