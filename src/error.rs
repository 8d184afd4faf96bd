//! Error types for the frame relay.
//!
//! All errors implement `std::error::Error` and carry enough context to tell
//! where in the pipeline they happened: binding the listener, capturing,
//! encoding, or talking to a client.
//!
//! ## Error Categories
//!
//! - **Bind Errors**: The listening endpoint could not be opened (fatal at startup)
//! - **Transport Errors**: A single client connection failed (local to that session)
//! - **Capture Errors**: The camera source failed to deliver a raw frame
//! - **Encode Errors**: A raw frame could not be turned into a payload (frame is dropped)
//! - **Config Errors**: Invalid or unreadable configuration
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use framerelay::RelayError;
//!
//! let error = RelayError::capture_failed("camera busy");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T, E = RelayError> = std::result::Result<T, E>;

/// Main error type for relay operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RelayError {
    #[error("Failed to bind relay endpoint {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport error: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Capture failed: {reason}")]
    Capture {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Frame encoding failed: {reason}")]
    Encode { reason: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Shutdown failed: {reason}")]
    Shutdown { reason: String },
}

impl RelayError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            RelayError::Bind { .. } => false,
            RelayError::Transport { .. } => true,
            RelayError::Capture { .. } => true,
            RelayError::Encode { .. } => true,
            RelayError::Config { .. } => false,
            RelayError::Timeout { .. } => true,
            RelayError::Shutdown { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            RelayError::Bind { .. } => vec![
                "Check that no other process is listening on the port",
                "Use a port above 1024 or run with sufficient privileges",
                "Verify the bind address belongs to this host",
            ],
            RelayError::Transport { .. } => vec![
                "Reconnect the client",
                "Check network connectivity between client and relay",
            ],
            RelayError::Capture { .. } => vec![
                "Check that the camera is connected and not used by another process",
                "Restart the capture pipeline",
            ],
            RelayError::Encode { .. } => vec![
                "Verify the raw frame dimensions match its pixel format",
                "Lower the capture resolution",
            ],
            RelayError::Config { .. } => vec![
                "Check the configuration file syntax",
                "Remove unknown configuration keys",
                "Use non-zero frame rate and dimensions",
            ],
            RelayError::Timeout { .. } => vec![
                "Increase the send timeout",
                "Check client bandwidth",
            ],
            RelayError::Shutdown { .. } => vec!["Restart the relay process"],
        }
    }

    /// Helper constructor for bind errors.
    pub fn bind_failed(addr: SocketAddr, source: std::io::Error) -> Self {
        RelayError::Bind { addr, source }
    }

    /// Helper constructor for transport errors.
    pub fn transport(reason: impl Into<String>) -> Self {
        RelayError::Transport { reason: reason.into(), source: None }
    }

    /// Helper constructor for transport errors with source.
    pub fn transport_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        RelayError::Transport { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for capture errors.
    pub fn capture_failed(reason: impl Into<String>) -> Self {
        RelayError::Capture { reason: reason.into(), source: None }
    }

    /// Helper constructor for encode errors.
    pub fn encode_failed(reason: impl Into<String>) -> Self {
        RelayError::Encode { reason: reason.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        RelayError::Config { reason: reason.into() }
    }
}

impl From<std::io::Error> for RelayError {
    fn from(err: std::io::Error) -> Self {
        RelayError::Transport { reason: err.to_string(), source: Some(Box::new(err)) }
    }
}

impl From<image::ImageError> for RelayError {
    fn from(err: image::ImageError) -> Self {
        RelayError::Encode { reason: err.to_string() }
    }
}

impl From<serde_yaml_ng::Error> for RelayError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        RelayError::Config { reason: err.to_string() }
    }
}
