//! Capture source trait for raw camera frames

use crate::Result;
use crate::types::RawFrame;

/// Trait for raw frame sources
///
/// Sources abstract over where frames come from (a camera callback, a test
/// pattern, a file) and handle their own pacing internally. The relay places
/// no rate limit of its own on top: the source's cadence is the only pacing
/// signal.
#[async_trait::async_trait]
pub trait CaptureSource: Send + 'static {
    /// Get the next raw frame
    ///
    /// Returns:
    /// - `Ok(Some(frame))` - New frame captured
    /// - `Ok(None)` - Capture ended (normal termination)
    /// - `Err(e)` - Capture failed; the driver retries with backoff
    async fn next_frame(&mut self) -> Result<Option<RawFrame>>;

    /// Nominal capture rate in Hz
    fn frame_rate(&self) -> f64;
}
