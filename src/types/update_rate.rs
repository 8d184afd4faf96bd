//! Delivery rate control for live sessions

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delivery rate for a live session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum UpdateRate {
    /// Every new version, as fast as the client consumes
    Native,

    /// At most this many frames per second, latest wins
    Max(u32),
}

impl UpdateRate {
    /// Build a rate from an optional `fps` request parameter
    ///
    /// Missing or zero means no cap, and so does a rate too high to have a
    /// non-zero period.
    pub fn from_fps(fps: Option<u32>) -> Self {
        match fps {
            Some(hz) if frame_period(hz as f64).is_some() => UpdateRate::Max(hz),
            _ => UpdateRate::Native,
        }
    }

    /// Get throttle interval if needed
    pub fn throttle_interval(self) -> Option<Duration> {
        match self {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => frame_period(hz as f64),
        }
    }
}

/// Time between frames at `hz`, or `None` unless it is a usable non-zero period
pub(crate) fn frame_period(hz: f64) -> Option<Duration> {
    if !(hz.is_finite() && hz > 0.0) {
        return None;
    }
    Duration::try_from_secs_f64(1.0 / hz).ok().filter(|period| !period.is_zero())
}
