//! Synthetic test pattern source

use tokio::time::{Interval, MissedTickBehavior, interval};
use tracing::{info, trace};

use crate::capture::CaptureSource;
use crate::types::{PixelFormat, RawFrame, frame_period};
use crate::{RelayError, Result};

/// Moving gradient source paced at a fixed frame rate
pub struct TestPatternSource {
    width: u32,
    height: u32,
    format: PixelFormat,
    frame_rate: f64,
    interval: Interval,
    frame_index: u64,
    /// Stop after this many frames, if set
    limit: Option<u64>,
}

impl TestPatternSource {
    /// Create a new test pattern source
    pub fn new(width: u32, height: u32, format: PixelFormat, frame_rate: f64) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(RelayError::config("test pattern dimensions must be non-zero"));
        }
        if format == PixelFormat::Jpeg {
            return Err(RelayError::config("test pattern cannot synthesize JPEG"));
        }
        let Some(period) = frame_period(frame_rate) else {
            return Err(RelayError::config(format!("invalid frame rate {frame_rate}")));
        };

        let mut interval = interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(width, height, ?format, frame_rate, "Test pattern source ready");

        Ok(Self { width, height, format, frame_rate, interval, frame_index: 0, limit: None })
    }

    /// End the source after `frames` frames
    pub fn with_limit(mut self, frames: u64) -> Self {
        self.limit = Some(frames);
        self
    }
}

#[async_trait::async_trait]
impl CaptureSource for TestPatternSource {
    async fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        if self.limit.is_some_and(|limit| self.frame_index >= limit) {
            return Ok(None);
        }

        self.interval.tick().await;

        let raw = render(self.width, self.height, self.format, self.frame_index);
        trace!(frame = self.frame_index, "Test pattern frame");
        self.frame_index += 1;

        Ok(Some(raw))
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }
}

/// Render frame `index` of the moving gradient
pub fn render(width: u32, height: u32, format: PixelFormat, index: u64) -> RawFrame {
    let (w, h) = (width as usize, height as usize);
    let shift = (index % 256) as usize;

    let data = match format {
        PixelFormat::Rgb8 => {
            let mut data = Vec::with_capacity(format.frame_len(width, height).unwrap_or(0));
            for y in 0..h {
                for x in 0..w {
                    data.push(((x * 255 / w.max(1)) + shift) as u8);
                    data.push(((y * 255 / h.max(1)) + shift) as u8);
                    data.push(((x + y) / 2 + shift * 2) as u8);
                }
            }
            data
        }
        PixelFormat::Nv21 | PixelFormat::I420 => {
            let len = format.frame_len(width, height).unwrap_or(0);
            let mut data = Vec::with_capacity(len);
            for y in 0..h {
                for x in 0..w {
                    data.push((x + y + shift) as u8);
                }
            }
            // Chroma drifts slowly so colors cycle over time
            let hue = (shift / 2) as u8;
            while data.len() < len {
                data.push(128u8.wrapping_add(hue));
            }
            data
        }
        PixelFormat::Jpeg => Vec::new(),
    };

    RawFrame::new(width, height, format, data)
}
