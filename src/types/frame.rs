//! Frame types flowing from the camera to the network

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Encoded frame as published into the [`FrameSlot`](crate::FrameSlot).
///
/// This is the unit every live client receives. The payload is immutable once
/// the frame exists; readers share it through `Arc<Frame>` and cheap `Bytes`
/// clones, so a reader can never see a partially written image.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Encoded image bytes (zero-copy via Bytes)
    pub payload: Bytes,

    /// Publish counter, starting at 1 for the first frame
    pub version: u64,

    /// When the producer published this frame
    pub published_at: Instant,
}

impl Frame {
    /// Create a new frame
    pub fn new(payload: impl Into<Bytes>, version: u64) -> Self {
        Self { payload: payload.into(), version, published_at: Instant::now() }
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// True for the degenerate empty frame
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Memory layout of a raw camera frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum PixelFormat {
    /// Packed 8-bit RGB, 3 bytes per pixel
    Rgb8,

    /// Y plane followed by interleaved V/U at quarter resolution (Android camera default)
    Nv21,

    /// Planar Y, U, V with quarter resolution chroma
    I420,

    /// Already JPEG-compressed (MJPEG cameras)
    Jpeg,
}

impl PixelFormat {
    /// Number of bytes a frame of the given size occupies.
    ///
    /// `None` for JPEG, and for sizes whose length does not fit in `usize`.
    pub fn frame_len(self, width: u32, height: u32) -> Option<usize> {
        let (w, h) = (width as usize, height as usize);
        let luma = w.checked_mul(h)?;
        match self {
            PixelFormat::Rgb8 => luma.checked_mul(3),
            PixelFormat::Nv21 | PixelFormat::I420 => {
                let chroma = w.div_ceil(2).checked_mul(h.div_ceil(2))?;
                luma.checked_add(chroma.checked_mul(2)?)
            }
            PixelFormat::Jpeg => None,
        }
    }
}

/// Raw frame handed over by the capture pipeline, before encoding.
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Pixel layout of `data`
    pub format: PixelFormat,

    /// Pixel data
    pub data: Bytes,

    /// Capture timestamp
    pub captured_at: Instant,
}

impl RawFrame {
    /// Create a new raw frame captured now
    pub fn new(width: u32, height: u32, format: PixelFormat, data: impl Into<Bytes>) -> Self {
        Self { width, height, format, data: data.into(), captured_at: Instant::now() }
    }

    /// Check that the buffer length matches the declared dimensions
    pub fn is_well_formed(&self) -> bool {
        if self.format == PixelFormat::Jpeg {
            return !self.data.is_empty();
        }
        self.width > 0
            && self.height > 0
            && self.format.frame_len(self.width, self.height) == Some(self.data.len())
    }
}
