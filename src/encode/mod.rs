//! Raw frame encoders
//!
//! An encoder turns one [`RawFrame`] into the compact payload live clients
//! receive. Encoding runs on the blocking thread pool, so implementations may
//! be CPU-heavy but must be `Sync`.
//!
//! - [`JpegEncoder`] compresses RGB and YUV frames to JPEG
//! - [`PassthroughEncoder`] forwards frames that are already JPEG

mod jpeg;
mod passthrough;
mod yuv;

pub use jpeg::JpegEncoder;
pub use passthrough::PassthroughEncoder;

use bytes::Bytes;

use crate::Result;
use crate::types::{Quality, RawFrame};

/// Trait for frame encoders
///
/// An `Err` return drops that single frame; the relay keeps serving the
/// previously published one.
pub trait FrameEncoder: Send + Sync + 'static {
    /// Encode a raw frame at the requested quality
    fn encode(&self, raw: &RawFrame, quality: Quality) -> Result<Bytes>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// JPEG start-of-image marker
pub(crate) const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
