//! JPEG encoder for raw camera frames

use bytes::Bytes;
use image::ExtendedColorType;
use image::codecs::jpeg;
use std::borrow::Cow;
use tracing::trace;

use super::{FrameEncoder, yuv};
use crate::types::{PixelFormat, Quality, RawFrame};
use crate::{RelayError, Result};

/// Compresses RGB, NV21 and I420 frames to baseline JPEG.
///
/// Frames that are already JPEG are forwarded without re-encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegEncoder;

impl JpegEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl FrameEncoder for JpegEncoder {
    fn encode(&self, raw: &RawFrame, quality: Quality) -> Result<Bytes> {
        if !raw.is_well_formed() {
            return Err(RelayError::encode_failed(format!(
                "{:?} frame {}x{} has {} bytes, expected {:?}",
                raw.format,
                raw.width,
                raw.height,
                raw.data.len(),
                raw.format.frame_len(raw.width, raw.height)
            )));
        }

        let rgb: Cow<'_, [u8]> = match raw.format {
            PixelFormat::Jpeg => return Ok(raw.data.clone()),
            PixelFormat::Rgb8 => Cow::Borrowed(raw.data.as_ref()),
            PixelFormat::Nv21 => Cow::Owned(yuv::nv21_to_rgb(&raw.data, raw.width, raw.height)),
            PixelFormat::I420 => Cow::Owned(yuv::i420_to_rgb(&raw.data, raw.width, raw.height)),
        };

        let mut out = Vec::with_capacity(rgb.len() / 8);
        let mut encoder = jpeg::JpegEncoder::new_with_quality(&mut out, quality.get());
        encoder.encode(&rgb, raw.width, raw.height, ExtendedColorType::Rgb8)?;

        trace!(
            width = raw.width,
            height = raw.height,
            quality = quality.get(),
            raw_bytes = raw.data.len(),
            jpeg_bytes = out.len(),
            "Frame encoded"
        );

        Ok(Bytes::from(out))
    }

    fn name(&self) -> &'static str {
        "jpeg"
    }
}
