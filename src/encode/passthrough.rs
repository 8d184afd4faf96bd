//! Pass-through encoder for cameras that already emit JPEG

use bytes::Bytes;

use super::{FrameEncoder, JPEG_SOI};
use crate::types::{PixelFormat, Quality, RawFrame};
use crate::{RelayError, Result};

/// Forwards JPEG frames untouched; anything else is an encode failure.
///
/// The quality parameter is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughEncoder;

impl FrameEncoder for PassthroughEncoder {
    fn encode(&self, raw: &RawFrame, _quality: Quality) -> Result<Bytes> {
        if raw.format != PixelFormat::Jpeg {
            return Err(RelayError::encode_failed(format!(
                "passthrough expects JPEG input, got {:?}",
                raw.format
            )));
        }
        if !raw.data.starts_with(&JPEG_SOI) {
            return Err(RelayError::encode_failed("missing JPEG start-of-image marker"));
        }
        Ok(raw.data.clone())
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwards_jpeg_payload() {
        let raw = RawFrame::new(1, 1, PixelFormat::Jpeg, vec![0xFF, 0xD8, 0x00, 0xFF, 0xD9]);
        assert_eq!(PassthroughEncoder.encode(&raw, Quality::default()).unwrap(), raw.data);
    }

    #[test]
    fn rejects_uncompressed_and_corrupt_input() {
        let rgb = RawFrame::new(1, 1, PixelFormat::Rgb8, vec![0, 0, 0]);
        assert!(PassthroughEncoder.encode(&rgb, Quality::default()).is_err());

        let garbage = RawFrame::new(1, 1, PixelFormat::Jpeg, vec![0x00, 0x01]);
        assert!(PassthroughEncoder.encode(&garbage, Quality::default()).is_err());
    }
}
