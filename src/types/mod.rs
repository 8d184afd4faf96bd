//! Core types for frame data and session control.
//!
//! ## Architecture
//!
//! - [`RawFrame`] is what the capture pipeline produces: pixels plus layout
//! - [`Frame`] is what the relay publishes: an encoded, immutable payload plus its version
//! - [`Quality`] is the encoder's target output quality
//! - [`UpdateRate`] caps how often a single live client is served
//! - [`SessionProtocol`] identifies the echo and live protocols
//!
//! ## Usage Example
//!
//! ```rust
//! use framerelay::types::{PixelFormat, RawFrame};
//!
//! let raw = RawFrame::new(2, 2, PixelFormat::Rgb8, vec![0u8; 12]);
//! assert!(raw.is_well_formed());
//!
//! // NV21 carries a full Y plane plus quarter-resolution interleaved chroma
//! assert_eq!(PixelFormat::Nv21.frame_len(4, 4), Some(24));
//! ```

mod frame;
mod protocol;
mod quality;
mod update_rate;

pub use frame::{Frame, PixelFormat, RawFrame};
pub use protocol::SessionProtocol;
pub use quality::Quality;
pub use update_rate::UpdateRate;
pub(crate) use update_rate::frame_period;
