//! Capture source implementations
//!
//! - [`ChannelSource`] receives frames pushed by an external capture callback
//!   through a [`CaptureHandle`]
//! - [`TestPatternSource`] synthesizes a moving gradient at a fixed rate

pub mod channel;
pub mod test_pattern;

pub use channel::{CaptureHandle, ChannelSource};
pub use test_pattern::TestPatternSource;
