//! Test utilities shared by unit tests and benchmarks
//!
//! Deterministic raw frames, a scripted capture source, and an encoder that
//! always fails, so producer and session behavior can be exercised without a
//! camera.

#![cfg(any(test, feature = "benchmark"))]

use bytes::Bytes;
use std::collections::VecDeque;

use crate::capture::CaptureSource;
use crate::encode::FrameEncoder;
use crate::sources::test_pattern::render;
use crate::types::{PixelFormat, Quality, RawFrame};
use crate::{RelayError, Result};

/// Deterministic raw frame; different seeds produce different pixels
pub fn test_pattern(width: u32, height: u32, format: PixelFormat, seed: u64) -> RawFrame {
    render(width, height, format, seed)
}

/// Step a [`ScriptedSource`] replays in order
#[derive(Debug)]
pub enum ScriptStep {
    Frame(RawFrame),
    Fail(String),
}

/// Capture source that replays a fixed script, then ends.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    steps: VecDeque<ScriptStep>,
    delivered: usize,
}

impl ScriptedSource {
    /// Deliver the given frames back to back
    pub fn new(frames: Vec<RawFrame>) -> Self {
        Self { steps: frames.into_iter().map(ScriptStep::Frame).collect(), delivered: 0 }
    }

    /// Fail `count` times in a row, then end
    pub fn failing(count: usize) -> Self {
        Self::from_steps((0..count).map(|i| ScriptStep::Fail(format!("scripted failure {i}"))))
    }

    pub fn from_steps(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self { steps: steps.into_iter().collect(), delivered: 0 }
    }

    /// Frames handed out so far
    pub fn delivered(&self) -> usize {
        self.delivered
    }
}

#[async_trait::async_trait]
impl CaptureSource for ScriptedSource {
    async fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        match self.steps.pop_front() {
            Some(ScriptStep::Frame(frame)) => {
                self.delivered += 1;
                Ok(Some(frame))
            }
            Some(ScriptStep::Fail(reason)) => Err(RelayError::capture_failed(reason)),
            None => Ok(None),
        }
    }

    fn frame_rate(&self) -> f64 {
        0.0
    }
}

/// Encoder that rejects every frame
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingEncoder;

impl FrameEncoder for FailingEncoder {
    fn encode(&self, raw: &RawFrame, _quality: Quality) -> Result<Bytes> {
        Err(RelayError::encode_failed(format!(
            "refusing {}x{} {:?} frame",
            raw.width, raw.height, raw.format
        )))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}
