//! Callback-fed capture source

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::Result;
use crate::capture::CaptureSource;
use crate::types::RawFrame;

/// State shared between the capture callback and the driver
struct Shared {
    /// Most recent frame not yet taken by the driver
    pending: Mutex<Option<RawFrame>>,
    notify: Notify,
    /// Every handle is gone
    handles_closed: AtomicBool,
    /// The source was dropped
    source_closed: AtomicBool,
    submitted: AtomicU64,
    superseded: AtomicU64,
}

impl Shared {
    fn take(&self) -> Option<RawFrame> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Sets the closed flag once the last [`CaptureHandle`] clone is dropped
struct HandleGuard {
    shared: Arc<Shared>,
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.shared.handles_closed.store(true, Ordering::Release);
        self.shared.notify.notify_one();
    }
}

/// Handle given to the external capture pipeline.
///
/// Only the most recent unconsumed frame is kept: submitting while the driver
/// is still busy encoding replaces the waiting frame instead of queueing it.
#[derive(Clone)]
pub struct CaptureHandle {
    guard: Arc<HandleGuard>,
}

impl CaptureHandle {
    /// Hand a captured frame to the relay.
    ///
    /// Returns `false` if the relay side is gone and the frame was discarded.
    pub fn submit(&self, raw: RawFrame) -> bool {
        let shared = &self.guard.shared;
        if shared.source_closed.load(Ordering::Acquire) {
            return false;
        }

        let replaced =
            shared.pending.lock().unwrap_or_else(PoisonError::into_inner).replace(raw).is_some();
        shared.submitted.fetch_add(1, Ordering::Relaxed);
        if replaced {
            shared.superseded.fetch_add(1, Ordering::Relaxed);
            trace!("Unconsumed raw frame replaced by a newer one");
        }

        shared.notify.notify_one();
        true
    }

    /// Frames submitted so far
    pub fn submitted(&self) -> u64 {
        self.guard.shared.submitted.load(Ordering::Relaxed)
    }

    /// Frames replaced before the driver picked them up
    pub fn superseded(&self) -> u64 {
        self.guard.shared.superseded.load(Ordering::Relaxed)
    }
}

/// Capture source fed by a [`CaptureHandle`]
pub struct ChannelSource {
    shared: Arc<Shared>,
    frame_rate: f64,
}

impl ChannelSource {
    /// Create a connected handle/source pair.
    ///
    /// `frame_rate` is the capture pipeline's nominal rate, used for reporting only.
    pub fn new(frame_rate: f64) -> (CaptureHandle, ChannelSource) {
        let shared = Arc::new(Shared {
            pending: Mutex::new(None),
            notify: Notify::new(),
            handles_closed: AtomicBool::new(false),
            source_closed: AtomicBool::new(false),
            submitted: AtomicU64::new(0),
            superseded: AtomicU64::new(0),
        });

        let handle = CaptureHandle { guard: Arc::new(HandleGuard { shared: Arc::clone(&shared) }) };
        (handle, ChannelSource { shared, frame_rate })
    }
}

impl Drop for ChannelSource {
    fn drop(&mut self) {
        self.shared.source_closed.store(true, Ordering::Release);
    }
}

#[async_trait::async_trait]
impl CaptureSource for ChannelSource {
    async fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        loop {
            if let Some(raw) = self.shared.take() {
                return Ok(Some(raw));
            }

            if self.shared.handles_closed.load(Ordering::Acquire) {
                debug!("All capture handles dropped, ending source");
                return Ok(None);
            }

            self.shared.notify.notified().await;
        }
    }

    fn frame_rate(&self) -> f64 {
        self.frame_rate
    }
}
