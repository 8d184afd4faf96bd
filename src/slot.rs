//! Single-slot frame buffer shared between the producer and every live session.
//!
//! The slot holds at most one [`Frame`]: the most recently published one. A
//! publish swaps the whole `Arc<Frame>` under the watch channel's lock, so the
//! lock is held only for a pointer swap, never while encoding or sending.
//! Readers clone the `Arc` and release the lock immediately; they can keep the
//! frame as long as they like without ever delaying the producer.
//!
//! Sessions subscribe to the slot; the slot never references sessions. A
//! dropped [`FrameSubscriber`] needs no unsubscription.

use bytes::Bytes;
use futures::Stream;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::types::Frame;

/// Shared handle to the single most-recent frame.
///
/// Cloning the handle is cheap; all clones refer to the same slot.
#[derive(Clone)]
pub struct FrameSlot {
    inner: Arc<SlotInner>,
}

struct SlotInner {
    /// Current frame, `None` until the first publish
    tx: watch::Sender<Option<Arc<Frame>>>,

    /// Set once the owning server stops
    closed: CancellationToken,
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSlot {
    /// Create an empty slot at version 0
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { inner: Arc::new(SlotInner { tx, closed: CancellationToken::new() }) }
    }

    /// Replace the current frame and return its version.
    ///
    /// The new version is always `previous + 1`, computed under the same swap
    /// that installs the frame. Empty payloads are accepted.
    pub fn publish(&self, payload: impl Into<Bytes>) -> u64 {
        let payload = payload.into();
        let size = payload.len();
        let mut version = 0;

        self.inner.tx.send_modify(|current| {
            version = current.as_ref().map_or(0, |frame| frame.version) + 1;
            *current = Some(Arc::new(Frame::new(payload, version)));
        });

        trace!(version, size, "Frame published");
        version
    }

    /// Version of the current frame, 0 if nothing was published yet
    pub fn current_version(&self) -> u64 {
        self.inner.tx.borrow().as_ref().map_or(0, |frame| frame.version)
    }

    /// Current frame and its version
    pub fn snapshot(&self) -> (Option<Arc<Frame>>, u64) {
        let frame = self.inner.tx.borrow().clone();
        let version = frame.as_ref().map_or(0, |frame| frame.version);
        (frame, version)
    }

    /// Create a reader that yields each newer frame once
    pub fn subscribe(&self) -> FrameSubscriber {
        FrameSubscriber {
            rx: self.inner.tx.subscribe(),
            closed: self.inner.closed.clone(),
            last_version: None,
        }
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.tx.receiver_count()
    }

    /// Close the slot; every subscriber ends
    pub fn close(&self) {
        if !self.inner.closed.is_cancelled() {
            debug!(version = self.current_version(), "Closing frame slot");
            self.inner.closed.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }
}

impl std::fmt::Debug for FrameSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSlot")
            .field("version", &self.current_version())
            .field("subscribers", &self.subscriber_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Per-reader view of a [`FrameSlot`].
///
/// Each call to [`next`](FrameSubscriber::next) suspends until a frame newer
/// than the last one it returned exists, then returns the newest one.
/// Intermediate versions published while the reader was busy are skipped.
pub struct FrameSubscriber {
    rx: watch::Receiver<Option<Arc<Frame>>>,
    closed: CancellationToken,
    last_version: Option<u64>,
}

impl FrameSubscriber {
    /// Wait for a frame newer than the last one returned.
    ///
    /// Returns `None` once the slot is closed or every slot handle is dropped.
    pub async fn next(&mut self) -> Option<Arc<Frame>> {
        loop {
            if self.closed.is_cancelled() {
                return None;
            }

            let latest = self.rx.borrow_and_update().clone();
            if let Some(frame) = latest {
                if self.last_version.is_none_or(|last| frame.version > last) {
                    self.last_version = Some(frame.version);
                    return Some(frame);
                }
            }

            tokio::select! {
                _ = self.closed.cancelled() => return None,
                changed = self.rx.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
            }
        }
    }

    /// Version of the last frame this subscriber returned
    pub fn last_version(&self) -> Option<u64> {
        self.last_version
    }

    /// Convert into a stream of strictly increasing frames
    pub fn into_stream(self) -> impl Stream<Item = Arc<Frame>> + Send + 'static {
        futures::stream::unfold(self, |mut subscriber| async move {
            subscriber.next().await.map(|frame| (frame, subscriber))
        })
    }
}
