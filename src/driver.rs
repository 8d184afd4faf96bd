//! Driver spawns and manages the frame production task

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::capture::CaptureSource;
use crate::encode::FrameEncoder;
use crate::slot::FrameSlot;
use crate::types::{Quality, RawFrame};
use crate::{RelayError, Result};

/// Consecutive capture errors tolerated before the driver gives up
const MAX_CAPTURE_ERRORS: u32 = 10;

/// Counters reported when the driver ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverReport {
    /// Raw frames delivered by the source
    pub frames_captured: u64,
    /// Encoded frames published into the slot
    pub frames_published: u64,
    /// Raw frames dropped because encoding failed
    pub encode_failures: u64,
}

/// Handle to a running driver task
pub struct DriverHandle {
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    task: JoinHandle<DriverReport>,
}

impl DriverHandle {
    /// Cancel the driver and wait for it to finish
    pub async fn stop(self) -> Result<DriverReport> {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the driver to end on its own (source exhausted or failed)
    pub async fn join(self) -> Result<DriverReport> {
        self.task
            .await
            .map_err(|e| RelayError::Shutdown { reason: format!("driver task failed: {e}") })
    }
}

/// Driver spawns and manages the producer side of the relay
///
/// Pulls raw frames from a [`CaptureSource`], encodes them on the blocking
/// pool, and publishes the result into the [`FrameSlot`]. It is the only
/// writer of the slot.
pub struct Driver;

impl Driver {
    /// Spawn the producer task
    pub fn spawn<S, E>(source: S, encoder: E, slot: FrameSlot, quality: Quality) -> DriverHandle
    where
        S: CaptureSource,
        E: FrameEncoder,
    {
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();
        let encoder: Arc<dyn FrameEncoder> = Arc::new(encoder);

        let task = tokio::spawn(async move {
            Self::produce_task(source, encoder, slot, quality, cancel_task).await
        });

        DriverHandle { cancel, task }
    }

    /// Producer task - captures, encodes, publishes
    async fn produce_task<S>(
        mut source: S,
        encoder: Arc<dyn FrameEncoder>,
        slot: FrameSlot,
        quality: Quality,
        cancel: CancellationToken,
    ) -> DriverReport
    where
        S: CaptureSource,
    {
        info!(
            encoder = encoder.name(),
            %quality,
            frame_rate = source.frame_rate(),
            "Frame producer started"
        );
        let mut report = DriverReport::default();
        let mut error_count = 0u32;

        loop {
            if cancel.is_cancelled() {
                info!("Frame producer cancelled");
                break;
            }

            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Frame producer cancelled during capture");
                    break;
                }
                result = source.next_frame() => result,
            };

            match result {
                Ok(Some(raw)) => {
                    error_count = 0;
                    report.frames_captured += 1;

                    let encoded = tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("Frame producer cancelled during encode");
                            break;
                        }
                        encoded = Self::encode(Arc::clone(&encoder), raw, quality) => encoded,
                    };

                    match encoded {
                        Ok(payload) => {
                            let version = slot.publish(payload);
                            report.frames_published += 1;
                            trace!(version, "Published encoded frame");
                        }
                        Err(e) => {
                            // Drop this frame; the slot keeps serving the previous one
                            report.encode_failures += 1;
                            warn!(
                                failures = report.encode_failures,
                                "Dropping frame that failed to encode: {}", e
                            );
                        }
                    }
                }
                Ok(None) => {
                    info!("Capture source ended after {} frames", report.frames_captured);
                    break;
                }
                Err(e) => {
                    error_count += 1;
                    error!("Capture error ({}/{}): {}", error_count, MAX_CAPTURE_ERRORS, e);

                    if error_count >= MAX_CAPTURE_ERRORS {
                        error!("Too many capture errors, stopping producer");
                        break;
                    }

                    // Exponential backoff: 100ms, 200ms, 400ms, ...
                    let backoff =
                        std::time::Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        info!(
            captured = report.frames_captured,
            published = report.frames_published,
            encode_failures = report.encode_failures,
            "Frame producer ended"
        );
        report
    }

    /// Encode on the blocking pool so async workers stay responsive
    async fn encode(
        encoder: Arc<dyn FrameEncoder>,
        raw: RawFrame,
        quality: Quality,
    ) -> Result<bytes::Bytes> {
        match tokio::task::spawn_blocking(move || encoder.encode(&raw, quality)).await {
            Ok(result) => result,
            Err(e) => {
                debug!("Encode task did not complete: {}", e);
                Err(RelayError::encode_failed(format!("encoder task failed: {e}")))
            }
        }
    }
}
