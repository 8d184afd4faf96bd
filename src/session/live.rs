//! Live frame broadcast served on `/live`

use axum::extract::ws::Message;
use futures::stream::BoxStream;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use super::{ClientSession, send_bounded};
use crate::server::RelayMetrics;
use crate::slot::FrameSubscriber;
use crate::stream::ThrottleExt;
use crate::types::{Frame, UpdateRate};

/// Why a broadcast loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopEnd {
    /// The client closed, errored, or stopped accepting data in time
    ClientGone,
    /// The session token was cancelled
    Cancelled,
    /// The frame slot closed
    SlotClosed,
}

/// Delivery summary of one live session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub frames_sent: u64,
    /// Versions published while this client was busy and never sent to it
    pub frames_skipped: u64,
    pub last_version: Option<u64>,
    pub end: LoopEnd,
}

/// Sends the newest frame to one client, one version at a time.
///
/// The loop holds at most the frame of the in-flight send. A new send starts
/// only after the previous one completed, and only for a version newer than
/// the last one sent, so a slow client skips straight to the latest frame.
pub struct BroadcastLoop {
    frames: FrameSubscriber,
    rate: UpdateRate,
    send_timeout: Duration,
    metrics: Option<Arc<RelayMetrics>>,
}

impl BroadcastLoop {
    pub fn new(frames: FrameSubscriber, send_timeout: Duration) -> Self {
        Self { frames, rate: UpdateRate::Native, send_timeout, metrics: None }
    }

    /// Cap delivery for this client
    pub fn with_rate(mut self, rate: UpdateRate) -> Self {
        self.rate = rate;
        self
    }

    /// Report sent and skipped frames into shared counters as they happen
    pub fn with_metrics(mut self, metrics: Arc<RelayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run until the client leaves, the session is cancelled, or the slot closes.
    ///
    /// `incoming` is the client's half of the socket. It is read only to notice
    /// a close while no frames are flowing; its messages are discarded.
    pub async fn run<S, R, E>(self, session: &ClientSession, mut sink: S, mut incoming: R) -> BroadcastOutcome
    where
        S: Sink<Message> + Unpin,
        S::Error: std::error::Error + Send + Sync + 'static,
        R: Stream<Item = Result<Message, E>> + Unpin,
        E: std::fmt::Display,
    {
        let Self { frames, rate, send_timeout, metrics } = self;

        let mut frames: BoxStream<'static, Arc<Frame>> = match rate.throttle_interval() {
            Some(interval) => frames.into_stream().throttle(interval).boxed(),
            None => frames.into_stream().boxed(),
        };

        let mut frames_sent = 0u64;
        let mut frames_skipped = 0u64;
        let mut last_version: Option<u64> = None;

        let end = loop {
            let frame = tokio::select! {
                _ = session.cancel.cancelled() => break LoopEnd::Cancelled,
                message = incoming.next() => match message {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(session = session.id, "Live client closed");
                        break LoopEnd::ClientGone;
                    }
                    Some(Err(e)) => {
                        debug!(session = session.id, "Live transport error: {}", e);
                        break LoopEnd::ClientGone;
                    }
                    Some(Ok(_)) => continue,
                },
                frame = frames.next() => match frame {
                    Some(frame) => frame,
                    None => break LoopEnd::SlotClosed,
                },
            };

            let skipped = last_version.map_or(0, |last| frame.version.saturating_sub(last + 1));
            let message = Message::Binary(frame.payload.clone());

            let sent = tokio::select! {
                _ = session.cancel.cancelled() => break LoopEnd::Cancelled,
                sent = send_bounded(&mut sink, message, send_timeout) => sent,
            };

            if let Err(e) = sent {
                debug!(session = session.id, version = frame.version, "Live send failed: {}", e);
                break LoopEnd::ClientGone;
            }

            frames_sent += 1;
            frames_skipped += skipped;
            last_version = Some(frame.version);
            if let Some(metrics) = &metrics {
                metrics.record_frame_sent();
                metrics.record_frames_skipped(skipped);
            }
            trace!(session = session.id, version = frame.version, skipped, size = frame.len(), "Frame sent");
        };

        // Best effort close frame; the peer may already be gone
        if end != LoopEnd::ClientGone {
            let _ = tokio::time::timeout(send_timeout, sink.send(Message::Close(None))).await;
        }
        session.close();

        BroadcastOutcome { frames_sent, frames_skipped, last_version, end }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::FrameSlot;
    use crate::types::SessionProtocol;
    use futures::channel::mpsc;
    use std::net::SocketAddr;
    use tokio::task::JoinHandle;
    use tokio_util::sync::CancellationToken;

    type Incoming = mpsc::UnboundedSender<Result<Message, axum::Error>>;

    fn session() -> ClientSession {
        ClientSession::new(
            7,
            SessionProtocol::Live,
            SocketAddr::from(([127, 0, 0, 1], 40002)),
            CancellationToken::new(),
        )
    }

    struct Harness {
        session: ClientSession,
        input: Incoming,
        output: mpsc::Receiver<Message>,
        task: JoinHandle<BroadcastOutcome>,
    }

    fn spawn_loop(slot: &FrameSlot, capacity: usize, broadcast: impl FnOnce(BroadcastLoop) -> BroadcastLoop) -> Harness {
        let session = session();
        let (input, in_rx) = mpsc::unbounded();
        let (out_tx, output) = mpsc::channel(capacity);
        let broadcast = broadcast(BroadcastLoop::new(slot.subscribe(), Duration::from_secs(1)));
        let task = {
            let session = session.clone();
            tokio::spawn(async move { broadcast.run(&session, out_tx, in_rx).await })
        };
        Harness { session, input, output, task }
    }

    async fn next(output: &mut mpsc::Receiver<Message>) -> Option<Message> {
        tokio::time::timeout(Duration::from_secs(2), output.next()).await.expect("no message within two seconds")
    }

    fn binary(message: Option<Message>) -> Vec<u8> {
        match message {
            Some(Message::Binary(b)) => b.to_vec(),
            other => panic!("expected binary message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn nothing_is_sent_before_the_first_publish() {
        let slot = FrameSlot::new();
        let mut h = spawn_loop(&slot, 4, |b| b);

        let early = tokio::time::timeout(Duration::from_millis(50), h.output.next()).await;
        assert!(early.is_err(), "live client must wait for the first frame");

        slot.publish(&b"first"[..]);
        assert_eq!(binary(h.output.next().await), b"first");

        h.session.cancel.cancel();
        let outcome = h.task.await.unwrap();
        assert_eq!(outcome.end, LoopEnd::Cancelled);
        assert_eq!(outcome.frames_sent, 1);
        assert_eq!(outcome.last_version, Some(1));
    }

    #[tokio::test]
    async fn keeping_up_client_sees_every_version_once() {
        let slot = FrameSlot::new();
        let mut h = spawn_loop(&slot, 4, |b| b);

        for i in 1..=20u8 {
            slot.publish(vec![i]);
            assert_eq!(binary(h.output.next().await), vec![i]);
        }

        let duplicate = tokio::time::timeout(Duration::from_millis(50), h.output.next()).await;
        assert!(duplicate.is_err(), "an unchanged frame is never resent");

        h.session.cancel.cancel();
        let outcome = h.task.await.unwrap();
        assert_eq!(outcome.frames_sent, 20);
        assert_eq!(outcome.frames_skipped, 0);
    }

    #[tokio::test]
    async fn slow_client_collapses_to_latest() {
        let slot = FrameSlot::new();
        // Zero capacity: a send completes only once the message is read
        let mut h = spawn_loop(&slot, 0, |b| b);

        slot.publish(vec![1u8]);
        tokio::time::sleep(Duration::from_millis(20)).await;
        // Published while version 1 is still in flight
        for i in 2..=5u8 {
            slot.publish(vec![i]);
        }

        let received = vec![binary(next(&mut h.output).await)[0], binary(next(&mut h.output).await)[0]];
        assert_eq!(received, vec![1, 5]);

        drop(h.output);
        h.session.cancel.cancel();
        let outcome = tokio::time::timeout(Duration::from_secs(2), h.task).await.unwrap().unwrap();
        assert_eq!(outcome.frames_sent, 2);
        assert_eq!(outcome.frames_skipped, 3);
        assert_eq!(outcome.last_version, Some(5));
    }

    #[tokio::test]
    async fn client_close_is_noticed_without_frames() {
        let slot = FrameSlot::new();
        let h = spawn_loop(&slot, 4, |b| b);

        h.input.unbounded_send(Ok(Message::Close(None))).unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(1), h.task).await.unwrap().unwrap();
        assert_eq!(outcome.end, LoopEnd::ClientGone);
        assert!(!h.session.is_alive());
    }

    #[tokio::test]
    async fn client_messages_are_discarded() {
        let slot = FrameSlot::new();
        let mut h = spawn_loop(&slot, 4, |b| b);

        h.input.unbounded_send(Ok(Message::Text("hello?".into()))).unwrap();
        slot.publish(vec![9u8]);
        assert_eq!(binary(h.output.next().await), vec![9]);

        drop(h.input);
        assert_eq!(h.task.await.unwrap().end, LoopEnd::ClientGone);
    }

    #[tokio::test]
    async fn failed_send_marks_session_dead() {
        let slot = FrameSlot::new();
        let h = spawn_loop(&slot, 4, |b| b);
        drop(h.output);

        slot.publish(vec![1u8]);
        let outcome = tokio::time::timeout(Duration::from_secs(1), h.task).await.unwrap().unwrap();
        assert_eq!(outcome.end, LoopEnd::ClientGone);
        assert_eq!(outcome.frames_sent, 0);
        assert!(!h.session.is_alive());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_client_times_out() {
        let slot = FrameSlot::new();
        let mut h = spawn_loop(&slot, 0, |b| b);

        slot.publish(vec![1u8]);
        assert_eq!(binary(h.output.next().await), vec![1]);
        slot.publish(vec![2u8]);

        // Never read again: the second send hits the one second limit
        let outcome = h.task.await.unwrap();
        assert_eq!(outcome.end, LoopEnd::ClientGone);
        assert_eq!(outcome.frames_sent, 1);
        assert_eq!(outcome.last_version, Some(1));
        assert!(!h.session.is_alive());
        drop(h.output);
    }

    #[tokio::test]
    async fn client_dropped_mid_send_leaves_other_clients_untouched() {
        let slot = FrameSlot::new();
        let stalled = spawn_loop(&slot, 0, |b| b);
        let mut draining = spawn_loop(&slot, 4, |b| b);

        slot.publish(vec![1u8]);
        assert_eq!(binary(next(&mut draining.output).await), vec![1]);

        // The stalled client never read version 1, so its send is still pending
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!stalled.task.is_finished());
        drop(stalled.output);

        for i in 2..=6u8 {
            slot.publish(vec![i]);
            assert_eq!(binary(next(&mut draining.output).await), vec![i]);
        }

        let gone = tokio::time::timeout(Duration::from_secs(3), stalled.task).await.unwrap().unwrap();
        assert_eq!(gone.end, LoopEnd::ClientGone);
        assert!(!stalled.session.is_alive());

        assert!(draining.session.is_alive());
        draining.session.cancel.cancel();
        let outcome = draining.task.await.unwrap();
        assert_eq!(outcome.end, LoopEnd::Cancelled);
        assert_eq!(outcome.frames_sent, 6);
        assert_eq!(outcome.frames_skipped, 0);
    }

    #[tokio::test]
    async fn slot_close_ends_the_loop() {
        let slot = FrameSlot::new();
        let h = spawn_loop(&slot, 4, |b| b);

        slot.close();
        let outcome = tokio::time::timeout(Duration::from_secs(1), h.task).await.unwrap().unwrap();
        assert_eq!(outcome.end, LoopEnd::SlotClosed);
    }

    #[tokio::test]
    async fn rate_too_high_for_a_period_runs_uncapped() {
        let slot = FrameSlot::new();
        let mut capped = spawn_loop(&slot, 4, |b| b.with_rate(UpdateRate::Max(u32::MAX)));
        let mut requested = spawn_loop(&slot, 4, |b| b.with_rate(UpdateRate::from_fps(Some(u32::MAX))));

        for i in 1..=3u8 {
            slot.publish(vec![i]);
            assert_eq!(binary(next(&mut capped.output).await), vec![i]);
            assert_eq!(binary(next(&mut requested.output).await), vec![i]);
        }

        for h in [capped, requested] {
            h.session.cancel.cancel();
            let outcome = h.task.await.unwrap();
            assert_eq!(outcome.end, LoopEnd::Cancelled);
            assert_eq!(outcome.frames_sent, 3);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn capped_rate_sends_fewer_frames_in_order() {
        let slot = FrameSlot::new();
        let metrics = Arc::new(RelayMetrics::new());
        let mut h = {
            let metrics = Arc::clone(&metrics);
            spawn_loop(&slot, 64, move |b| b.with_rate(UpdateRate::Max(10)).with_metrics(metrics))
        };

        // 100 Hz producer for one second against a 10 Hz cap
        for i in 0..100u8 {
            slot.publish(vec![i]);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        h.session.cancel.cancel();
        let outcome = h.task.await.unwrap();

        let mut received = Vec::new();
        while let Ok(Some(message)) = h.output.try_next() {
            if let Message::Binary(b) = message {
                received.push(b[0]);
            }
        }

        assert!(received.len() >= 5 && received.len() <= 15, "got {} frames", received.len());
        assert!(received.windows(2).all(|w| w[0] < w[1]), "versions must strictly increase");
        assert_eq!(outcome.frames_sent as usize, received.len());
        assert_eq!(metrics.snapshot(0).frames_sent, outcome.frames_sent);
        assert_eq!(metrics.snapshot(0).frames_skipped, outcome.frames_skipped);
    }
}
