//! Text echo protocol served on `/chat`

use axum::extract::ws::Message;
use futures::{Sink, Stream, StreamExt};
use std::time::Duration;
use tracing::{debug, trace};

use super::{ClientSession, send_bounded};

/// First message every echo client receives
pub const GREETING: &str = "You are connected!";

/// Prefix of every reply
pub const REPLY_PREFIX: &str = "You said: ";

/// How an echo session went
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EchoOutcome {
    /// Replies sent (the greeting is not counted)
    pub replies: u64,
}

/// Run the echo protocol until the client leaves or the session is cancelled.
///
/// Binary, ping and pong messages are ignored. Nothing is sent after the loop
/// ends.
pub async fn run_echo<S, R, E>(
    session: &ClientSession,
    mut sink: S,
    mut incoming: R,
    send_timeout: Duration,
) -> EchoOutcome
where
    S: Sink<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut outcome = EchoOutcome::default();

    if let Err(e) = send_bounded(&mut sink, Message::Text(GREETING.into()), send_timeout).await {
        debug!(session = session.id, "Greeting failed: {}", e);
        session.close();
        return outcome;
    }

    loop {
        let message = tokio::select! {
            _ = session.cancel.cancelled() => break,
            message = incoming.next() => message,
        };

        match message {
            Some(Ok(Message::Text(text))) => {
                trace!(session = session.id, len = text.as_str().len(), "Echo request");
                let reply = format!("{REPLY_PREFIX}{}", text.as_str());
                if let Err(e) = send_bounded(&mut sink, Message::Text(reply.into()), send_timeout).await {
                    debug!(session = session.id, "Echo reply failed: {}", e);
                    break;
                }
                outcome.replies += 1;
            }
            Some(Ok(Message::Close(_))) | None => {
                debug!(session = session.id, "Echo client closed");
                break;
            }
            Some(Err(e)) => {
                debug!(session = session.id, "Echo transport error: {}", e);
                break;
            }
            Some(Ok(_)) => {}
        }
    }

    session.close();
    outcome
}
