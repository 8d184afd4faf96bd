//! Per-connection sessions
//!
//! Every accepted WebSocket runs exactly one protocol, chosen by request path:
//!
//! - [`echo`] on `/chat`: greeting, then a text reply per text message
//! - [`live`] on `/live`: the newest published frame, as binary messages
//!
//! Both protocols are written against `Sink<Message>` / `Stream<Item =
//! Result<Message, E>>` rather than the concrete socket, so they run the same
//! over an axum `WebSocket` and over in-memory channels in tests.

pub mod echo;
pub mod live;

pub use echo::{EchoOutcome, GREETING, REPLY_PREFIX, run_echo};
pub use live::{BroadcastLoop, BroadcastOutcome, LoopEnd};

use axum::extract::ws::Message;
use futures::{Sink, SinkExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::types::SessionProtocol;
use crate::{RelayError, Result};

/// One accepted client connection
#[derive(Debug, Clone)]
pub struct ClientSession {
    /// Server-unique id, assigned in accept order
    pub id: u64,

    pub protocol: SessionProtocol,

    /// Remote address of the client
    pub peer: SocketAddr,

    /// Liveness flag; cancelled on disconnect, failed send, or server shutdown
    pub cancel: CancellationToken,
}

impl ClientSession {
    pub fn new(id: u64, protocol: SessionProtocol, peer: SocketAddr, cancel: CancellationToken) -> Self {
        Self { id, protocol, peer, cancel }
    }

    pub fn is_alive(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Mark the session dead
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

/// Send one message, failing with [`RelayError::Timeout`] instead of waiting
/// on a dead peer forever.
pub(crate) async fn send_bounded<S>(sink: &mut S, message: Message, limit: Duration) -> Result<()>
where
    S: Sink<Message> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    match tokio::time::timeout(limit, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(RelayError::transport_with_source("send failed", Box::new(e))),
        Err(_) => Err(RelayError::Timeout { duration: limit }),
    }
}
