//! Bookkeeping of the sessions currently being served

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::RelayMetrics;
use crate::session::ClientSession;
use crate::types::SessionProtocol;

#[derive(Debug, Clone)]
struct SessionEntry {
    protocol: SessionProtocol,
    peer: SocketAddr,
    cancel: CancellationToken,
    opened_at: Instant,
}

/// Summary of one registered session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: u64,
    pub protocol: SessionProtocol,
    pub peer: SocketAddr,
    pub opened_at: Instant,
}

/// Active sessions keyed by id.
///
/// Sessions only register and deregister themselves; frame delivery never
/// goes through the registry.
#[derive(Debug)]
pub struct SessionRegistry {
    next_id: AtomicU64,
    sessions: Mutex<HashMap<u64, SessionEntry>>,
    metrics: Arc<RelayMetrics>,
}

impl SessionRegistry {
    pub fn new(metrics: Arc<RelayMetrics>) -> Self {
        Self { next_id: AtomicU64::new(1), sessions: Mutex::new(HashMap::new()), metrics }
    }

    /// Register a new session whose liveness token is a child of `parent`.
    ///
    /// The session stays registered until the returned guard is dropped.
    pub fn open(
        self: &Arc<Self>,
        protocol: SessionProtocol,
        peer: SocketAddr,
        parent: &CancellationToken,
    ) -> (ClientSession, SessionGuard) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = parent.child_token();

        self.lock().insert(
            id,
            SessionEntry { protocol, peer, cancel: cancel.clone(), opened_at: Instant::now() },
        );
        self.metrics.session_opened(protocol);
        debug!(id, %protocol, %peer, "Session registered");

        let session = ClientSession::new(id, protocol, peer, cancel);
        (session, SessionGuard { id, registry: Arc::clone(self) })
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the registered sessions, ordered by id
    pub fn sessions(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<_> = self
            .lock()
            .iter()
            .map(|(&id, entry)| SessionInfo {
                id,
                protocol: entry.protocol,
                peer: entry.peer,
                opened_at: entry.opened_at,
            })
            .collect();
        sessions.sort_by_key(|s| s.id);
        sessions
    }

    /// Cancel every registered session; returns how many were signalled
    pub fn cancel_all(&self) -> usize {
        let sessions = self.lock();
        for entry in sessions.values() {
            entry.cancel.cancel();
        }
        sessions.len()
    }

    fn close(&self, id: u64) {
        if let Some(entry) = self.lock().remove(&id) {
            self.metrics.session_closed(entry.protocol);
            debug!(
                id,
                protocol = %entry.protocol,
                elapsed_ms = entry.opened_at.elapsed().as_millis() as u64,
                "Session deregistered"
            );
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Deregisters its session when dropped
#[derive(Debug)]
pub struct SessionGuard {
    id: u64,
    registry: Arc<SessionRegistry>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.close(self.id);
    }
}
