//! Lock-free relay counters, exposed on `/status`.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::SessionProtocol;

/// Thread-safe counters for the relay.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    active_echo: AtomicU64,
    active_live: AtomicU64,
    total_sessions: AtomicU64,
    frames_sent: AtomicU64,
    frames_skipped: AtomicU64,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_opened(&self, protocol: SessionProtocol) {
        self.total_sessions.fetch_add(1, Ordering::Relaxed);
        self.active(protocol).fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_closed(&self, protocol: SessionProtocol) {
        self.active(protocol).fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frames_skipped(&self, skipped: u64) {
        if skipped > 0 {
            self.frames_skipped.fetch_add(skipped, Ordering::Relaxed);
        }
    }

    pub fn active_sessions(&self, protocol: SessionProtocol) -> u64 {
        self.active(protocol).load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self, current_version: u64) -> RelayStats {
        RelayStats {
            current_version,
            active_live_sessions: self.active_live.load(Ordering::Relaxed),
            active_echo_sessions: self.active_echo.load(Ordering::Relaxed),
            total_sessions: self.total_sessions.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
        }
    }

    fn active(&self, protocol: SessionProtocol) -> &AtomicU64 {
        match protocol {
            SessionProtocol::Echo => &self.active_echo,
            SessionProtocol::Live => &self.active_live,
        }
    }
}

/// Counter snapshot served as JSON on `/status`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct RelayStats {
    /// Version of the frame currently in the slot (0 before the first publish)
    pub current_version: u64,
    pub active_live_sessions: u64,
    pub active_echo_sessions: u64,
    /// Sessions accepted since start
    pub total_sessions: u64,
    /// Binary frames delivered to live clients
    pub frames_sent: u64,
    /// Versions collapsed away for lagging live clients
    pub frames_skipped: u64,
}
