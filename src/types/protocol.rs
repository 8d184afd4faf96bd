//! Session protocols selected by request path

use serde::{Deserialize, Serialize};

/// Protocol a client session runs after the WebSocket upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "lowercase")]
pub enum SessionProtocol {
    /// Text round trip on `/chat`
    Echo,

    /// Binary frame broadcast on `/live`
    Live,
}

impl SessionProtocol {
    /// Resolve a request path to its protocol
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "/chat" => Some(SessionProtocol::Echo),
            "/live" => Some(SessionProtocol::Live),
            _ => None,
        }
    }

    /// Route path serving this protocol
    pub fn path(self) -> &'static str {
        match self {
            SessionProtocol::Echo => "/chat",
            SessionProtocol::Live => "/live",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionProtocol::Echo => "echo",
            SessionProtocol::Live => "live",
        }
    }
}

impl std::fmt::Display for SessionProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
