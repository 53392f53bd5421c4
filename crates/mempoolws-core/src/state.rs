//! Connection state machine.
//!
//! ```text
//! Connecting ──first frame──▶ Open ──transport error──▶ Offline
//!     │                        ▲                          │
//!     └──connect failure──▶ Offline ◀─────────────────────┘
//!                              │
//!                              └──first frame after reconnect──▶ Open (replay)
//! ```

use serde::{Deserialize, Serialize};

/// Connection state as observed by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No frame received yet on the first connection.
    #[default]
    Connecting,
    /// Frames are flowing.
    Open,
    /// The last connection failed; a retry is pending or in flight.
    Offline,
}

impl ConnectionState {
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Offline)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Offline => write!(f, "offline"),
        }
    }
}
