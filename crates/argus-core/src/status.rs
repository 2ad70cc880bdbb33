//! Connection readiness states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four-state connection readiness indicator.
///
/// Numbering matches the WebSocket `readyState` values the monitoring
/// front-end historically exposed, so serialized status survives the wire
/// unchanged.
///
/// `Closing` is declared for completeness but never entered by the engine —
/// no graceful-shutdown handshake is modeled; an explicit close goes
/// straight to `Closed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ConnectionStatus {
    /// A connection attempt is in flight.
    Connecting = 0,
    /// The channel is open and usable.
    Open = 1,
    /// A graceful shutdown is in progress (declared, unreached).
    Closing = 2,
    /// No usable connection.
    #[default]
    Closed = 3,
}

impl ConnectionStatus {
    /// Human-readable status text for UI display.
    #[must_use]
    pub fn as_text(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "connected",
            Self::Closing => "closing",
            Self::Closed => "disconnected",
        }
    }

    /// Raw numeric state, mirroring WebSocket `readyState`.
    #[must_use]
    pub fn as_num(self) -> u8 {
        self as u8
    }

    /// Inverse of [`as_num`](Self::as_num); `None` for out-of-range values.
    #[must_use]
    pub fn from_num(num: u8) -> Option<Self> {
        match num {
            0 => Some(Self::Connecting),
            1 => Some(Self::Open),
            2 => Some(Self::Closing),
            3 => Some(Self::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_text())
    }
}
