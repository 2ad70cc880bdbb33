//! Error types for the channel crate.

use thiserror::Error;

/// Errors surfaced by the connection engine.
///
/// The engine never returns these from its public methods; they travel in
/// [`EngineEvent::Error`](crate::events::EngineEvent::Error) so consumers can
/// observe transport failures without the engine interrupting its own
/// reconnection cycle.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The underlying WebSocket transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// An outbound payload could not be serialized to JSON.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ─────────────────────────────── Tests ───────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_display_includes_source() {
        let err = ChannelError::from(tokio_tungstenite::tungstenite::Error::ConnectionClosed);
        let text = err.to_string();
        assert!(text.starts_with("transport error:"), "{text}");
    }

    #[test]
    fn serialize_display_includes_source() {
        let bad = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err = ChannelError::from(bad);
        assert!(err.to_string().starts_with("serialization error:"));
    }

    #[test]
    fn error_is_debug() {
        let err = ChannelError::from(tokio_tungstenite::tungstenite::Error::ConnectionClosed);
        assert!(format!("{err:?}").contains("Transport"));
    }
}
