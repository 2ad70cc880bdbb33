//! Lifecycle and message events emitted by the connection engine.

use argus_core::Envelope;

use crate::errors::ChannelError;

/// Events the engine emits on its event channel, in the order they occur.
///
/// One receiver (typically the [`ChannelManager`](crate::manager::ChannelManager)
/// dispatch task) consumes these. Heartbeat envelopes are absorbed inside the
/// engine and never appear here.
#[derive(Debug)]
pub enum EngineEvent {
    /// The socket finished its handshake and the channel is open. Emitted
    /// after every successful dial, including reconnects.
    Opened,

    /// A non-heartbeat envelope arrived and parsed cleanly. `raw` carries the
    /// original frame text for consumers that want the unparsed form.
    Message {
        /// The parsed envelope.
        envelope: Envelope,
        /// The frame text exactly as it arrived.
        raw: String,
    },

    /// A text frame arrived that did not parse as an envelope.
    Raw(String),

    /// The transport reported an error. The engine keeps running; a `Closed`
    /// follows if the error tore the connection down.
    Error(ChannelError),

    /// The connection closed, cleanly or not.
    Closed,

    /// Every reconnection attempt was used up; the engine has stopped. Only a
    /// new `connect` call will dial again.
    Exhausted {
        /// How many attempts were made before giving up.
        attempts: u32,
    },
}

// ─────────────────────────────── Tests ───────────────────────────────
