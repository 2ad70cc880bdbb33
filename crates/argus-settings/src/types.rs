//! Channel settings structures.
//!
//! Defaults mirror the monitoring platform's production values: a 30 second
//! heartbeat, linear reconnect backoff of 5 seconds per attempt, at most 5
//! attempts, and the `/api/websocket` endpoint base path.

use serde::{Deserialize, Serialize};

/// Top-level settings for the realtime channel client.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSettings {
    /// Push-channel endpoint construction.
    pub endpoint: EndpointSettings,
    /// Reconnection backoff parameters.
    pub reconnect: ReconnectSettings,
    /// Keep-alive heartbeat interval in milliseconds.
    pub heartbeat_interval_ms: u64,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            endpoint: EndpointSettings::default(),
            reconnect: ReconnectSettings::default(),
            heartbeat_interval_ms: 30_000,
        }
    }
}

/// How the push-channel endpoint URL is assembled.
///
/// The final URL is `{ws|wss}://{host}{base_path}/{subject}` — `wss` when
/// `secure` is set, mirroring the security level of the hosting page.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointSettings {
    /// Use `wss://` instead of `ws://`.
    pub secure: bool,
    /// Host (and optional port) of the monitoring backend.
    pub host: String,
    /// Fixed path prefix of the push endpoint.
    pub base_path: String,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            secure: false,
            host: "127.0.0.1:8080".to_string(),
            base_path: "/api/websocket".to_string(),
        }
    }
}

/// Reconnection backoff parameters.
///
/// The engine uses linear backoff: attempt N (1-based) waits
/// `base_delay_ms * N` before re-dialing, up to `max_attempts` attempts.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectSettings {
    /// Maximum consecutive reconnection attempts before giving up.
    pub max_attempts: u32,
    /// Base delay multiplied by the attempt number, in milliseconds.
    pub base_delay_ms: u64,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 5_000,
        }
    }
}
