//! Channel endpoint URL construction.

use argus_core::SubjectId;
use argus_settings::EndpointSettings;

/// Build the WebSocket URL for a subject's push channel.
///
/// The scheme follows `secure` (`wss` when set, `ws` otherwise), and the
/// subject id is appended as the final path segment:
/// `{scheme}://{host}{base_path}/{subject}`. A missing leading slash or a
/// trailing slash on `base_path` is tolerated.
pub fn endpoint_url(endpoint: &EndpointSettings, subject: &SubjectId) -> String {
    let scheme = if endpoint.secure { "wss" } else { "ws" };
    let base = endpoint.base_path.trim_end_matches('/');
    if base.is_empty() {
        format!("{scheme}://{}/{subject}", endpoint.host)
    } else if base.starts_with('/') {
        format!("{scheme}://{}{base}/{subject}", endpoint.host)
    } else {
        format!("{scheme}://{}/{base}/{subject}", endpoint.host)
    }
}

// ─────────────────────────────── Tests ───────────────────────────────
