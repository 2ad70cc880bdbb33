//! The wire message envelope.
//!
//! Every structured message on the push channel — in both directions — is a
//! JSON object of the shape:
//!
//! ```json
//! { "type": "alarm", "data": {...}, "timestamp": 1767225600000, "id": "..." }
//! ```
//!
//! `type` is the routing discriminator. The value `"heartbeat"` is reserved
//! for transport keep-alive and is never surfaced to subscribers. `data` is
//! deliberately an opaque [`serde_json::Value`] so server-introduced types
//! stay representable without a client update.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::MessageId;

/// Reserved message type for transport keep-alive.
pub const HEARTBEAT_TYPE: &str = "heartbeat";

/// A structured wire message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Routing discriminator (`"alarm"`, `"device.status"`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Consumer-defined payload.
    pub data: Value,
    /// Milliseconds since the Unix epoch, stamped at send time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    /// Unique message identifier, stamped at send time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Envelope {
    /// Build a fully stamped envelope for an outbound message.
    #[must_use]
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        Self {
            kind: kind.into(),
            data,
            timestamp: Some(now_ms()),
            id: Some(MessageId::new().into_inner()),
        }
    }

    /// Build a heartbeat envelope carrying the current timestamp.
    #[must_use]
    pub fn heartbeat() -> Self {
        Self::new(HEARTBEAT_TYPE, serde_json::json!({ "timestamp": now_ms() }))
    }

    /// Whether this envelope is transport keep-alive.
    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        self.kind == HEARTBEAT_TYPE
    }

    /// Parse a text frame as a structured envelope.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Serialize to the wire format.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Current time in milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Stamp a raw JSON value the way the engine stamps outbound payloads.
///
/// Objects lacking an explicit `id` field gain a current `timestamp` and a
/// freshly generated `id`. Objects that already carry an `id`, and
/// non-object values, are returned unmodified.
#[must_use]
pub fn stamp_value(value: Value) -> Value {
    match value {
        Value::Object(mut map) if !map.contains_key("id") => {
            let _ = map.insert("timestamp".to_owned(), Value::from(now_ms()));
            let _ = map.insert(
                "id".to_owned(),
                Value::String(MessageId::new().into_inner()),
            );
            Value::Object(map)
        }
        other => other,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_envelope_is_stamped() {
        let env = Envelope::new("alarm", json!({"severity": "high"}));
        assert_eq!(env.kind, "alarm");
        assert!(env.timestamp.is_some());
        assert!(env.id.is_some());
    }

    #[test]
    fn heartbeat_is_heartbeat() {
        let hb = Envelope::heartbeat();
        assert!(hb.is_heartbeat());
        assert!(hb.data["timestamp"].is_i64());
    }

    #[test]
    fn alarm_is_not_heartbeat() {
        let env = Envelope::new("alarm", json!({}));
        assert!(!env.is_heartbeat());
    }

    #[test]
    fn serializes_with_type_field() {
        let env = Envelope::new("device.status", json!({"online": true}));
        let wire = env.to_wire().unwrap();
        let value: Value = serde_json::from_str(&wire).unwrap();
        assert_eq!(value["type"], "device.status");
        assert_eq!(value["data"]["online"], true);
        assert!(value["timestamp"].is_i64());
        assert!(value["id"].is_string());
    }

    #[test]
    fn parse_roundtrip() {
        let env = Envelope::new("alarm", json!({"zone": 3}));
        let back = Envelope::parse(&env.to_wire().unwrap()).unwrap();
        assert_eq!(back, env);
    }

    #[test]
    fn parse_accepts_minimal_envelope() {
        // Server pushes may omit timestamp and id.
        let env = Envelope::parse(r#"{"type":"alarm","data":{"zone":1}}"#).unwrap();
        assert_eq!(env.kind, "alarm");
        assert!(env.timestamp.is_none());
        assert!(env.id.is_none());
    }

    #[test]
    fn parse_rejects_non_envelope() {
        assert!(Envelope::parse("not json").is_err());
        assert!(Envelope::parse(r#"{"no_type":true}"#).is_err());
        assert!(Envelope::parse("[1,2,3]").is_err());
    }

    #[test]
    fn optional_fields_omitted_on_wire() {
        let env = Envelope {
            kind: "alarm".into(),
            data: json!({}),
            timestamp: None,
            id: None,
        };
        let wire = env.to_wire().unwrap();
        assert!(!wire.contains("timestamp"));
        assert!(!wire.contains("\"id\""));
    }

    #[test]
    fn stamp_value_adds_id_and_timestamp() {
        let stamped = stamp_value(json!({"type": "ack", "data": {}}));
        assert!(stamped["id"].is_string());
        assert!(stamped["timestamp"].is_i64());
    }

    #[test]
    fn stamp_value_preserves_existing_id() {
        let stamped = stamp_value(json!({"id": "keep-me", "type": "ack"}));
        assert_eq!(stamped["id"], "keep-me");
        assert!(
            stamped.get("timestamp").is_none(),
            "payload with an id must pass through untouched"
        );
    }

    #[test]
    fn stamp_value_leaves_non_objects_alone() {
        assert_eq!(stamp_value(json!("plain string")), json!("plain string"));
        assert_eq!(stamp_value(json!(42)), json!(42));
        assert_eq!(stamp_value(json!([1, 2])), json!([1, 2]));
    }

    #[test]
    fn stamped_ids_are_unique() {
        let a = stamp_value(json!({"type": "x"}));
        let b = stamp_value(json!({"type": "x"}));
        assert_ne!(a["id"], b["id"]);
    }

    #[test]
    fn now_ms_is_recent() {
        let ms = now_ms();
        // Past 2020-01-01 and below year ~5000.
        assert!(ms > 1_577_836_800_000);
        assert!(ms < 100_000_000_000_000);
    }
}
