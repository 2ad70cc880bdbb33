//! Branded ID newtypes for type safety.
//!
//! Each identifier in the channel protocol is a distinct newtype wrapper
//! around `String`, so a message ID can never be passed where a subject
//! identifier is expected.
//!
//! Generated IDs are UUID v7 (time-ordered) via [`uuid::Uuid::now_v7`] —
//! time-prefixed plus random, which gives the low in-session collision
//! probability the wire protocol asks of message identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Generate a new UUID v7 string (time-ordered).
fn new_v7() -> String {
    Uuid::now_v7().to_string()
}

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID (UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(new_v7())
            }

            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Unique identifier stamped onto outbound wire messages.
    MessageId
}

branded_id! {
    /// Caller-supplied identity (typically a user ID) that scopes the
    /// push-channel endpoint.
    SubjectId
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_id_new_is_uuid_v7() {
        let id = MessageId::new();
        let parsed = Uuid::parse_str(id.as_str()).expect("should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn subject_id_new_is_uuid_v7() {
        let id = SubjectId::new();
        let parsed = Uuid::parse_str(id.as_str()).expect("should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn ids_are_unique() {
        let a = MessageId::new();
        let b = MessageId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn from_string() {
        let id = SubjectId::from_string("user_42".to_owned());
        assert_eq!(id.as_str(), "user_42");
    }

    #[test]
    fn deref_to_str() {
        let id = SubjectId::from("admin");
        let s: &str = &id;
        assert_eq!(s, "admin");
    }

    #[test]
    fn display() {
        let id = MessageId::from("display-me");
        assert_eq!(format!("{id}"), "display-me");
    }

    #[test]
    fn serde_roundtrip() {
        let id = MessageId::from("serde-test");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"serde-test\"");
        let back: MessageId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn serde_transparent_in_struct() {
        #[derive(Serialize, Deserialize, Debug, PartialEq)]
        struct Wire {
            id: MessageId,
            subject: SubjectId,
        }

        let wire = Wire {
            id: MessageId::from("msg-1"),
            subject: SubjectId::from("user-1"),
        };
        let json = serde_json::to_string(&wire).unwrap();
        assert_eq!(json, r#"{"id":"msg-1","subject":"user-1"}"#);
        let back: Wire = serde_json::from_str(&json).unwrap();
        assert_eq!(wire, back);
    }

    #[test]
    fn default_creates_new() {
        let a = MessageId::default();
        let b = MessageId::default();
        assert_ne!(a, b, "default should create unique IDs");
    }

    #[test]
    fn into_inner() {
        let id = SubjectId::from("inner-test");
        assert_eq!(id.into_inner(), "inner-test");
    }
}
