//! # argus-core
//!
//! Foundation types for the Argus realtime channel client.
//!
//! This crate provides the shared vocabulary the channel crates depend on:
//!
//! - **Branded IDs**: [`MessageId`] and [`SubjectId`] as newtypes for type safety
//! - **Wire envelope**: [`Envelope`] — the `{type, data, timestamp, id}` JSON
//!   message exchanged with the monitoring backend
//! - **Connection status**: [`ConnectionStatus`] — the four-state readiness
//!   indicator shared by the engine and the manager

#![deny(unsafe_code)]

pub mod envelope;
pub mod ids;
pub mod status;

pub use envelope::{Envelope, HEARTBEAT_TYPE, now_ms, stamp_value};
pub use ids::{MessageId, SubjectId};
pub use status::ConnectionStatus;
