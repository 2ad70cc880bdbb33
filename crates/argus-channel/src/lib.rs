//! Reconnecting realtime push channel client.
//!
//! Two layers:
//!
//! - [`ChannelEngine`] owns one WebSocket connection end to end: dialing,
//!   application heartbeats, linear-backoff reconnection, and a queue for
//!   payloads sent while the channel is down. It reports everything through
//!   a stream of [`EngineEvent`]s.
//! - [`ChannelManager`] wraps an engine for application code: type-routed
//!   subscriptions, watchable connection status, lifecycle callbacks, and
//!   strict (non-queueing) sends.
//!
//! ```no_run
//! use argus_channel::{ChannelManager, ConnectOptions};
//! use argus_core::SubjectId;
//! use argus_settings::ChannelSettings;
//!
//! # async fn demo() {
//! let manager = ChannelManager::new(ChannelSettings::default());
//! let _sub = manager.on_message("alarm", |data| {
//!     println!("alarm: {data}");
//! });
//! manager.connect(
//!     SubjectId::from_string("guard-42".into()),
//!     ConnectOptions::default(),
//! );
//! # }
//! ```

#![deny(unsafe_code)]

pub mod endpoint;
pub mod engine;
pub mod errors;
pub mod events;
pub mod manager;
pub mod registry;

pub use endpoint::endpoint_url;
pub use engine::ChannelEngine;
pub use errors::ChannelError;
pub use events::EngineEvent;
pub use manager::{ChannelManager, ConnectOptions};
pub use registry::{SubscriberRegistry, SubscriptionId};
