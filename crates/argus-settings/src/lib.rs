//! # argus-settings
//!
//! Layered configuration for the Argus realtime channel client.
//!
//! Loading flow:
//! 1. Start with compiled [`ChannelSettings::default()`]
//! 2. If `~/.argus/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `ARGUS_*` environment variable overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, settings_path};
pub use types::{ChannelSettings, EndpointSettings, ReconnectSettings};
