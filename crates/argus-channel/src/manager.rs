//! The channel manager.
//!
//! A facade over [`ChannelEngine`] for application code: it consumes the
//! engine's event channel on a background task, routes typed messages through
//! a [`SubscriberRegistry`], tracks connection status in a
//! [`watch`](tokio::sync::watch) channel, and exposes boolean send methods
//! that refuse (rather than queue) when the channel is down.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use argus_core::{ConnectionStatus, SubjectId};
use argus_settings::ChannelSettings;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::ChannelEngine;
use crate::errors::ChannelError;
use crate::events::EngineEvent;
use crate::registry::{SubscriberRegistry, SubscriptionId};

/// Callbacks a consumer may attach for the lifetime of one connection.
///
/// All fields are optional; unset callbacks are simply skipped. Raw message
/// callbacks receive every non-heartbeat inbound frame as text, parseable or
/// not, alongside whatever typed routing the registry performs.
#[derive(Clone, Default)]
pub struct ConnectOptions {
    /// Invoked each time the channel opens, reconnects included.
    pub on_open: Option<Arc<dyn Fn() + Send + Sync>>,
    /// Invoked each time the channel closes.
    pub on_close: Option<Arc<dyn Fn() + Send + Sync>>,
    /// Invoked on transport errors.
    pub on_error: Option<Arc<dyn Fn(&ChannelError) + Send + Sync>>,
    /// Invoked with the raw text of every non-heartbeat inbound frame.
    pub on_message: Option<Arc<dyn Fn(&str) + Send + Sync>>,
}

impl std::fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_message", &self.on_message.is_some())
            .finish()
    }
}

/// State shared between the manager and its dispatch task.
struct Shared {
    registry: SubscriberRegistry,
    status_tx: watch::Sender<ConnectionStatus>,
    options: Mutex<ConnectOptions>,
    reconnect_count: AtomicU32,
}

/// High-level handle on a subject's push channel.
pub struct ChannelManager {
    engine: ChannelEngine,
    shared: Arc<Shared>,
    status_rx: watch::Receiver<ConnectionStatus>,
    dispatch: JoinHandle<()>,
}

impl ChannelManager {
    /// Create a manager and start its event dispatch task.
    ///
    /// Idle until [`connect`](Self::connect).
    #[must_use]
    pub fn new(settings: ChannelSettings) -> Self {
        let (engine, events) = ChannelEngine::new(settings);
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Closed);
        let shared = Arc::new(Shared {
            registry: SubscriberRegistry::new(),
            status_tx,
            options: Mutex::new(ConnectOptions::default()),
            reconnect_count: AtomicU32::new(0),
        });
        let dispatch = tokio::spawn(dispatch_events(events, Arc::clone(&shared)));
        Self {
            engine,
            shared,
            status_rx,
            dispatch,
        }
    }

    /// Connect for `subject`, attaching the given lifecycle callbacks.
    ///
    /// Ignored with a warning when the channel is already open; disconnect
    /// first to switch subjects.
    pub fn connect(&self, subject: SubjectId, options: ConnectOptions) {
        if self.is_connected() {
            warn!("channel already connected, ignoring connect request");
            return;
        }
        *self.shared.options.lock() = options;
        let _ = self.shared.status_tx.send(ConnectionStatus::Connecting);
        self.engine.connect(subject);
    }

    /// Close the channel and detach all lifecycle callbacks.
    pub fn disconnect(&self) {
        self.engine.close();
        *self.shared.options.lock() = ConnectOptions::default();
        let _ = self.shared.status_tx.send(ConnectionStatus::Closed);
    }

    /// Send a JSON payload if the channel is open.
    ///
    /// Returns `false` without queueing when it is not; callers that want
    /// store-and-forward talk to the [`engine`](Self::engine) directly.
    pub fn send(&self, payload: Value) -> bool {
        if !self.is_connected() {
            warn!("channel not connected, payload dropped");
            return false;
        }
        self.engine.send(payload);
        true
    }

    /// Send a typed envelope if the channel is open.
    ///
    /// Returns `false` without queueing when it is not.
    pub fn send_message(&self, kind: impl Into<String>, data: Value) -> bool {
        if !self.is_connected() {
            warn!("channel not connected, message dropped");
            return false;
        }
        self.engine.send_message(kind, data);
        true
    }

    /// Register `callback` for inbound envelopes of type `kind`.
    pub fn on_message(
        &self,
        kind: impl Into<String>,
        callback: impl Fn(Value) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.shared.registry.subscribe(kind, callback)
    }

    /// Remove a subscription previously returned by
    /// [`on_message`](Self::on_message).
    pub fn off_message(&self, kind: &str, id: SubscriptionId) {
        self.shared.registry.unsubscribe(kind, id);
    }

    /// Whether the channel is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.engine.is_connected()
    }

    /// Current connection status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }

    /// Human-readable form of the current status.
    #[must_use]
    pub fn status_text(&self) -> &'static str {
        self.status().as_text()
    }

    /// A watch receiver that observes every status change.
    #[must_use]
    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status_tx.subscribe()
    }

    /// The subject currently connected, if any.
    #[must_use]
    pub fn current_subject(&self) -> Option<SubjectId> {
        self.engine.current_subject()
    }

    /// How many transport errors the channel has absorbed since creation.
    #[must_use]
    pub fn reconnect_count(&self) -> u32 {
        self.shared.reconnect_count.load(Ordering::Relaxed)
    }

    /// The underlying engine, for callers that need queueing sends or the
    /// raw ready state.
    #[must_use]
    pub fn engine(&self) -> &ChannelEngine {
        &self.engine
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        self.engine.close();
        self.dispatch.abort();
    }
}

/// Consume engine events until the engine is dropped.
async fn dispatch_events(mut events: mpsc::Receiver<EngineEvent>, shared: Arc<Shared>) {
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::Opened => {
                let _ = shared.status_tx.send(ConnectionStatus::Open);
                // Clone the callback out so subscribers can call back into
                // the manager without deadlocking on the options lock.
                let callback = shared.options.lock().on_open.clone();
                if let Some(callback) = callback {
                    callback();
                }
            }
            EngineEvent::Message { envelope, raw } => {
                let delivered = shared.registry.dispatch(&envelope.kind, &envelope.data);
                debug!(message_type = %envelope.kind, delivered, "routed inbound message");
                let callback = shared.options.lock().on_message.clone();
                if let Some(callback) = callback {
                    callback(&raw);
                }
            }
            EngineEvent::Raw(text) => {
                let callback = shared.options.lock().on_message.clone();
                if let Some(callback) = callback {
                    callback(&text);
                }
            }
            EngineEvent::Error(error) => {
                // A transport error always precedes (or stands in for) a
                // close, so the observable status drops immediately.
                let _ = shared.status_tx.send(ConnectionStatus::Closed);
                let _ = shared.reconnect_count.fetch_add(1, Ordering::Relaxed);
                let callback = shared.options.lock().on_error.clone();
                if let Some(callback) = callback {
                    callback(&error);
                }
            }
            EngineEvent::Closed => {
                let _ = shared.status_tx.send(ConnectionStatus::Closed);
                let callback = shared.options.lock().on_close.clone();
                if let Some(callback) = callback {
                    callback();
                }
            }
            EngineEvent::Exhausted { attempts } => {
                warn!(attempts, "channel gave up reconnecting");
                let _ = shared.status_tx.send(ConnectionStatus::Closed);
            }
        }
    }
}

// ─────────────────────────────── Tests ───────────────────────────────
