//! Message-type subscription registry.
//!
//! Consumers register callbacks keyed by envelope type. Dispatch fans an
//! envelope's `data` payload out to every callback registered for that type,
//! isolating each invocation so one misbehaving subscriber cannot take down
//! the dispatch loop or starve its peers.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::warn;

/// Callback invoked with an envelope's `data` payload.
pub type SubscriberCallback = Arc<dyn Fn(Value) + Send + Sync>;

/// Handle identifying a single subscription, returned by
/// [`SubscriberRegistry::subscribe`] and consumed by
/// [`SubscriberRegistry::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    callback: SubscriberCallback,
}

/// Registry of per-message-type subscriber callbacks.
pub struct SubscriberRegistry {
    subscribers: Mutex<HashMap<String, Vec<Subscriber>>>,
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register `callback` for envelopes of type `kind`.
    ///
    /// Multiple callbacks may be registered for the same type; each gets its
    /// own [`SubscriptionId`].
    pub fn subscribe(
        &self,
        kind: impl Into<String>,
        callback: impl Fn(Value) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscriber = Subscriber {
            id,
            callback: Arc::new(callback),
        };
        self.subscribers
            .lock()
            .entry(kind.into())
            .or_default()
            .push(subscriber);
        id
    }

    /// Remove the subscription identified by `id` under `kind`.
    ///
    /// Unknown types and already-removed ids are no-ops.
    pub fn unsubscribe(&self, kind: &str, id: SubscriptionId) {
        let mut subscribers = self.subscribers.lock();
        if let Some(entries) = subscribers.get_mut(kind) {
            entries.retain(|s| s.id != id);
            if entries.is_empty() {
                let _ = subscribers.remove(kind);
            }
        }
    }

    /// Invoke every callback registered for `kind` with a clone of `data`.
    ///
    /// Callbacks run outside the registry lock, so a subscriber may
    /// re-register or unsubscribe from within its own callback. A panicking
    /// subscriber is logged and skipped; the rest still run. Returns how many
    /// callbacks were invoked.
    pub fn dispatch(&self, kind: &str, data: &Value) -> usize {
        let callbacks: Vec<SubscriberCallback> = {
            let subscribers = self.subscribers.lock();
            match subscribers.get(kind) {
                Some(entries) => entries.iter().map(|s| Arc::clone(&s.callback)).collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for callback in callbacks {
            let payload = data.clone();
            if catch_unwind(AssertUnwindSafe(|| callback(payload))).is_err() {
                warn!(message_type = kind, "subscriber panicked during dispatch");
            } else {
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of callbacks currently registered for `kind`.
    pub fn subscriber_count(&self, kind: &str) -> usize {
        self.subscribers.lock().get(kind).map_or(0, Vec::len)
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────── Tests ───────────────────────────────
