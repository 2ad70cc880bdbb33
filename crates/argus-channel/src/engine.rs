//! The connection engine.
//!
//! Owns the WebSocket lifecycle for one subject: dialing, the application
//! heartbeat, linear-backoff reconnection, and the queue of payloads sent
//! while the channel was down. The engine never returns errors from its
//! public methods; everything observable travels as [`EngineEvent`]s on the
//! channel handed out by [`ChannelEngine::new`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::time::Duration;

use argus_core::{ConnectionStatus, Envelope, SubjectId, stamp_value};
use argus_settings::ChannelSettings;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::endpoint::endpoint_url;
use crate::errors::ChannelError;
use crate::events::EngineEvent;

/// Capacity of the engine's event channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Sentinel for "no connection attempt in flight" in the ready-state atomic.
const READY_ABSENT: u8 = u8::MAX;

/// How a single open socket session ended.
enum LinkExit {
    /// Closed by [`ChannelEngine::close`] or a superseding connect.
    Cancelled,
    /// The peer closed, the transport failed, or the engine was dropped.
    Dropped,
}

/// One logical connection: the cancel token tears down the run task, the
/// outbound sender feeds the write half while the socket is open.
struct Link {
    cancel: CancellationToken,
    outbound: mpsc::UnboundedSender<String>,
}

struct EngineInner {
    settings: ChannelSettings,
    event_tx: mpsc::Sender<EngineEvent>,
    subject: Mutex<Option<SubjectId>>,
    queue: Mutex<VecDeque<Value>>,
    attempts: AtomicU32,
    ready: AtomicU8,
    link: Mutex<Option<Link>>,
}

impl EngineInner {
    fn set_ready(&self, status: Option<ConnectionStatus>) {
        let raw = status.map_or(READY_ABSENT, ConnectionStatus::as_num);
        self.ready.store(raw, Ordering::Release);
    }

    fn ready_state(&self) -> Option<ConnectionStatus> {
        match self.ready.load(Ordering::Acquire) {
            READY_ABSENT => None,
            raw => ConnectionStatus::from_num(raw),
        }
    }

    async fn emit(&self, event: EngineEvent) {
        // A dropped receiver means nobody is listening anymore; that is not
        // the engine's problem.
        let _ = self.event_tx.send(event).await;
    }

    /// Serialize and hand a payload to the open socket's writer.
    ///
    /// Payloads are stamped with a timestamp and id unless they already carry
    /// an id. On a lost writer the payload goes back on the queue for the
    /// next session.
    fn send_now(&self, payload: Value) {
        let outbound = self.link.lock().as_ref().map(|l| l.outbound.clone());
        let Some(outbound) = outbound else {
            self.queue.lock().push_back(payload);
            return;
        };
        let stamped = stamp_value(payload);
        match serde_json::to_string(&stamped) {
            Ok(text) => {
                if outbound.send(text).is_err() {
                    warn!("outbound writer gone, requeueing payload");
                    self.queue.lock().push_back(stamped);
                }
            }
            Err(error) => {
                warn!(%error, "dropping unserializable outbound payload");
            }
        }
    }

    /// Flush every queued payload, oldest first.
    fn drain_queue(&self) {
        let pending: Vec<Value> = {
            let mut queue = self.queue.lock();
            queue.drain(..).collect()
        };
        if pending.is_empty() {
            return;
        }
        debug!(count = pending.len(), "draining queued payloads");
        for payload in pending {
            self.send_now(payload);
        }
    }
}

/// Reconnecting WebSocket client for one subject's push channel.
///
/// Cheap to clone; all clones share the same connection.
#[derive(Clone)]
pub struct ChannelEngine {
    inner: Arc<EngineInner>,
}

impl ChannelEngine {
    /// Create an engine and the receiving end of its event channel.
    ///
    /// The engine is idle until [`connect`](Self::connect) is called.
    #[must_use]
    pub fn new(settings: ChannelSettings) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let inner = Arc::new(EngineInner {
            settings,
            event_tx,
            subject: Mutex::new(None),
            queue: Mutex::new(VecDeque::new()),
            attempts: AtomicU32::new(0),
            ready: AtomicU8::new(READY_ABSENT),
            link: Mutex::new(None),
        });
        (Self { inner }, event_rx)
    }

    /// Open (or replace) the connection for `subject`.
    ///
    /// An existing connection is torn down first, its queue included; the new
    /// subject supersedes it. Payloads queued while the engine was idle
    /// survive and are drained once the channel opens. The reconnection
    /// attempt budget starts fresh.
    pub fn connect(&self, subject: SubjectId) {
        if self.teardown() {
            self.inner.queue.lock().clear();
        }
        info!(%subject, "opening push channel");
        *self.inner.subject.lock() = Some(subject.clone());
        self.inner.attempts.store(0, Ordering::Relaxed);

        let cancel = CancellationToken::new();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        *self.inner.link.lock() = Some(Link {
            cancel: cancel.clone(),
            outbound: outbound_tx,
        });
        self.inner.set_ready(Some(ConnectionStatus::Connecting));

        let inner = Arc::clone(&self.inner);
        let _ = tokio::spawn(run_link(inner, subject, outbound_rx, cancel));
    }

    /// Send a JSON payload, or queue it if the channel is not open.
    ///
    /// Object payloads without an `id` are stamped with a timestamp and a
    /// fresh id at actual send time. Queued payloads are flushed in order the
    /// next time the channel opens.
    pub fn send(&self, payload: Value) {
        if self.is_connected() {
            self.inner.send_now(payload);
        } else {
            debug!("channel not open, queueing payload");
            self.inner.queue.lock().push_back(payload);
        }
    }

    /// Send a typed envelope with the given `data`, queueing when not open.
    pub fn send_message(&self, kind: impl Into<String>, data: Value) {
        let envelope = Envelope::new(kind, data);
        match serde_json::to_value(&envelope) {
            Ok(value) => self.send(value),
            Err(error) => warn!(%error, "dropping unserializable envelope"),
        }
    }

    /// Tear the connection down and forget the subject.
    ///
    /// Cancels any reconnection in flight, clears the queue, and leaves the
    /// engine idle. Safe to call repeatedly.
    pub fn close(&self) {
        let _ = self.teardown();
        self.inner.queue.lock().clear();
        *self.inner.subject.lock() = None;
    }

    /// Whether the channel is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.ready_state() == Some(ConnectionStatus::Open)
    }

    /// Current lifecycle state of the connection, or `None` when no
    /// connection attempt exists.
    #[must_use]
    pub fn ready_state(&self) -> Option<ConnectionStatus> {
        self.inner.ready_state()
    }

    /// The subject the engine is (or was last) connected for.
    #[must_use]
    pub fn current_subject(&self) -> Option<SubjectId> {
        self.inner.subject.lock().clone()
    }

    /// How many payloads are waiting for the channel to open.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.inner.queue.lock().len()
    }

    /// Cancel any live connection. Returns whether one existed; the queue is
    /// left alone so callers decide its fate.
    fn teardown(&self) -> bool {
        let link = self.inner.link.lock().take();
        self.inner.set_ready(None);
        match link {
            Some(link) => {
                link.cancel.cancel();
                true
            }
            None => false,
        }
    }
}

/// Delay before reconnection attempt `attempt` (1-based): linear backoff,
/// `base * attempt`.
fn reconnect_delay(base: Duration, attempt: u32) -> Duration {
    base * attempt
}

/// Dial-and-redial loop for one logical connection.
///
/// Runs until cancelled, until the attempt budget is exhausted, or until the
/// engine is dropped. Each successful open resets the attempt counter, so a
/// long-lived channel always has the full budget for its next outage.
async fn run_link(
    inner: Arc<EngineInner>,
    subject: SubjectId,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    cancel: CancellationToken,
) {
    let url = endpoint_url(&inner.settings.endpoint, &subject);
    let max_attempts = inner.settings.reconnect.max_attempts;
    let base_delay = Duration::from_millis(inner.settings.reconnect.base_delay_ms);

    loop {
        inner.set_ready(Some(ConnectionStatus::Connecting));
        debug!(%url, "dialing");
        let dial = tokio::select! {
            result = connect_async(url.as_str()) => result,
            () = cancel.cancelled() => return,
        };
        match dial {
            Ok((stream, _response)) => {
                info!(%subject, "channel open");
                inner.set_ready(Some(ConnectionStatus::Open));
                inner.attempts.store(0, Ordering::Relaxed);
                inner.emit(EngineEvent::Opened).await;
                inner.drain_queue();

                let exit = drive_open(&inner, stream, &mut outbound_rx, &cancel).await;
                match exit {
                    LinkExit::Cancelled => {
                        inner.emit(EngineEvent::Closed).await;
                        return;
                    }
                    LinkExit::Dropped => {
                        inner.set_ready(Some(ConnectionStatus::Closed));
                        inner.emit(EngineEvent::Closed).await;
                    }
                }
            }
            Err(error) => {
                warn!(%error, "dial failed");
                inner.set_ready(Some(ConnectionStatus::Closed));
                inner.emit(EngineEvent::Error(ChannelError::Transport(error))).await;
            }
        }

        if cancel.is_cancelled() {
            return;
        }
        let attempt = inner.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        if attempt > max_attempts {
            warn!(attempts = max_attempts, "reconnection attempts exhausted");
            inner
                .emit(EngineEvent::Exhausted {
                    attempts: max_attempts,
                })
                .await;
            return;
        }
        let delay = reconnect_delay(base_delay, attempt);
        info!(attempt, ?delay, "reconnecting after delay");
        tokio::select! {
            () = time::sleep(delay) => {}
            () = cancel.cancelled() => return,
        }
    }
}

/// Drive one open socket session: heartbeats out, frames in, outbound
/// payloads through.
async fn drive_open(
    inner: &Arc<EngineInner>,
    stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    outbound_rx: &mut mpsc::UnboundedReceiver<String>,
    cancel: &CancellationToken,
) -> LinkExit {
    let (mut sink, mut source) = stream.split();
    let mut heartbeat = time::interval(Duration::from_millis(
        inner.settings.heartbeat_interval_ms,
    ));
    // The first tick fires immediately; consume it so heartbeats start one
    // full interval after open.
    let _ = heartbeat.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = sink.close().await;
                return LinkExit::Cancelled;
            }
            _ = heartbeat.tick() => {
                match Envelope::heartbeat().to_wire() {
                    Ok(text) => {
                        trace!("sending heartbeat");
                        if sink.send(Message::Text(text.into())).await.is_err() {
                            return LinkExit::Dropped;
                        }
                    }
                    Err(error) => warn!(%error, "failed to serialize heartbeat"),
                }
            }
            out = outbound_rx.recv() => {
                match out {
                    Some(text) => {
                        trace!(len = text.len(), "sending payload");
                        if sink.send(Message::Text(text.into())).await.is_err() {
                            return LinkExit::Dropped;
                        }
                    }
                    // The engine itself was dropped.
                    None => return LinkExit::Dropped,
                }
            }
            frame = source.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        handle_text(inner, text.as_str()).await;
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = sink.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("peer closed the channel");
                        return LinkExit::Dropped;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        warn!(%error, "transport error on channel");
                        inner
                            .emit(EngineEvent::Error(ChannelError::Transport(error)))
                            .await;
                        return LinkExit::Dropped;
                    }
                }
            }
        }
    }
}

/// Route one inbound text frame.
///
/// Heartbeats are absorbed here; parsed envelopes and unparsable frames each
/// get their own event so consumers can tell them apart.
async fn handle_text(inner: &Arc<EngineInner>, text: &str) {
    match Envelope::parse(text) {
        Ok(envelope) if envelope.is_heartbeat() => {
            trace!("heartbeat received");
        }
        Ok(envelope) => {
            inner
                .emit(EngineEvent::Message {
                    envelope,
                    raw: text.to_owned(),
                })
                .await;
        }
        Err(error) => {
            debug!(%error, "inbound frame is not an envelope");
            inner.emit(EngineEvent::Raw(text.to_owned())).await;
        }
    }
}

// ─────────────────────────────── Tests ───────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn engine() -> (ChannelEngine, mpsc::Receiver<EngineEvent>) {
        ChannelEngine::new(ChannelSettings::default())
    }

    fn fast_settings() -> ChannelSettings {
        let mut settings = ChannelSettings::default();
        // Nothing listens on this port; dials fail fast.
        settings.endpoint.host = "127.0.0.1:9".to_string();
        settings.reconnect.base_delay_ms = 10;
        settings.reconnect.max_attempts = 2;
        settings
    }

    #[test]
    fn reconnect_delay_is_linear_in_attempt() {
        let base = Duration::from_millis(5_000);
        assert_eq!(reconnect_delay(base, 1), Duration::from_millis(5_000));
        assert_eq!(reconnect_delay(base, 2), Duration::from_millis(10_000));
        assert_eq!(reconnect_delay(base, 5), Duration::from_millis(25_000));
    }

    #[tokio::test]
    async fn fresh_engine_is_idle() {
        let (engine, _events) = engine();
        assert!(!engine.is_connected());
        assert_eq!(engine.ready_state(), None);
        assert_eq!(engine.current_subject(), None);
        assert_eq!(engine.queued_len(), 0);
    }

    #[tokio::test]
    async fn send_while_idle_queues_in_order() {
        let (engine, _events) = engine();
        engine.send(json!({"seq": 1}));
        engine.send(json!({"seq": 2}));
        engine.send(json!({"seq": 3}));
        assert_eq!(engine.queued_len(), 3);
        // Payloads are stamped at send time, not enqueue time.
        let front = engine.inner.queue.lock().front().cloned().unwrap();
        assert_eq!(front, json!({"seq": 1}));
    }

    #[tokio::test]
    async fn close_clears_queue_and_subject() {
        let (engine, _events) = engine();
        engine.send(json!({"seq": 1}));
        engine.close();
        assert_eq!(engine.queued_len(), 0);
        assert_eq!(engine.current_subject(), None);
        assert_eq!(engine.ready_state(), None);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (engine, _events) = engine();
        engine.close();
        engine.close();
        assert!(!engine.is_connected());
    }

    #[tokio::test]
    async fn connect_records_subject_and_enters_connecting() {
        let (engine, _events) = ChannelEngine::new(fast_settings());
        let subject = SubjectId::from_string("guard-1".to_string());
        engine.connect(subject.clone());
        assert_eq!(engine.current_subject(), Some(subject));
        // Connecting or already Closed depending on how fast the dial fails.
        assert_matches!(
            engine.ready_state(),
            Some(ConnectionStatus::Connecting | ConnectionStatus::Closed)
        );
        engine.close();
    }

    #[tokio::test]
    async fn failed_dials_emit_errors_then_exhausted() {
        let (engine, mut events) = ChannelEngine::new(fast_settings());
        engine.connect(SubjectId::from_string("guard-2".to_string()));

        let mut errors = 0;
        let exhausted = loop {
            let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
                .await
                .expect("engine went silent")
                .expect("event channel closed early");
            match event {
                EngineEvent::Error(_) => errors += 1,
                EngineEvent::Exhausted { attempts } => break attempts,
                other => panic!("unexpected event: {other:?}"),
            }
        };
        // Initial dial plus max_attempts redials, each failing.
        assert_eq!(errors, 3);
        assert_eq!(exhausted, 2);
    }

    #[tokio::test]
    async fn close_during_backoff_stops_redialing() {
        let mut settings = fast_settings();
        settings.reconnect.base_delay_ms = 60_000;
        let (engine, mut events) = ChannelEngine::new(settings);
        engine.connect(SubjectId::from_string("guard-3".to_string()));

        // First dial fails, engine enters its backoff sleep.
        let first = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("no dial outcome")
            .expect("event channel closed early");
        assert_matches!(first, EngineEvent::Error(_));

        engine.close();
        // The run task exits without emitting Exhausted; the channel just
        // drains.
        let next = tokio::time::timeout(Duration::from_millis(500), events.recv()).await;
        match next {
            Err(_) | Ok(None) => {}
            Ok(Some(event)) => panic!("unexpected event after close: {event:?}"),
        }
    }

    #[tokio::test]
    async fn send_message_queues_full_envelope() {
        let (engine, _events) = engine();
        engine.send_message("ack", json!({"alarm": "a-17"}));
        assert_eq!(engine.queued_len(), 1);
        let queued = engine.inner.queue.lock().front().cloned().unwrap();
        assert_eq!(queued["type"], "ack");
        assert_eq!(queued["data"]["alarm"], "a-17");
        assert!(queued["id"].is_string());
        assert!(queued["timestamp"].is_i64());
    }

    #[tokio::test]
    async fn connect_preserves_payloads_queued_while_idle() {
        let (engine, _events) = ChannelEngine::new(fast_settings());
        engine.send(json!({"seq": 1}));
        engine.send(json!({"seq": 2}));
        engine.send(json!({"seq": 3}));
        // No connection existed, so the queue must ride into the new session
        // intact and wait for a successful open.
        engine.connect(SubjectId::from_string("guard-12".to_string()));
        assert_eq!(engine.queued_len(), 3);
        let front = engine.inner.queue.lock().front().cloned().unwrap();
        assert_eq!(front, json!({"seq": 1}));
        engine.close();
        assert_eq!(engine.queued_len(), 0);
    }

    #[tokio::test]
    async fn connect_supersedes_previous_subject() {
        let (engine, _events) = ChannelEngine::new(fast_settings());
        engine.send(json!({"stale": true}));
        engine.connect(SubjectId::from_string("first".to_string()));
        engine.connect(SubjectId::from_string("second".to_string()));
        assert_eq!(
            engine.current_subject(),
            Some(SubjectId::from_string("second".to_string()))
        );
        // Replacing a live session drops its queue along with it.
        assert_eq!(engine.queued_len(), 0);
        engine.close();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_dial_backoff_follows_linear_schedule() {
        let mut settings = fast_settings();
        settings.reconnect.base_delay_ms = 5_000;
        settings.reconnect.max_attempts = 2;
        let (engine, mut events) = ChannelEngine::new(settings);

        let start = tokio::time::Instant::now();
        engine.connect(SubjectId::from_string("guard-13".to_string()));
        loop {
            match events.recv().await.expect("event channel closed early") {
                EngineEvent::Error(_) => {}
                EngineEvent::Exhausted { attempts } => {
                    assert_eq!(attempts, 2);
                    break;
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
        // Two scheduled redials: 1 * 5s then 2 * 5s of virtual time.
        assert_eq!(start.elapsed(), Duration::from_millis(15_000));
    }
}
