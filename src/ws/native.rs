//! Native subscription transport — `tokio-tungstenite`.
//!
//! - One background tokio task per connection, spawned lazily on first use
//! - `connection_init` / `connection_ack` handshake with timeout
//! - All operations multiplexed over one socket by id
//! - `ka` keep-alive watchdog
//! - Exponential backoff reconnection with jitter
//! - Active operations re-sent after reconnect
//! - Dropping a [`SubscriptionStream`] sends `stop`
//! - The task never waits on a consumer: events for a full stream are dropped

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream, Stream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::{LinkError, WsError};
use crate::operation::{Operation, Response};
use crate::ws::{
    decode_error_payload, MessageIn, MessageOut, ReadyState, WsConfig, GRAPHQL_WS_PROTOCOL,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type ResultSender = mpsc::Sender<Result<Response, LinkError>>;

/// Events buffered per operation before new ones are dropped.
pub const RESULT_BUFFER: usize = 256;

// ─── Commands from public API to background task ─────────────────────────────

enum Command {
    Start {
        id: String,
        operation: Operation,
        results: ResultSender,
    },
    Stop {
        id: String,
    },
    Terminate,
}

// ─── Disconnect reasons for reconnection decision ────────────────────────────

enum DisconnectReason {
    UserRequested,
    KeepAliveTimeout,
    Error(WsError),
}

// ─── Background task state ───────────────────────────────────────────────────

struct ActiveOperation {
    operation: Operation,
    results: ResultSender,
}

struct TaskState {
    config: WsConfig,
    cmd_rx: mpsc::Receiver<Command>,
    operations: HashMap<String, ActiveOperation>,
    reconnect_attempts: u32,
    ready_state: Arc<AtomicU8>,
}

impl TaskState {
    fn set_ready_state(&self, state: ReadyState) {
        self.ready_state.store(state as u8, Ordering::SeqCst);
    }

    fn should_reconnect(&self) -> bool {
        self.config.reconnect
            && !self.operations.is_empty()
            && self
                .config
                .max_reconnect_attempts
                .map_or(true, |max| self.reconnect_attempts < max)
    }

    /// Deliver `error` to every active operation and forget them.
    fn fail_all(&mut self, error: WsError) {
        for (id, op) in self.operations.drain() {
            tracing::debug!(id = %id, "Failing subscription: {}", error);
            deliver_last(&id, op.results, Err(LinkError::Ws(error.clone())));
        }
    }

    /// Refuse further commands and fail any `Start` still queued.
    fn close_commands(&mut self) {
        self.cmd_rx.close();
        while let Ok(cmd) = self.cmd_rx.try_recv() {
            if let Command::Start { id, results, .. } = cmd {
                deliver_last(&id, results, Err(LinkError::Ws(WsError::NotConnected)));
            }
        }
    }
}

// ─── Public client ───────────────────────────────────────────────────────────

struct Inner {
    config: WsConfig,
    cmd_tx: Mutex<Option<mpsc::Sender<Command>>>,
    task_handle: Mutex<Option<JoinHandle<()>>>,
    next_id: AtomicU64,
    ready_state: Arc<AtomicU8>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Ok(mut handle) = self.task_handle.lock() {
            if let Some(handle) = handle.take() {
                handle.abort();
            }
        }
    }
}

/// Subscription transport over one multiplexed WebSocket.
///
/// Cheap to clone; clones share the connection.
#[derive(Clone)]
pub struct SubscriptionClient {
    inner: Arc<Inner>,
}

impl SubscriptionClient {
    /// Create a client. Does not connect until the first [`start`](Self::start).
    pub fn new(config: WsConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                cmd_tx: Mutex::new(None),
                task_handle: Mutex::new(None),
                next_id: AtomicU64::new(0),
                ready_state: Arc::new(AtomicU8::new(ReadyState::Closed as u8)),
            }),
        }
    }

    pub fn config(&self) -> &WsConfig {
        &self.inner.config
    }

    /// Start an operation and return the stream of its results.
    ///
    /// Spawns the connection task if none is running. Must be called
    /// within a tokio runtime.
    pub async fn start(&self, operation: Operation) -> Result<SubscriptionStream, WsError> {
        let id = (self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string();
        let (results, rx) = mpsc::channel(RESULT_BUFFER);
        let cmd_tx = self.ensure_task()?;

        tracing::debug!(id = %id, operation = operation.display_name(), "Starting subscription");

        cmd_tx
            .send(Command::Start {
                id: id.clone(),
                operation,
                results,
            })
            .await
            .map_err(|_| WsError::NotConnected)?;

        Ok(SubscriptionStream {
            id,
            rx,
            cmd_tx,
            finished: false,
        })
    }

    /// Send `connection_terminate`, close the socket and wait for the task.
    ///
    /// Active streams end. A later [`start`](Self::start) reconnects.
    pub async fn close(&self) {
        let tx = self.lock_cmd_tx().take();
        if let Some(tx) = tx {
            let _ = tx.send(Command::Terminate).await;
        }

        let handle = self
            .inner
            .task_handle
            .lock()
            .ok()
            .and_then(|mut h| h.take());
        if let Some(handle) = handle {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }

        self.inner
            .ready_state
            .store(ReadyState::Closed as u8, Ordering::SeqCst);
    }

    /// Whether the WebSocket is currently open.
    pub fn is_connected(&self) -> bool {
        self.ready_state() == ReadyState::Open
    }

    /// Current connection state.
    pub fn ready_state(&self) -> ReadyState {
        ReadyState::from(self.inner.ready_state.load(Ordering::SeqCst))
    }

    fn lock_cmd_tx(&self) -> std::sync::MutexGuard<'_, Option<mpsc::Sender<Command>>> {
        self.inner
            .cmd_tx
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return a live command sender, spawning the task if needed.
    fn ensure_task(&self) -> Result<mpsc::Sender<Command>, WsError> {
        let mut guard = self.lock_cmd_tx();
        if let Some(tx) = guard.as_ref() {
            if !tx.is_closed() {
                return Ok(tx.clone());
            }
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;

        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        self.inner
            .ready_state
            .store(ReadyState::Connecting as u8, Ordering::SeqCst);

        let state = TaskState {
            config: self.inner.config.clone(),
            cmd_rx,
            operations: HashMap::new(),
            reconnect_attempts: 0,
            ready_state: Arc::clone(&self.inner.ready_state),
        };

        let handle = runtime.spawn(run_task(state));
        if let Ok(mut slot) = self.inner.task_handle.lock() {
            if let Some(old) = slot.replace(handle) {
                old.abort();
            }
        }

        *guard = Some(cmd_tx.clone());
        Ok(cmd_tx)
    }
}

/// Results of one operation. Dropping it before completion sends `stop`.
pub struct SubscriptionStream {
    id: String,
    rx: mpsc::Receiver<Result<Response, LinkError>>,
    cmd_tx: mpsc::Sender<Command>,
    finished: bool,
}

impl SubscriptionStream {
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Stream for SubscriptionStream {
    type Item = Result<Response, LinkError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let poll = self.rx.poll_recv(cx);
        if let Poll::Ready(None) = poll {
            self.finished = true;
        }
        poll
    }
}

impl Drop for SubscriptionStream {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.cmd_tx.try_send(Command::Stop {
                id: std::mem::take(&mut self.id),
            });
        }
    }
}

// ─── Background task ─────────────────────────────────────────────────────────

async fn run_task(mut state: TaskState) {
    run_connections(&mut state).await;
    state.close_commands();
    state.set_ready_state(ReadyState::Closed);
}

/// Connect, serve and reconnect until the client terminates or gives up.
async fn run_connections(state: &mut TaskState) {
    // The first Start is usually already queued.
    if !drain_commands(state) {
        return;
    }

    loop {
        // ── 1. Connect + handshake ───────────────────────────────────────
        state.set_ready_state(ReadyState::Connecting);
        let (sink, stream) = match attempt_connect(&state.config).await {
            Ok(parts) => parts,
            Err(e) => {
                tracing::error!(url = %state.config.url, "WebSocket connection failed: {}", e);

                // Commands that queued while connecting count as active.
                if !drain_commands(state) {
                    break;
                }
                if state.should_reconnect() {
                    backoff_sleep(state).await;
                    if !drain_commands(state) {
                        break;
                    }
                    continue;
                }
                let error = give_up_error(state, e);
                state.fail_all(error);
                break;
            }
        };

        // ── 2. Connected ─────────────────────────────────────────────────
        state.reconnect_attempts = 0;
        state.set_ready_state(ReadyState::Open);
        tracing::info!(url = %state.config.url, "WebSocket connected");

        // ── 3. (Re)start every active operation ──────────────────────────
        let mut sink = sink;
        restart_all(&mut sink, &state.operations).await;

        // ── 4. Inner select! loop ────────────────────────────────────────
        let reason = run_connected(state, sink, stream).await;

        // ── 5. Post-disconnect decision ──────────────────────────────────
        state.set_ready_state(ReadyState::Closed);

        let error = match reason {
            DisconnectReason::UserRequested => {
                state.operations.clear();
                break;
            }
            DisconnectReason::KeepAliveTimeout => WsError::Closed {
                code: None,
                reason: "Keep-alive timeout".into(),
            },
            DisconnectReason::Error(e) => e,
        };

        if !drain_commands(state) {
            break;
        }
        if state.should_reconnect() {
            backoff_sleep(state).await;
            if !drain_commands(state) {
                break;
            }
            continue;
        }
        let error = give_up_error(state, error);
        state.fail_all(error);
        break;
    }
}

/// Runs until the connection breaks.
async fn run_connected(
    state: &mut TaskState,
    mut sink: WsSink,
    mut stream: SplitStream<WsStream>,
) -> DisconnectReason {
    let ka_dur = Duration::from_millis(state.config.keep_alive_timeout_ms);
    let mut ka_armed = false;

    let far_future = tokio::time::Instant::now() + Duration::from_secs(86400);
    let ka_sleep = tokio::time::sleep_until(far_future);
    tokio::pin!(ka_sleep);

    loop {
        tokio::select! {
            // ── a) Incoming WS message ───────────────────────────────────
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let text_str: &str = text.as_ref();
                        match serde_json::from_str::<MessageIn>(text_str) {
                            Ok(MessageIn::KeepAlive {}) => {
                                ka_armed = true;
                                ka_sleep.as_mut().reset(tokio::time::Instant::now() + ka_dur);
                            }
                            Ok(msg_in) => {
                                if let Some(reason) = handle_message(state, &mut sink, msg_in).await {
                                    return reason;
                                }
                            }
                            Err(e) => {
                                tracing::warn!("WS deserialization error: {} (raw: {})", e, text_str);
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = extract_close(frame.as_ref());
                        tracing::info!(code, reason = %reason, "WebSocket closed by server");
                        return DisconnectReason::Error(WsError::Closed {
                            code: Some(code),
                            reason,
                        });
                    }
                    Some(Ok(_)) => {} // Binary, Pong, Frame
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        return DisconnectReason::Error(WsError::Closed {
                            code: None,
                            reason: e.to_string(),
                        });
                    }
                    None => {
                        return DisconnectReason::Error(WsError::Closed {
                            code: None,
                            reason: "Stream ended".into(),
                        });
                    }
                }
            }

            // ── b) Command from public API ───────────────────────────────
            cmd = state.cmd_rx.recv() => {
                match cmd {
                    Some(Command::Start { id, operation, results }) => {
                        let msg = MessageOut::Start { id: id.clone(), payload: operation.clone() };
                        state.operations.insert(id, ActiveOperation { operation, results });
                        if let Err(e) = send_msg(&mut sink, &msg).await {
                            tracing::warn!("Send failed: {}", e);
                            return DisconnectReason::Error(e);
                        }
                    }
                    Some(Command::Stop { id }) => {
                        if state.operations.remove(&id).is_some() {
                            if let Err(e) = send_msg(&mut sink, &MessageOut::Stop { id }).await {
                                tracing::warn!("Failed to send stop: {}", e);
                            }
                        }
                    }
                    Some(Command::Terminate) | None => {
                        let _ = send_msg(&mut sink, &MessageOut::ConnectionTerminate).await;
                        let _ = sink.send(Message::Close(Some(CloseFrame {
                            code: CloseCode::Normal,
                            reason: "Client disconnect".into(),
                        }))).await;
                        return DisconnectReason::UserRequested;
                    }
                }
            }

            // ── c) Keep-alive timeout ────────────────────────────────────
            () = &mut ka_sleep, if ka_armed => {
                tracing::warn!(
                    "Keep-alive timeout: no `ka` within {}ms",
                    state.config.keep_alive_timeout_ms
                );
                let _ = sink.close().await;
                return DisconnectReason::KeepAliveTimeout;
            }
        }
    }
}

/// Route one protocol message to its operation.
///
/// Returns a disconnect reason when the connection must be dropped.
async fn handle_message(
    state: &mut TaskState,
    sink: &mut WsSink,
    msg: MessageIn,
) -> Option<DisconnectReason> {
    match msg {
        MessageIn::Data { id, payload } => {
            let Some(op) = state.operations.get(&id) else {
                tracing::debug!(id = %id, "Data for unknown operation");
                return None;
            };
            match op.results.try_send(Ok(payload)) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(id = %id, "Subscription not keeping up, dropping event");
                }
                Err(TrySendError::Closed(_)) => {
                    // Consumer went away without a Stop making it through.
                    state.operations.remove(&id);
                    let _ = send_msg(sink, &MessageOut::Stop { id }).await;
                }
            }
        }
        MessageIn::Error { id, payload } => {
            if let Some(op) = state.operations.remove(&id) {
                let errors = decode_error_payload(payload);
                deliver_last(&id, op.results, Err(LinkError::Graphql { errors }));
            }
        }
        MessageIn::Complete { id } => {
            if state.operations.remove(&id).is_some() {
                tracing::debug!(id = %id, "Subscription complete");
            }
        }
        MessageIn::ConnectionError { payload } => {
            let reason = payload.map(|p| p.to_string()).unwrap_or_default();
            tracing::error!("Connection error from server: {}", reason);
            return Some(DisconnectReason::Error(WsError::ConnectionRejected(reason)));
        }
        MessageIn::ConnectionAck { .. } | MessageIn::KeepAlive {} => {}
    }
    None
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Open the socket and complete the `connection_init` handshake.
async fn attempt_connect(
    config: &WsConfig,
) -> Result<(WsSink, SplitStream<WsStream>), WsError> {
    let timeout = Duration::from_millis(config.connection_timeout_ms);

    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;
    request.headers_mut().insert(
        "Sec-WebSocket-Protocol",
        HeaderValue::from_static(GRAPHQL_WS_PROTOCOL),
    );

    let (ws_stream, _) = tokio::time::timeout(timeout, connect_async(request))
        .await
        .map_err(|_| WsError::ConnectionFailed("Connection timeout".into()))?
        .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;

    let (mut sink, mut stream) = ws_stream.split();

    send_msg(
        &mut sink,
        &MessageOut::ConnectionInit {
            payload: config.init_payload.clone(),
        },
    )
    .await?;

    tokio::time::timeout(timeout, wait_for_ack(&mut stream))
        .await
        .map_err(|_| WsError::ConnectionFailed("connection_ack timeout".into()))??;

    Ok((sink, stream))
}

async fn wait_for_ack(stream: &mut SplitStream<WsStream>) -> Result<(), WsError> {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let text_str: &str = text.as_ref();
                match serde_json::from_str::<MessageIn>(text_str) {
                    Ok(MessageIn::ConnectionAck { .. }) => return Ok(()),
                    Ok(MessageIn::ConnectionError { payload }) => {
                        let reason = payload.map(|p| p.to_string()).unwrap_or_default();
                        return Err(WsError::ConnectionRejected(reason));
                    }
                    Ok(_) => {}
                    Err(e) => return Err(WsError::ProtocolError(e.to_string())),
                }
            }
            Ok(Message::Close(frame)) => {
                let (code, reason) = extract_close(frame.as_ref());
                return Err(WsError::Closed {
                    code: Some(code),
                    reason,
                });
            }
            Ok(_) => {}
            Err(e) => return Err(WsError::ConnectionFailed(e.to_string())),
        }
    }
    Err(WsError::Closed {
        code: None,
        reason: "Stream ended before connection_ack".into(),
    })
}

/// Serialize and send a MessageOut over the sink.
async fn send_msg(sink: &mut WsSink, msg: &MessageOut) -> Result<(), WsError> {
    let json = serde_json::to_string(msg).map_err(|e| WsError::SendFailed(e.to_string()))?;
    sink.send(Message::Text(json.into()))
        .await
        .map_err(|e| WsError::SendFailed(e.to_string()))
}

/// Extract close code and reason from an optional CloseFrame.
fn extract_close(frame: Option<&CloseFrame>) -> (u16, String) {
    match frame {
        Some(f) => (f.code.into(), f.reason.to_string()),
        None => (1006, "No close frame".into()),
    }
}

async fn restart_all(sink: &mut WsSink, operations: &HashMap<String, ActiveOperation>) {
    if operations.is_empty() {
        return;
    }
    tracing::info!("Starting {} active operation(s)", operations.len());
    for (id, op) in operations {
        let msg = MessageOut::Start {
            id: id.clone(),
            payload: op.operation.clone(),
        };
        if let Err(e) = send_msg(sink, &msg).await {
            tracing::warn!(id = %id, "Failed to restart operation: {}", e);
        }
    }
}

/// Send the final item of an operation without blocking the task.
///
/// A full buffer gets the item from a spawned sender once the consumer
/// catches up.
fn deliver_last(id: &str, results: ResultSender, item: Result<Response, LinkError>) {
    match results.try_send(item) {
        Ok(()) | Err(TrySendError::Closed(_)) => {}
        Err(TrySendError::Full(item)) => {
            tracing::debug!(id = %id, "Result buffer full, delivering final item later");
            tokio::spawn(async move {
                let _ = results.send(item).await;
            });
        }
    }
}

/// Apply queued commands while no socket is open.
///
/// Returns `false` when the client asked to terminate.
fn drain_commands(state: &mut TaskState) -> bool {
    while let Ok(cmd) = state.cmd_rx.try_recv() {
        match cmd {
            Command::Start {
                id,
                operation,
                results,
            } => {
                state
                    .operations
                    .insert(id, ActiveOperation { operation, results });
            }
            Command::Stop { id } => {
                state.operations.remove(&id);
            }
            Command::Terminate => {
                state.operations.clear();
                return false;
            }
        }
    }
    true
}

fn give_up_error(state: &TaskState, last: WsError) -> WsError {
    if state.config.reconnect && state.reconnect_attempts > 0 {
        WsError::MaxReconnectReached {
            attempts: state.reconnect_attempts,
        }
    } else {
        last
    }
}

// ─── Reconnection backoff ────────────────────────────────────────────────────

/// Delay before reconnect attempt `attempt` (1-based), before jitter.
fn reconnect_delay_ms(attempt: u32, base_ms: u64, cap_ms: u64) -> u64 {
    let exp = attempt.saturating_sub(1).min(16);
    base_ms.saturating_mul(1u64 << exp).min(cap_ms)
}

async fn backoff_sleep(state: &mut TaskState) {
    state.reconnect_attempts += 1;
    state.set_ready_state(ReadyState::Connecting);

    let base = reconnect_delay_ms(
        state.reconnect_attempts,
        state.config.base_reconnect_delay_ms,
        state.config.max_reconnect_delay_ms,
    );
    let jitter = rand::random::<u64>() % (base / 4 + 1);
    let delay = base.saturating_add(jitter).min(state.config.max_reconnect_delay_ms);

    tracing::info!(
        attempt = state.reconnect_attempts,
        max = ?state.config.max_reconnect_attempts,
        delay_ms = delay,
        "Reconnecting"
    );

    tokio::time::sleep(Duration::from_millis(delay)).await;
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state(config: WsConfig) -> (mpsc::Sender<Command>, TaskState) {
        let (tx, rx) = mpsc::channel(8);
        let state = TaskState {
            config,
            cmd_rx: rx,
            operations: HashMap::new(),
            reconnect_attempts: 0,
            ready_state: Arc::new(AtomicU8::new(ReadyState::Closed as u8)),
        };
        (tx, state)
    }

    #[test]
    fn test_client_new_is_closed() {
        let client = SubscriptionClient::new(WsConfig::new("ws://localhost:1/subscriptions"));
        assert_eq!(client.ready_state(), ReadyState::Closed);
        assert!(!client.is_connected());
    }

    #[test]
    fn test_reconnect_delay_doubles_and_caps() {
        assert_eq!(reconnect_delay_ms(1, 1000, 30_000), 1000);
        assert_eq!(reconnect_delay_ms(2, 1000, 30_000), 2000);
        assert_eq!(reconnect_delay_ms(3, 1000, 30_000), 4000);
        assert_eq!(reconnect_delay_ms(10, 1000, 30_000), 30_000);
        assert_eq!(reconnect_delay_ms(u32::MAX, 1000, 30_000), 30_000);
    }

    #[test]
    fn test_should_reconnect_requires_active_operations() {
        let (_tx, mut state) = test_state(WsConfig::new("ws://x"));
        assert!(!state.should_reconnect());

        let (results, _rx) = mpsc::channel(1);
        state.operations.insert(
            "1".into(),
            ActiveOperation {
                operation: Operation::new("subscription { a }"),
                results,
            },
        );
        assert!(state.should_reconnect());

        state.config.reconnect = false;
        assert!(!state.should_reconnect());
    }

    #[test]
    fn test_should_reconnect_honours_max_attempts() {
        let mut config = WsConfig::new("ws://x");
        config.max_reconnect_attempts = Some(2);
        let (_tx, mut state) = test_state(config);
        let (results, _rx) = mpsc::channel(1);
        state.operations.insert(
            "1".into(),
            ActiveOperation {
                operation: Operation::new("subscription { a }"),
                results,
            },
        );
        state.reconnect_attempts = 1;
        assert!(state.should_reconnect());
        state.reconnect_attempts = 2;
        assert!(!state.should_reconnect());
        assert!(matches!(
            give_up_error(&state, WsError::NotConnected),
            WsError::MaxReconnectReached { attempts: 2 }
        ));
    }

    #[tokio::test]
    async fn test_drain_commands_tracks_start_and_stop() {
        let (tx, mut state) = test_state(WsConfig::new("ws://x"));
        let (results, _rx) = mpsc::channel(1);
        tx.send(Command::Start {
            id: "1".into(),
            operation: Operation::new("subscription { a }"),
            results: results.clone(),
        })
        .await
        .unwrap();
        tx.send(Command::Start {
            id: "2".into(),
            operation: Operation::new("subscription { b }"),
            results,
        })
        .await
        .unwrap();
        tx.send(Command::Stop { id: "1".into() }).await.unwrap();

        assert!(drain_commands(&mut state));
        assert_eq!(state.operations.len(), 1);
        assert!(state.operations.contains_key("2"));

        tx.send(Command::Terminate).await.unwrap();
        assert!(!drain_commands(&mut state));
        assert!(state.operations.is_empty());
    }

    #[tokio::test]
    async fn test_fail_all_delivers_error() {
        let (_tx, mut state) = test_state(WsConfig::new("ws://x"));
        let (results, mut rx) = mpsc::channel(1);
        state.operations.insert(
            "1".into(),
            ActiveOperation {
                operation: Operation::new("subscription { a }"),
                results,
            },
        );
        state.fail_all(WsError::NotConnected);
        assert!(state.operations.is_empty());
        assert!(matches!(
            rx.recv().await,
            Some(Err(LinkError::Ws(WsError::NotConnected)))
        ));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_fail_all_with_full_buffer_still_delivers() {
        let (_tx, mut state) = test_state(WsConfig::new("ws://x"));
        let (results, mut rx) = mpsc::channel(1);
        results.try_send(Ok(Response::default())).unwrap();
        state.operations.insert(
            "1".into(),
            ActiveOperation {
                operation: Operation::new("subscription { a }"),
                results,
            },
        );
        state.fail_all(WsError::NotConnected);

        assert!(matches!(rx.recv().await, Some(Ok(_))));
        assert!(matches!(
            rx.recv().await,
            Some(Err(LinkError::Ws(WsError::NotConnected)))
        ));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_close_commands_fails_queued_start() {
        let (tx, mut state) = test_state(WsConfig::new("ws://x"));
        let (results, mut rx) = mpsc::channel(1);
        tx.send(Command::Start {
            id: "1".into(),
            operation: Operation::new("subscription { a }"),
            results,
        })
        .await
        .unwrap();

        state.close_commands();

        assert!(matches!(
            rx.recv().await,
            Some(Err(LinkError::Ws(WsError::NotConnected)))
        ));
        assert!(tx.is_closed());
        assert!(tx.try_send(Command::Stop { id: "1".into() }).is_err());
    }

    #[test]
    fn test_extract_close_with_frame() {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: "goodbye".into(),
        };
        let (code, reason) = extract_close(Some(&frame));
        assert_eq!(code, 1000);
        assert_eq!(reason, "goodbye");
    }

    #[test]
    fn test_extract_close_no_frame() {
        let (code, reason) = extract_close(None);
        assert_eq!(code, 1006);
        assert_eq!(reason, "No close frame");
    }

    #[tokio::test]
    async fn test_close_when_never_connected() {
        let client = SubscriptionClient::new(WsConfig::new("ws://localhost:1/subscriptions"));
        client.close().await;
        assert_eq!(client.ready_state(), ReadyState::Closed);
    }
}
