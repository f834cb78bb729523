//! Local `graphql-ws` server used by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_hdr_async, WebSocketStream};

pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How the server answers `start`.
#[derive(Debug, Clone, Copy)]
pub enum Mode {
    /// `ticks` data messages, then `complete`.
    Stream { ticks: usize },
    /// One `error` message.
    Error,
    /// First connection: drop the socket on `start`. Later ones: one tick.
    DropFirstConnection,
    /// First connection: send `ka` after the ack, then ignore `start`.
    SilentAfterKeepAlive,
    /// One tick, then keep the operation open.
    Hold,
}

/// What the server saw.
#[derive(Default)]
pub struct ServerLog {
    pub connections: AtomicUsize,
    received: Mutex<Vec<String>>,
    init_payloads: Mutex<Vec<Value>>,
}

impl ServerLog {
    /// Message types received, in order.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.received().iter().filter(|k| k.as_str() == kind).count()
    }

    /// `connection_init` payloads, one per connection.
    pub fn init_payloads(&self) -> Vec<Value> {
        self.init_payloads.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Poll until `kind` was received `n` times.
    pub async fn wait_for(&self, kind: &str, n: usize) {
        tokio::time::timeout(TEST_TIMEOUT, async {
            while self.count(kind) < n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {n} `{kind}` message(s)"));
    }
}

/// Start a server on a random port. Returns its subscriptions URL.
pub async fn spawn_server(mode: Mode) -> (String, Arc<ServerLog>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let log = Arc::new(ServerLog::default());

    let server_log = Arc::clone(&log);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let connection = server_log.connections.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::spawn(serve(stream, mode, connection, Arc::clone(&server_log)));
        }
    });

    (format!("ws://{addr}/subscriptions"), log)
}

/// A URL nothing listens on.
pub async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("ws://{addr}/subscriptions")
}

async fn serve(stream: TcpStream, mode: Mode, connection: usize, log: Arc<ServerLog>) {
    let callback = |_req: &Request, mut resp: Response| -> Result<Response, ErrorResponse> {
        resp.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static("graphql-ws"),
        );
        Ok(resp)
    };
    let Ok(mut ws) = accept_hdr_async(stream, callback).await else {
        return;
    };

    while let Some(Ok(msg)) = ws.next().await {
        let Message::Text(text) = msg else {
            continue;
        };
        let msg: Value = serde_json::from_str(text.as_str()).expect("client sent JSON");
        let kind = msg["type"].as_str().unwrap_or_default().to_string();
        log.received.lock().unwrap().push(kind.clone());

        match kind.as_str() {
            "connection_init" => {
                log.init_payloads.lock().unwrap().push(msg["payload"].clone());
                send(&mut ws, json!({"type": "connection_ack"})).await;
                if matches!(mode, Mode::SilentAfterKeepAlive) && connection == 1 {
                    send(&mut ws, json!({"type": "ka"})).await;
                }
            }
            "start" => {
                let id = msg["id"].clone();
                match mode {
                    Mode::DropFirstConnection if connection == 1 => return,
                    Mode::SilentAfterKeepAlive if connection == 1 => {}
                    Mode::Stream { ticks } => {
                        for tick in 0..ticks {
                            send(&mut ws, data(&id, tick)).await;
                        }
                        send(&mut ws, json!({"type": "complete", "id": id})).await;
                    }
                    Mode::Error => {
                        let error = json!({
                            "type": "error",
                            "id": id,
                            "payload": [{"message": "boom"}]
                        });
                        send(&mut ws, error).await;
                    }
                    Mode::Hold => send(&mut ws, data(&id, 0)).await,
                    Mode::DropFirstConnection | Mode::SilentAfterKeepAlive => {
                        send(&mut ws, data(&id, 0)).await;
                        send(&mut ws, json!({"type": "complete", "id": id})).await;
                    }
                }
            }
            "connection_terminate" => break,
            _ => {}
        }
    }
}

fn data(id: &Value, tick: usize) -> Value {
    json!({
        "type": "data",
        "id": id,
        "payload": {"data": {"tick": {"__typename": "Tick", "id": "clock", "n": tick}}}
    })
}

async fn send(ws: &mut WebSocketStream<TcpStream>, msg: Value) {
    let _ = ws.send(Message::Text(msg.to_string().into())).await;
}
