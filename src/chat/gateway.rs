//! Discord gateway connection
//!
//! Owns the websocket session: hello/identify handshake, heartbeat
//! cadence, and dispatch of `MESSAGE_CREATE` events into the pipeline's
//! channel. Dropped connections reconnect with capped backoff and a fresh
//! identify; messages sent while disconnected are not backfilled.

use super::{ChatError, MessageEvent};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

const GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// GUILDS | GUILD_MESSAGES | MESSAGE_CONTENT.
const INTENTS: u64 = (1 << 0) | (1 << 9) | (1 << 15);

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

type WsWrite = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsRead = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Inbound gateway frame. `d` stays raw until the opcode says what it is.
#[derive(Debug, Deserialize)]
struct GatewayPayload {
    op: u8,
    #[serde(default)]
    d: serde_json::Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

enum SessionEnd {
    /// Server asked for (or the connection needs) a fresh session.
    Reconnect,
    /// The event receiver is gone; the process is shutting down.
    Shutdown,
}

fn identify_payload(token: &str) -> serde_json::Value {
    json!({
        "op": OP_IDENTIFY,
        "d": {
            "token": token,
            "intents": INTENTS,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "raccoon-bot",
                "device": "raccoon-bot"
            }
        }
    })
}

fn heartbeat_payload(last_seq: Option<u64>) -> serde_json::Value {
    json!({ "d": last_seq, "op": OP_HEARTBEAT })
}

/// Run the gateway until the event channel closes. Every exit path other
/// than shutdown loops back into a reconnect.
pub async fn run(token: String, events: mpsc::Sender<MessageEvent>) {
    let mut backoff = INITIAL_BACKOFF;

    loop {
        match connect_and_listen(&token, &events).await {
            Ok(SessionEnd::Shutdown) => {
                info!("Event channel closed, gateway stopping");
                return;
            }
            Ok(SessionEnd::Reconnect) => {
                info!("Gateway session ended, reconnecting");
                backoff = INITIAL_BACKOFF;
            }
            Err(e) => {
                warn!("Gateway connection failed: {}", e);
            }
        }

        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

async fn connect_and_listen(
    token: &str,
    events: &mpsc::Sender<MessageEvent>,
) -> Result<SessionEnd, ChatError> {
    let (ws_stream, _) = connect_async(GATEWAY_URL)
        .await
        .map_err(|e| ChatError::NetworkError(e.to_string()))?;
    let (mut write, mut read) = ws_stream.split();

    // The server speaks first with Hello carrying the heartbeat cadence.
    let hello = next_payload(&mut read).await?;
    if hello.op != OP_HELLO {
        return Err(ChatError::ParseError(format!(
            "expected hello frame, got op {}",
            hello.op
        )));
    }
    let heartbeat_ms = hello
        .d
        .get("heartbeat_interval")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| ChatError::ParseError("hello frame without heartbeat_interval".into()))?;

    send_json(&mut write, identify_payload(token)).await?;
    debug!(heartbeat_ms = heartbeat_ms, "Identified with gateway");

    let mut heartbeat = tokio::time::interval(Duration::from_millis(heartbeat_ms));
    let mut last_seq: Option<u64> = None;
    let mut acked = true;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                if !acked {
                    warn!("Heartbeat went unacknowledged, dropping connection");
                    return Ok(SessionEnd::Reconnect);
                }
                send_json(&mut write, heartbeat_payload(last_seq)).await?;
                acked = false;
            }
            item = read.next() => {
                let msg = match item {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => return Err(ChatError::NetworkError(e.to_string())),
                    None => return Ok(SessionEnd::Reconnect),
                };

                match msg {
                    Message::Text(text) => {
                        let payload: GatewayPayload = match serde_json::from_str(&text) {
                            Ok(payload) => payload,
                            Err(e) => {
                                debug!("Skipping unparseable gateway frame: {}", e);
                                continue;
                            }
                        };
                        if let Some(s) = payload.s {
                            last_seq = Some(s);
                        }

                        match payload.op {
                            OP_DISPATCH => {
                                if handle_dispatch(payload, events).await {
                                    return Ok(SessionEnd::Shutdown);
                                }
                            }
                            OP_HEARTBEAT => {
                                send_json(&mut write, heartbeat_payload(last_seq)).await?;
                            }
                            OP_HEARTBEAT_ACK => acked = true,
                            OP_RECONNECT | OP_INVALID_SESSION => {
                                return Ok(SessionEnd::Reconnect);
                            }
                            _ => {}
                        }
                    }
                    Message::Close(frame) => {
                        info!(frame = ?frame, "Gateway closed the connection");
                        return Ok(SessionEnd::Reconnect);
                    }
                    _ => {} // tungstenite answers pings itself
                }
            }
        }
    }
}

/// Route one dispatch frame. Only `READY` and `MESSAGE_CREATE` matter;
/// bot-authored messages never reach the pipeline. Returns true when the
/// event receiver is gone and the gateway should shut down.
async fn handle_dispatch(payload: GatewayPayload, events: &mpsc::Sender<MessageEvent>) -> bool {
    match payload.t.as_deref() {
        Some("READY") => {
            let username = payload
                .d
                .get("user")
                .and_then(|u| u.get("username"))
                .and_then(|v| v.as_str())
                .unwrap_or("<unknown>");
            info!(user = %username, "Gateway session ready");
        }
        Some("MESSAGE_CREATE") => {
            let event: MessageEvent = match serde_json::from_value(payload.d) {
                Ok(event) => event,
                Err(e) => {
                    debug!("Skipping unparseable message event: {}", e);
                    return false;
                }
            };
            if event.author.bot {
                return false;
            }
            if events.send(event).await.is_err() {
                return true;
            }
        }
        _ => {}
    }
    false
}

async fn send_json(write: &mut WsWrite, payload: serde_json::Value) -> Result<(), ChatError> {
    write
        .send(Message::Text(payload.to_string()))
        .await
        .map_err(|e| ChatError::NetworkError(e.to_string()))
}

async fn next_payload(read: &mut WsRead) -> Result<GatewayPayload, ChatError> {
    while let Some(item) = read.next().await {
        let msg = item.map_err(|e| ChatError::NetworkError(e.to_string()))?;
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text)
                .map_err(|e| ChatError::ParseError(e.to_string()));
        }
    }
    Err(ChatError::NetworkError(
        "gateway closed during handshake".into(),
    ))
}
