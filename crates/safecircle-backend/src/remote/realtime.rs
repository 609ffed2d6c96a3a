//! Realtime change feed over the Phoenix channel protocol.
//!
//! [`RealtimeClient`] opens one websocket per subscription, joins the
//! configured channel with a `postgres_changes` filter for inserts on the
//! incidents table and forwards every matching row as an [`IncidentEvent`].

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use safecircle_bridge::{
    auth::AuthSession,
    config::BackendConfig,
    incident::IncidentEvent,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

use super::{ChangeFeed, FeedError, RemoteError};

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

const INCIDENTS_TABLE: &str = "incidents";
const PROTOCOL_VERSION: &str = "1.0.0";
const JOIN_REF: &str = "1";
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const JOIN_TIMEOUT: Duration = Duration::from_secs(10);
const EVENT_BUFFER: usize = 32;

/// A frame of the Phoenix channel protocol.
#[derive(Debug, Deserialize)]
struct PhoenixMessage {
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
    #[serde(rename = "ref")]
    reference: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChangePayload {
    data: ChangeData,
}

#[derive(Debug, Deserialize)]
struct ChangeData {
    #[serde(rename = "type")]
    kind: String,
    table: String,
    record: IncidentEvent,
}

/// Client for the hosted realtime service.
#[derive(Debug, Clone)]
pub struct RealtimeClient {
    socket_url: String,
    channel: String,
}

impl RealtimeClient {
    pub fn new(config: &BackendConfig) -> Result<Self, RemoteError> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| RemoteError::InvalidUrl("no project url configured".to_string()))?;
        let anon_key = config
            .anon_key
            .as_deref()
            .ok_or_else(|| RemoteError::InvalidUrl(format!("no anon key configured for {url}")))?;

        Ok(Self {
            socket_url: socket_url(url, anon_key)?,
            channel: config.realtime_channel.clone(),
        })
    }

    fn topic(&self) -> String {
        format!("realtime:{}", self.channel)
    }

    async fn join(&self, socket: &mut Socket, session: &AuthSession) -> Result<(), FeedError> {
        let topic = self.topic();
        send_json(socket, join_message(&topic, &session.access_token)).await?;

        let reply = tokio::time::timeout(JOIN_TIMEOUT, async {
            while let Some(frame) = socket.next().await {
                let frame = frame.map_err(|error| FeedError::Protocol(error.to_string()))?;
                let Message::Text(text) = frame else {
                    continue;
                };
                let Ok(message) = serde_json::from_str::<PhoenixMessage>(&text) else {
                    continue;
                };
                if message.topic == topic
                    && message.event == "phx_reply"
                    && message.reference.as_deref() == Some(JOIN_REF)
                {
                    return Ok(message.payload);
                }
            }
            Err::<Value, FeedError>(FeedError::Protocol(
                "socket closed before join reply".to_string(),
            ))
        })
        .await
        .map_err(|_| FeedError::JoinRejected("timed out waiting for join reply".to_string()))??;

        match reply.get("status").and_then(Value::as_str) {
            Some("ok") => Ok(()),
            status => Err(FeedError::JoinRejected(format!(
                "status {}: {}",
                status.unwrap_or("missing"),
                reply.get("response").cloned().unwrap_or(Value::Null)
            ))),
        }
    }
}

#[async_trait]
impl ChangeFeed for RealtimeClient {
    async fn subscribe_incident_inserts(
        &self,
        session: &AuthSession,
        cancel: CancellationToken,
    ) -> Result<Receiver<IncidentEvent>, FeedError> {
        let (mut socket, _response) = connect_async(self.socket_url.as_str())
            .await
            .map_err(|error| FeedError::Connect(error.to_string()))?;
        self.join(&mut socket, session).await?;
        log::info!("Joined realtime channel {}", self.channel);

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        tokio::spawn(pump(socket, self.topic(), tx, cancel));
        Ok(rx)
    }
}

/// Forwards incident inserts until cancelled, the socket closes or the
/// receiver goes away.
async fn pump(
    mut socket: Socket,
    topic: String,
    tx: Sender<IncidentEvent>,
    cancel: CancellationToken,
) {
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut next_ref: u64 = 2;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                log::debug!("Leaving realtime channel {topic}");
                let _ = send_json(&mut socket, leave_message(&topic, next_ref)).await;
                let _ = socket.close(None).await;
                break;
            }
            _ = tx.closed() => {
                let _ = socket.close(None).await;
                break;
            }
            _ = heartbeat.tick() => {
                if let Err(error) = send_json(&mut socket, heartbeat_message(next_ref)).await {
                    log::error!("Realtime heartbeat failed: {error}");
                    break;
                }
                next_ref += 1;
            }
            frame = socket.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = parse_incident_insert(&text) {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    log::info!("Realtime socket closed: {frame:?}");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    log::error!("Realtime receive error: {error}");
                    break;
                }
                None => break,
            },
        }
    }
}

async fn send_json(socket: &mut Socket, value: Value) -> Result<(), FeedError> {
    socket
        .send(Message::Text(value.to_string()))
        .await
        .map_err(|error| FeedError::Protocol(error.to_string()))
}

fn socket_url(project_url: &str, anon_key: &str) -> Result<String, RemoteError> {
    let host = if let Some(rest) = project_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = project_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(RemoteError::InvalidUrl(project_url.to_string()));
    };
    Ok(format!(
        "{}/realtime/v1/websocket?apikey={anon_key}&vsn={PROTOCOL_VERSION}",
        host.trim_end_matches('/')
    ))
}

fn join_message(topic: &str, access_token: &str) -> Value {
    json!({
        "topic": topic,
        "event": "phx_join",
        "payload": {
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [
                    { "event": "INSERT", "schema": "public", "table": INCIDENTS_TABLE }
                ]
            },
            "access_token": access_token
        },
        "ref": JOIN_REF,
        "join_ref": JOIN_REF
    })
}

fn heartbeat_message(reference: u64) -> Value {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": reference.to_string()
    })
}

fn leave_message(topic: &str, reference: u64) -> Value {
    json!({
        "topic": topic,
        "event": "phx_leave",
        "payload": {},
        "ref": reference.to_string(),
        "join_ref": JOIN_REF
    })
}

/// Extracts an incident from a `postgres_changes` insert frame. Any other
/// frame yields `None`.
fn parse_incident_insert(text: &str) -> Option<IncidentEvent> {
    let message: PhoenixMessage = serde_json::from_str(text).ok()?;
    if message.event != "postgres_changes" {
        return None;
    }
    let change: ChangePayload = match serde_json::from_value(message.payload) {
        Ok(change) => change,
        Err(error) => {
            log::warn!("Failed to parse realtime change: {error}");
            return None;
        }
    };
    if change.data.kind != "INSERT" || change.data.table != INCIDENTS_TABLE {
        return None;
    }
    Some(change.data.record)
}
