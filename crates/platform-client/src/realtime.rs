//! Realtime change feed over the platform's Phoenix-style websocket.
//!
//! One call to [`RealtimeClient::open_bookmark_feed`] drives the whole
//! lifecycle for one subscription instance: connect, join the user's
//! channel, stream decoded change events, heartbeat, and leave on drop.
//! There is no reconnect; once the feed reports a degraded status that
//! instance is done and the caller decides whether to open a new one.

use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use shelfmark_client_core::{Bookmark, ChangeEvent, FeedMessage, FeedStatus};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, warn};
use url::Url;

use crate::PlatformClient;
use crate::error::{PlatformError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

const SOCKET_PATH: &str = "/realtime/v1/websocket";
const SOCKET_VSN: &str = "1.0.0";
const FEED_CHANNEL_PREFIX: &str = "bookmarks-realtime";

/// Feed configuration.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Bounds both the socket connect and the channel join ack.
    pub join_timeout: Duration,
    pub heartbeat_interval: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            join_timeout: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(25),
        }
    }
}

/// Wire frame for the socket protocol, both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketFrame {
    pub topic: String,
    pub event: String,
    pub payload: Value,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
}

/// Decoded inbound socket message.
#[derive(Debug, Clone)]
pub enum RealtimeMessage {
    /// Ack for a frame we sent; `ok` is false when the server rejected it.
    Reply {
        topic: String,
        reference: Option<String>,
        ok: bool,
        detail: String,
    },
    Change(ChangeEvent),
    System { ok: bool, message: String },
    /// The channel crashed server-side.
    ChannelDown(String),
    Closed,
}

/// Channel topic for one user's bookmark changes.
#[must_use]
pub fn feed_topic(user_id: &str) -> String {
    format!("realtime:{FEED_CHANNEL_PREFIX}-{user_id}")
}

/// Join frame subscribing to every change kind on the caller's rows. The
/// access token rides along so row-level security applies to the stream.
#[must_use]
pub fn join_frame(topic: &str, access_token: &str, user_id: &str, reference: &str) -> SocketFrame {
    let changes: Vec<Value> = ["INSERT", "UPDATE", "DELETE"]
        .iter()
        .map(|event| {
            json!({
                "event": event,
                "schema": "public",
                "table": "bookmarks",
                "filter": format!("user_id=eq.{user_id}"),
            })
        })
        .collect();

    SocketFrame {
        topic: topic.to_string(),
        event: "phx_join".to_string(),
        payload: json!({
            "config": {"postgres_changes": changes},
            "access_token": access_token,
        }),
        reference: Some(reference.to_string()),
    }
}

#[must_use]
pub fn heartbeat_frame(reference: &str) -> SocketFrame {
    SocketFrame {
        topic: "phoenix".to_string(),
        event: "heartbeat".to_string(),
        payload: json!({}),
        reference: Some(reference.to_string()),
    }
}

#[must_use]
pub fn leave_frame(topic: &str, reference: &str) -> SocketFrame {
    SocketFrame {
        topic: topic.to_string(),
        event: "phx_leave".to_string(),
        payload: json!({}),
        reference: Some(reference.to_string()),
    }
}

/// Parse a socket text frame into a typed message. Unknown events decode
/// to `None`; a frame that names a known event but carries a broken
/// payload is a protocol error.
pub fn parse_realtime_message(text: &str) -> Result<Option<RealtimeMessage>> {
    let frame: SocketFrame = serde_json::from_str(text)
        .map_err(|error| PlatformError::Protocol(format!("invalid socket frame: {error}")))?;

    match frame.event.as_str() {
        "phx_reply" => {
            let status = frame
                .payload
                .get("status")
                .and_then(Value::as_str)
                .ok_or_else(|| PlatformError::Protocol("phx_reply missing status".to_string()))?;
            let detail = frame
                .payload
                .get("response")
                .map(Value::to_string)
                .unwrap_or_default();
            Ok(Some(RealtimeMessage::Reply {
                topic: frame.topic,
                reference: frame.reference,
                ok: status == "ok",
                detail,
            }))
        }
        "postgres_changes" => {
            let data = frame.payload.get("data").ok_or_else(|| {
                PlatformError::Protocol("postgres_changes missing data".to_string())
            })?;
            decode_change(data).map(|event| Some(RealtimeMessage::Change(event)))
        }
        "system" => {
            let ok = frame
                .payload
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("ok")
                == "ok";
            let message = frame
                .payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Ok(Some(RealtimeMessage::System { ok, message }))
        }
        "phx_error" => Ok(Some(RealtimeMessage::ChannelDown(
            frame.payload.to_string(),
        ))),
        "phx_close" => Ok(Some(RealtimeMessage::Closed)),
        _ => Ok(None),
    }
}

/// Decode the `data` member of a change frame into a typed event.
pub fn decode_change(data: &Value) -> Result<ChangeEvent> {
    let kind = data
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| PlatformError::Protocol("change event missing type".to_string()))?;

    match kind {
        "INSERT" | "UPDATE" => {
            let record = data.get("record").cloned().ok_or_else(|| {
                PlatformError::Protocol(format!("{kind} change missing record"))
            })?;
            let bookmark: Bookmark = serde_json::from_value(record).map_err(|error| {
                PlatformError::Protocol(format!("invalid {kind} record: {error}"))
            })?;
            if kind == "INSERT" {
                Ok(ChangeEvent::Insert(bookmark))
            } else {
                Ok(ChangeEvent::Update(bookmark))
            }
        }
        "DELETE" => {
            // Deletes ship only the old row's keys.
            let id = data
                .get("old_record")
                .and_then(|old| old.get("id"))
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    PlatformError::Protocol("DELETE change missing old_record.id".to_string())
                })?;
            Ok(ChangeEvent::Delete { id: id.to_string() })
        }
        other => Err(PlatformError::Protocol(format!(
            "unknown change type: {other}"
        ))),
    }
}

/// Realtime socket client.
#[derive(Debug, Clone)]
pub struct RealtimeClient {
    ws_url: Url,
    config: RealtimeConfig,
}

impl PlatformClient {
    pub fn realtime(&self, config: RealtimeConfig) -> Result<RealtimeClient> {
        RealtimeClient::new(self.base_url(), self.publishable_key(), config)
    }
}

impl RealtimeClient {
    pub fn new(base_url: &str, publishable_key: &str, config: RealtimeConfig) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let ws_base = if let Some(rest) = trimmed.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = trimmed.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            return Err(PlatformError::InvalidUrl(format!(
                "expected an http(s) base URL, got: {trimmed}"
            )));
        };

        let mut ws_url = Url::parse(&format!("{ws_base}{SOCKET_PATH}"))?;
        ws_url
            .query_pairs_mut()
            .append_pair("apikey", publishable_key)
            .append_pair("vsn", SOCKET_VSN);

        Ok(Self { ws_url, config })
    }

    #[must_use]
    pub fn ws_url(&self) -> &Url {
        &self.ws_url
    }

    /// Open the change feed for one user.
    ///
    /// Returns immediately; connection and join progress arrives on the
    /// feed as [`FeedMessage::Status`] values. Dropping the guard leaves
    /// the channel and closes the socket.
    #[must_use]
    pub fn open_bookmark_feed(
        &self,
        user_id: &str,
        access_token: &str,
    ) -> (mpsc::UnboundedReceiver<FeedMessage>, FeedGuard) {
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(run_feed(
            self.ws_url.clone(),
            self.config.clone(),
            user_id.to_string(),
            access_token.to_string(),
            feed_tx,
            shutdown_rx,
        ));

        (
            feed_rx,
            FeedGuard {
                shutdown: Some(shutdown_tx),
                task,
            },
        )
    }
}

/// Handle for one open feed. Dropping it tears the subscription down.
#[derive(Debug)]
pub struct FeedGuard {
    shutdown: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl FeedGuard {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for FeedGuard {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn run_feed(
    ws_url: Url,
    config: RealtimeConfig,
    user_id: String,
    access_token: String,
    feed_tx: mpsc::UnboundedSender<FeedMessage>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let stream = match timeout(config.join_timeout, connect_async(ws_url.as_str())).await {
        Ok(Ok((stream, _response))) => stream,
        Ok(Err(error)) => {
            warn!("realtime connect failed: {error}");
            let _ = feed_tx.send(FeedMessage::Status(FeedStatus::ChannelError));
            return;
        }
        Err(_elapsed) => {
            warn!("realtime connect timed out after {:?}", config.join_timeout);
            let _ = feed_tx.send(FeedMessage::Status(FeedStatus::TimedOut));
            return;
        }
    };

    let (mut writer, mut reader) = stream.split();
    let topic = feed_topic(&user_id);
    let mut reference: u64 = 1;

    let join = join_frame(&topic, &access_token, &user_id, &reference.to_string());
    if let Err(error) = send_frame(&mut writer, &join).await {
        warn!("realtime join send failed: {error}");
        let _ = feed_tx.send(FeedMessage::Status(FeedStatus::ChannelError));
        return;
    }

    match timeout(config.join_timeout, await_join_ack(&mut reader, &topic)).await {
        Ok(Ok(true)) => {
            debug!("joined {topic}");
            let _ = feed_tx.send(FeedMessage::Status(FeedStatus::Subscribed));
        }
        Ok(Ok(false)) => {
            let _ = feed_tx.send(FeedMessage::Status(FeedStatus::ChannelError));
            return;
        }
        Ok(Err(error)) => {
            warn!("realtime join failed: {error}");
            let _ = feed_tx.send(FeedMessage::Status(FeedStatus::ChannelError));
            return;
        }
        Err(_elapsed) => {
            warn!("realtime join timed out after {:?}", config.join_timeout);
            let _ = feed_tx.send(FeedMessage::Status(FeedStatus::TimedOut));
            return;
        }
    }

    let mut heartbeat = interval(config.heartbeat_interval);
    // Consume the immediate first tick; the join just proved liveness.
    heartbeat.tick().await;

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                reference += 1;
                let leave = leave_frame(&topic, &reference.to_string());
                let _ = send_frame(&mut writer, &leave).await;
                let _ = writer.send(Message::Close(None)).await;
                break;
            }
            _ = heartbeat.tick() => {
                reference += 1;
                let frame = heartbeat_frame(&reference.to_string());
                if let Err(error) = send_frame(&mut writer, &frame).await {
                    warn!("realtime heartbeat failed: {error}");
                    let _ = feed_tx.send(FeedMessage::Status(FeedStatus::ChannelError));
                    break;
                }
            }
            frame = reader.next() => match frame {
                Some(Ok(Message::Text(text))) => match parse_realtime_message(text.as_str()) {
                    Ok(Some(RealtimeMessage::Change(event))) => {
                        if feed_tx.send(FeedMessage::Event(event)).is_err() {
                            break;
                        }
                    }
                    Ok(Some(RealtimeMessage::ChannelDown(detail))) => {
                        warn!("realtime channel down: {detail}");
                        let _ = feed_tx.send(FeedMessage::Status(FeedStatus::ChannelError));
                        break;
                    }
                    Ok(Some(RealtimeMessage::System { ok: false, message })) => {
                        warn!("realtime system error: {message}");
                        let _ = feed_tx.send(FeedMessage::Status(FeedStatus::ChannelError));
                        break;
                    }
                    Ok(Some(RealtimeMessage::Closed)) => break,
                    // Heartbeat acks and benign system notices.
                    Ok(Some(_)) => {}
                    Ok(None) => {}
                    Err(error) => {
                        // A malformed event is dropped, not fatal.
                        warn!("realtime decode error: {error}");
                    }
                },
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(_))) => break,
                Some(Err(error)) => {
                    warn!("realtime read error: {error}");
                    break;
                }
                None => break,
            },
        }
    }
}

/// Wait for the server's verdict on our join frame. `Ok(true)` means
/// subscribed; `Ok(false)` means the server rejected or dropped the
/// channel.
async fn await_join_ack(reader: &mut WsReader, topic: &str) -> Result<bool> {
    while let Some(frame) = reader.next().await {
        match frame {
            Ok(Message::Text(text)) => match parse_realtime_message(text.as_str()) {
                Ok(Some(RealtimeMessage::Reply {
                    topic: reply_topic,
                    ok,
                    detail,
                    ..
                })) if reply_topic == topic => {
                    if !ok {
                        warn!("channel join rejected: {detail}");
                    }
                    return Ok(ok);
                }
                Ok(Some(RealtimeMessage::ChannelDown(detail))) => {
                    warn!("channel failed while joining: {detail}");
                    return Ok(false);
                }
                Ok(Some(RealtimeMessage::System { ok: false, message })) => {
                    warn!("system error while joining: {message}");
                    return Ok(false);
                }
                Ok(_) => {}
                Err(error) => {
                    warn!("realtime decode error during join: {error}");
                }
            },
            Ok(Message::Close(_)) => {
                return Err(PlatformError::WebSocket(
                    "socket closed during join".to_string(),
                ));
            }
            Ok(_) => {}
            Err(error) => return Err(PlatformError::WebSocket(error.to_string())),
        }
    }
    Err(PlatformError::WebSocket(
        "socket ended during join".to_string(),
    ))
}

async fn send_frame(writer: &mut WsWriter, frame: &SocketFrame) -> Result<()> {
    let text = serde_json::to_string(frame)
        .map_err(|error| PlatformError::Protocol(error.to_string()))?;
    writer
        .send(Message::Text(text.into()))
        .await
        .map_err(|error| PlatformError::WebSocket(error.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::State;
    use axum::extract::ws::{Message as StubMessage, WebSocket, WebSocketUpgrade};
    use axum::response::IntoResponse;
    use axum::routing::get;

    fn insert_frame(topic: &str, id: &str) -> String {
        json!({
            "topic": topic,
            "event": "postgres_changes",
            "payload": {
                "ids": [1],
                "data": {
                    "type": "INSERT",
                    "record": {
                        "id": id,
                        "user_id": "user-1",
                        "url": "https://example.com/post",
                        "title": "Example",
                        "created_at": "2024-05-01T10:00:00Z"
                    }
                }
            },
            "ref": null
        })
        .to_string()
    }

    #[test]
    fn feed_topic_scopes_to_the_user() {
        assert_eq!(feed_topic("user-1"), "realtime:bookmarks-realtime-user-1");
    }

    #[test]
    fn join_frame_covers_every_change_kind() {
        let frame = join_frame("realtime:bookmarks-realtime-user-1", "at-1", "user-1", "1");
        assert_eq!(frame.event, "phx_join");
        assert_eq!(frame.reference.as_deref(), Some("1"));
        assert_eq!(frame.payload["access_token"], "at-1");

        let changes = frame.payload["config"]["postgres_changes"]
            .as_array()
            .expect("changes array");
        let events: Vec<&str> = changes
            .iter()
            .map(|c| c["event"].as_str().expect("event"))
            .collect();
        assert_eq!(events, vec!["INSERT", "UPDATE", "DELETE"]);
        for change in changes {
            assert_eq!(change["schema"], "public");
            assert_eq!(change["table"], "bookmarks");
            assert_eq!(change["filter"], "user_id=eq.user-1");
        }
    }

    #[test]
    fn wire_frame_round_trips_the_ref_field() {
        let text = serde_json::to_string(&heartbeat_frame("7")).expect("serialize");
        assert!(text.contains("\"ref\":\"7\""));

        let frame: SocketFrame = serde_json::from_str(&text).expect("decode");
        assert_eq!(frame.topic, "phoenix");
        assert_eq!(frame.event, "heartbeat");
        assert_eq!(frame.reference.as_deref(), Some("7"));
    }

    #[test]
    fn parse_reply_carries_the_verdict() {
        let ok = parse_realtime_message(
            r#"{"topic":"realtime:t","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"1"}"#,
        )
        .expect("parse")
        .expect("message");
        let RealtimeMessage::Reply { ok: verdict, .. } = ok else {
            unreachable!("expected a reply");
        };
        assert!(verdict);

        let rejected = parse_realtime_message(
            r#"{"topic":"realtime:t","event":"phx_reply","payload":{"status":"error","response":{"reason":"unauthorized"}},"ref":"1"}"#,
        )
        .expect("parse")
        .expect("message");
        let RealtimeMessage::Reply { ok: verdict, detail, .. } = rejected else {
            unreachable!("expected a reply");
        };
        assert!(!verdict);
        assert!(detail.contains("unauthorized"));
    }

    #[test]
    fn parse_insert_and_update_changes() {
        let text = insert_frame("realtime:t", "b-1");
        let message = parse_realtime_message(&text).expect("parse").expect("message");
        let RealtimeMessage::Change(ChangeEvent::Insert(bookmark)) = message else {
            unreachable!("expected an insert");
        };
        assert_eq!(bookmark.id, "b-1");
        assert_eq!(bookmark.title, "Example");

        let updated = text.replace("INSERT", "UPDATE");
        let message = parse_realtime_message(&updated).expect("parse").expect("message");
        assert!(matches!(
            message,
            RealtimeMessage::Change(ChangeEvent::Update(_))
        ));
    }

    #[test]
    fn parse_delete_reads_the_old_row_id() {
        let text = json!({
            "topic": "realtime:t",
            "event": "postgres_changes",
            "payload": {"ids": [2], "data": {"type": "DELETE", "old_record": {"id": "b-9"}}},
            "ref": null
        })
        .to_string();
        let message = parse_realtime_message(&text).expect("parse").expect("message");
        assert!(matches!(
            message,
            RealtimeMessage::Change(ChangeEvent::Delete { id }) if id == "b-9"
        ));
    }

    #[test]
    fn unknown_events_are_ignored() {
        let text = r#"{"topic":"realtime:t","event":"presence_diff","payload":{},"ref":null}"#;
        assert!(parse_realtime_message(text).expect("parse").is_none());
    }

    #[test]
    fn malformed_frames_are_protocol_errors() {
        struct Case {
            name: &'static str,
            text: String,
        }

        let cases = vec![
            Case {
                name: "not json",
                text: "not a frame".to_string(),
            },
            Case {
                name: "reply without status",
                text: r#"{"topic":"t","event":"phx_reply","payload":{},"ref":"1"}"#.to_string(),
            },
            Case {
                name: "change without data",
                text: r#"{"topic":"t","event":"postgres_changes","payload":{"ids":[]},"ref":null}"#
                    .to_string(),
            },
            Case {
                name: "change without type",
                text: json!({"topic":"t","event":"postgres_changes","payload":{"data":{}},"ref":null})
                    .to_string(),
            },
            Case {
                name: "insert without record",
                text: json!({"topic":"t","event":"postgres_changes","payload":{"data":{"type":"INSERT"}},"ref":null})
                    .to_string(),
            },
            Case {
                name: "insert with a broken record",
                text: json!({"topic":"t","event":"postgres_changes","payload":{"data":{"type":"INSERT","record":{"id":7}}},"ref":null})
                    .to_string(),
            },
            Case {
                name: "delete without old_record",
                text: json!({"topic":"t","event":"postgres_changes","payload":{"data":{"type":"DELETE"}},"ref":null})
                    .to_string(),
            },
            Case {
                name: "unknown change type",
                text: json!({"topic":"t","event":"postgres_changes","payload":{"data":{"type":"TRUNCATE"}},"ref":null})
                    .to_string(),
            },
        ];

        for case in cases {
            let result = parse_realtime_message(&case.text);
            assert!(
                matches!(result, Err(PlatformError::Protocol(_))),
                "case `{}` should be a protocol error, got {result:?}",
                case.name
            );
        }
    }

    #[test]
    fn ws_url_derives_from_the_http_base() {
        let secure = RealtimeClient::new(
            "https://project.example.com/",
            "pk-test",
            RealtimeConfig::default(),
        )
        .expect("client");
        assert_eq!(
            secure.ws_url().as_str(),
            "wss://project.example.com/realtime/v1/websocket?apikey=pk-test&vsn=1.0.0"
        );

        let plain = RealtimeClient::new(
            "http://127.0.0.1:8000",
            "pk-test",
            RealtimeConfig::default(),
        )
        .expect("client");
        assert_eq!(plain.ws_url().scheme(), "ws");

        let bad = RealtimeClient::new("ftp://example.com", "pk-test", RealtimeConfig::default());
        assert!(matches!(bad, Err(PlatformError::InvalidUrl(_))));
    }

    async fn serve_stub(handler: axum::routing::MethodRouter<mpsc::UnboundedSender<String>>, sent_tx: mpsc::UnboundedSender<String>) -> String {
        let app = Router::new()
            .route(SOCKET_PATH, handler)
            .with_state(sent_tx);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub");
        let addr = listener.local_addr().expect("stub addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    async fn accepting_stub(
        State(sent_tx): State<mpsc::UnboundedSender<String>>,
        ws: WebSocketUpgrade,
    ) -> impl IntoResponse {
        ws.on_upgrade(move |mut socket: WebSocket| async move {
            let Some(Ok(StubMessage::Text(join))) = socket.recv().await else {
                return;
            };
            let frame: Value = serde_json::from_str(&join).expect("join frame");
            let topic = frame["topic"].as_str().expect("topic").to_string();
            let reply = json!({
                "topic": topic,
                "event": "phx_reply",
                "payload": {"status": "ok", "response": {}},
                "ref": frame["ref"],
            });
            socket
                .send(StubMessage::Text(reply.to_string()))
                .await
                .expect("send reply");
            socket
                .send(StubMessage::Text(insert_frame(&topic, "b-1")))
                .await
                .expect("send change");

            while let Some(Ok(message)) = socket.recv().await {
                if let StubMessage::Text(text) = message {
                    let _ = sent_tx.send(text);
                }
            }
        })
    }

    async fn rejecting_stub(
        State(_sent_tx): State<mpsc::UnboundedSender<String>>,
        ws: WebSocketUpgrade,
    ) -> impl IntoResponse {
        ws.on_upgrade(|mut socket: WebSocket| async move {
            let Some(Ok(StubMessage::Text(join))) = socket.recv().await else {
                return;
            };
            let frame: Value = serde_json::from_str(&join).expect("join frame");
            let reply = json!({
                "topic": frame["topic"],
                "event": "phx_reply",
                "payload": {"status": "error", "response": {"reason": "unauthorized"}},
                "ref": frame["ref"],
            });
            let _ = socket.send(StubMessage::Text(reply.to_string())).await;
        })
    }

    async fn silent_stub(
        State(_sent_tx): State<mpsc::UnboundedSender<String>>,
        ws: WebSocketUpgrade,
    ) -> impl IntoResponse {
        ws.on_upgrade(|mut socket: WebSocket| async move {
            // Accept the join but never answer it.
            while socket.recv().await.is_some() {}
        })
    }

    #[tokio::test]
    async fn feed_subscribes_delivers_changes_and_leaves_on_drop() {
        let (sent_tx, mut sent_rx) = mpsc::unbounded_channel();
        let base = serve_stub(get(accepting_stub), sent_tx).await;

        let client = RealtimeClient::new(&base, "pk-test", RealtimeConfig::default())
            .expect("realtime client");
        let (mut feed, guard) = client.open_bookmark_feed("user-1", "at-1");

        let first = timeout(Duration::from_secs(5), feed.recv())
            .await
            .expect("status in time")
            .expect("status");
        assert!(matches!(
            first,
            FeedMessage::Status(FeedStatus::Subscribed)
        ));

        let second = timeout(Duration::from_secs(5), feed.recv())
            .await
            .expect("event in time")
            .expect("event");
        let FeedMessage::Event(ChangeEvent::Insert(bookmark)) = second else {
            unreachable!("expected the insert event, got {second:?}");
        };
        assert_eq!(bookmark.id, "b-1");

        drop(guard);
        let leave = timeout(Duration::from_secs(5), sent_rx.recv())
            .await
            .expect("leave in time")
            .expect("leave frame");
        assert!(leave.contains("phx_leave"));
    }

    #[tokio::test]
    async fn rejected_join_reports_channel_error() {
        let (sent_tx, _sent_rx) = mpsc::unbounded_channel();
        let base = serve_stub(get(rejecting_stub), sent_tx).await;

        let client = RealtimeClient::new(&base, "pk-test", RealtimeConfig::default())
            .expect("realtime client");
        let (mut feed, _guard) = client.open_bookmark_feed("user-1", "at-1");

        let first = timeout(Duration::from_secs(5), feed.recv())
            .await
            .expect("status in time")
            .expect("status");
        assert!(matches!(
            first,
            FeedMessage::Status(FeedStatus::ChannelError)
        ));
        // The feed ends with the subscription instance.
        let next = timeout(Duration::from_secs(5), feed.recv())
            .await
            .expect("close in time");
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn unanswered_join_times_out() {
        let (sent_tx, _sent_rx) = mpsc::unbounded_channel();
        let base = serve_stub(get(silent_stub), sent_tx).await;

        let config = RealtimeConfig {
            join_timeout: Duration::from_millis(200),
            ..RealtimeConfig::default()
        };
        let client = RealtimeClient::new(&base, "pk-test", config).expect("realtime client");
        let (mut feed, _guard) = client.open_bookmark_feed("user-1", "at-1");

        let first = timeout(Duration::from_secs(5), feed.recv())
            .await
            .expect("status in time")
            .expect("status");
        assert!(matches!(first, FeedMessage::Status(FeedStatus::TimedOut)));
    }

    #[tokio::test]
    async fn unreachable_socket_reports_channel_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let client = RealtimeClient::new(
            &format!("http://{addr}"),
            "pk-test",
            RealtimeConfig::default(),
        )
        .expect("realtime client");
        let (mut feed, _guard) = client.open_bookmark_feed("user-1", "at-1");

        let first = timeout(Duration::from_secs(5), feed.recv())
            .await
            .expect("status in time")
            .expect("status");
        assert!(matches!(
            first,
            FeedMessage::Status(FeedStatus::ChannelError)
        ));
    }
}
