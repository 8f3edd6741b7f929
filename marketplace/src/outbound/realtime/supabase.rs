//! Change feed over the Supabase realtime websocket.
//!
//! Each subscription opens its own socket, joins a `realtime:<table>` topic
//! with a `postgres_changes` binding and forwards row changes until the
//! stream is dropped or the server ends the channel. Filtering happens on the
//! server. Heartbeats keep the socket alive; a rejected join or a dropped
//! connection ends the stream after a warning.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt, stream};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};
use url::Url;

use super::DEFAULT_CHANNEL_CAPACITY;
use crate::domain::ChangeFilter;
use crate::domain::ports::{ChangeFeed, ChangeFeedError, ChangeKind, ChangeStream, RawChange};
use crate::outbound::supabase::SupabaseClient;

/// Interval the realtime server expects heartbeats within.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(30);

const JOIN_REF: &str = "1";
const SCHEMA: &str = "public";

/// Opens one realtime channel per subscription.
pub struct SupabaseChangeFeed {
    client: Arc<SupabaseClient>,
    heartbeat: Duration,
}

impl SupabaseChangeFeed {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        Self {
            client,
            heartbeat: DEFAULT_HEARTBEAT,
        }
    }

    #[must_use]
    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }
}

impl ChangeFeed for SupabaseChangeFeed {
    fn subscribe(
        &self,
        table: &str,
        filter: Option<&ChangeFilter>,
    ) -> Result<ChangeStream, ChangeFeedError> {
        let runtime = Handle::try_current().map_err(|error| {
            ChangeFeedError::rejected(table, format!("no async runtime: {error}"))
        })?;
        let url = self
            .client
            .realtime_url()
            .map_err(|error| ChangeFeedError::rejected(table, error.to_string()))?;
        let channel = Channel {
            url,
            table: table.to_owned(),
            join: join_message(table, filter, &self.client.realtime_token()),
            heartbeat: self.heartbeat,
        };
        let (sender, receiver) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        runtime.spawn(channel.run(sender));
        Ok(Box::pin(stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|change| (change, receiver))
        })))
    }
}

struct Channel {
    url: Url,
    table: String,
    join: String,
    heartbeat: Duration,
}

impl Channel {
    async fn run(self, sender: mpsc::Sender<RawChange>) {
        let table = self.table.as_str();
        let socket = match connect_async(self.url.as_str()).await {
            Ok((socket, _)) => socket,
            Err(error) => {
                warn!(%table, %error, "realtime connection failed");
                return;
            }
        };
        let (mut write, mut read) = socket.split();
        if let Err(error) = write.send(Message::Text(self.join.clone())).await {
            warn!(%table, %error, "realtime join could not be sent");
            return;
        }
        info!(%table, "realtime channel joined");

        let mut ticker = interval(self.heartbeat);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        let mut next_ref: u64 = 1;
        loop {
            tokio::select! {
                () = sender.closed() => {
                    debug!(%table, "realtime subscriber dropped");
                    break;
                }
                _ = ticker.tick() => {
                    next_ref += 1;
                    if let Err(error) = write.send(Message::Text(heartbeat_message(next_ref))).await {
                        warn!(%table, %error, "realtime heartbeat failed");
                        break;
                    }
                }
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => match decode_frame(&text, table) {
                        Frame::Change(change) => {
                            if sender.send(change).await.is_err() {
                                break;
                            }
                        }
                        Frame::Rejected(reason) => {
                            warn!(%table, %reason, "realtime channel rejected");
                            break;
                        }
                        Frame::Ignored => {}
                    },
                    Some(Ok(Message::Ping(payload))) => {
                        if let Err(error) = write.send(Message::Pong(payload)).await {
                            warn!(%table, %error, "realtime pong failed");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(%table, "realtime connection closed");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        warn!(%table, %error, "realtime connection error");
                        break;
                    }
                },
            }
        }
        if let Err(error) = write.close().await {
            debug!(%table, %error, "realtime socket did not close cleanly");
        }
    }
}

/// `phx_join` for a `postgres_changes` binding on `table`.
fn join_message(table: &str, filter: Option<&ChangeFilter>, access_token: &str) -> String {
    let mut binding = json!({ "event": "*", "schema": SCHEMA, "table": table });
    if let (Some(filter), Some(fields)) = (filter, binding.as_object_mut()) {
        fields.insert("filter".to_owned(), Value::String(filter.to_string()));
    }
    json!({
        "topic": topic(table),
        "event": "phx_join",
        "payload": {
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [binding],
            },
            "access_token": access_token,
        },
        "ref": JOIN_REF,
        "join_ref": JOIN_REF,
    })
    .to_string()
}

fn heartbeat_message(reference: u64) -> String {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": reference.to_string(),
    })
    .to_string()
}

fn topic(table: &str) -> String {
    format!("realtime:{table}")
}

#[derive(Debug, PartialEq)]
enum Frame {
    Change(RawChange),
    Rejected(String),
    Ignored,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(default)]
    topic: String,
    event: String,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize)]
struct PostgresChange {
    #[serde(rename = "type")]
    kind: ChangeKind,
    #[serde(default)]
    table: Option<String>,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
}

/// Empty row images stand for "no image".
fn image(value: Option<Value>) -> Option<Value> {
    match value {
        Some(Value::Null) => None,
        Some(Value::Object(fields)) if fields.is_empty() => None,
        other => other,
    }
}

fn decode_frame(text: &str, table: &str) -> Frame {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(error) => {
            debug!(%table, %error, "ignoring unreadable realtime frame");
            return Frame::Ignored;
        }
    };
    if envelope.topic != topic(table) {
        return Frame::Ignored;
    }
    let payload = envelope.payload;
    match envelope.event.as_str() {
        "postgres_changes" => {
            let Some(data) = payload.get("data").cloned() else {
                return Frame::Ignored;
            };
            match serde_json::from_value::<PostgresChange>(data) {
                Ok(change) => Frame::Change(RawChange {
                    table: change.table.unwrap_or_else(|| table.to_owned()),
                    kind: change.kind,
                    old: image(change.old_record),
                    new: image(change.record),
                }),
                Err(error) => {
                    debug!(%table, %error, "ignoring malformed postgres change");
                    Frame::Ignored
                }
            }
        }
        "phx_reply" if payload.get("status").and_then(Value::as_str) == Some("error") => {
            Frame::Rejected(reason(&payload["response"]))
        }
        "system" if payload.get("status").and_then(Value::as_str) == Some("error") => {
            Frame::Rejected(reason(&payload))
        }
        "phx_error" => Frame::Rejected("channel crashed on the server".to_owned()),
        "phx_close" => Frame::Rejected("channel closed by the server".to_owned()),
        _ => Frame::Ignored,
    }
}

fn reason(value: &Value) -> String {
    ["reason", "message"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map_or_else(|| value.to_string(), str::to_owned)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn frame(event: &str, payload: Value) -> String {
        json!({
            "topic": "realtime:service_requests",
            "event": event,
            "payload": payload,
            "ref": null,
        })
        .to_string()
    }

    #[rstest]
    fn join_binds_postgres_changes_with_the_filter() {
        let filter = ChangeFilter::eq("broker_id", "b-1");
        let join: Value =
            serde_json::from_str(&join_message("service_requests", Some(&filter), "jwt"))
                .expect("json");
        assert_eq!(join["topic"], "realtime:service_requests");
        assert_eq!(join["event"], "phx_join");
        assert_eq!(join["payload"]["access_token"], "jwt");
        assert_eq!(
            join["payload"]["config"]["postgres_changes"][0],
            json!({
                "event": "*",
                "schema": "public",
                "table": "service_requests",
                "filter": "broker_id=eq.b-1",
            })
        );
    }

    #[rstest]
    fn unfiltered_join_omits_the_filter() {
        let join: Value =
            serde_json::from_str(&join_message("reviews", None, "anon")).expect("json");
        let binding = &join["payload"]["config"]["postgres_changes"][0];
        assert!(binding.get("filter").is_none());
    }

    #[rstest]
    fn heartbeats_use_the_phoenix_topic() {
        let beat: Value = serde_json::from_str(&heartbeat_message(7)).expect("json");
        assert_eq!(
            beat,
            json!({ "topic": "phoenix", "event": "heartbeat", "payload": {}, "ref": "7" })
        );
    }

    #[rstest]
    fn decodes_inserts() {
        let text = frame(
            "postgres_changes",
            json!({
                "ids": [1],
                "data": {
                    "type": "INSERT",
                    "table": "service_requests",
                    "schema": "public",
                    "record": { "id": "r-1", "status": "pending" },
                    "old_record": {},
                    "commit_timestamp": "2024-01-01T00:00:00Z",
                },
            }),
        );
        assert_eq!(
            decode_frame(&text, "service_requests"),
            Frame::Change(RawChange {
                table: "service_requests".to_owned(),
                kind: ChangeKind::Insert,
                old: None,
                new: Some(json!({ "id": "r-1", "status": "pending" })),
            })
        );
    }

    #[rstest]
    fn deletes_carry_the_old_record() {
        let text = frame(
            "postgres_changes",
            json!({ "data": { "type": "DELETE", "old_record": { "id": "r-1" } } }),
        );
        let Frame::Change(change) = decode_frame(&text, "service_requests") else {
            panic!("expected a change");
        };
        assert_eq!(change.kind, ChangeKind::Delete);
        assert_eq!(change.table, "service_requests");
        assert_eq!(change.row(), Some(&json!({ "id": "r-1" })));
        assert!(change.new.is_none());
    }

    #[rstest]
    #[case::join_error(
        "phx_reply",
        json!({ "status": "error", "response": { "reason": "unauthorized" } }),
        "unauthorized"
    )]
    #[case::system_error(
        "system",
        json!({ "status": "error", "message": "invalid filter", "extension": "postgres_changes" }),
        "invalid filter"
    )]
    fn server_errors_reject_the_channel(
        #[case] event: &str,
        #[case] payload: Value,
        #[case] expected: &str,
    ) {
        assert_eq!(
            decode_frame(&frame(event, payload), "service_requests"),
            Frame::Rejected(expected.to_owned())
        );
    }

    #[rstest]
    #[case::join_ok(frame("phx_reply", json!({ "status": "ok", "response": {} })))]
    #[case::presence(frame("presence_state", json!({})))]
    #[case::not_json("hello".to_owned())]
    #[case::other_topic(
        json!({ "topic": "phoenix", "event": "phx_reply", "payload": { "status": "ok" } })
            .to_string()
    )]
    fn bookkeeping_frames_are_ignored(#[case] text: String) {
        assert_eq!(decode_frame(&text, "service_requests"), Frame::Ignored);
    }

    #[rstest]
    fn subscribing_outside_a_runtime_is_rejected() {
        let client = SupabaseClient::new(
            Url::parse("https://abc.supabase.co").expect("url"),
            "anon",
            Duration::from_secs(5),
        )
        .expect("client");
        let feed = SupabaseChangeFeed::new(Arc::new(client));
        let Err(error) = feed.subscribe("reviews", None) else {
            panic!("subscribing needs a runtime");
        };
        assert!(matches!(error, ChangeFeedError::Rejected { table, .. } if table == "reviews"));
    }
}
