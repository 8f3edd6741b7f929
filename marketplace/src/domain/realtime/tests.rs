//! Regression coverage for change decoding and subscription lifecycle.

use std::sync::Mutex;

use futures_util::stream;
use rstest::rstest;
use serde::Deserialize;
use serde_json::json;

use super::*;

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Row {
    id: u32,
    status: String,
}

/// Replays a fixed script on every subscription and records each call.
#[derive(Default)]
struct ScriptedFeed {
    script: Vec<RawChange>,
    calls: Mutex<Vec<(String, Option<String>)>>,
}

impl ScriptedFeed {
    fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl ChangeFeed for ScriptedFeed {
    fn subscribe(
        &self,
        table: &str,
        filter: Option<&ChangeFilter>,
    ) -> Result<ChangeStream, ChangeFeedError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((table.to_owned(), filter.map(ToString::to_string)));
        Ok(Box::pin(stream::iter(self.script.clone())))
    }
}

fn change(kind: ChangeKind, old: Option<Value>, new: Option<Value>) -> RawChange {
    RawChange {
        table: "service_requests".to_owned(),
        kind,
        old,
        new,
    }
}

#[derive(Default)]
struct Recorder {
    inserted: Vec<Row>,
    updated: Vec<(Option<Row>, Row)>,
    deleted: Vec<Row>,
}

impl ChangeHandler<Row> for Recorder {
    fn on_insert(&mut self, new: Row) {
        self.inserted.push(new);
    }

    fn on_update(&mut self, old: Option<Row>, new: Row) {
        self.updated.push((old, new));
    }

    fn on_delete(&mut self, old: Row) {
        self.deleted.push(old);
    }
}

#[rstest]
#[case("client_id=eq.abc", Some(("client_id", "abc")))]
#[case("broker_id=eq.a=b", Some(("broker_id", "a=b")))]
#[case("client_id=neq.abc", None)]
#[case("=eq.abc", None)]
#[case("client id=eq.abc", None)]
#[case("client_id=eq.", None)]
fn parses_filters(#[case] raw: &str, #[case] expected: Option<(&str, &str)>) {
    let parsed = raw.parse::<ChangeFilter>().ok();
    assert_eq!(
        parsed.as_ref().map(|f| (f.column(), f.value())),
        expected
    );
}

#[rstest]
fn filter_matches_strings_and_numbers() {
    let by_client = ChangeFilter::eq("client_id", "abc");
    assert!(by_client.matches(&json!({ "client_id": "abc" })));
    assert!(!by_client.matches(&json!({ "client_id": "xyz" })));
    assert!(!by_client.matches(&json!({ "broker_id": "abc" })));

    let by_rating = ChangeFilter::eq("rating", "5");
    assert!(by_rating.matches(&json!({ "rating": 5 })));
}

#[rstest]
fn decodes_each_operation() {
    let insert = ChangeEvent::<Row>::decode(change(
        ChangeKind::Insert,
        None,
        Some(json!({ "id": 1, "status": "pending" })),
    ))
    .expect("insert");
    assert_eq!(
        insert,
        ChangeEvent::Insert {
            new: Row {
                id: 1,
                status: "pending".to_owned()
            }
        }
    );

    let update = ChangeEvent::<Row>::decode(change(
        ChangeKind::Update,
        Some(json!({ "id": 1 })),
        Some(json!({ "id": 1, "status": "accepted" })),
    ))
    .expect("update");
    assert!(matches!(update, ChangeEvent::Update { old: None, .. }));

    let missing = ChangeEvent::<Row>::decode(change(ChangeKind::Delete, None, None));
    assert!(matches!(
        missing,
        Err(ChangeDecodeError::MissingRow {
            kind: ChangeKind::Delete,
            ..
        })
    ));
}

#[rstest]
#[tokio::test]
async fn dispatch_routes_events_and_skips_bad_payloads() {
    let feed = Arc::new(ScriptedFeed {
        script: vec![
            change(
                ChangeKind::Insert,
                None,
                Some(json!({ "id": 1, "status": "pending" })),
            ),
            change(ChangeKind::Insert, None, Some(json!({ "id": "oops" }))),
            change(
                ChangeKind::Update,
                Some(json!({ "id": 1, "status": "pending" })),
                Some(json!({ "id": 1, "status": "accepted" })),
            ),
            change(
                ChangeKind::Delete,
                Some(json!({ "id": 1, "status": "accepted" })),
                None,
            ),
        ],
        ..ScriptedFeed::default()
    });
    let mut subscription =
        Subscription::<Row>::open(feed, "service_requests", None).expect("open");
    let mut recorder = Recorder::default();

    let delivered = subscription.dispatch(&mut recorder).await;

    assert_eq!(delivered, 3);
    assert_eq!(recorder.inserted.len(), 1);
    assert_eq!(recorder.updated.len(), 1);
    assert!(recorder.updated[0].0.is_some());
    assert_eq!(recorder.deleted[0].status, "accepted");
    assert!(!subscription.is_open());
}

#[rstest]
#[tokio::test]
async fn restart_opens_a_fresh_channel_with_the_new_filter() {
    let feed = Arc::new(ScriptedFeed::default());
    let mut subscription = Subscription::<Row>::open(
        feed.clone(),
        "service_requests",
        Some(ChangeFilter::eq("client_id", "a")),
    )
    .expect("open");

    subscription
        .restart(Some(ChangeFilter::eq("client_id", "b")))
        .expect("restart");

    assert_eq!(
        feed.calls(),
        vec![
            (
                "service_requests".to_owned(),
                Some("client_id=eq.a".to_owned())
            ),
            (
                "service_requests".to_owned(),
                Some("client_id=eq.b".to_owned())
            ),
        ]
    );
    assert_eq!(subscription.change_filter().map(ChangeFilter::value), Some("b"));
}

#[rstest]
#[tokio::test]
async fn restart_on_moves_the_channel_to_another_table() {
    let feed = Arc::new(ScriptedFeed::default());
    let mut subscription = Subscription::<Row>::open(
        feed.clone(),
        "service_requests",
        Some(ChangeFilter::eq("client_id", "a")),
    )
    .expect("open");

    subscription
        .restart_on("reviews", Some(ChangeFilter::eq("reviewed_id", "a")))
        .expect("restart");

    assert_eq!(subscription.table(), "reviews");
    assert_eq!(
        subscription.change_filter().map(ToString::to_string),
        Some("reviewed_id=eq.a".to_owned())
    );
    assert_eq!(
        feed.calls().last(),
        Some(&("reviews".to_owned(), Some("reviewed_id=eq.a".to_owned())))
    );
    assert!(subscription.is_open());
}

#[rstest]
#[tokio::test]
async fn change_filter_stays_reachable_next_to_stream_combinators() {
    let feed = Arc::new(ScriptedFeed {
        script: vec![change(
            ChangeKind::Insert,
            None,
            Some(json!({ "id": 7, "status": "pending" })),
        )],
        ..ScriptedFeed::default()
    });
    let mut subscription = Subscription::<Row>::open(
        feed,
        "service_requests",
        Some(ChangeFilter::eq("client_id", "c")),
    )
    .expect("open");

    assert_eq!(subscription.change_filter().map(ChangeFilter::column), Some("client_id"));
    let first = subscription.next().await.expect("event").expect("decoded");
    assert!(matches!(first, ChangeEvent::Insert { new } if new.id == 7));
}

#[rstest]
#[tokio::test]
async fn closed_subscriptions_yield_nothing() {
    let feed = Arc::new(ScriptedFeed {
        script: vec![change(
            ChangeKind::Insert,
            None,
            Some(json!({ "id": 1, "status": "pending" })),
        )],
        ..ScriptedFeed::default()
    });
    let mut subscription = Subscription::<Row>::open(feed, "service_requests", None).expect("open");
    subscription.close();

    assert!(subscription.next().await.is_none());
}
