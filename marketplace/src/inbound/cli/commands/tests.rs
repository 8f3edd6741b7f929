use std::sync::Arc;

use clap::Parser;
use rstest::{fixture, rstest};
use serde_json::{Value, json};

use super::*;
use crate::domain::ports::{KeyValueStore, RawChange};
use crate::inbound::cli::{Cli, CliStatePorts};
use crate::outbound::memory::InMemoryMarketplace;
use crate::outbound::realtime::BroadcastChangeFeed;
use crate::outbound::storage::InMemoryStore;
use crate::test_support::fixture_clock;

struct Harness {
    state: CliState,
    marketplace: Arc<InMemoryMarketplace>,
}

#[fixture]
fn harness() -> Harness {
    let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::default());
    let marketplace = Arc::new(InMemoryMarketplace::default());
    let state = CliState::new(
        CliStatePorts::offline(store, Arc::clone(&marketplace)),
        fixture_clock(),
    );
    Harness { state, marketplace }
}

async fn exec(state: &CliState, argv: &[&str]) -> Result<Value, CliError> {
    let cli = Cli::try_parse_from(argv).expect("valid arguments");
    let mut out = Vec::new();
    run(state, cli.command, &mut out).await?;
    Ok(serde_json::from_slice(&out).expect("json output"))
}

async fn sign_up_broker(state: &CliState) -> Value {
    exec(
        state,
        &[
            "dalali",
            "signup",
            "--name",
            "Amina",
            "--email",
            "amina@example.com",
            "--password",
            "siri123",
            "--role",
            "broker",
        ],
    )
    .await
    .expect("signup")
}

#[rstest]
#[tokio::test]
async fn signup_prints_user_without_token(harness: Harness) {
    let signed_up = sign_up_broker(&harness.state).await;
    assert_eq!(signed_up["redirect"], "/dashboard");
    assert_eq!(signed_up["user"]["role"], "broker");
    assert!(signed_up["user"].get("token").is_none());

    let whoami = exec(&harness.state, &["dalali", "whoami"])
        .await
        .expect("whoami");
    assert_eq!(whoami["authenticated"], true);
    assert_eq!(whoami["user"]["displayName"], "Amina");
}

#[rstest]
#[tokio::test]
async fn request_commands_need_a_session(harness: Harness) {
    let error = exec(&harness.state, &["dalali", "requests", "list"])
        .await
        .expect_err("anonymous");
    assert!(matches!(error, CliError::Auth(AuthError::NotAuthenticated)));
}

#[rstest]
#[tokio::test]
async fn broker_search_is_logged(harness: Harness) {
    let found = exec(
        &harness.state,
        &["dalali", "brokers", "--service", "car-rental", "--verified-only"],
    )
    .await
    .expect("search");

    assert_eq!(found["activeFilters"], 2);
    let names: Vec<&str> = found["brokers"]
        .as_array()
        .expect("broker list")
        .iter()
        .filter_map(|broker| broker["name"].as_str())
        .collect();
    assert_eq!(names, vec!["Juma Motors"]);
    let logs = harness.marketplace.search_logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].results_count, 1);
    assert!(logs[0].user_id.is_none());
}

#[rstest]
#[tokio::test]
async fn broker_pages_redirect_clients_home(harness: Harness) {
    exec(
        &harness.state,
        &[
            "dalali",
            "signup",
            "--name",
            "Juma",
            "--phone",
            "+255712345678",
            "--password",
            "siri123",
        ],
    )
    .await
    .expect("signup");

    let denied = exec(&harness.state, &["dalali", "route", "/dashboard"])
        .await
        .expect("route");
    assert_eq!(denied["allowed"], false);
    assert_eq!(denied["redirect"], "/");

    let open = exec(&harness.state, &["dalali", "route", "/requests/42"])
        .await
        .expect("route");
    assert_eq!(open["allowed"], true);
    assert_eq!(open["redirect"], Value::Null);
}

#[rstest]
#[tokio::test]
async fn chosen_language_drives_translations(harness: Harness) {
    let before = exec(&harness.state, &["dalali", "translate", "nav.home"])
        .await
        .expect("translate");
    assert_eq!(before["text"], "Home");

    let onboarding = exec(&harness.state, &["dalali", "onboarding", "language", "sw"])
        .await
        .expect("select language");
    assert_eq!(onboarding["nextStep"], "introduction");

    let after = exec(&harness.state, &["dalali", "translate", "nav.home"])
        .await
        .expect("translate");
    assert_eq!(after["language"], "sw");
    assert_eq!(after["text"], "Nyumbani");
}

#[rstest]
#[tokio::test]
async fn listings_default_to_the_signed_in_broker(harness: Harness) {
    sign_up_broker(&harness.state).await;
    exec(
        &harness.state,
        &[
            "dalali",
            "listings",
            "create",
            "--category",
            "land",
            "--title",
            "Plot in Bunju",
            "--price-min",
            "20000000",
        ],
    )
    .await
    .expect("create");

    let listed = exec(&harness.state, &["dalali", "listings", "list"])
        .await
        .expect("list");
    assert_eq!(listed[0]["title"], "Plot in Bunju");
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
}

#[rstest]
#[tokio::test]
async fn demo_replays_the_broker_inbox() {
    let mut out = Vec::new();
    super::demo::run(&mut out).await.expect("demo");
    let summary: Value = serde_json::from_slice(&out).expect("json output");

    assert_eq!(summary["request"]["status"], "completed");
    assert_eq!(summary["brokerRating"], 5.0);
    let inbox = summary["brokerInbox"].as_array().expect("inbox");
    assert_eq!(inbox.len(), 4);
    assert_eq!(inbox[0]["event"], "insert");
    assert_eq!(inbox[3]["to"], "completed");
}

fn state_over(feed: &Arc<BroadcastChangeFeed>) -> CliState {
    let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::default());
    CliState::new(
        CliStatePorts::offline_with_feed(
            store,
            Arc::new(InMemoryMarketplace::default()),
            Arc::clone(feed),
        ),
        fixture_clock(),
    )
}

fn change(table: &str, kind: ChangeKind, old: Option<Value>, new: Option<Value>) -> RawChange {
    RawChange {
        table: table.to_owned(),
        kind,
        old,
        new,
    }
}

#[rstest]
#[tokio::test]
async fn watch_prints_matching_changes_until_the_feed_ends() {
    let feed = Arc::new(BroadcastChangeFeed::default());
    let state = state_over(&feed);
    let cli = Cli::try_parse_from([
        "dalali",
        "watch",
        "service_requests",
        "--filter",
        "broker_id=eq.b-1",
    ])
    .expect("valid arguments");
    let mut out = Vec::new();

    let publisher = async {
        while feed.subscriber_count() == 0 {
            tokio::task::yield_now().await;
        }
        let mine = json!({ "id": "r-1", "broker_id": "b-1", "status": "pending" });
        let accepted = json!({ "id": "r-1", "broker_id": "b-1", "status": "accepted" });
        let theirs = json!({ "id": "r-2", "broker_id": "b-2", "status": "pending" });
        feed.publish(change("service_requests", ChangeKind::Insert, None, Some(mine.clone())));
        feed.publish(change("service_requests", ChangeKind::Insert, None, Some(theirs)));
        feed.publish(change("reviews", ChangeKind::Insert, None, Some(mine.clone())));
        feed.publish(change(
            "service_requests",
            ChangeKind::Update,
            Some(mine),
            Some(accepted.clone()),
        ));
        feed.publish(change("service_requests", ChangeKind::Delete, Some(accepted), None));
        feed.close();
    };
    let (outcome, ()) = tokio::join!(run(&state, cli.command, &mut out), publisher);
    outcome.expect("watch");

    let text = String::from_utf8(out).expect("utf8 output");
    let lines: Vec<Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();
    let events: Vec<&str> = lines
        .iter()
        .filter_map(|line| line["event"].as_str())
        .collect();
    assert_eq!(events, ["INSERT", "UPDATE", "DELETE"]);
    assert!(lines.iter().all(|line| line["table"] == "service_requests"));
    assert_eq!(lines[0]["old"], Value::Null);
    assert_eq!(lines[1]["old"]["status"], "pending");
    assert_eq!(lines[1]["new"]["status"], "accepted");
    assert_eq!(lines[2]["new"], Value::Null);
}

#[rstest]
#[tokio::test]
async fn watch_fails_on_a_closed_feed() {
    let feed = Arc::new(BroadcastChangeFeed::default());
    feed.close();
    let state = state_over(&feed);
    let error = exec(&state, &["dalali", "watch", "reviews"])
        .await
        .expect_err("closed feed");
    assert!(matches!(error, CliError::Realtime(ChangeFeedError::Closed)));
}
