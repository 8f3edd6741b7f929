//! Scripted booking against throwaway in-memory adapters.
//!
//! A broker publishes a listing, a client books it, the broker accepts and
//! completes the job and the client leaves a review. The broker's request
//! inbox is a live subscription, replayed at the end.

use std::io::Write;
use std::sync::Arc;

use mockable::DefaultClock;
use serde_json::json;
use tracing::info;

use super::commands::{CliError, UserView, emit, settled};
use super::state::{CliState, CliStatePorts};
use crate::domain::ports::KeyValueStore;
use crate::domain::{
    AuthError, ChangeFilter, ChangeHandler, Error, NewReview, NewServiceListing,
    NewServiceRequest, RequestStatus, ReviewRating, Role, ServiceRequest, SignupRequest,
    Subscription,
};
use crate::outbound::memory::InMemoryMarketplace;
use crate::outbound::realtime::BroadcastChangeFeed;
use crate::outbound::storage::InMemoryStore;

/// Compact record of each change the broker saw.
#[derive(Default)]
struct Inbox {
    events: Vec<serde_json::Value>,
}

impl ChangeHandler<ServiceRequest> for Inbox {
    fn on_insert(&mut self, new: ServiceRequest) {
        self.events
            .push(json!({ "event": "insert", "title": new.title, "status": new.status }));
    }

    fn on_update(&mut self, old: Option<ServiceRequest>, new: ServiceRequest) {
        self.events.push(json!({
            "event": "update",
            "from": old.map(|request| request.status),
            "to": new.status,
        }));
    }
}

fn signup(name: &str, email: &str, role: Role) -> Result<SignupRequest, AuthError> {
    SignupRequest::try_new(name, Some(email), None, "karibu123", role).map_err(AuthError::from)
}

/// Run the scripted booking and print its summary.
///
/// # Errors
///
/// Returns [`CliError`] when any step of the booking fails.
pub async fn run<W: Write>(out: &mut W) -> Result<(), CliError> {
    let feed = Arc::new(BroadcastChangeFeed::default());
    let marketplace =
        Arc::new(InMemoryMarketplace::default().with_change_feed(Arc::clone(&feed)));
    let store: Arc<dyn KeyValueStore> = Arc::new(InMemoryStore::default());
    let state = CliState::new(
        CliStatePorts::offline_with_feed(store, marketplace, Arc::clone(&feed)),
        Arc::new(DefaultClock),
    );

    let broker = state
        .auth
        .signup(signup("Amina Mwakasege", "amina@dalali.example", Role::Broker)?)
        .await?;
    let listing = state
        .catalogue
        .create(
            &broker,
            NewServiceListing {
                category: "real-estate".to_owned(),
                title: "Two bedroom apartment in Mikocheni".to_owned(),
                description: "Furnished, with parking".to_owned(),
                price_min: Some(600_000),
                price_max: Some(900_000),
                location: Some("Mikocheni".to_owned()),
            },
        )
        .await?;
    let mut inbox: Subscription<ServiceRequest> = Subscription::open(
        Arc::clone(&state.changes),
        "service_requests",
        Some(ChangeFilter::eq("brokerId", broker.id().to_string())),
    )?;

    let client = state
        .auth
        .signup(signup("Juma Hassan", "juma@dalali.example", Role::Client)?)
        .await?;
    let request = state
        .requests
        .create(
            &client,
            NewServiceRequest {
                title: listing.title.clone(),
                description: "Viewing this weekend?".to_owned(),
                broker_id: broker.id().clone(),
                service_id: listing.id,
                proposed_price: Some(700_000),
            },
        )
        .await?;
    state
        .requests
        .respond(
            &broker,
            request.id,
            Some("Karibu, Saturday at 10".to_owned()),
            Some(750_000),
        )
        .await?;
    state
        .requests
        .update_status(&broker, request.id, RequestStatus::InProgress)
        .await?;
    let completed = state
        .requests
        .update_status(&broker, request.id, RequestStatus::Completed)
        .await?;
    let rating = ReviewRating::new(5).map_err(|error| Error::internal(error.to_string()))?;
    let review = state
        .reviews
        .create(
            &client,
            NewReview {
                service_request_id: request.id,
                rating,
                comment: Some("Honest and quick".to_owned()),
                anonymous: false,
            },
        )
        .await?;
    let average = settled(state.reviews.broker_rating(broker.id()).await)?;

    feed.close();
    let mut seen = Inbox::default();
    let delivered = inbox.dispatch(&mut seen).await;
    info!(delivered, "demo finished");

    emit(
        out,
        &json!({
            "broker": UserView::from(&broker),
            "client": UserView::from(&client),
            "listing": listing,
            "request": completed,
            "review": review,
            "brokerRating": average,
            "brokerInbox": seen.events,
        }),
    )
}
