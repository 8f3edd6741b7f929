use std::sync::Arc;

use futures_util::StreamExt;
use rstest::{fixture, rstest};
use serde_json::json;

use super::*;
use crate::domain::ports::{ChangeFeed, DEFAULT_LATITUDE, DEFAULT_LONGITUDE};
use crate::domain::{
    ChangeEvent, ChangeFilter, NewReview, NewServiceRequest, RequestStatus, ReviewRating,
    Subscription,
};
use crate::test_support::fixture_timestamp;

#[fixture]
fn marketplace() -> InMemoryMarketplace {
    InMemoryMarketplace::default()
}

fn query(radius_km: f64, category: Option<&str>) -> NearbyQuery {
    NearbyQuery {
        latitude: DEFAULT_LATITUDE,
        longitude: DEFAULT_LONGITUDE,
        radius_km,
        category: category.map(str::to_owned),
    }
}

fn request(client: &UserId, broker: &UserId) -> ServiceRequest {
    ServiceRequest::create(
        client.clone(),
        NewServiceRequest {
            title: "Two bedroom flat".to_owned(),
            description: "Near Mlimani City".to_owned(),
            broker_id: broker.clone(),
            service_id: Uuid::new_v4(),
            proposed_price: None,
        },
        fixture_timestamp(),
    )
    .expect("valid request")
}

fn review(broker: &UserId, rating: u8) -> Review {
    Review::create(
        UserId::random(),
        broker.clone(),
        NewReview {
            service_request_id: Uuid::new_v4(),
            rating: ReviewRating::new(rating).expect("rating"),
            comment: None,
            anonymous: false,
        },
        fixture_timestamp(),
    )
    .expect("valid review")
}

#[rstest]
fn haversine_matches_known_distance() {
    // Dar es Salaam city centre to Julius Nyerere airport is about 11 km.
    let km = haversine_km(-6.8160, 39.2803, -6.8781, 39.2026);
    assert!((km - 11.0).abs() < 0.5, "got {km}");
    assert!(haversine_km(-6.8, 39.2, -6.8, 39.2).abs() < f64::EPSILON);
}

#[rstest]
#[tokio::test]
async fn nearby_sorts_by_distance_within_radius(marketplace: InMemoryMarketplace) {
    let brokers = marketplace.nearby(&query(10.0, None)).await.expect("nearby");

    assert!(!brokers.is_empty());
    let distances: Vec<f64> = brokers
        .iter()
        .map(|b| b.distance_km().expect("formatted distance"))
        .collect();
    assert!(distances.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(distances.iter().all(|km| *km <= 10.0));
    assert_eq!(brokers[0].name, "Neema Homes");
    assert_eq!(brokers[0].distance, "0.0 km");
    assert!(brokers.iter().all(|b| b.name != "Zawadi Plots"));
}

#[rstest]
#[case(Some("car-rental"), &["Juma Motors", "Kariakoo Car Hire"])]
#[case(Some("Surveying"), &[])]
#[case(Some("commercial"), &["Baraka Commercial Spaces"])]
#[tokio::test]
async fn nearby_filters_by_category(
    marketplace: InMemoryMarketplace,
    #[case] category: Option<&str>,
    #[case] expected: &[&str],
) {
    let mut names: Vec<String> = marketplace
        .nearby(&query(10.0, category))
        .await
        .expect("nearby")
        .into_iter()
        .map(|b| b.name)
        .collect();
    names.sort();
    assert_eq!(names, expected);
}

#[rstest]
#[tokio::test]
async fn wide_radius_reaches_outlying_brokers(marketplace: InMemoryMarketplace) {
    let brokers = marketplace
        .nearby(&query(50.0, Some("Surveying")))
        .await
        .expect("nearby");
    assert_eq!(brokers.len(), 1);
    assert_eq!(brokers[0].name, "Zawadi Plots");
}

#[rstest]
#[tokio::test]
async fn request_mutations_reach_filtered_subscribers() {
    let feed = Arc::new(BroadcastChangeFeed::default());
    let marketplace = InMemoryMarketplace::default().with_change_feed(Arc::clone(&feed));
    let broker = UserId::random();
    let client = UserId::random();
    let mut subscription: Subscription<ServiceRequest> = Subscription::open(
        Arc::clone(&feed) as Arc<dyn ChangeFeed>,
        "service_requests",
        Some(ChangeFilter::eq("brokerId", broker.to_string())),
    )
    .expect("subscribe");

    let mut mine = request(&client, &broker);
    ServiceRequestRepository::insert(&marketplace, &request(&client, &UserId::random()))
        .await
        .expect("insert other");
    ServiceRequestRepository::insert(&marketplace, &mine)
        .await
        .expect("insert mine");
    mine.status = RequestStatus::Accepted;
    ServiceRequestRepository::update(&marketplace, &mine)
        .await
        .expect("update");
    feed.close();

    let first = subscription.next().await.expect("insert event").expect("decoded");
    assert!(matches!(first, ChangeEvent::Insert { new } if new.id == mine.id));
    let second = subscription.next().await.expect("update event").expect("decoded");
    match second {
        ChangeEvent::Update { old, new } => {
            assert_eq!(old.map(|r| r.status), Some(RequestStatus::Pending));
            assert_eq!(new.status, RequestStatus::Accepted);
        }
        other => panic!("expected update, got {other:?}"),
    }
    assert!(subscription.next().await.is_none());
}

#[rstest]
#[tokio::test]
async fn updating_unknown_request_is_not_found(marketplace: InMemoryMarketplace) {
    let unsaved = request(&UserId::random(), &UserId::random());
    let error = ServiceRequestRepository::update(&marketplace, &unsaved)
        .await
        .expect_err("missing row");
    assert!(matches!(error, ServiceRequestRepositoryError::NotFound { .. }));
}

#[rstest]
#[tokio::test]
async fn requests_list_newest_first(marketplace: InMemoryMarketplace) {
    let client = UserId::random();
    let broker = UserId::random();
    let older = request(&client, &broker);
    let mut newer = request(&client, &broker);
    newer.created_at = older.created_at + chrono::Duration::minutes(5);
    ServiceRequestRepository::insert(&marketplace, &older)
        .await
        .expect("older");
    ServiceRequestRepository::insert(&marketplace, &newer)
        .await
        .expect("newer");

    let ids: Vec<Uuid> = marketplace
        .list_for_broker(&broker)
        .await
        .expect("list")
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![newer.id, older.id]);
    assert!(
        marketplace
            .list_for_client(&broker)
            .await
            .expect("list")
            .is_empty()
    );
}

#[rstest]
#[tokio::test]
async fn broker_rating_averages_reviews(marketplace: InMemoryMarketplace) {
    let broker = UserId::random();
    assert_eq!(marketplace.broker_rating(&broker).await.expect("rating"), None);

    for rating in [5, 4, 3] {
        ReviewRepository::insert(&marketplace, &review(&broker, rating))
            .await
            .expect("insert");
    }
    ReviewRepository::insert(&marketplace, &review(&UserId::random(), 1))
        .await
        .expect("other broker");

    assert_eq!(
        marketplace.broker_rating(&broker).await.expect("rating"),
        Some(4.0)
    );
}

#[rstest]
#[tokio::test]
async fn second_review_for_same_request_is_duplicate(marketplace: InMemoryMarketplace) {
    let first = review(&UserId::random(), 5);
    let mut second = first.clone();
    second.id = Uuid::new_v4();
    ReviewRepository::insert(&marketplace, &first)
        .await
        .expect("first");
    let error = ReviewRepository::insert(&marketplace, &second)
        .await
        .expect_err("duplicate");
    assert!(matches!(error, ReviewRepositoryError::Duplicate { .. }));
}

#[rstest]
#[tokio::test]
async fn listing_delete_publishes_old_row() {
    let feed = Arc::new(BroadcastChangeFeed::default());
    let marketplace = InMemoryMarketplace::default().with_change_feed(Arc::clone(&feed));
    let changes = feed.subscribe("broker_services", None).expect("subscribe");
    let listing = ServiceListing {
        id: Uuid::new_v4(),
        broker_id: UserId::random(),
        category: "land".to_owned(),
        title: "Plot in Bunju".to_owned(),
        description: String::new(),
        price_min: Some(20_000_000),
        price_max: None,
        location: None,
        active: true,
    };
    ServiceListingRepository::insert(&marketplace, &listing)
        .await
        .expect("insert");
    ServiceListingRepository::delete(&marketplace, &listing.id)
        .await
        .expect("delete");
    assert!(matches!(
        ServiceListingRepository::delete(&marketplace, &listing.id).await,
        Err(ServiceListingRepositoryError::NotFound { .. })
    ));
    feed.close();

    let kinds: Vec<ChangeKind> = changes.map(|change| change.kind).collect().await;
    assert_eq!(kinds, vec![ChangeKind::Insert, ChangeKind::Delete]);
}

#[rstest]
#[tokio::test]
async fn search_logs_and_routes_are_kept(marketplace: InMemoryMarketplace) {
    let entry = SearchLog {
        user_id: None,
        search_query: "plots".to_owned(),
        filters: json!({ "service": "land" }),
        results_count: 2,
    };
    marketplace.record(&entry).await.expect("record");
    assert_eq!(marketplace.search_logs(), vec![entry]);
    assert!(marketplace.routes_for(None).await.expect("routes").is_empty());
}

#[rstest]
#[tokio::test]
async fn snapshot_restores_into_a_fresh_marketplace(marketplace: InMemoryMarketplace) {
    let broker = UserId::random();
    let saved = request(&UserId::random(), &broker);
    ServiceRequestRepository::insert(&marketplace, &saved)
        .await
        .expect("insert");
    ReviewRepository::insert(&marketplace, &review(&broker, 4))
        .await
        .expect("review");

    let raw = serde_json::to_string(&marketplace.snapshot()).expect("encode");
    let restored = InMemoryMarketplace::default();
    restored.restore(serde_json::from_str(&raw).expect("decode"));

    assert_eq!(
        restored.list_for_broker(&broker).await.expect("list"),
        vec![saved]
    );
    assert_eq!(
        restored.broker_rating(&broker).await.expect("rating"),
        Some(4.0)
    );
}
