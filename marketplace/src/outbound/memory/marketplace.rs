//! Mutex-guarded tables implementing the data ports.

use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::fixtures::{DirectoryEntry, demo_brokers};
use crate::domain::ports::{
    BrokerDirectory, BrokerDirectoryError, ChangeKind, NearbyQuery, ReviewRepository,
    ReviewRepositoryError, RouteRepository, RouteRepositoryError, SearchLog, SearchLogError,
    SearchLogRepository, ServiceListingRepository, ServiceListingRepositoryError,
    ServiceRequestRepository, ServiceRequestRepositoryError,
};
use crate::domain::{
    BrokerProfile, Review, Role, RouteDescriptor, ServiceListing, ServiceRequest, ServiceType,
    UserId,
};
use crate::outbound::realtime::BroadcastChangeFeed;

const EARTH_RADIUS_KM: f64 = 6_371.0;

const LISTINGS: &str = "broker_services";
const REQUESTS: &str = "service_requests";
const REVIEWS: &str = "reviews";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Great-circle distance between two points in kilometres.
fn haversine_km(lat_a: f64, lng_a: f64, lat_b: f64, lng_b: f64) -> f64 {
    let d_lat = (lat_b - lat_a).to_radians();
    let d_lng = (lng_b - lng_a).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.to_radians().cos() * lat_b.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Category names are service-type identifiers; anything else is compared
/// against specialty tags directly.
fn offers(category: &str, specialties: &[String]) -> bool {
    match ServiceType::from_str(category) {
        Ok(service) => service.matches(specialties),
        Err(_) => specialties
            .iter()
            .any(|tag| tag.eq_ignore_ascii_case(category.trim())),
    }
}

/// Replace the row whose id matches, returning the previous image.
fn replace<T: Clone>(rows: &mut [T], id: &Uuid, row: &T, id_of: impl Fn(&T) -> &Uuid) -> Option<T> {
    rows.iter_mut()
        .find(|existing| id_of(existing) == id)
        .map(|existing| std::mem::replace(existing, row.clone()))
}

/// Mutable tables of an [`InMemoryMarketplace`], for carrying offline data
/// between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketplaceSnapshot {
    pub listings: Vec<ServiceListing>,
    pub requests: Vec<ServiceRequest>,
    pub reviews: Vec<Review>,
}

/// Whole marketplace held in process memory.
///
/// The broker directory is fixed at construction; the other tables start
/// empty. When a change feed is attached every listing, request and review
/// mutation is published to it.
pub struct InMemoryMarketplace {
    brokers: Vec<DirectoryEntry>,
    listings: Mutex<Vec<ServiceListing>>,
    requests: Mutex<Vec<ServiceRequest>>,
    reviews: Mutex<Vec<Review>>,
    search_logs: Mutex<Vec<SearchLog>>,
    routes: Vec<RouteDescriptor>,
    feed: Option<Arc<BroadcastChangeFeed>>,
}

impl Default for InMemoryMarketplace {
    fn default() -> Self {
        Self::new(demo_brokers())
    }
}

impl InMemoryMarketplace {
    pub fn new(brokers: Vec<DirectoryEntry>) -> Self {
        Self {
            brokers,
            listings: Mutex::default(),
            requests: Mutex::default(),
            reviews: Mutex::default(),
            search_logs: Mutex::default(),
            routes: Vec::new(),
            feed: None,
        }
    }

    /// Publish mutations to `feed`.
    pub fn with_change_feed(mut self, feed: Arc<BroadcastChangeFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Serve `routes` from the route repository. Without them callers fall
    /// back to their built-in route table.
    pub fn with_routes(mut self, routes: Vec<RouteDescriptor>) -> Self {
        self.routes = routes;
        self
    }

    pub fn snapshot(&self) -> MarketplaceSnapshot {
        MarketplaceSnapshot {
            listings: lock(&self.listings).clone(),
            requests: lock(&self.requests).clone(),
            reviews: lock(&self.reviews).clone(),
        }
    }

    /// Replace the mutable tables. Nothing is published.
    pub fn restore(&self, snapshot: MarketplaceSnapshot) {
        let MarketplaceSnapshot {
            listings,
            requests,
            reviews,
        } = snapshot;
        *lock(&self.listings) = listings;
        *lock(&self.requests) = requests;
        *lock(&self.reviews) = reviews;
    }

    /// Search log entries recorded so far, oldest first.
    pub fn search_logs(&self) -> Vec<SearchLog> {
        lock(&self.search_logs).clone()
    }

    fn publish<T: Serialize>(&self, table: &str, kind: ChangeKind, old: Option<&T>, new: Option<&T>) {
        let Some(feed) = &self.feed else {
            return;
        };
        match feed.publish_row(table, kind, old, new) {
            Ok(receivers) => debug!(table, ?kind, receivers, "change published"),
            Err(error) => warn!(table, %error, "change not published"),
        }
    }
}

#[async_trait]
impl BrokerDirectory for InMemoryMarketplace {
    async fn nearby(&self, query: &NearbyQuery) -> Result<Vec<BrokerProfile>, BrokerDirectoryError> {
        let mut found: Vec<(f64, BrokerProfile)> = self
            .brokers
            .iter()
            .filter(|entry| {
                query
                    .category
                    .as_deref()
                    .is_none_or(|category| offers(category, &entry.profile.specialties))
            })
            .filter_map(|entry| {
                let km = haversine_km(
                    query.latitude,
                    query.longitude,
                    entry.latitude,
                    entry.longitude,
                );
                (km <= query.radius_km).then(|| {
                    let mut profile = entry.profile.clone();
                    profile.distance = format!("{km:.1} km");
                    (km, profile)
                })
            })
            .collect();
        found.sort_by(|(a, _), (b, _)| a.total_cmp(b));
        Ok(found.into_iter().map(|(_, profile)| profile).collect())
    }
}

#[async_trait]
impl ServiceListingRepository for InMemoryMarketplace {
    async fn list_by_broker(
        &self,
        broker_id: &UserId,
    ) -> Result<Vec<ServiceListing>, ServiceListingRepositoryError> {
        Ok(lock(&self.listings)
            .iter()
            .filter(|listing| &listing.broker_id == broker_id)
            .cloned()
            .collect())
    }

    async fn find_by_id(
        &self,
        id: &Uuid,
    ) -> Result<Option<ServiceListing>, ServiceListingRepositoryError> {
        Ok(lock(&self.listings)
            .iter()
            .find(|listing| &listing.id == id)
            .cloned())
    }

    async fn insert(&self, listing: &ServiceListing) -> Result<(), ServiceListingRepositoryError> {
        lock(&self.listings).push(listing.clone());
        self.publish(LISTINGS, ChangeKind::Insert, None, Some(listing));
        Ok(())
    }

    async fn update(&self, listing: &ServiceListing) -> Result<(), ServiceListingRepositoryError> {
        let old = replace(&mut lock(&self.listings), &listing.id, listing, |l| &l.id)
            .ok_or_else(|| ServiceListingRepositoryError::not_found(listing.id.to_string()))?;
        self.publish(LISTINGS, ChangeKind::Update, Some(&old), Some(listing));
        Ok(())
    }

    async fn delete(&self, id: &Uuid) -> Result<(), ServiceListingRepositoryError> {
        let removed = {
            let mut listings = lock(&self.listings);
            let index = listings
                .iter()
                .position(|listing| &listing.id == id)
                .ok_or_else(|| ServiceListingRepositoryError::not_found(id.to_string()))?;
            listings.remove(index)
        };
        self.publish(LISTINGS, ChangeKind::Delete, Some(&removed), None);
        Ok(())
    }
}

#[async_trait]
impl ServiceRequestRepository for InMemoryMarketplace {
    async fn list_for_client(
        &self,
        client_id: &UserId,
    ) -> Result<Vec<ServiceRequest>, ServiceRequestRepositoryError> {
        let mut rows: Vec<ServiceRequest> = lock(&self.requests)
            .iter()
            .filter(|request| &request.client_id == client_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn list_for_broker(
        &self,
        broker_id: &UserId,
    ) -> Result<Vec<ServiceRequest>, ServiceRequestRepositoryError> {
        let mut rows: Vec<ServiceRequest> = lock(&self.requests)
            .iter()
            .filter(|request| &request.broker_id == broker_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn find_by_id(
        &self,
        id: &Uuid,
    ) -> Result<Option<ServiceRequest>, ServiceRequestRepositoryError> {
        Ok(lock(&self.requests)
            .iter()
            .find(|request| &request.id == id)
            .cloned())
    }

    async fn insert(&self, request: &ServiceRequest) -> Result<(), ServiceRequestRepositoryError> {
        lock(&self.requests).push(request.clone());
        self.publish(REQUESTS, ChangeKind::Insert, None, Some(request));
        Ok(())
    }

    async fn update(&self, request: &ServiceRequest) -> Result<(), ServiceRequestRepositoryError> {
        let old = replace(&mut lock(&self.requests), &request.id, request, |r| &r.id)
            .ok_or_else(|| ServiceRequestRepositoryError::not_found(request.id.to_string()))?;
        self.publish(REQUESTS, ChangeKind::Update, Some(&old), Some(request));
        Ok(())
    }
}

#[async_trait]
impl ReviewRepository for InMemoryMarketplace {
    async fn list_for_reviewed(
        &self,
        reviewed_id: &UserId,
    ) -> Result<Vec<Review>, ReviewRepositoryError> {
        let mut rows: Vec<Review> = lock(&self.reviews)
            .iter()
            .filter(|review| &review.reviewed_id == reviewed_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Review>, ReviewRepositoryError> {
        Ok(lock(&self.reviews)
            .iter()
            .find(|review| &review.id == id)
            .cloned())
    }

    async fn find_for_request(
        &self,
        service_request_id: &Uuid,
        reviewer_id: &UserId,
    ) -> Result<Option<Review>, ReviewRepositoryError> {
        Ok(lock(&self.reviews)
            .iter()
            .find(|review| {
                &review.service_request_id == service_request_id
                    && &review.reviewer_id == reviewer_id
            })
            .cloned())
    }

    async fn insert(&self, review: &Review) -> Result<(), ReviewRepositoryError> {
        {
            let mut reviews = lock(&self.reviews);
            let taken = reviews.iter().any(|existing| {
                existing.service_request_id == review.service_request_id
                    && existing.reviewer_id == review.reviewer_id
            });
            if taken {
                return Err(ReviewRepositoryError::duplicate(format!(
                    "request {} already reviewed by {}",
                    review.service_request_id, review.reviewer_id
                )));
            }
            reviews.push(review.clone());
        }
        self.publish(REVIEWS, ChangeKind::Insert, None, Some(review));
        Ok(())
    }

    async fn update(&self, review: &Review) -> Result<(), ReviewRepositoryError> {
        let old = replace(&mut lock(&self.reviews), &review.id, review, |r| &r.id).ok_or_else(
            || ReviewRepositoryError::query(format!("review {} vanished during update", review.id)),
        )?;
        self.publish(REVIEWS, ChangeKind::Update, Some(&old), Some(review));
        Ok(())
    }

    async fn broker_rating(&self, broker_id: &UserId) -> Result<Option<f64>, ReviewRepositoryError> {
        let reviews = lock(&self.reviews);
        let ratings: Vec<f64> = reviews
            .iter()
            .filter(|review| &review.reviewed_id == broker_id)
            .map(|review| f64::from(review.rating.get()))
            .collect();
        if ratings.is_empty() {
            return Ok(None);
        }
        let count = ratings.len() as f64;
        Ok(Some(ratings.iter().sum::<f64>() / count))
    }
}

#[async_trait]
impl SearchLogRepository for InMemoryMarketplace {
    async fn record(&self, entry: &SearchLog) -> Result<(), SearchLogError> {
        lock(&self.search_logs).push(entry.clone());
        Ok(())
    }
}

#[async_trait]
impl RouteRepository for InMemoryMarketplace {
    async fn routes_for(
        &self,
        _role: Option<Role>,
    ) -> Result<Vec<RouteDescriptor>, RouteRepositoryError> {
        Ok(self.routes.clone())
    }
}

#[cfg(test)]
mod tests;
