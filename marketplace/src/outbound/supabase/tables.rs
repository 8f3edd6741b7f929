//! Port implementations over the Supabase tables and RPCs.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use super::client::HttpFailure;
use super::dto::{
    ListingRow, NearbyArgs, NearbyBrokerRow, RequestRow, ReviewRow, RouteRow, SearchLogRow,
};
use super::repository::{SupabaseRepository, is_unique_violation};
use crate::domain::ports::{
    BrokerDirectory, BrokerDirectoryError, NearbyQuery, ReviewRepository, ReviewRepositoryError,
    RouteRepository, RouteRepositoryError, SearchLog, SearchLogError, SearchLogRepository,
    ServiceListingRepository, ServiceListingRepositoryError, ServiceRequestRepository,
    ServiceRequestRepositoryError,
};
use crate::domain::{
    BrokerProfile, Review, Role, RouteDescriptor, ServiceListing, ServiceRequest, UserId,
};

const LISTINGS: &str = "broker_services";
const REQUESTS: &str = "service_requests";
const REVIEWS: &str = "reviews";
const SEARCH_LOGS: &str = "search_logs";

fn directory_error(failure: HttpFailure) -> BrokerDirectoryError {
    if failure.is_unavailable() {
        BrokerDirectoryError::connection(failure.to_string())
    } else {
        BrokerDirectoryError::query(failure.to_string())
    }
}

fn listing_error(failure: HttpFailure) -> ServiceListingRepositoryError {
    if failure.is_unavailable() {
        ServiceListingRepositoryError::connection(failure.to_string())
    } else {
        ServiceListingRepositoryError::query(failure.to_string())
    }
}

fn request_error(failure: HttpFailure) -> ServiceRequestRepositoryError {
    if failure.is_unavailable() {
        ServiceRequestRepositoryError::connection(failure.to_string())
    } else {
        ServiceRequestRepositoryError::query(failure.to_string())
    }
}

fn review_error(failure: HttpFailure) -> ReviewRepositoryError {
    if is_unique_violation(&failure) {
        ReviewRepositoryError::duplicate(failure.to_string())
    } else if failure.is_unavailable() {
        ReviewRepositoryError::connection(failure.to_string())
    } else {
        ReviewRepositoryError::query(failure.to_string())
    }
}

fn route_error(failure: HttpFailure) -> RouteRepositoryError {
    if failure.is_unavailable() {
        RouteRepositoryError::connection(failure.to_string())
    } else {
        RouteRepositoryError::query(failure.to_string())
    }
}

#[async_trait]
impl BrokerDirectory for SupabaseRepository {
    async fn nearby(&self, query: &NearbyQuery) -> Result<Vec<BrokerProfile>, BrokerDirectoryError> {
        let args = NearbyArgs {
            lat: query.latitude,
            lng: query.longitude,
            radius_km: query.radius_km,
            category: query.category.as_deref(),
        };
        let rows: Vec<NearbyBrokerRow> = self
            .rpc("get_nearby_brokers", &args)
            .await
            .map_err(directory_error)?;
        debug!(count = rows.len(), "nearby brokers fetched");
        Ok(rows.into_iter().map(NearbyBrokerRow::into_profile).collect())
    }
}

#[async_trait]
impl ServiceListingRepository for SupabaseRepository {
    async fn list_by_broker(
        &self,
        broker_id: &UserId,
    ) -> Result<Vec<ServiceListing>, ServiceListingRepositoryError> {
        let rows: Vec<ListingRow> = self
            .select(LISTINGS, &[("broker_id", broker_id.to_string())], Some("created_at"))
            .await
            .map_err(listing_error)?;
        Ok(rows.into_iter().map(ServiceListing::from).collect())
    }

    async fn find_by_id(
        &self,
        id: &Uuid,
    ) -> Result<Option<ServiceListing>, ServiceListingRepositoryError> {
        let row: Option<ListingRow> = self.find(LISTINGS, id).await.map_err(listing_error)?;
        Ok(row.map(ServiceListing::from))
    }

    async fn insert(&self, listing: &ServiceListing) -> Result<(), ServiceListingRepositoryError> {
        self.insert_row(LISTINGS, &ListingRow::from(listing))
            .await
            .map_err(listing_error)
    }

    async fn update(&self, listing: &ServiceListing) -> Result<(), ServiceListingRepositoryError> {
        let matched = self
            .patch(LISTINGS, &listing.id, &ListingRow::from(listing))
            .await
            .map_err(listing_error)?;
        if matched {
            Ok(())
        } else {
            Err(ServiceListingRepositoryError::not_found(listing.id.to_string()))
        }
    }

    async fn delete(&self, id: &Uuid) -> Result<(), ServiceListingRepositoryError> {
        let matched = self
            .delete_row(LISTINGS, id)
            .await
            .map_err(listing_error)?;
        if matched {
            Ok(())
        } else {
            Err(ServiceListingRepositoryError::not_found(id.to_string()))
        }
    }
}

#[async_trait]
impl ServiceRequestRepository for SupabaseRepository {
    async fn list_for_client(
        &self,
        client_id: &UserId,
    ) -> Result<Vec<ServiceRequest>, ServiceRequestRepositoryError> {
        let rows: Vec<RequestRow> = self
            .select(REQUESTS, &[("client_id", client_id.to_string())], Some("created_at"))
            .await
            .map_err(request_error)?;
        Ok(rows.into_iter().map(ServiceRequest::from).collect())
    }

    async fn list_for_broker(
        &self,
        broker_id: &UserId,
    ) -> Result<Vec<ServiceRequest>, ServiceRequestRepositoryError> {
        let rows: Vec<RequestRow> = self
            .select(REQUESTS, &[("broker_id", broker_id.to_string())], Some("created_at"))
            .await
            .map_err(request_error)?;
        Ok(rows.into_iter().map(ServiceRequest::from).collect())
    }

    async fn find_by_id(
        &self,
        id: &Uuid,
    ) -> Result<Option<ServiceRequest>, ServiceRequestRepositoryError> {
        let row: Option<RequestRow> = self.find(REQUESTS, id).await.map_err(request_error)?;
        Ok(row.map(ServiceRequest::from))
    }

    async fn insert(&self, request: &ServiceRequest) -> Result<(), ServiceRequestRepositoryError> {
        self.insert_row(REQUESTS, &RequestRow::from(request))
            .await
            .map_err(request_error)
    }

    async fn update(&self, request: &ServiceRequest) -> Result<(), ServiceRequestRepositoryError> {
        let matched = self
            .patch(REQUESTS, &request.id, &RequestRow::from(request))
            .await
            .map_err(request_error)?;
        if matched {
            Ok(())
        } else {
            Err(ServiceRequestRepositoryError::not_found(request.id.to_string()))
        }
    }
}

#[async_trait]
impl ReviewRepository for SupabaseRepository {
    async fn list_for_reviewed(
        &self,
        reviewed_id: &UserId,
    ) -> Result<Vec<Review>, ReviewRepositoryError> {
        let rows: Vec<ReviewRow> = self
            .select(REVIEWS, &[("reviewed_id", reviewed_id.to_string())], Some("created_at"))
            .await
            .map_err(review_error)?;
        Ok(rows.into_iter().map(Review::from).collect())
    }

    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Review>, ReviewRepositoryError> {
        let row: Option<ReviewRow> = self.find(REVIEWS, id).await.map_err(review_error)?;
        Ok(row.map(Review::from))
    }

    async fn find_for_request(
        &self,
        service_request_id: &Uuid,
        reviewer_id: &UserId,
    ) -> Result<Option<Review>, ReviewRepositoryError> {
        let rows: Vec<ReviewRow> = self
            .select(
                REVIEWS,
                &[
                    ("service_request_id", service_request_id.to_string()),
                    ("reviewer_id", reviewer_id.to_string()),
                ],
                None,
            )
            .await
            .map_err(review_error)?;
        Ok(rows.into_iter().next().map(Review::from))
    }

    async fn insert(&self, review: &Review) -> Result<(), ReviewRepositoryError> {
        self.insert_row(REVIEWS, &ReviewRow::from(review))
            .await
            .map_err(review_error)
    }

    async fn update(&self, review: &Review) -> Result<(), ReviewRepositoryError> {
        let patch = json!({ "rating": review.rating, "comment": review.comment });
        let matched = self
            .patch(REVIEWS, &review.id, &patch)
            .await
            .map_err(review_error)?;
        if matched {
            Ok(())
        } else {
            Err(ReviewRepositoryError::query(format!(
                "review {} vanished during update",
                review.id
            )))
        }
    }

    async fn broker_rating(&self, broker_id: &UserId) -> Result<Option<f64>, ReviewRepositoryError> {
        self.rpc(
            "calculate_broker_rating",
            &json!({ "broker_id": broker_id }),
        )
        .await
        .map_err(review_error)
    }
}

#[async_trait]
impl SearchLogRepository for SupabaseRepository {
    async fn record(&self, entry: &SearchLog) -> Result<(), SearchLogError> {
        let row = SearchLogRow {
            user_id: entry.user_id.as_ref(),
            search_query: &entry.search_query,
            filters: &entry.filters,
            results_count: entry.results_count,
        };
        self.insert_row(SEARCH_LOGS, &row)
            .await
            .map_err(|failure| SearchLogError::write(failure.to_string()))
    }
}

#[async_trait]
impl RouteRepository for SupabaseRepository {
    async fn routes_for(
        &self,
        role: Option<Role>,
    ) -> Result<Vec<RouteDescriptor>, RouteRepositoryError> {
        let rows: Vec<RouteRow> = self
            .rpc("get_user_routes", &json!({ "user_role": role }))
            .await
            .map_err(route_error)?;
        rows.into_iter()
            .map(RouteRow::into_descriptor)
            .collect::<Result<_, _>>()
            .map_err(RouteRepositoryError::query)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn status(status: u16, body: &str) -> HttpFailure {
        HttpFailure::Status {
            status,
            body: body.to_owned(),
        }
    }

    #[rstest]
    fn review_conflicts_become_duplicates() {
        let error = review_error(status(409, r#"{"code":"23505"}"#));
        assert!(matches!(error, ReviewRepositoryError::Duplicate { .. }));
    }

    #[rstest]
    #[case(503, true)]
    #[case(400, false)]
    fn outages_map_to_connection_errors(#[case] code: u16, #[case] connection: bool) {
        assert_eq!(
            matches!(
                listing_error(status(code, "")),
                ServiceListingRepositoryError::Connection { .. }
            ),
            connection
        );
        assert_eq!(
            matches!(
                route_error(status(code, "")),
                RouteRepositoryError::Connection { .. }
            ),
            connection
        );
    }
}
