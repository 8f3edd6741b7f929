//! Reviews left after a completed request, and the broker rating built
//! from them.

use std::sync::Arc;

use mockable::Clock;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::ports::{
    ReviewRepository, ReviewRepositoryError, ServiceRequestRepository,
    ServiceRequestRepositoryError,
};
use crate::domain::{
    Error, Invalidates, NewReview, QueryCache, QueryKey, RequestStatus, Resource, Review,
    ReviewRating, ReviewValidationError, User, UserId,
};

impl Invalidates for Review {
    fn invalidates(&self) -> Vec<QueryKey> {
        vec![
            QueryKey::Reviews {
                reviewed_id: self.reviewed_id.clone(),
            },
            QueryKey::BrokerRating {
                broker_id: self.reviewed_id.clone(),
            },
        ]
    }
}

/// Review reads and writes.
pub struct Reviews<R: ?Sized, Q: ?Sized> {
    reviews: Arc<R>,
    requests: Arc<Q>,
    clock: Arc<dyn Clock>,
    lists: QueryCache<Vec<Review>>,
    ratings: QueryCache<Option<f64>>,
}

impl<R, Q> Reviews<R, Q>
where
    R: ReviewRepository + ?Sized,
    Q: ServiceRequestRepository + ?Sized,
{
    pub fn new(reviews: Arc<R>, requests: Arc<Q>, clock: Arc<dyn Clock>) -> Self {
        Self {
            reviews,
            requests,
            clock,
            lists: QueryCache::new(),
            ratings: QueryCache::new(),
        }
    }

    fn map_review_error(error: ReviewRepositoryError) -> Error {
        match error {
            ReviewRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("review repository unavailable: {message}"))
            }
            ReviewRepositoryError::Query { message } => {
                Error::internal(format!("review repository error: {message}"))
            }
            ReviewRepositoryError::Duplicate { message } => {
                Error::conflict(format!("review already exists: {message}"))
                    .with_details(json!({ "code": "duplicate_review" }))
            }
        }
    }

    fn map_request_error(error: ServiceRequestRepositoryError) -> Error {
        match error {
            ServiceRequestRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("request repository unavailable: {message}"))
            }
            ServiceRequestRepositoryError::Query { message } => {
                Error::internal(format!("request repository error: {message}"))
            }
            ServiceRequestRepositoryError::NotFound { id } => {
                Error::not_found(format!("service request {id} not found"))
            }
        }
    }

    fn map_validation_error(error: ReviewValidationError) -> Error {
        Error::invalid_request(error.to_string())
    }

    /// Reviews received by `reviewed_id`.
    pub async fn reviews_for(&self, reviewed_id: &UserId) -> Resource<Vec<Review>> {
        let reviewed_id = reviewed_id.clone();
        let key = QueryKey::Reviews {
            reviewed_id: reviewed_id.clone(),
        };
        self.lists
            .fetch(key, || async move {
                self.reviews
                    .list_for_reviewed(&reviewed_id)
                    .await
                    .map_err(Self::map_review_error)
            })
            .await
    }

    /// Average rating of `broker_id`; `Some(None)` data means unrated.
    pub async fn broker_rating(&self, broker_id: &UserId) -> Resource<Option<f64>> {
        let broker_id = broker_id.clone();
        let key = QueryKey::BrokerRating {
            broker_id: broker_id.clone(),
        };
        self.ratings
            .fetch(key, || async move {
                self.reviews
                    .broker_rating(&broker_id)
                    .await
                    .map_err(Self::map_review_error)
            })
            .await
    }

    async fn refresh(&self, mutation: &impl Invalidates) {
        for key in mutation.invalidates() {
            match &key {
                QueryKey::Reviews { reviewed_id } => {
                    if self.lists.invalidate(&key) {
                        debug!(?key, "re-fetching invalidated reviews");
                        self.reviews_for(reviewed_id).await;
                    }
                }
                QueryKey::BrokerRating { broker_id } => {
                    if self.ratings.invalidate(&key) {
                        debug!(?key, "re-fetching invalidated rating");
                        self.broker_rating(broker_id).await;
                    }
                }
                _ => {}
            }
        }
    }

    /// Review the other party of a completed request.
    ///
    /// Only the client or broker on the request may review, only once the
    /// request is completed, and only once per request.
    pub async fn create(&self, reviewer: &User, draft: NewReview) -> Result<Review, Error> {
        let request_id = draft.service_request_id;
        let request = self
            .requests
            .find_by_id(&request_id)
            .await
            .map_err(Self::map_request_error)?
            .ok_or_else(|| Error::not_found(format!("service request {request_id} not found")))?;
        let reviewed = request
            .counterparty(reviewer.id())
            .ok_or_else(|| Error::forbidden("not a party to this request"))?
            .clone();
        if request.status != RequestStatus::Completed {
            return Err(
                Error::conflict("only completed requests can be reviewed").with_details(json!({
                    "code": "request_not_completed",
                    "status": request.status,
                })),
            );
        }
        let existing = self
            .reviews
            .find_for_request(&request_id, reviewer.id())
            .await
            .map_err(Self::map_review_error)?;
        if existing.is_some() {
            return Err(Error::conflict("request already reviewed")
                .with_details(json!({ "code": "duplicate_review" })));
        }

        let review = Review::create(reviewer.id().clone(), reviewed, draft, self.clock.utc())
            .map_err(Self::map_validation_error)?;
        self.reviews
            .insert(&review)
            .await
            .map_err(Self::map_review_error)?;
        info!(review_id = %review.id, reviewed_id = %review.reviewed_id, "review created");
        self.refresh(&review).await;
        Ok(review)
    }

    /// Revise review `id`. Only its author may do so.
    pub async fn update(
        &self,
        reviewer: &User,
        id: Uuid,
        rating: ReviewRating,
        comment: Option<String>,
    ) -> Result<Review, Error> {
        let mut review = self
            .reviews
            .find_by_id(&id)
            .await
            .map_err(Self::map_review_error)?
            .ok_or_else(|| Error::not_found(format!("review {id} not found")))?;
        if &review.reviewer_id != reviewer.id() {
            return Err(Error::forbidden("only the reviewer can edit a review"));
        }
        review.revise(rating, comment);
        self.reviews
            .update(&review)
            .await
            .map_err(Self::map_review_error)?;
        self.refresh(&review).await;
        Ok(review)
    }
}
