//! Port for `reviews` persistence and the broker rating RPC.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Review, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by review repository adapters.
    pub enum ReviewRepositoryError {
        /// The backend could not be reached.
        Connection { message: String } => "review repository unavailable: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "review repository query failed: {message}",
        /// A unique constraint rejected the write.
        Duplicate { message: String } => "review already exists: {message}",
    }
}

/// Storage for reviews.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Reviews received by `reviewed_id`, newest first.
    async fn list_for_reviewed(
        &self,
        reviewed_id: &UserId,
    ) -> Result<Vec<Review>, ReviewRepositoryError>;

    async fn find_by_id(&self, id: &Uuid) -> Result<Option<Review>, ReviewRepositoryError>;

    /// The review `reviewer_id` left on a request, if any.
    async fn find_for_request(
        &self,
        service_request_id: &Uuid,
        reviewer_id: &UserId,
    ) -> Result<Option<Review>, ReviewRepositoryError>;

    async fn insert(&self, review: &Review) -> Result<(), ReviewRepositoryError>;

    async fn update(&self, review: &Review) -> Result<(), ReviewRepositoryError>;

    /// Average rating of a broker, `None` when unrated.
    async fn broker_rating(&self, broker_id: &UserId) -> Result<Option<f64>, ReviewRepositoryError>;
}
