//! Port for `broker_services` persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{ServiceListing, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by listing repository adapters.
    pub enum ServiceListingRepositoryError {
        /// The backend could not be reached.
        Connection { message: String } => "listing repository unavailable: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "listing repository query failed: {message}",
        /// No listing with the given id exists.
        NotFound { id: String } => "listing {id} not found",
    }
}

/// Storage for the services brokers offer.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceListingRepository: Send + Sync {
    /// All listings owned by `broker_id`, newest first.
    async fn list_by_broker(
        &self,
        broker_id: &UserId,
    ) -> Result<Vec<ServiceListing>, ServiceListingRepositoryError>;

    /// Fetch one listing.
    async fn find_by_id(
        &self,
        id: &Uuid,
    ) -> Result<Option<ServiceListing>, ServiceListingRepositoryError>;

    async fn insert(&self, listing: &ServiceListing) -> Result<(), ServiceListingRepositoryError>;

    /// Replace an existing listing.
    async fn update(&self, listing: &ServiceListing) -> Result<(), ServiceListingRepositoryError>;

    async fn delete(&self, id: &Uuid) -> Result<(), ServiceListingRepositoryError>;
}
