//! Port for `service_requests` persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{ServiceRequest, UserId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by service request repository adapters.
    pub enum ServiceRequestRepositoryError {
        /// The backend could not be reached.
        Connection { message: String } => "request repository unavailable: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "request repository query failed: {message}",
        /// No request with the given id exists.
        NotFound { id: String } => "service request {id} not found",
    }
}

/// Storage for client bookings.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceRequestRepository: Send + Sync {
    /// Requests created by `client_id`, newest first.
    async fn list_for_client(
        &self,
        client_id: &UserId,
    ) -> Result<Vec<ServiceRequest>, ServiceRequestRepositoryError>;

    /// Requests addressed to `broker_id`, newest first.
    async fn list_for_broker(
        &self,
        broker_id: &UserId,
    ) -> Result<Vec<ServiceRequest>, ServiceRequestRepositoryError>;

    async fn find_by_id(
        &self,
        id: &Uuid,
    ) -> Result<Option<ServiceRequest>, ServiceRequestRepositoryError>;

    async fn insert(&self, request: &ServiceRequest) -> Result<(), ServiceRequestRepositoryError>;

    /// Replace an existing request.
    async fn update(&self, request: &ServiceRequest) -> Result<(), ServiceRequestRepositoryError>;
}
