//! Port for backend-provided route descriptors (`get_user_routes`).

use async_trait::async_trait;

use crate::domain::{RouteDescriptor, Role};

use super::define_port_error;

define_port_error! {
    /// Errors raised by route descriptor adapters.
    pub enum RouteRepositoryError {
        /// The backend could not be reached.
        Connection { message: String } => "route repository unavailable: {message}",
        /// The backend returned an error or malformed rows.
        Query { message: String } => "route repository query failed: {message}",
    }
}

/// Source of gated client routes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RouteRepository: Send + Sync {
    /// Routes visible to `role`; `None` asks for the anonymous set.
    async fn routes_for(
        &self,
        role: Option<Role>,
    ) -> Result<Vec<RouteDescriptor>, RouteRepositoryError>;
}
