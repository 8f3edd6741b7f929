//! Domain ports and supporting types for the hexagonal boundary.

mod macros;
pub(crate) use macros::define_port_error;

mod broker_directory;
mod change_feed;
mod identity_provider;
mod key_value_store;
mod review_repository;
mod route_repository;
mod search_log_repository;
mod service_listing_repository;
mod service_request_repository;

#[cfg(test)]
pub use broker_directory::MockBrokerDirectory;
pub use broker_directory::{
    BrokerDirectory, BrokerDirectoryError, DEFAULT_LATITUDE, DEFAULT_LONGITUDE, DEFAULT_RADIUS_KM,
    NearbyQuery,
};
pub use change_feed::{ChangeFeed, ChangeFeedError, ChangeKind, ChangeStream, RawChange};
#[cfg(test)]
pub use identity_provider::MockIdentityProvider;
pub use identity_provider::{Account, AuthenticatedAccount, IdentityProvider};
#[cfg(test)]
pub use key_value_store::MockKeyValueStore;
pub use key_value_store::{KeyValueStore, StorageError, load_json, save_json};
#[cfg(test)]
pub use review_repository::MockReviewRepository;
pub use review_repository::{ReviewRepository, ReviewRepositoryError};
#[cfg(test)]
pub use route_repository::MockRouteRepository;
pub use route_repository::{RouteRepository, RouteRepositoryError};
#[cfg(test)]
pub use search_log_repository::MockSearchLogRepository;
pub use search_log_repository::{SearchLog, SearchLogError, SearchLogRepository};
#[cfg(test)]
pub use service_listing_repository::MockServiceListingRepository;
pub use service_listing_repository::{ServiceListingRepository, ServiceListingRepositoryError};
#[cfg(test)]
pub use service_request_repository::MockServiceRequestRepository;
pub use service_request_repository::{ServiceRequestRepository, ServiceRequestRepositoryError};
