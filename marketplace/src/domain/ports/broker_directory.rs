//! Port for locating brokers around a point.

use async_trait::async_trait;

use crate::domain::BrokerProfile;

use super::define_port_error;

/// Latitude of central Dar es Salaam, used when no location is granted.
pub const DEFAULT_LATITUDE: f64 = -6.7924;
/// Longitude of central Dar es Salaam.
pub const DEFAULT_LONGITUDE: f64 = 39.2083;
/// Search radius used when the caller does not pick one.
pub const DEFAULT_RADIUS_KM: f64 = 10.0;

define_port_error! {
    /// Errors raised by broker directory adapters.
    pub enum BrokerDirectoryError {
        /// The backend could not be reached.
        Connection { message: String } => "broker directory unavailable: {message}",
        /// The backend rejected the query or returned malformed rows.
        Query { message: String } => "broker directory query failed: {message}",
    }
}

/// Parameters of a proximity search.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
    /// Restrict to a `service_categories` slug.
    pub category: Option<String>,
}

impl Default for NearbyQuery {
    fn default() -> Self {
        Self {
            latitude: DEFAULT_LATITUDE,
            longitude: DEFAULT_LONGITUDE,
            radius_km: DEFAULT_RADIUS_KM,
            category: None,
        }
    }
}

/// Proximity search over broker profiles.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerDirectory: Send + Sync {
    /// Brokers within `query.radius_km`, nearest first.
    async fn nearby(&self, query: &NearbyQuery) -> Result<Vec<BrokerProfile>, BrokerDirectoryError>;
}
