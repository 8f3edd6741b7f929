//! Domain primitives, services and ports.
//!
//! Purpose: define the strongly typed marketplace model (users, brokers,
//! requests, reviews, listings, routes) and the services that drive it over
//! the ports in [`ports`]. Adapters live in `crate::outbound`.
//!
//! Public surface:
//! - Error / ErrorCode: failure payload shared by every service.
//! - AuthService: session lifecycle over an identity provider.
//! - BrokerFilters / filter_brokers: pure discovery filtering.
//! - ServiceCatalogue, ServiceRequests, Reviews, RouteAccess,
//!   BrokerDiscovery: cached reads plus mutations.
//! - Subscription / ChangeEvent: typed realtime change streams.
//! - Onboarding: persisted first-run flow.

pub mod error;
pub mod ports;
pub mod storage_keys;

mod access;
mod auth;
mod auth_service;
mod broker;
mod broker_filter;
mod catalogue_service;
mod discovery;
mod listing;
mod onboarding;
mod query_cache;
mod realtime;
mod request_service;
mod review;
mod review_service;
mod route_service;
mod search_log;
mod service_request;
mod user;

pub use self::access::{
    AccessLevel, LOGIN_PATH, RouteDescriptor, redirect_path_for, resolve_route, static_routes,
};
pub use self::auth::{
    AuthError, AuthValidationError, LoginCredentials, PASSWORD_MIN, SignupRequest, SocialProfile,
    SocialProvider,
};
pub use self::auth_service::AuthService;
pub use self::broker::{
    BrokerProfile, LOW_PRICE_WIDTH_MAX, MEDIUM_PRICE_WIDTH_MAX, PriceTier, leading_number,
};
pub use self::broker_filter::{
    ALL_CRITERION, BrokerFilters, Criterion, DistanceBound, RatingThreshold, ServiceType,
    filter_brokers,
};
pub use self::catalogue_service::ServiceCatalogue;
pub use self::discovery::BrokerDiscovery;
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::listing::{ListingValidationError, NewServiceListing, ServiceListing};
pub use self::onboarding::{LocationPermission, Onboarding, OnboardingState, OnboardingStep};
pub use self::query_cache::{Invalidates, QueryCache, QueryKey, Resource};
pub use self::realtime::{
    ChangeDecodeError, ChangeEvent, ChangeFilter, ChangeFilterParseError, ChangeHandler,
    Subscription,
};
pub use self::request_service::ServiceRequests;
pub use self::review::{NewReview, Review, ReviewRating, ReviewValidationError};
pub use self::review_service::Reviews;
pub use self::route_service::RouteAccess;
pub use self::search_log::SearchLogger;
pub use self::service_request::{
    NewServiceRequest, RequestStatus, ServiceRequest, ServiceRequestError,
};
pub use self::user::{
    DISPLAY_NAME_MAX, DisplayName, Identifier, Role, SessionToken, User, UserId,
    UserValidationError,
};

/// Result alias for service operations.
///
/// # Examples
/// ```
/// use marketplace::domain::{Error, ServiceResult};
///
/// fn lookup() -> ServiceResult<u8> {
///     Err(Error::not_found("nothing here"))
/// }
/// assert!(lookup().is_err());
/// ```
pub type ServiceResult<T> = Result<T, Error>;
