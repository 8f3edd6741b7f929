//! Row and payload DTOs for the Supabase REST and auth APIs.
//!
//! Rows use the database's snake_case columns; adapters decode into these
//! first and then map into domain records in one pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::ports::Account;
use crate::domain::{
    BrokerProfile, DisplayName, PriceTier, RequestStatus, Review, ReviewRating, Role,
    RouteDescriptor, ServiceListing, ServiceRequest, UserId,
};

/// Row returned by the `get_nearby_brokers` RPC.
#[derive(Debug, Deserialize)]
pub(super) struct NearbyBrokerRow {
    pub(super) id: UserId,
    #[serde(alias = "full_name")]
    pub(super) name: String,
    #[serde(default, alias = "avatar_url")]
    pub(super) avatar: Option<String>,
    #[serde(default)]
    pub(super) rating: Option<f64>,
    #[serde(default)]
    pub(super) review_count: Option<u32>,
    #[serde(default)]
    pub(super) distance_km: Option<f64>,
    #[serde(default)]
    pub(super) specialties: Option<Vec<String>>,
    #[serde(default, alias = "is_verified")]
    pub(super) verified: bool,
    #[serde(default, alias = "is_online")]
    pub(super) online: bool,
    #[serde(default)]
    pub(super) price_min: Option<u64>,
    #[serde(default)]
    pub(super) price_max: Option<u64>,
}

impl NearbyBrokerRow {
    pub(super) fn into_profile(self) -> BrokerProfile {
        BrokerProfile {
            id: self.id,
            name: self.name,
            avatar: self.avatar,
            rating: self.rating.unwrap_or(0.0).clamp(0.0, 5.0),
            review_count: self.review_count.unwrap_or(0),
            distance: self
                .distance_km
                .map_or_else(String::new, |km| format!("{km:.1} km")),
            specialties: self.specialties.unwrap_or_default(),
            verified: self.verified,
            online: self.online,
            price_level: PriceTier::from_range(self.price_min, self.price_max),
        }
    }
}

/// `profiles` row.
#[derive(Debug, Deserialize)]
pub(super) struct ProfileRow {
    pub(super) id: UserId,
    #[serde(alias = "full_name")]
    pub(super) name: DisplayName,
    #[serde(default)]
    pub(super) email: Option<String>,
    #[serde(default)]
    pub(super) phone: Option<String>,
    #[serde(default, alias = "user_type")]
    pub(super) role: Option<Role>,
    #[serde(default)]
    pub(super) avatar_url: Option<String>,
}

impl ProfileRow {
    pub(super) fn into_account(self) -> Account {
        Account {
            id: self.id,
            display_name: self.name,
            email: self.email,
            phone: self.phone,
            role: self.role.unwrap_or(Role::Client),
            avatar_url: self.avatar_url,
        }
    }
}

/// `broker_services` row.
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct ListingRow {
    pub(super) id: Uuid,
    pub(super) broker_id: UserId,
    pub(super) category: String,
    pub(super) title: String,
    #[serde(default)]
    pub(super) description: Option<String>,
    #[serde(default)]
    pub(super) price_min: Option<u64>,
    #[serde(default)]
    pub(super) price_max: Option<u64>,
    #[serde(default)]
    pub(super) location: Option<String>,
    #[serde(default = "default_active")]
    pub(super) is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl From<ListingRow> for ServiceListing {
    fn from(row: ListingRow) -> Self {
        Self {
            id: row.id,
            broker_id: row.broker_id,
            category: row.category,
            title: row.title,
            description: row.description.unwrap_or_default(),
            price_min: row.price_min,
            price_max: row.price_max,
            location: row.location,
            active: row.is_active,
        }
    }
}

impl From<&ServiceListing> for ListingRow {
    fn from(listing: &ServiceListing) -> Self {
        Self {
            id: listing.id,
            broker_id: listing.broker_id.clone(),
            category: listing.category.clone(),
            title: listing.title.clone(),
            description: Some(listing.description.clone()).filter(|d| !d.is_empty()),
            price_min: listing.price_min,
            price_max: listing.price_max,
            location: listing.location.clone(),
            is_active: listing.active,
        }
    }
}

/// `service_requests` row.
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct RequestRow {
    pub(super) id: Uuid,
    pub(super) title: String,
    #[serde(default)]
    pub(super) description: Option<String>,
    pub(super) client_id: UserId,
    pub(super) broker_id: UserId,
    pub(super) service_id: Uuid,
    pub(super) status: RequestStatus,
    pub(super) created_at: DateTime<Utc>,
    #[serde(default)]
    pub(super) accepted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(super) started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(super) completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(super) cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(super) proposed_price: Option<u64>,
    #[serde(default)]
    pub(super) broker_response: Option<String>,
    #[serde(default)]
    pub(super) cancellation_reason: Option<String>,
}

impl From<RequestRow> for ServiceRequest {
    fn from(row: RequestRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description.unwrap_or_default(),
            client_id: row.client_id,
            broker_id: row.broker_id,
            service_id: row.service_id,
            status: row.status,
            created_at: row.created_at,
            accepted_at: row.accepted_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            cancelled_at: row.cancelled_at,
            proposed_price: row.proposed_price,
            broker_response: row.broker_response,
            cancellation_reason: row.cancellation_reason,
        }
    }
}

impl From<&ServiceRequest> for RequestRow {
    fn from(request: &ServiceRequest) -> Self {
        Self {
            id: request.id,
            title: request.title.clone(),
            description: Some(request.description.clone()).filter(|d| !d.is_empty()),
            client_id: request.client_id.clone(),
            broker_id: request.broker_id.clone(),
            service_id: request.service_id,
            status: request.status,
            created_at: request.created_at,
            accepted_at: request.accepted_at,
            started_at: request.started_at,
            completed_at: request.completed_at,
            cancelled_at: request.cancelled_at,
            proposed_price: request.proposed_price,
            broker_response: request.broker_response.clone(),
            cancellation_reason: request.cancellation_reason.clone(),
        }
    }
}

/// `reviews` row.
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct ReviewRow {
    pub(super) id: Uuid,
    pub(super) service_request_id: Uuid,
    pub(super) reviewer_id: UserId,
    pub(super) reviewed_id: UserId,
    pub(super) rating: ReviewRating,
    #[serde(default)]
    pub(super) comment: Option<String>,
    #[serde(default)]
    pub(super) is_anonymous: bool,
    pub(super) created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            service_request_id: row.service_request_id,
            reviewer_id: row.reviewer_id,
            reviewed_id: row.reviewed_id,
            rating: row.rating,
            comment: row.comment,
            anonymous: row.is_anonymous,
            created_at: row.created_at,
        }
    }
}

impl From<&Review> for ReviewRow {
    fn from(review: &Review) -> Self {
        Self {
            id: review.id,
            service_request_id: review.service_request_id,
            reviewer_id: review.reviewer_id.clone(),
            reviewed_id: review.reviewed_id.clone(),
            rating: review.rating,
            comment: review.comment.clone(),
            is_anonymous: review.anonymous,
            created_at: review.created_at,
        }
    }
}

/// Row returned by `get_user_routes`.
#[derive(Debug, Deserialize)]
pub(super) struct RouteRow {
    pub(super) path: String,
    #[serde(alias = "access")]
    pub(super) access_level: String,
}

impl RouteRow {
    pub(super) fn into_descriptor(self) -> Result<RouteDescriptor, String> {
        let access = self
            .access_level
            .parse()
            .map_err(|error| format!("route {}: {error}", self.path))?;
        Ok(RouteDescriptor::new(self.path, access))
    }
}

/// GoTrue session response.
#[derive(Debug, Deserialize)]
pub(super) struct SessionResponse {
    #[serde(default)]
    pub(super) access_token: Option<String>,
    pub(super) user: GoTrueUser,
}

/// GoTrue signup response: a session when auto-confirm is on, otherwise
/// the bare user.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum SignupResponse {
    Session(SessionResponse),
    User(GoTrueUser),
}

#[derive(Debug, Deserialize)]
pub(super) struct GoTrueUser {
    pub(super) id: UserId,
    #[serde(default)]
    pub(super) email: Option<String>,
    #[serde(default)]
    pub(super) phone: Option<String>,
    #[serde(default)]
    pub(super) user_metadata: UserMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct UserMetadata {
    #[serde(default, alias = "full_name")]
    pub(super) name: Option<String>,
    #[serde(default)]
    pub(super) role: Option<Role>,
    #[serde(default)]
    pub(super) avatar_url: Option<String>,
}

impl GoTrueUser {
    pub(super) fn into_account(self) -> Result<Account, String> {
        let fallback = self
            .email
            .clone()
            .or_else(|| self.phone.clone())
            .unwrap_or_else(|| self.id.to_string());
        let name = self
            .user_metadata
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(fallback);
        let display_name = DisplayName::new(name).map_err(|error| error.to_string())?;
        Ok(Account {
            id: self.id,
            display_name,
            email: self.email.filter(|e| !e.is_empty()),
            phone: self.phone.filter(|p| !p.is_empty()),
            role: self.user_metadata.role.unwrap_or(Role::Client),
            avatar_url: self.user_metadata.avatar_url,
        })
    }
}

/// GoTrue error body. Older servers send `error`, newer ones `error_code`.
#[derive(Debug, Default, Deserialize)]
pub(super) struct GoTrueError {
    #[serde(default)]
    pub(super) error: Option<String>,
    #[serde(default)]
    pub(super) error_code: Option<String>,
    #[serde(default, alias = "msg", alias = "error_description")]
    pub(super) message: Option<String>,
}

impl GoTrueError {
    pub(super) fn code(&self) -> Option<&str> {
        self.error_code.as_deref().or(self.error.as_deref())
    }
}

/// PostgREST error body.
#[derive(Debug, Default, Deserialize)]
pub(super) struct PostgrestError {
    #[serde(default)]
    pub(super) code: Option<String>,
}

/// Postgres unique violation.
pub(super) const UNIQUE_VIOLATION: &str = "23505";

/// Arguments of `get_nearby_brokers`.
#[derive(Debug, Serialize)]
pub(super) struct NearbyArgs<'a> {
    pub(super) lat: f64,
    pub(super) lng: f64,
    pub(super) radius_km: f64,
    pub(super) category: Option<&'a str>,
}

/// `search_logs` insert payload.
#[derive(Debug, Serialize)]
pub(super) struct SearchLogRow<'a> {
    pub(super) user_id: Option<&'a UserId>,
    pub(super) search_query: &'a str,
    pub(super) filters: &'a Value,
    pub(super) results_count: usize,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::domain::AccessLevel;

    #[rstest]
    fn nearby_rows_become_profiles() {
        let row: NearbyBrokerRow = serde_json::from_value(json!({
            "id": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
            "full_name": "Neema Homes",
            "rating": 4.6,
            "review_count": 12,
            "distance_km": 1.24,
            "specialties": ["Real Estate"],
            "is_verified": true,
            "price_min": 500_000,
            "price_max": 2_000_000,
        }))
        .expect("row");
        let profile = row.into_profile();

        assert_eq!(profile.name, "Neema Homes");
        assert_eq!(profile.distance, "1.2 km");
        assert_eq!(profile.distance_km(), Some(1.2));
        assert!(profile.verified);
        assert!(!profile.online);
        assert_eq!(profile.price_level, PriceTier::Medium);
    }

    #[rstest]
    fn route_rows_parse_access_levels() {
        let row: RouteRow = serde_json::from_value(json!({
            "path": "/dashboard",
            "access_level": "broker",
        }))
        .expect("row");
        assert_eq!(
            row.into_descriptor().expect("descriptor"),
            RouteDescriptor::new("/dashboard", AccessLevel::Role(Role::Broker))
        );
    }

    #[rstest]
    fn unknown_access_level_is_rejected() {
        let row = RouteRow {
            path: "/x".to_owned(),
            access_level: "admin".to_owned(),
        };
        assert!(row.into_descriptor().is_err());
    }

    #[rstest]
    fn gotrue_users_fall_back_to_email_for_a_name() {
        let user: GoTrueUser = serde_json::from_value(json!({
            "id": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
            "email": "baraka@example.com",
            "phone": "",
            "user_metadata": { "role": "broker" },
        }))
        .expect("user");
        let account = user.into_account().expect("account");

        assert_eq!(account.display_name.as_ref(), "baraka@example.com");
        assert_eq!(account.role, Role::Broker);
        assert!(account.phone.is_none());
    }

    #[rstest]
    #[case(json!({ "error": "invalid_grant" }), Some("invalid_grant"))]
    #[case(json!({ "error_code": "invalid_credentials", "msg": "bad" }), Some("invalid_credentials"))]
    #[case(json!({}), None)]
    fn reads_either_gotrue_error_field(#[case] body: Value, #[case] expected: Option<&str>) {
        let error: GoTrueError = serde_json::from_value(body).expect("error");
        assert_eq!(error.code(), expected);
    }
}
