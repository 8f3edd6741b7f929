//! Names of values kept in the device-local store.

/// Serialised session user.
pub const USER: &str = "user";
/// Credential map of the local identity provider.
pub const REGISTERED_USERS: &str = "registeredUsers";
/// Selected interface language code.
pub const LANGUAGE: &str = "language";
pub const HAS_SELECTED_LANGUAGE: &str = "hasSelectedLanguage";
pub const ONBOARDING_COMPLETE: &str = "onboardingComplete";
/// `granted`, `denied` or `prompt`.
pub const PERMISSION_LOCATION: &str = "permission_location";
/// RFC 3339 timestamp of the last launch.
pub const LAST_OPENED: &str = "lastOpened";
/// Listings, requests and reviews of the offline marketplace.
pub const MARKETPLACE: &str = "marketplace";
