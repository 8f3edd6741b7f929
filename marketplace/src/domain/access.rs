//! Route gating by access level.
//!
//! Every client-visible path carries an [`AccessLevel`]; a route is open to
//! a user when the level is public, when the user is signed in for
//! `authenticated` routes, or when the user's role matches a role-gated route.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Role, User};

/// Path of the sign-in page anonymous users are sent to.
pub const LOGIN_PATH: &str = "/login";

/// Route gating classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AccessLevel {
    Public,
    Authenticated,
    Role(Role),
}

impl AccessLevel {
    /// Whether `user` (or an anonymous visitor) may open a route at this level.
    pub fn allows(self, user: Option<&User>) -> bool {
        match self {
            Self::Public => true,
            Self::Authenticated => user.is_some(),
            Self::Role(role) => user.is_some_and(|u| u.role() == role),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Authenticated => "authenticated",
            Self::Role(role) => role.as_str(),
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "public" => Ok(Self::Public),
            "authenticated" => Ok(Self::Authenticated),
            other => other
                .parse::<Role>()
                .map(Self::Role)
                .map_err(|_| format!("unknown access level '{other}'")),
        }
    }
}

impl TryFrom<String> for AccessLevel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccessLevel> for String {
    fn from(value: AccessLevel) -> Self {
        value.as_str().to_owned()
    }
}

/// A gated client route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDescriptor {
    pub path: String,
    #[serde(alias = "access_level")]
    pub access: AccessLevel,
}

impl RouteDescriptor {
    pub fn new(path: impl Into<String>, access: AccessLevel) -> Self {
        Self {
            path: path.into(),
            access,
        }
    }

    /// Exact match, or a nested path below this route. `/` only matches itself.
    ///
    /// # Examples
    /// ```
    /// use marketplace::domain::{AccessLevel, RouteDescriptor};
    ///
    /// let route = RouteDescriptor::new("/requests", AccessLevel::Authenticated);
    /// assert!(route.matches("/requests"));
    /// assert!(route.matches("/requests/42"));
    /// assert!(!route.matches("/requests-archive"));
    /// ```
    pub fn matches(&self, path: &str) -> bool {
        if self.path == "/" {
            return path == "/";
        }
        path.strip_prefix(self.path.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }

    pub fn allows(&self, user: Option<&User>) -> bool {
        self.access.allows(user)
    }
}

/// Built-in route table used when the backend cannot supply one.
pub fn static_routes() -> Vec<RouteDescriptor> {
    use AccessLevel::{Authenticated, Public, Role as Only};

    [
        ("/", Public),
        ("/find-broker", Public),
        ("/login", Public),
        ("/register", Public),
        ("/onboarding", Public),
        ("/language", Public),
        ("/messages", Authenticated),
        ("/requests", Authenticated),
        ("/profile", Authenticated),
        ("/become-broker", Only(Role::Client)),
        ("/dashboard", Only(Role::Broker)),
        ("/listings", Only(Role::Broker)),
        ("/orders", Only(Role::Broker)),
        ("/marketing", Only(Role::Broker)),
    ]
    .into_iter()
    .map(|(path, access)| RouteDescriptor::new(path, access))
    .collect()
}

/// Landing path for the current session.
///
/// # Examples
/// ```
/// use marketplace::domain::redirect_path_for;
///
/// assert_eq!(redirect_path_for(None), "/login");
/// ```
pub fn redirect_path_for(user: Option<&User>) -> &'static str {
    user.map_or(LOGIN_PATH, |u| u.role().landing_path())
}

/// Most specific route matching `path`.
pub fn resolve_route<'a>(routes: &'a [RouteDescriptor], path: &str) -> Option<&'a RouteDescriptor> {
    routes
        .iter()
        .filter(|route| route.matches(path))
        .max_by_key(|route| route.path.len())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::domain::{DisplayName, SessionToken, UserId};

    fn user(role: Role) -> User {
        User::new(
            UserId::random(),
            DisplayName::new("Neema").expect("name"),
            role,
            SessionToken::new("t"),
        )
    }

    #[rstest]
    #[case("/dashboard", None, false)]
    #[case("/dashboard", Some(Role::Client), false)]
    #[case("/dashboard", Some(Role::Broker), true)]
    #[case("/requests/abc", None, false)]
    #[case("/requests/abc", Some(Role::Client), true)]
    #[case("/find-broker", None, true)]
    #[case("/become-broker", Some(Role::Broker), false)]
    fn static_table_gates_by_role(
        #[case] path: &str,
        #[case] role: Option<Role>,
        #[case] allowed: bool,
    ) {
        let routes = static_routes();
        let session = role.map(user);
        let route = resolve_route(&routes, path).expect("known route");
        assert_eq!(route.allows(session.as_ref()), allowed);
    }

    #[rstest]
    fn root_does_not_swallow_other_paths() {
        let routes = static_routes();
        assert!(resolve_route(&routes, "/unknown").is_none());
        assert_eq!(
            resolve_route(&routes, "/").map(|r| r.path.as_str()),
            Some("/")
        );
    }

    #[rstest]
    fn redirect_follows_role() {
        assert_eq!(redirect_path_for(Some(&user(Role::Broker))), "/dashboard");
        assert_eq!(redirect_path_for(Some(&user(Role::Client))), "/");
    }

    #[rstest]
    fn access_level_serde_uses_plain_strings() {
        let json = serde_json::json!({ "path": "/orders", "access_level": "broker" });
        let route: RouteDescriptor = serde_json::from_value(json).expect("descriptor");
        assert_eq!(route.access, AccessLevel::Role(Role::Broker));
        assert_eq!(
            serde_json::to_value(route).expect("json")["access"],
            "broker"
        );
    }
}
