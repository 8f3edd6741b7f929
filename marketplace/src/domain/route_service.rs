//! Route descriptors from the backend, with the built-in table as fallback.

use std::sync::Arc;

use tracing::warn;

use crate::domain::ports::{RouteRepository, RouteRepositoryError};
use crate::domain::{
    Error, QueryCache, QueryKey, Role, RouteDescriptor, User, resolve_route, static_routes,
};

/// Answers "may this user open this path".
pub struct RouteAccess<R: ?Sized> {
    repo: Arc<R>,
    cache: QueryCache<Vec<RouteDescriptor>>,
}

impl<R> RouteAccess<R>
where
    R: RouteRepository + ?Sized,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self {
            repo,
            cache: QueryCache::new(),
        }
    }

    fn map_repo_error(error: RouteRepositoryError) -> Error {
        match error {
            RouteRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("route repository unavailable: {message}"))
            }
            RouteRepositoryError::Query { message } => {
                Error::internal(format!("route repository error: {message}"))
            }
        }
    }

    /// Routes visible to `role`. Falls back to [`static_routes`] when the
    /// backend fails or returns nothing.
    pub async fn routes(&self, role: Option<Role>) -> Vec<RouteDescriptor> {
        let resource = self
            .cache
            .fetch(QueryKey::Routes { role }, || async move {
                self.repo
                    .routes_for(role)
                    .await
                    .map_err(Self::map_repo_error)
            })
            .await;
        if let Some(error) = &resource.error {
            warn!(%error, "using built-in route table");
        }
        match resource.data {
            Some(routes) if !routes.is_empty() => routes,
            _ => static_routes(),
        }
    }

    /// Whether `user` may open `path`. Paths no route covers are open.
    pub async fn can_access(&self, path: &str, user: Option<&User>) -> bool {
        let routes = self.routes(user.map(User::role)).await;
        resolve_route(&routes, path).is_none_or(|route| route.allows(user))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::domain::AccessLevel;
    use crate::domain::ports::MockRouteRepository;
    use crate::test_support::signed_in;

    fn failing() -> RouteAccess<MockRouteRepository> {
        let mut repo = MockRouteRepository::new();
        repo.expect_routes_for()
            .returning(|_| Err(RouteRepositoryError::connection("offline")));
        RouteAccess::new(Arc::new(repo))
    }

    #[rstest]
    #[case("/dashboard", None, false)]
    #[case("/dashboard", Some(Role::Client), false)]
    #[case("/dashboard", Some(Role::Broker), true)]
    #[case("/become-broker", Some(Role::Client), true)]
    #[case("/requests/42", None, false)]
    #[case("/find-broker", None, true)]
    #[case("/not-a-route", None, true)]
    #[tokio::test]
    async fn falls_back_to_built_in_table(
        #[case] path: &str,
        #[case] role: Option<Role>,
        #[case] expected: bool,
    ) {
        let user = role.map(signed_in);
        assert_eq!(failing().can_access(path, user.as_ref()).await, expected);
    }

    #[rstest]
    #[tokio::test]
    async fn backend_routes_take_precedence() {
        let mut repo = MockRouteRepository::new();
        repo.expect_routes_for().returning(|_| {
            Ok(vec![RouteDescriptor::new(
                "/dashboard",
                AccessLevel::Authenticated,
            )])
        });
        let access = RouteAccess::new(Arc::new(repo));
        let client = signed_in(Role::Client);

        assert!(access.can_access("/dashboard", Some(&client)).await);
    }

    #[rstest]
    #[tokio::test]
    async fn empty_backend_answer_uses_built_in_table() {
        let mut repo = MockRouteRepository::new();
        repo.expect_routes_for().returning(|_| Ok(Vec::new()));
        let access = RouteAccess::new(Arc::new(repo));

        assert_eq!(access.routes(None).await, static_routes());
    }
}
