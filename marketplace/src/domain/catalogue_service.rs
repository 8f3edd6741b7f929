//! Broker listing management (`broker_services`).

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::domain::ports::{ServiceListingRepository, ServiceListingRepositoryError};
use crate::domain::{
    Error, Invalidates, ListingValidationError, NewServiceListing, QueryCache, QueryKey, Resource,
    Role, ServiceListing, User, UserId,
};

impl Invalidates for ServiceListing {
    fn invalidates(&self) -> Vec<QueryKey> {
        vec![QueryKey::ServiceListings {
            broker_id: self.broker_id.clone(),
        }]
    }
}

/// Listing reads and mutations for brokers.
pub struct ServiceCatalogue<R: ?Sized> {
    repo: Arc<R>,
    cache: QueryCache<Vec<ServiceListing>>,
}

impl<R> ServiceCatalogue<R>
where
    R: ServiceListingRepository + ?Sized,
{
    pub fn new(repo: Arc<R>) -> Self {
        Self {
            repo,
            cache: QueryCache::new(),
        }
    }

    fn map_repo_error(error: ServiceListingRepositoryError) -> Error {
        match error {
            ServiceListingRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("listing repository unavailable: {message}"))
            }
            ServiceListingRepositoryError::Query { message } => {
                Error::internal(format!("listing repository error: {message}"))
            }
            ServiceListingRepositoryError::NotFound { id } => {
                Error::not_found(format!("listing {id} not found"))
            }
        }
    }

    fn map_validation_error(error: ListingValidationError) -> Error {
        Error::invalid_request(error.to_string())
    }

    /// Fetch the listings of `broker_id`.
    pub async fn listings(&self, broker_id: &UserId) -> Resource<Vec<ServiceListing>> {
        self.load(QueryKey::ServiceListings {
            broker_id: broker_id.clone(),
        })
        .await
    }

    /// Last fetched listings of `broker_id` without a round trip.
    pub fn cached(&self, broker_id: &UserId) -> Resource<Vec<ServiceListing>> {
        self.cache.get(&QueryKey::ServiceListings {
            broker_id: broker_id.clone(),
        })
    }

    async fn load(&self, key: QueryKey) -> Resource<Vec<ServiceListing>> {
        let QueryKey::ServiceListings { broker_id } = &key else {
            return Resource::default();
        };
        let broker_id = broker_id.clone();
        self.cache
            .fetch(key, || async move {
                self.repo
                    .list_by_broker(&broker_id)
                    .await
                    .map_err(Self::map_repo_error)
            })
            .await
    }

    async fn refresh(&self, mutation: &impl Invalidates) {
        for key in mutation.invalidates() {
            if self.cache.invalidate(&key) {
                debug!(?key, "re-fetching invalidated listings");
                self.load(key).await;
            }
        }
    }

    /// Publish a new listing owned by `owner`.
    pub async fn create(
        &self,
        owner: &User,
        draft: NewServiceListing,
    ) -> Result<ServiceListing, Error> {
        if owner.role() != Role::Broker {
            return Err(Error::forbidden("only brokers can publish listings"));
        }
        let listing = ServiceListing::publish(owner.id().clone(), draft)
            .map_err(Self::map_validation_error)?;
        self.repo
            .insert(&listing)
            .await
            .map_err(Self::map_repo_error)?;
        self.refresh(&listing).await;
        Ok(listing)
    }

    /// Replace the editable fields of listing `id`.
    pub async fn update(
        &self,
        owner: &User,
        id: Uuid,
        draft: NewServiceListing,
    ) -> Result<ServiceListing, Error> {
        let mut listing = self.owned(owner, id).await?;
        listing.apply(draft).map_err(Self::map_validation_error)?;
        self.repo
            .update(&listing)
            .await
            .map_err(Self::map_repo_error)?;
        self.refresh(&listing).await;
        Ok(listing)
    }

    /// Toggle whether listing `id` appears in searches.
    pub async fn set_active(
        &self,
        owner: &User,
        id: Uuid,
        active: bool,
    ) -> Result<ServiceListing, Error> {
        let mut listing = self.owned(owner, id).await?;
        listing.active = active;
        self.repo
            .update(&listing)
            .await
            .map_err(Self::map_repo_error)?;
        self.refresh(&listing).await;
        Ok(listing)
    }

    pub async fn delete(&self, owner: &User, id: Uuid) -> Result<(), Error> {
        let listing = self.owned(owner, id).await?;
        self.repo
            .delete(&listing.id)
            .await
            .map_err(Self::map_repo_error)?;
        self.refresh(&listing).await;
        Ok(())
    }

    async fn owned(&self, owner: &User, id: Uuid) -> Result<ServiceListing, Error> {
        let listing = self
            .repo
            .find_by_id(&id)
            .await
            .map_err(Self::map_repo_error)?
            .ok_or_else(|| Error::not_found(format!("listing {id} not found")))?;
        if &listing.broker_id != owner.id() {
            return Err(Error::forbidden("listing belongs to another broker"));
        }
        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ports::MockServiceListingRepository;
    use crate::test_support::signed_in;

    fn draft() -> NewServiceListing {
        NewServiceListing {
            category: "car-sales".to_owned(),
            title: "Used Toyota IST".to_owned(),
            description: "2012, low mileage".to_owned(),
            price_min: Some(12_000_000),
            price_max: Some(15_000_000),
            location: Some("Sinza".to_owned()),
        }
    }

    #[fixture]
    fn broker() -> User {
        signed_in(Role::Broker)
    }

    #[rstest]
    #[tokio::test]
    async fn clients_cannot_publish() {
        let service = ServiceCatalogue::new(Arc::new(MockServiceListingRepository::new()));
        let err = service
            .create(&signed_in(Role::Client), draft())
            .await
            .expect_err("forbidden");
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    #[tokio::test]
    async fn create_refetches_a_cached_list(broker: User) {
        let mut repo = MockServiceListingRepository::new();
        let mut fetches = 0;
        repo.expect_list_by_broker()
            .with(eq(broker.id().clone()))
            .times(2)
            .returning(move |_| {
                fetches += 1;
                if fetches == 1 {
                    Ok(Vec::new())
                } else {
                    Ok(vec![
                        ServiceListing::publish(UserId::random(), draft()).expect("listing"),
                    ])
                }
            });
        repo.expect_insert().times(1).return_once(|_| Ok(()));
        let service = ServiceCatalogue::new(Arc::new(repo));

        let before = service.listings(broker.id()).await;
        assert_eq!(before.data.as_ref().map(Vec::len), Some(0));

        service.create(&broker, draft()).await.expect("create");

        let after = service.cached(broker.id());
        assert_eq!(after.data.as_ref().map(Vec::len), Some(1));
        assert!(!after.loading);
    }

    #[rstest]
    #[tokio::test]
    async fn uncached_lists_are_not_fetched_after_mutation(broker: User) {
        let mut repo = MockServiceListingRepository::new();
        repo.expect_list_by_broker().never();
        repo.expect_insert().times(1).return_once(|_| Ok(()));
        let service = ServiceCatalogue::new(Arc::new(repo));

        service.create(&broker, draft()).await.expect("create");
    }

    #[rstest]
    #[tokio::test]
    async fn read_errors_are_captured(broker: User) {
        let mut repo = MockServiceListingRepository::new();
        repo.expect_list_by_broker()
            .return_once(|_| Err(ServiceListingRepositoryError::connection("dns")));
        let service = ServiceCatalogue::new(Arc::new(repo));

        let resource = service.listings(broker.id()).await;
        assert!(resource.data.is_none());
        assert_eq!(
            resource.error.map(|e| e.code()),
            Some(ErrorCode::ServiceUnavailable)
        );
    }

    #[rstest]
    #[tokio::test]
    async fn only_the_owner_may_edit(broker: User) {
        let foreign = ServiceListing::publish(UserId::random(), draft()).expect("listing");
        let id = foreign.id;
        let mut repo = MockServiceListingRepository::new();
        repo.expect_find_by_id()
            .return_once(move |_| Ok(Some(foreign)));
        repo.expect_update().never();
        let service = ServiceCatalogue::new(Arc::new(repo));

        let err = service
            .update(&broker, id, draft())
            .await
            .expect_err("forbidden");
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    #[tokio::test]
    async fn missing_listing_is_not_found(broker: User) {
        let mut repo = MockServiceListingRepository::new();
        repo.expect_find_by_id().return_once(|_| Ok(None));
        let service = ServiceCatalogue::new(Arc::new(repo));

        let err = service
            .delete(&broker, Uuid::new_v4())
            .await
            .expect_err("missing");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }
}
