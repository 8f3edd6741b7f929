//! Client bookings and the broker's side of them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::ports::{ServiceRequestRepository, ServiceRequestRepositoryError};
use crate::domain::{
    Error, Invalidates, NewServiceRequest, QueryCache, QueryKey, RequestStatus, Resource, Role,
    ServiceRequest, ServiceRequestError, User,
};

impl Invalidates for ServiceRequest {
    fn invalidates(&self) -> Vec<QueryKey> {
        vec![
            QueryKey::ClientRequests {
                client_id: self.client_id.clone(),
            },
            QueryKey::BrokerRequests {
                broker_id: self.broker_id.clone(),
            },
        ]
    }
}

/// Key under which `viewer`'s requests are cached.
fn viewer_key(viewer: &User) -> QueryKey {
    match viewer.role() {
        Role::Client => QueryKey::ClientRequests {
            client_id: viewer.id().clone(),
        },
        Role::Broker => QueryKey::BrokerRequests {
            broker_id: viewer.id().clone(),
        },
    }
}

/// Request reads and state transitions.
pub struct ServiceRequests<R: ?Sized> {
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
    cache: QueryCache<Vec<ServiceRequest>>,
}

impl<R> ServiceRequests<R>
where
    R: ServiceRequestRepository + ?Sized,
{
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            clock,
            cache: QueryCache::new(),
        }
    }

    fn map_repo_error(error: ServiceRequestRepositoryError) -> Error {
        match error {
            ServiceRequestRepositoryError::Connection { message } => {
                Error::service_unavailable(format!("request repository unavailable: {message}"))
            }
            ServiceRequestRepositoryError::Query { message } => {
                Error::internal(format!("request repository error: {message}"))
            }
            ServiceRequestRepositoryError::NotFound { id } => {
                Error::not_found(format!("service request {id} not found"))
            }
        }
    }

    fn map_request_error(error: ServiceRequestError) -> Error {
        match error {
            ServiceRequestError::InvalidTransition { from, to } => {
                Error::conflict(format!("cannot move request from {from} to {to}")).with_details(
                    json!({
                        "code": "invalid_transition",
                        "from": from,
                        "to": to,
                    }),
                )
            }
            other @ (ServiceRequestError::EmptyTitle | ServiceRequestError::SelfRequest) => {
                Error::invalid_request(other.to_string())
            }
        }
    }

    /// Requests visible to `viewer`: created ones for clients, received
    /// ones for brokers.
    pub async fn requests_for(&self, viewer: &User) -> Resource<Vec<ServiceRequest>> {
        self.load(viewer_key(viewer)).await
    }

    pub fn cached(&self, viewer: &User) -> Resource<Vec<ServiceRequest>> {
        self.cache.get(&viewer_key(viewer))
    }

    async fn load(&self, key: QueryKey) -> Resource<Vec<ServiceRequest>> {
        let repo = &self.repo;
        match key.clone() {
            QueryKey::ClientRequests { client_id } => {
                self.cache
                    .fetch(key, || async move {
                        repo.list_for_client(&client_id)
                            .await
                            .map_err(Self::map_repo_error)
                    })
                    .await
            }
            QueryKey::BrokerRequests { broker_id } => {
                self.cache
                    .fetch(key, || async move {
                        repo.list_for_broker(&broker_id)
                            .await
                            .map_err(Self::map_repo_error)
                    })
                    .await
            }
            _ => Resource::default(),
        }
    }

    async fn refresh(&self, mutation: &impl Invalidates) {
        for key in mutation.invalidates() {
            if self.cache.invalidate(&key) {
                debug!(?key, "re-fetching invalidated requests");
                self.load(key).await;
            }
        }
    }

    /// Book `draft` on behalf of `client`.
    pub async fn create(
        &self,
        client: &User,
        draft: NewServiceRequest,
    ) -> Result<ServiceRequest, Error> {
        let request = ServiceRequest::create(client.id().clone(), draft, self.clock.utc())
            .map_err(Self::map_request_error)?;
        self.repo
            .insert(&request)
            .await
            .map_err(Self::map_repo_error)?;
        info!(request_id = %request.id, broker_id = %request.broker_id, "service request created");
        self.refresh(&request).await;
        Ok(request)
    }

    /// Move request `id` to `status`. Either party may do so.
    pub async fn update_status(
        &self,
        actor: &User,
        id: Uuid,
        status: RequestStatus,
    ) -> Result<ServiceRequest, Error> {
        self.mutate(actor, id, Party::Either, |request, now| {
            request.transition(status, now)
        })
        .await
    }

    /// Cancel request `id` with an optional reason.
    pub async fn cancel(
        &self,
        actor: &User,
        id: Uuid,
        reason: Option<String>,
    ) -> Result<ServiceRequest, Error> {
        self.mutate(actor, id, Party::Either, |request, now| {
            request.cancel(reason, now)
        })
        .await
    }

    /// Broker accepts request `id`, optionally quoting a price.
    pub async fn respond(
        &self,
        broker: &User,
        id: Uuid,
        response: Option<String>,
        price: Option<u64>,
    ) -> Result<ServiceRequest, Error> {
        self.mutate(broker, id, Party::Broker, |request, now| {
            request.accept(response, price, now)
        })
        .await
    }

    async fn mutate<F>(
        &self,
        actor: &User,
        id: Uuid,
        party: Party,
        change: F,
    ) -> Result<ServiceRequest, Error>
    where
        F: FnOnce(&mut ServiceRequest, DateTime<Utc>) -> Result<(), ServiceRequestError>,
    {
        let mut request = self
            .repo
            .find_by_id(&id)
            .await
            .map_err(Self::map_repo_error)?
            .ok_or_else(|| Error::not_found(format!("service request {id} not found")))?;
        if !party.admits(&request, actor) {
            return Err(Error::forbidden(party.denial()));
        }
        change(&mut request, self.clock.utc()).map_err(Self::map_request_error)?;
        self.repo
            .update(&request)
            .await
            .map_err(Self::map_repo_error)?;
        info!(request_id = %request.id, status = %request.status, "service request updated");
        self.refresh(&request).await;
        Ok(request)
    }
}

/// Who may perform a mutation.
#[derive(Debug, Clone, Copy)]
enum Party {
    Either,
    Broker,
}

impl Party {
    fn admits(self, request: &ServiceRequest, actor: &User) -> bool {
        match self {
            Self::Either => request.involves(actor.id()),
            Self::Broker => &request.broker_id == actor.id(),
        }
    }

    fn denial(self) -> &'static str {
        match self {
            Self::Either => "not a party to this request",
            Self::Broker => "only the addressed broker can respond",
        }
    }
}
