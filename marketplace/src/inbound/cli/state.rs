//! Service wiring for the command line.
//!
//! Commands only see domain services built over port trait objects, so the
//! same handlers run against the offline adapters, Supabase, or test doubles.

use std::sync::Arc;

use mockable::{Clock, DefaultClock};
use thiserror::Error;
use tracing::{debug, info, warn};
use translations::Language;

use crate::config::{AppSettings, Backend, ConfigError};
use crate::domain::ports::{
    BrokerDirectory, ChangeFeed, IdentityProvider, KeyValueStore, ReviewRepository,
    RouteRepository, SearchLogRepository, ServiceListingRepository, ServiceRequestRepository,
    StorageError, load_json, save_json,
};
use crate::domain::{
    AuthService, BrokerDiscovery, Onboarding, Reviews, RouteAccess, ServiceCatalogue,
    ServiceRequests, storage_keys,
};
use crate::outbound::identity::LocalIdentityProvider;
use crate::outbound::memory::{InMemoryMarketplace, MarketplaceSnapshot};
use crate::outbound::realtime::{BroadcastChangeFeed, SupabaseChangeFeed};
use crate::outbound::storage::FileStore;
use crate::outbound::supabase::{SupabaseClient, SupabaseIdentityProvider, SupabaseRepository};

/// Failures while assembling the services.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("HTTP client could not be built: {message}")]
    Http { message: String },
}

/// Parameter object bundling every port implementation.
#[derive(Clone)]
pub struct CliStatePorts {
    pub identity: Arc<dyn IdentityProvider>,
    pub store: Arc<dyn KeyValueStore>,
    pub directory: Arc<dyn BrokerDirectory>,
    pub search_log: Arc<dyn SearchLogRepository>,
    pub listings: Arc<dyn ServiceListingRepository>,
    pub requests: Arc<dyn ServiceRequestRepository>,
    pub reviews: Arc<dyn ReviewRepository>,
    pub routes: Arc<dyn RouteRepository>,
    pub changes: Arc<dyn ChangeFeed>,
}

impl CliStatePorts {
    /// Local credentials in `store` and every table in `marketplace`.
    pub fn offline(store: Arc<dyn KeyValueStore>, marketplace: Arc<InMemoryMarketplace>) -> Self {
        Self::offline_with_feed(store, marketplace, Arc::new(BroadcastChangeFeed::default()))
    }

    /// As [`Self::offline`], with `feed` as the change feed. The marketplace
    /// should publish to the same feed for subscribers to see its changes.
    pub fn offline_with_feed(
        store: Arc<dyn KeyValueStore>,
        marketplace: Arc<InMemoryMarketplace>,
        feed: Arc<BroadcastChangeFeed>,
    ) -> Self {
        Self {
            identity: Arc::new(LocalIdentityProvider::new(Arc::clone(&store))),
            store,
            directory: marketplace.clone(),
            search_log: marketplace.clone(),
            listings: marketplace.clone(),
            requests: marketplace.clone(),
            reviews: marketplace.clone(),
            routes: marketplace,
            changes: feed,
        }
    }
}

/// Table snapshot written back to the store after each command.
struct OfflineTables {
    marketplace: Arc<InMemoryMarketplace>,
    store: Arc<dyn KeyValueStore>,
}

/// Dependency bundle for command handlers.
pub struct CliState {
    pub auth: AuthService<dyn IdentityProvider, dyn KeyValueStore>,
    pub discovery: BrokerDiscovery<dyn BrokerDirectory, dyn SearchLogRepository>,
    pub catalogue: ServiceCatalogue<dyn ServiceListingRepository>,
    pub requests: ServiceRequests<dyn ServiceRequestRepository>,
    pub reviews: Reviews<dyn ReviewRepository, dyn ServiceRequestRepository>,
    pub routes: RouteAccess<dyn RouteRepository>,
    pub onboarding: Onboarding<dyn KeyValueStore>,
    pub changes: Arc<dyn ChangeFeed>,
    pub fallback_language: Language,
    offline: Option<OfflineTables>,
}

impl CliState {
    pub fn new(ports: CliStatePorts, clock: Arc<dyn Clock>) -> Self {
        let CliStatePorts {
            identity,
            store,
            directory,
            search_log,
            listings,
            requests,
            reviews,
            routes,
            changes,
        } = ports;
        Self {
            auth: AuthService::new(identity, Arc::clone(&store)),
            discovery: BrokerDiscovery::new(directory, search_log),
            catalogue: ServiceCatalogue::new(listings),
            requests: ServiceRequests::new(Arc::clone(&requests), Arc::clone(&clock)),
            reviews: Reviews::new(reviews, requests, Arc::clone(&clock)),
            routes: RouteAccess::new(routes),
            onboarding: Onboarding::new(store, clock),
            changes,
            fallback_language: Language::default(),
            offline: None,
        }
    }

    pub fn with_fallback_language(mut self, language: Language) -> Self {
        self.fallback_language = language;
        self
    }

    /// Write `marketplace` tables to `store` on [`Self::persist`].
    fn persisting(
        mut self,
        marketplace: Arc<InMemoryMarketplace>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        self.offline = Some(OfflineTables { marketplace, store });
        self
    }

    /// Save offline tables. A no-op for hosted backends.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the snapshot cannot be written.
    pub fn persist(&self) -> Result<(), StorageError> {
        let Some(tables) = &self.offline else {
            return Ok(());
        };
        save_json(
            tables.store.as_ref(),
            storage_keys::MARKETPLACE,
            &tables.marketplace.snapshot(),
        )
    }
}

fn offline_state(settings: &AppSettings, clock: Arc<dyn Clock>) -> Result<CliState, StartupError> {
    let dir = settings.data_dir()?;
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&dir)?);
    let marketplace = Arc::new(InMemoryMarketplace::default());
    match load_json::<_, MarketplaceSnapshot>(store.as_ref(), storage_keys::MARKETPLACE) {
        Ok(Some(snapshot)) => marketplace.restore(snapshot),
        Ok(None) => debug!("no offline tables saved yet"),
        Err(error) => warn!(%error, "discarding unreadable offline tables"),
    }
    info!(data_dir = %dir, "using offline backend");
    let ports = CliStatePorts::offline(Arc::clone(&store), Arc::clone(&marketplace));
    let state = CliState::new(ports, clock).persisting(marketplace, store);
    state.auth.hydrate();
    Ok(state)
}

fn supabase_state(settings: &AppSettings, clock: Arc<dyn Clock>) -> Result<CliState, StartupError> {
    let supabase = settings.supabase()?;
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(settings.data_dir()?)?);
    let client = Arc::new(
        SupabaseClient::new(supabase.url.clone(), supabase.anon_key, supabase.timeout).map_err(
            |error| StartupError::Http {
                message: error.to_string(),
            },
        )?,
    );
    let repository = Arc::new(SupabaseRepository::new(Arc::clone(&client)));
    info!(url = %supabase.url, "using Supabase backend");
    let ports = CliStatePorts {
        identity: Arc::new(SupabaseIdentityProvider::new(Arc::clone(&client))),
        store,
        directory: repository.clone(),
        search_log: repository.clone(),
        listings: repository.clone(),
        requests: repository.clone(),
        reviews: repository.clone(),
        routes: repository,
        changes: Arc::new(SupabaseChangeFeed::new(Arc::clone(&client))),
    };
    let state = CliState::new(ports, clock);
    if let Some(user) = state.auth.hydrate() {
        client.set_access_token(Some(user.token().clone()));
    }
    Ok(state)
}

/// Assemble services for `settings` and restore the persisted session.
///
/// # Errors
///
/// Returns [`StartupError`] when settings are incomplete or the local store
/// cannot be opened.
pub fn build_state(settings: &AppSettings) -> Result<CliState, StartupError> {
    let clock: Arc<dyn Clock> = Arc::new(DefaultClock);
    let state = match settings.backend()? {
        Backend::Local => offline_state(settings, clock)?,
        Backend::Supabase => supabase_state(settings, clock)?,
    };
    Ok(state.with_fallback_language(settings.language()?))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;
    use crate::domain::{NewServiceRequest, Role};
    use crate::test_support::{fixture_clock, signed_in};

    fn settings_for(dir: &TempDir) -> AppSettings {
        AppSettings {
            data_dir: Some(dir.path().to_path_buf()),
            language: Some("sw".to_owned()),
            ..AppSettings::default()
        }
    }

    #[rstest]
    #[tokio::test]
    async fn offline_tables_survive_restarts() {
        let dir = TempDir::new().expect("temp dir");
        let settings = settings_for(&dir);
        let client = signed_in(Role::Client);

        let first = build_state(&settings).expect("state");
        assert_eq!(first.fallback_language, Language::Swahili);
        let created = first
            .requests
            .create(
                &client,
                NewServiceRequest {
                    title: "Plot survey".to_owned(),
                    description: String::new(),
                    broker_id: crate::domain::UserId::random(),
                    service_id: uuid::Uuid::new_v4(),
                    proposed_price: None,
                },
            )
            .await
            .expect("created");
        first.persist().expect("persist");

        let second = build_state(&settings).expect("state");
        let listed = second.requests.requests_for(&client).await;
        assert_eq!(listed.data, Some(vec![created]));
    }

    #[rstest]
    fn supabase_backend_needs_a_url() {
        let dir = TempDir::new().expect("temp dir");
        let mut settings = settings_for(&dir);
        settings.identity = Some("supabase".to_owned());
        assert!(matches!(
            build_state(&settings),
            Err(StartupError::Config(ConfigError::MissingSetting { .. }))
        ));
    }

    #[rstest]
    fn state_without_offline_tables_persists_nothing() {
        let marketplace = Arc::new(InMemoryMarketplace::default());
        let store: Arc<dyn KeyValueStore> =
            Arc::new(crate::outbound::storage::InMemoryStore::default());
        let state = CliState::new(
            CliStatePorts::offline(Arc::clone(&store), marketplace),
            fixture_clock(),
        );
        state.persist().expect("no-op");
        assert_eq!(store.get(storage_keys::MARKETPLACE).expect("get"), None);
    }
}
