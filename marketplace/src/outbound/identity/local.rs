//! Device-local identity provider backed by the `registeredUsers` map.
//!
//! Intended for demos and offline use: passwords are stored as entered.
//! Each record is indexed under every identifier it owns, so an account with
//! both an email and a phone number appears twice in the map with the same
//! id.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroize;

use crate::domain::ports::{
    Account, AuthenticatedAccount, IdentityProvider, KeyValueStore, load_json, save_json,
};
use crate::domain::{
    AuthError, DisplayName, Identifier, LoginCredentials, Role, SessionToken, SignupRequest,
    SocialProfile, SocialProvider, UserId, storage_keys,
};

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialRecord {
    id: UserId,
    name: DisplayName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    phone: Option<String>,
    password: String,
    role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    avatar_url: Option<String>,
}

impl Drop for CredentialRecord {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

impl CredentialRecord {
    fn account(&self) -> Account {
        Account {
            id: self.id.clone(),
            display_name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            role: self.role,
            avatar_url: self.avatar_url.clone(),
        }
    }

    fn session(&self) -> AuthenticatedAccount {
        AuthenticatedAccount {
            account: self.account(),
            token: SessionToken::random(),
        }
    }
}

type Registry = BTreeMap<String, CredentialRecord>;

/// Identity provider keeping credentials in the local key-value store.
pub struct LocalIdentityProvider<S: ?Sized> {
    store: Arc<S>,
    registry_lock: Mutex<()>,
}

impl<S> LocalIdentityProvider<S>
where
    S: KeyValueStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            registry_lock: Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.registry_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn load(&self) -> Result<Registry, AuthError> {
        load_json(self.store.as_ref(), storage_keys::REGISTERED_USERS)
            .map(Option::unwrap_or_default)
            .map_err(|err| AuthError::storage(err.to_string()))
    }

    fn save(&self, registry: &Registry) -> Result<(), AuthError> {
        save_json(self.store.as_ref(), storage_keys::REGISTERED_USERS, registry)
            .map_err(|err| AuthError::storage(err.to_string()))
    }
}

#[async_trait]
impl<S> IdentityProvider for LocalIdentityProvider<S>
where
    S: KeyValueStore + ?Sized,
{
    async fn sign_in(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<AuthenticatedAccount, AuthError> {
        let _guard = self.lock();
        let registry = self.load()?;
        let record = registry
            .get(credentials.identifier().as_ref())
            .ok_or(AuthError::NoAccount)?;
        if record.password != credentials.password() {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(record.session())
    }

    async fn sign_up(&self, request: &SignupRequest) -> Result<AuthenticatedAccount, AuthError> {
        let _guard = self.lock();
        let mut registry = self.load()?;
        if let Some(taken) = request
            .identifiers()
            .find(|identifier| registry.contains_key(identifier.as_ref()))
        {
            return Err(AuthError::DuplicateIdentifier {
                identifier: taken.to_string(),
            });
        }
        let record = CredentialRecord {
            id: UserId::random(),
            name: request.display_name().clone(),
            email: request.email().map(ToString::to_string),
            phone: request.phone().map(ToString::to_string),
            password: request.password().to_owned(),
            role: request.role(),
            avatar_url: request.avatar_url().map(str::to_owned),
        };
        for identifier in request.identifiers() {
            registry.insert(identifier.to_string(), record.clone());
        }
        self.save(&registry)?;
        debug!(user_id = %record.id, "registered local account");
        Ok(record.session())
    }

    async fn exists(&self, identifier: &Identifier) -> Result<bool, AuthError> {
        let _guard = self.lock();
        Ok(self.load()?.contains_key(identifier.as_ref()))
    }

    async fn find_by_email(&self, email: &Identifier) -> Result<Option<Account>, AuthError> {
        let _guard = self.lock();
        Ok(self
            .load()?
            .get(email.as_ref())
            .map(CredentialRecord::account))
    }

    async fn sign_in_federated(
        &self,
        provider: SocialProvider,
        profile: &SocialProfile,
    ) -> Result<AuthenticatedAccount, AuthError> {
        let _guard = self.lock();
        let registry = self.load()?;
        let record = registry
            .get(profile.email().as_ref())
            .ok_or(AuthError::NoAccount)?;
        debug!(%provider, user_id = %record.id, "federated sign-in");
        Ok(record.session())
    }

    async fn update_role(
        &self,
        id: &UserId,
        role: Role,
        _token: &SessionToken,
    ) -> Result<(), AuthError> {
        let _guard = self.lock();
        let mut registry = self.load()?;
        let mut touched = false;
        for record in registry.values_mut().filter(|record| &record.id == id) {
            record.role = role;
            touched = true;
        }
        if touched {
            self.save(&registry)?;
        }
        Ok(())
    }

    async fn sign_out(&self, _token: &SessionToken) -> Result<(), AuthError> {
        Ok(())
    }
}
