//! Session lifecycle: sign-in, signup, social login, role switch and logout.
//!
//! The service is the single owner of the session user. It hydrates from the
//! `user` storage key on startup, writes the key on every successful sign-in
//! or role change, and removes it on logout.
//!
//! ```text
//! Anonymous --login/signup/social--> Authenticated(role)
//! Authenticated(role) --update_user_role--> Authenticated(role')
//! Authenticated(_) --logout--> Anonymous
//! ```

use std::sync::{Arc, PoisonError, RwLock};

use rand::distributions::Alphanumeric;
use rand::{Rng, thread_rng};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::ports::{IdentityProvider, KeyValueStore, StorageError, load_json, save_json};
use super::{
    AuthError, Identifier, LoginCredentials, Role, SignupRequest, SocialProfile, SocialProvider,
    User, redirect_path_for, storage_keys,
};

const GENERATED_PASSWORD_LEN: usize = 32;

fn storage_error(error: StorageError) -> AuthError {
    AuthError::storage(error.to_string())
}

/// Authentication state holder.
///
/// # Examples
/// ```
/// use std::sync::Arc;
///
/// use marketplace::domain::AuthService;
/// use marketplace::outbound::identity::LocalIdentityProvider;
/// use marketplace::outbound::storage::InMemoryStore;
///
/// let store = Arc::new(InMemoryStore::default());
/// let provider = Arc::new(LocalIdentityProvider::new(store.clone()));
/// let auth = AuthService::new(provider, store);
/// assert!(auth.hydrate().is_none());
/// assert_eq!(auth.redirect_path(), "/login");
/// ```
pub struct AuthService<P: ?Sized, S: ?Sized> {
    provider: Arc<P>,
    store: Arc<S>,
    session: RwLock<Option<User>>,
}

impl<P, S> AuthService<P, S>
where
    P: IdentityProvider + ?Sized,
    S: KeyValueStore + ?Sized,
{
    /// Create an anonymous service. Call [`Self::hydrate`] to restore a
    /// persisted session.
    pub fn new(provider: Arc<P>, store: Arc<S>) -> Self {
        Self {
            provider,
            store,
            session: RwLock::new(None),
        }
    }

    /// Restore the persisted session user, if any.
    ///
    /// An unreadable payload is logged and removed so the next start is clean.
    pub fn hydrate(&self) -> Option<User> {
        let restored = match load_json::<_, User>(self.store.as_ref(), storage_keys::USER) {
            Ok(user) => user,
            Err(error @ StorageError::Corrupt { .. }) => {
                warn!(%error, "discarding unreadable session");
                if let Err(error) = self.store.remove(storage_keys::USER) {
                    warn!(%error, "failed to clear unreadable session");
                }
                None
            }
            Err(error) => {
                warn!(%error, "session storage unavailable; starting anonymous");
                None
            }
        };
        if let Some(user) = &restored {
            debug!(user_id = %user.id(), role = %user.role(), "restored session");
        }
        self.replace_session(restored.clone());
        restored
    }

    /// Sign in with an email or phone number and password.
    pub async fn login(&self, identifier: &str, password: &str) -> Result<User, AuthError> {
        let credentials = LoginCredentials::try_from_parts(identifier, password)?;
        let account = self.provider.sign_in(&credentials).await?;
        self.establish(account.into_user())
    }

    /// Register a new account and sign in.
    pub async fn signup(&self, request: SignupRequest) -> Result<User, AuthError> {
        let account = self.provider.sign_up(&request).await?;
        self.establish(account.into_user())
    }

    /// Sign in through a social provider, registering a client account on
    /// first use. An existing account keeps its role.
    pub async fn social_login(
        &self,
        provider: SocialProvider,
        profile: SocialProfile,
    ) -> Result<User, AuthError> {
        if self.provider.find_by_email(profile.email()).await?.is_some() {
            let account = self.provider.sign_in_federated(provider, &profile).await?;
            return self.establish(account.into_user());
        }

        let password = generated_password();
        let request = SignupRequest::try_new(
            profile.display_name().as_ref(),
            Some(profile.email().as_ref()),
            None,
            &password,
            Role::Client,
        )?
        .with_avatar_url(profile.avatar_url().map(str::to_owned));

        let account = match self.provider.sign_up(&request).await {
            Ok(account) => account,
            Err(AuthError::DuplicateIdentifier { .. }) => {
                debug!(%provider, "account appeared during social signup; signing in");
                self.provider.sign_in_federated(provider, &profile).await?
            }
            Err(error) => return Err(error),
        };
        info!(%provider, user_id = %account.account.id, "registered account via social login");
        self.establish(account.into_user())
    }

    /// Switch the signed-in user's role.
    pub async fn update_user_role(&self, role: Role) -> Result<User, AuthError> {
        let current = self.current_user().ok_or(AuthError::NotAuthenticated)?;
        self.provider
            .update_role(current.id(), role, current.token())
            .await?;
        self.establish(current.with_role(role))
    }

    /// End the session. Safe to call when already signed out.
    ///
    /// Backend sign-out failures are logged; the local session is cleared
    /// regardless.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let previous = self.replace_session(None);
        if let Some(user) = &previous {
            if let Err(error) = self.provider.sign_out(user.token()).await {
                warn!(%error, user_id = %user.id(), "backend sign-out failed");
            }
            info!(user_id = %user.id(), "signed out");
        }
        self.store
            .remove(storage_keys::USER)
            .map_err(storage_error)
    }

    /// Landing path for the current session.
    pub fn redirect_path(&self) -> &'static str {
        redirect_path_for(self.read_session().as_ref())
    }

    /// Whether an account exists for `identifier`.
    ///
    /// Malformed identifiers and backend failures answer `false`.
    pub async fn check_user_exists(&self, identifier: &str) -> bool {
        let identifier = match Identifier::parse(identifier) {
            Ok(identifier) => identifier,
            Err(error) => {
                debug!(%error, "existence check on malformed identifier");
                return false;
            }
        };
        match self.provider.exists(&identifier).await {
            Ok(exists) => exists,
            Err(error) => {
                warn!(%error, "existence check failed; assuming no account");
                false
            }
        }
    }

    pub fn current_user(&self) -> Option<User> {
        self.read_session()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read_session().is_some()
    }

    fn establish(&self, user: User) -> Result<User, AuthError> {
        save_json(self.store.as_ref(), storage_keys::USER, &user).map_err(storage_error)?;
        info!(user_id = %user.id(), role = %user.role(), "session established");
        self.replace_session(Some(user.clone()));
        Ok(user)
    }

    fn read_session(&self) -> Option<User> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_session(&self, user: Option<User>) -> Option<User> {
        let mut session = self
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *session, user)
    }
}

fn generated_password() -> Zeroizing<String> {
    Zeroizing::new(
        thread_rng()
            .sample_iter(&Alphanumeric)
            .take(GENERATED_PASSWORD_LEN)
            .map(char::from)
            .collect(),
    )
}
