//! Port for the account backend that authenticates users.
//!
//! Two adapters implement it: a device-local provider backed by the
//! `registeredUsers` map and a Supabase GoTrue provider. Both report failures
//! through the shared [`AuthError`] taxonomy.

use async_trait::async_trait;

use crate::domain::{
    AuthError, DisplayName, Identifier, LoginCredentials, Role, SessionToken, SignupRequest,
    SocialProfile, SocialProvider, User, UserId,
};

/// Stored account details without a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: UserId,
    pub display_name: DisplayName,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub avatar_url: Option<String>,
}

impl Account {
    /// Attach a session token, producing the session user.
    pub fn into_user(self, token: SessionToken) -> User {
        let mut user = User::new(self.id, self.display_name, self.role, token)
            .with_avatar_url(self.avatar_url);
        if let Some(email) = self.email {
            user = user.with_email(email);
        }
        if let Some(phone) = self.phone {
            user = user.with_phone(phone);
        }
        user
    }
}

/// An account together with a freshly issued session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedAccount {
    pub account: Account,
    pub token: SessionToken,
}

impl AuthenticatedAccount {
    pub fn into_user(self) -> User {
        self.account.into_user(self.token)
    }
}

/// Account backend contract.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify credentials and open a session.
    async fn sign_in(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<AuthenticatedAccount, AuthError>;

    /// Register a new account and open a session.
    ///
    /// Fails with [`AuthError::DuplicateIdentifier`] when the email or phone
    /// is already registered.
    async fn sign_up(&self, request: &SignupRequest) -> Result<AuthenticatedAccount, AuthError>;

    /// Whether an account is registered under `identifier`.
    async fn exists(&self, identifier: &Identifier) -> Result<bool, AuthError>;

    /// Look up an account by email.
    async fn find_by_email(&self, email: &Identifier) -> Result<Option<Account>, AuthError>;

    /// Open a session for an existing account verified by a social provider.
    async fn sign_in_federated(
        &self,
        provider: SocialProvider,
        profile: &SocialProfile,
    ) -> Result<AuthenticatedAccount, AuthError>;

    /// Persist a role change for `id`.
    async fn update_role(
        &self,
        id: &UserId,
        role: Role,
        token: &SessionToken,
    ) -> Result<(), AuthError>;

    /// Revoke the session behind `token`.
    async fn sign_out(&self, token: &SessionToken) -> Result<(), AuthError>;
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn into_user_carries_contact_details() {
        let account = Account {
            id: UserId::random(),
            display_name: DisplayName::new("Zawadi").expect("name"),
            email: Some("zawadi@example.com".to_owned()),
            phone: None,
            role: Role::Broker,
            avatar_url: Some("https://cdn.example.com/z.png".to_owned()),
        };
        let user = AuthenticatedAccount {
            account: account.clone(),
            token: SessionToken::new("abc"),
        }
        .into_user();

        assert_eq!(user.id(), &account.id);
        assert_eq!(user.email(), Some("zawadi@example.com"));
        assert_eq!(user.phone(), None);
        assert_eq!(user.role(), Role::Broker);
        assert_eq!(user.token().expose(), "abc");
        assert_eq!(user.avatar_url(), Some("https://cdn.example.com/z.png"));
    }
}
