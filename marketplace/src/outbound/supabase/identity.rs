//! GoTrue-backed identity provider.
//!
//! GoTrue answers a failed password grant with `invalid_grant` (or
//! `invalid_credentials` on newer servers) whether or not the account
//! exists, so this adapter reports [`AuthError::InvalidCredentials`] and
//! never [`AuthError::NoAccount`].

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::client::{HttpFailure, SupabaseClient, decode, eq};
use super::dto::{GoTrueError, ProfileRow, SessionResponse, SignupResponse};
use crate::domain::ports::{Account, AuthenticatedAccount, IdentityProvider};
use crate::domain::{
    AuthError, AuthValidationError, Identifier, LoginCredentials, Role, SessionToken,
    SignupRequest, SocialProfile, SocialProvider, UserId,
};

const INVALID_GRANT_CODES: [&str; 2] = ["invalid_grant", "invalid_credentials"];
const DUPLICATE_CODES: [&str; 3] = ["user_already_exists", "email_exists", "phone_exists"];

fn gotrue_error(failure: &HttpFailure) -> GoTrueError {
    decode(failure.body().as_bytes()).unwrap_or_default()
}

fn backend_error(failure: HttpFailure) -> AuthError {
    AuthError::backend(failure.to_string())
}

fn map_sign_in_failure(failure: HttpFailure) -> AuthError {
    let rejected = failure.status() == Some(StatusCode::BAD_REQUEST)
        && gotrue_error(&failure)
            .code()
            .is_some_and(|code| INVALID_GRANT_CODES.contains(&code));
    if rejected {
        AuthError::InvalidCredentials
    } else {
        backend_error(failure)
    }
}

fn map_sign_up_failure(failure: HttpFailure, identifier: &str) -> AuthError {
    let body = gotrue_error(&failure);
    let duplicate = body
        .code()
        .is_some_and(|code| DUPLICATE_CODES.contains(&code))
        || body
            .message
            .as_deref()
            .is_some_and(|m| m.to_ascii_lowercase().contains("already registered"));
    if duplicate && failure.status().is_some_and(|s| s.is_client_error()) {
        AuthError::DuplicateIdentifier {
            identifier: identifier.to_owned(),
        }
    } else {
        backend_error(failure)
    }
}

fn identifier_field(identifier: &Identifier) -> (&'static str, &str) {
    match identifier {
        Identifier::Email(email) => ("email", email.as_str()),
        Identifier::Phone(phone) => ("phone", phone.as_str()),
    }
}

/// Identity provider backed by Supabase auth and the `profiles` table.
pub struct SupabaseIdentityProvider {
    client: Arc<SupabaseClient>,
}

impl SupabaseIdentityProvider {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        Self { client }
    }

    fn open_session(&self, response: SessionResponse) -> Result<AuthenticatedAccount, AuthError> {
        let token = response
            .access_token
            .map(SessionToken::new)
            .ok_or_else(|| AuthError::backend("auth response carried no access token"))?;
        let account = response.user.into_account().map_err(AuthError::backend)?;
        self.client.set_access_token(Some(token.clone()));
        Ok(AuthenticatedAccount { account, token })
    }

    async fn password_grant(
        &self,
        identifier: &Identifier,
        password: &str,
    ) -> Result<AuthenticatedAccount, AuthError> {
        let url = self
            .client
            .auth_url("token?grant_type=password")
            .map_err(backend_error)?;
        let (field, value) = identifier_field(identifier);
        let mut body = json!({ "password": password });
        body[field] = Value::from(value);
        let response: SessionResponse = SupabaseClient::send_json(
            self.client.request(Method::POST, url, None).json(&body),
        )
        .await
        .map_err(map_sign_in_failure)?;
        self.open_session(response)
    }

    async fn profiles_by(
        &self,
        identifier: &Identifier,
        select: &str,
    ) -> Result<Vec<Value>, AuthError> {
        let url = self.client.table_url("profiles").map_err(backend_error)?;
        let (field, value) = identifier_field(identifier);
        let filter = eq(value);
        SupabaseClient::send_json(
            self.client
                .request(Method::GET, url, None)
                .query(&[("select", select), (field, filter.as_str()), ("limit", "1")]),
        )
        .await
        .map_err(backend_error)
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentityProvider {
    async fn sign_in(
        &self,
        credentials: &LoginCredentials,
    ) -> Result<AuthenticatedAccount, AuthError> {
        self.password_grant(credentials.identifier(), credentials.password())
            .await
    }

    async fn sign_up(&self, request: &SignupRequest) -> Result<AuthenticatedAccount, AuthError> {
        let primary = request
            .identifiers()
            .next()
            .ok_or(AuthValidationError::MissingIdentifier)?
            .clone();
        let url = self.client.auth_url("signup").map_err(backend_error)?;
        let body = json!({
            "email": request.email().map(ToString::to_string),
            "phone": request.phone().map(ToString::to_string),
            "password": request.password(),
            "data": {
                "name": request.display_name().as_ref(),
                "role": request.role(),
                "avatar_url": request.avatar_url(),
            },
        });
        let response: SignupResponse = SupabaseClient::send_json(
            self.client.request(Method::POST, url, None).json(&body),
        )
        .await
        .map_err(|failure| map_sign_up_failure(failure, primary.as_ref()))?;

        match response {
            SignupResponse::Session(session) if session.access_token.is_some() => {
                self.open_session(session)
            }
            SignupResponse::Session(_) | SignupResponse::User(_) => {
                debug!("signup returned no session; signing in with the new password");
                self.password_grant(&primary, request.password()).await
            }
        }
    }

    async fn exists(&self, identifier: &Identifier) -> Result<bool, AuthError> {
        Ok(!self.profiles_by(identifier, "id").await?.is_empty())
    }

    async fn find_by_email(&self, email: &Identifier) -> Result<Option<Account>, AuthError> {
        let Some(row) = self.profiles_by(email, "*").await?.into_iter().next() else {
            return Ok(None);
        };
        let profile: ProfileRow = serde_json::from_value(row)
            .map_err(|error| AuthError::backend(format!("invalid profile row: {error}")))?;
        Ok(Some(profile.into_account()))
    }

    async fn sign_in_federated(
        &self,
        provider: SocialProvider,
        profile: &SocialProfile,
    ) -> Result<AuthenticatedAccount, AuthError> {
        let id_token = profile
            .id_token()
            .ok_or(AuthValidationError::MissingIdToken)?;
        let url = self
            .client
            .auth_url("token?grant_type=id_token")
            .map_err(backend_error)?;
        let body = json!({ "provider": provider.as_str(), "id_token": id_token });
        let response: SessionResponse = SupabaseClient::send_json(
            self.client.request(Method::POST, url, None).json(&body),
        )
        .await
        .map_err(map_sign_in_failure)?;
        self.open_session(response)
    }

    async fn update_role(
        &self,
        id: &UserId,
        role: Role,
        token: &SessionToken,
    ) -> Result<(), AuthError> {
        let profiles = self.client.table_url("profiles").map_err(backend_error)?;
        SupabaseClient::send_empty(
            self.client
                .request(Method::PATCH, profiles, Some(token))
                .query(&[("id", eq(id))])
                .header("Prefer", "return=minimal")
                .json(&json!({ "role": role })),
        )
        .await
        .map_err(backend_error)?;

        let user = self.client.auth_url("user").map_err(backend_error)?;
        SupabaseClient::send_empty(
            self.client
                .request(Method::PUT, user, Some(token))
                .json(&json!({ "data": { "role": role } })),
        )
        .await
        .map_err(backend_error)
    }

    async fn sign_out(&self, token: &SessionToken) -> Result<(), AuthError> {
        self.client.set_access_token(None);
        let url = self.client.auth_url("logout").map_err(backend_error)?;
        let outcome =
            SupabaseClient::send_empty(self.client.request(Method::POST, url, Some(token))).await;
        match outcome {
            Ok(()) => Ok(()),
            Err(failure) if failure.status() == Some(StatusCode::UNAUTHORIZED) => {
                warn!("session already expired at sign-out");
                Ok(())
            }
            Err(failure) => Err(backend_error(failure)),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn status(status: u16, body: &str) -> HttpFailure {
        HttpFailure::Status {
            status,
            body: body.to_owned(),
        }
    }

    #[rstest]
    #[case(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#)]
    #[case(r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#)]
    fn rejected_password_grant_is_invalid_credentials(#[case] body: &str) {
        assert_eq!(
            map_sign_in_failure(status(400, body)),
            AuthError::InvalidCredentials
        );
    }

    #[rstest]
    fn server_errors_stay_backend_failures() {
        assert!(matches!(
            map_sign_in_failure(status(503, "upstream down")),
            AuthError::Backend { .. }
        ));
        assert!(matches!(
            map_sign_in_failure(HttpFailure::Transport {
                message: "dns".to_owned(),
                timeout: false,
            }),
            AuthError::Backend { .. }
        ));
    }

    #[rstest]
    #[case(422, r#"{"error_code":"user_already_exists","msg":"User already registered"}"#, true)]
    #[case(400, r#"{"msg":"User already registered"}"#, true)]
    #[case(422, r#"{"error_code":"weak_password"}"#, false)]
    #[case(500, r#"{"msg":"User already registered"}"#, false)]
    fn detects_duplicate_signups(#[case] code: u16, #[case] body: &str, #[case] duplicate: bool) {
        let error = map_sign_up_failure(status(code, body), "neema@example.com");
        assert_eq!(
            matches!(error, AuthError::DuplicateIdentifier { .. }),
            duplicate
        );
    }

    #[rstest]
    fn identifiers_pick_their_grant_field() {
        let phone = Identifier::parse("+255712345678").expect("phone");
        assert_eq!(identifier_field(&phone), ("phone", "+255712345678"));
        let email = Identifier::parse("a@b.co").expect("email");
        assert_eq!(identifier_field(&email), ("email", "a@b.co"));
    }
}
