//! Authentication primitives: credentials, signup payloads, and the auth
//! error taxonomy.
//!
//! Constructors validate raw string input before anything talks to an
//! identity provider, so adapters only ever see well-formed requests.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

use super::user::{DisplayName, Identifier, Role, UserValidationError};
use super::{Error, ErrorCode};

/// Minimum password length accepted at signup.
pub const PASSWORD_MIN: usize = 5;

/// Validation failures for login and signup input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthValidationError {
    /// Email or phone was malformed.
    #[error("{0}")]
    Identifier(UserValidationError),
    /// Display name was rejected.
    #[error("{0}")]
    DisplayName(UserValidationError),
    /// Password was blank.
    #[error("password must not be empty")]
    EmptyPassword,
    /// Password was shorter than [`PASSWORD_MIN`].
    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },
    /// Signup supplied neither an email nor a phone number.
    #[error("an email address or phone number is required")]
    MissingIdentifier,
    /// Remote social login needs a provider-issued ID token.
    #[error("social login requires an identity token")]
    MissingIdToken,
}

/// Auth-flow errors surfaced to callers.
///
/// `NoAccount` is only reported by identity providers that can tell an
/// unknown identifier apart from a wrong password.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The identifier is not registered.
    #[error("no account found for this email or phone number")]
    NoAccount,
    /// The identifier exists but the password did not match.
    #[error("invalid email/phone or password")]
    InvalidCredentials,
    /// Signup used an email or phone that is already registered.
    #[error("an account already exists for {identifier}")]
    DuplicateIdentifier { identifier: String },
    /// The operation needs an active session.
    #[error("you must be logged in to do that")]
    NotAuthenticated,
    /// Input failed validation.
    #[error(transparent)]
    Validation(#[from] AuthValidationError),
    /// The identity backend failed.
    #[error("identity backend failed: {message}")]
    Backend { message: String },
    /// The local session store failed.
    #[error("session storage failed: {message}")]
    Storage { message: String },
}

impl AuthError {
    /// Helper for backend failures.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Helper for storage failures.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

impl From<AuthError> for Error {
    fn from(value: AuthError) -> Self {
        let code = match &value {
            AuthError::NoAccount | AuthError::InvalidCredentials | AuthError::NotAuthenticated => {
                ErrorCode::Unauthorized
            }
            AuthError::DuplicateIdentifier { .. } => ErrorCode::Conflict,
            AuthError::Validation(_) => ErrorCode::InvalidRequest,
            AuthError::Backend { .. } => ErrorCode::ServiceUnavailable,
            AuthError::Storage { .. } => ErrorCode::InternalError,
        };
        Error::new(code, value.to_string())
    }
}

fn validate_password(password: &str, min: usize) -> Result<Zeroizing<String>, AuthValidationError> {
    if password.is_empty() {
        return Err(AuthValidationError::EmptyPassword);
    }
    if password.chars().count() < min {
        return Err(AuthValidationError::PasswordTooShort { min });
    }
    Ok(Zeroizing::new(password.to_owned()))
}

/// Validated login credentials.
///
/// ## Invariants
/// - `identifier` is a normalised email or phone number.
/// - `password` is non-empty and keeps caller-provided whitespace.
///
/// # Examples
/// ```
/// use marketplace::domain::LoginCredentials;
///
/// let creds = LoginCredentials::try_from_parts("Alice@X.com", "pw123").unwrap();
/// assert_eq!(creds.identifier().as_ref(), "alice@x.com");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    identifier: Identifier,
    password: Zeroizing<String>,
}

impl LoginCredentials {
    /// Construct credentials from raw identifier/password inputs.
    pub fn try_from_parts(identifier: &str, password: &str) -> Result<Self, AuthValidationError> {
        let identifier = Identifier::parse(identifier).map_err(AuthValidationError::Identifier)?;
        // Login accepts whatever length the account was created with.
        let password = validate_password(password, 1)?;
        Ok(Self {
            identifier,
            password,
        })
    }

    /// Normalised identifier for account lookups.
    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// Password provided by the caller.
    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

/// Validated signup payload.
#[derive(Clone, PartialEq, Eq)]
pub struct SignupRequest {
    display_name: DisplayName,
    email: Option<Identifier>,
    phone: Option<Identifier>,
    password: Zeroizing<String>,
    role: Role,
    avatar_url: Option<String>,
}

impl SignupRequest {
    /// Validate raw signup form input.
    ///
    /// # Examples
    /// ```
    /// use marketplace::domain::{Role, SignupRequest};
    ///
    /// let request =
    ///     SignupRequest::try_new("Alice", Some("alice@x.com"), None, "pw123", Role::Client)
    ///         .unwrap();
    /// assert_eq!(request.identifiers().count(), 1);
    /// ```
    pub fn try_new(
        display_name: &str,
        email: Option<&str>,
        phone: Option<&str>,
        password: &str,
        role: Role,
    ) -> Result<Self, AuthValidationError> {
        let display_name =
            DisplayName::new(display_name).map_err(AuthValidationError::DisplayName)?;
        let email = non_blank(email)
            .map(Identifier::email)
            .transpose()
            .map_err(AuthValidationError::Identifier)?;
        let phone = non_blank(phone)
            .map(Identifier::phone)
            .transpose()
            .map_err(AuthValidationError::Identifier)?;
        if email.is_none() && phone.is_none() {
            return Err(AuthValidationError::MissingIdentifier);
        }
        let password = validate_password(password, PASSWORD_MIN)?;
        Ok(Self {
            display_name,
            email,
            phone,
            password,
            role,
            avatar_url: None,
        })
    }

    /// Attach an avatar URL (social signups).
    pub fn with_avatar_url(mut self, avatar_url: Option<String>) -> Self {
        self.avatar_url = avatar_url;
        self
    }

    /// Display name for the new account.
    pub fn display_name(&self) -> &DisplayName {
        &self.display_name
    }

    /// Email, when supplied.
    pub fn email(&self) -> Option<&Identifier> {
        self.email.as_ref()
    }

    /// Phone number, when supplied.
    pub fn phone(&self) -> Option<&Identifier> {
        self.phone.as_ref()
    }

    /// Every identifier the account will be reachable by.
    pub fn identifiers(&self) -> impl Iterator<Item = &Identifier> {
        self.email.iter().chain(self.phone.iter())
    }

    /// Chosen password.
    pub fn password(&self) -> &str {
        self.password.as_str()
    }

    /// Initial role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Avatar URL, when supplied.
    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }
}

impl fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupRequest")
            .field("display_name", &self.display_name)
            .field("email", &self.email)
            .field("phone", &self.phone)
            .field("role", &self.role)
            .finish_non_exhaustive()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Social identity providers offered on the login screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialProvider {
    Google,
    Facebook,
    Apple,
}

impl SocialProvider {
    /// Provider name as understood by the identity backend.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Facebook => "facebook",
            Self::Apple => "apple",
        }
    }
}

impl fmt::Display for SocialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile data returned by a social provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialProfile {
    email: Identifier,
    display_name: DisplayName,
    avatar_url: Option<String>,
    id_token: Option<String>,
}

impl SocialProfile {
    /// Validate provider profile data. The email must be an email address.
    pub fn try_new(
        email: &str,
        display_name: &str,
        avatar_url: Option<String>,
    ) -> Result<Self, AuthValidationError> {
        Ok(Self {
            email: Identifier::email(email).map_err(AuthValidationError::Identifier)?,
            display_name: DisplayName::new(display_name)
                .map_err(AuthValidationError::DisplayName)?,
            avatar_url,
            id_token: None,
        })
    }

    /// Attach the provider-issued ID token used by remote identity backends.
    pub fn with_id_token(mut self, id_token: impl Into<String>) -> Self {
        self.id_token = Some(id_token.into());
        self
    }

    /// Email reported by the provider.
    pub fn email(&self) -> &Identifier {
        &self.email
    }

    /// Name reported by the provider.
    pub fn display_name(&self) -> &DisplayName {
        &self.display_name
    }

    /// Avatar reported by the provider.
    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }

    /// Provider-issued ID token, if any.
    pub fn id_token(&self) -> Option<&str> {
        self.id_token.as_deref()
    }
}
