//! Reqwest-backed transport shared by every Supabase adapter.
//!
//! Owns transport details only: endpoint composition, the `apikey` and
//! bearer headers, the request timeout, HTTP status classification and JSON
//! decoding. Adapters translate [`HttpFailure`] into their port errors.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::domain::SessionToken;

const REST_PREFIX: &str = "rest/v1/";
const AUTH_PREFIX: &str = "auth/v1/";
const REALTIME_PREFIX: &str = "realtime/v1/";
/// Phoenix serializer the realtime endpoint speaks in JSON object form.
const REALTIME_VSN: &str = "1.0.0";
const PREVIEW_CHAR_LIMIT: usize = 160;

/// Transport failure before it is mapped into a port error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpFailure {
    /// The request never produced a response.
    #[error("request failed: {message}")]
    Transport { message: String, timeout: bool },
    /// The backend answered with a non-success status.
    #[error("status {status}: {body}")]
    Status { status: u16, body: String },
    /// The body could not be decoded.
    #[error("invalid response payload: {message}")]
    Decode { message: String },
}

impl HttpFailure {
    /// Whether the backend was unreachable or overloaded rather than
    /// rejecting the request.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            Self::Decode { .. } => false,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => StatusCode::from_u16(*status).ok(),
            Self::Transport { .. } | Self::Decode { .. } => None,
        }
    }

    /// Response body preview, empty for non-status failures.
    pub fn body(&self) -> &str {
        match self {
            Self::Status { body, .. } => body,
            Self::Transport { .. } | Self::Decode { .. } => "",
        }
    }
}

fn map_transport_error(error: reqwest::Error) -> HttpFailure {
    HttpFailure::Transport {
        timeout: error.is_timeout(),
        message: error.to_string(),
    }
}

fn body_preview(body: &[u8]) -> String {
    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}

/// Connection to one Supabase project.
///
/// Data requests carry the signed-in user's access token when one is set so
/// row-level security applies; otherwise they fall back to the anon key.
pub struct SupabaseClient {
    http: Client,
    base: Url,
    anon_key: String,
    access_token: RwLock<Option<SessionToken>>,
}

impl SupabaseClient {
    /// Build a client for the project at `base`.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        mut base: Url,
        anon_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base,
            anon_key: anon_key.into(),
            access_token: RwLock::new(None),
        })
    }

    /// Use `token` for subsequent data requests; `None` reverts to the anon
    /// key.
    pub fn set_access_token(&self, token: Option<SessionToken>) {
        *self
            .access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    fn current_token(&self) -> Option<SessionToken> {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn endpoint(&self, prefix: &str, path: &str) -> Result<Url, HttpFailure> {
        self.base
            .join(&format!("{prefix}{path}"))
            .map_err(|error| HttpFailure::Decode {
                message: format!("invalid endpoint '{path}': {error}"),
            })
    }

    /// `rest/v1/{table}`.
    pub fn table_url(&self, table: &str) -> Result<Url, HttpFailure> {
        self.endpoint(REST_PREFIX, table)
    }

    /// `rest/v1/rpc/{function}`.
    pub fn rpc_url(&self, function: &str) -> Result<Url, HttpFailure> {
        self.endpoint(REST_PREFIX, &format!("rpc/{function}"))
    }

    /// `auth/v1/{path}`.
    pub fn auth_url(&self, path: &str) -> Result<Url, HttpFailure> {
        self.endpoint(AUTH_PREFIX, path)
    }

    /// `realtime/v1/websocket` on the matching `ws`/`wss` scheme, carrying
    /// the anon key and protocol version as query parameters.
    pub fn realtime_url(&self) -> Result<Url, HttpFailure> {
        let mut url = self.endpoint(REALTIME_PREFIX, "websocket")?;
        let scheme = if url.scheme() == "http" { "ws" } else { "wss" };
        url.set_scheme(scheme).map_err(|()| HttpFailure::Decode {
            message: format!("cannot switch {url} to {scheme}"),
        })?;
        url.query_pairs_mut()
            .append_pair("apikey", &self.anon_key)
            .append_pair("vsn", REALTIME_VSN);
        Ok(url)
    }

    /// Token realtime channels authorise with: the session token when set,
    /// otherwise the anon key.
    pub fn realtime_token(&self) -> String {
        self.current_token()
            .map_or_else(|| self.anon_key.clone(), |t| t.expose().to_owned())
    }

    /// Start a request authorised with `token`, the current session token,
    /// or the anon key, in that order.
    pub fn request(&self, method: Method, url: Url, token: Option<&SessionToken>) -> RequestBuilder {
        let bearer = token
            .cloned()
            .or_else(|| self.current_token())
            .map_or_else(|| self.anon_key.clone(), |t| t.expose().to_owned());
        self.http
            .request(method, url)
            .header("apikey", self.anon_key.as_str())
            .bearer_auth(bearer)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn send_raw(builder: RequestBuilder) -> Result<Vec<u8>, HttpFailure> {
        let response = builder.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(HttpFailure::Status {
                status: status.as_u16(),
                body: body_preview(body.as_ref()),
            });
        }
        Ok(body.to_vec())
    }

    /// Send and decode a JSON body.
    pub async fn send_json<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, HttpFailure> {
        let body = Self::send_raw(builder).await?;
        decode(&body)
    }

    /// Send and discard the body.
    pub async fn send_empty(builder: RequestBuilder) -> Result<(), HttpFailure> {
        Self::send_raw(builder).await.map(|_| ())
    }
}

/// Decode a JSON payload.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, HttpFailure> {
    serde_json::from_slice(body).map_err(|error| HttpFailure::Decode {
        message: error.to_string(),
    })
}

/// PostgREST equality filter value.
pub fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}
