//! Runtime settings loaded via OrthoConfig.
//!
//! Values come from `DALALI_*` environment variables or a configuration
//! file; unset values fall back to an offline setup rooted at `.dalali`.

use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;
use translations::{Language, UnknownLanguage};
use url::Url;

const DEFAULT_DATA_DIR: &str = ".dalali";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Which adapters back identity and marketplace data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Credential store and tables kept under the data directory.
    Local,
    /// A hosted Supabase project.
    Supabase,
}

/// Settings that cannot be turned into a working setup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("configuration could not be loaded: {message}")]
    Load { message: String },
    #[error("unknown identity backend '{value}' (expected 'local' or 'supabase')")]
    UnknownBackend { value: String },
    #[error("{setting} is required when identity is 'supabase'")]
    MissingSetting { setting: &'static str },
    #[error("supabase_url is not a valid URL: {message}")]
    InvalidUrl { message: String },
    #[error("data_dir must be valid UTF-8: {path}")]
    NonUtf8DataDir { path: String },
    #[error(transparent)]
    Language(#[from] UnknownLanguage),
}

/// Connection details for a Supabase project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseSettings {
    pub url: Url,
    pub anon_key: String,
    pub timeout: Duration,
}

/// Configuration for the `dalali` binary.
///
/// The request timeout carries an OrthoConfig default so an empty merge
/// still yields a settings document; every other field is optional.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "DALALI")]
#[serde(default)]
pub struct AppSettings {
    /// Directory holding the local store.
    pub data_dir: Option<PathBuf>,
    /// `local` or `supabase`.
    pub identity: Option<String>,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    /// Timeout in seconds applied to each Supabase request.
    #[ortho_config(default = 15)]
    pub request_timeout_secs: u64,
    /// Language used when onboarding has not recorded a choice.
    pub language: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            identity: None,
            supabase_url: None,
            supabase_anon_key: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            language: None,
        }
    }
}

impl AppSettings {
    /// Load settings from the environment and configuration files only.
    ///
    /// Command-line flags belong to the CLI parser, so only the program
    /// name is handed to OrthoConfig.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] when a source cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_iter([OsString::from("dalali")]).map_err(|error| ConfigError::Load {
            message: error.to_string(),
        })
    }

    pub fn data_dir(&self) -> Result<Utf8PathBuf, ConfigError> {
        let path = self
            .data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        Utf8PathBuf::from_path_buf(path).map_err(|path| ConfigError::NonUtf8DataDir {
            path: path.display().to_string(),
        })
    }

    pub fn backend(&self) -> Result<Backend, ConfigError> {
        match self.identity.as_deref().map(str::trim) {
            None | Some("local") => Ok(Backend::Local),
            Some("supabase") => Ok(Backend::Supabase),
            Some(other) => Err(ConfigError::UnknownBackend {
                value: other.to_owned(),
            }),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Project URL, key and timeout. Both the URL and the key are required.
    pub fn supabase(&self) -> Result<SupabaseSettings, ConfigError> {
        let raw_url = self
            .supabase_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingSetting {
                setting: "supabase_url",
            })?;
        let url = Url::parse(raw_url.trim()).map_err(|error| ConfigError::InvalidUrl {
            message: error.to_string(),
        })?;
        let anon_key = self
            .supabase_anon_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingSetting {
                setting: "supabase_anon_key",
            })?;
        Ok(SupabaseSettings {
            url,
            anon_key,
            timeout: self.request_timeout(),
        })
    }

    /// Configured fallback language, English when unset.
    pub fn language(&self) -> Result<Language, ConfigError> {
        self.language
            .as_deref()
            .map_or(Ok(Language::English), Language::from_code)
            .map_err(ConfigError::from)
    }
}
