//! Static translation store for the Dalali Kiganjani marketplace.
//!
//! Copy is held in fixed key/value tables per [`Language`]. Lookups never
//! fail: a key missing from the requested language falls back to English,
//! and a key missing from English is returned verbatim so screens still
//! render something recognisable.
//!
//! ```
//! use translations::{Language, translate};
//!
//! assert_eq!(translate(Language::Swahili, "nav.home"), "Nyumbani");
//! assert_eq!(translate(Language::English, "nav.home"), "Home");
//! assert_eq!(translate(Language::Swahili, "no.such.key"), "no.such.key");
//! ```

mod en;
mod sw;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Languages offered on the language selection screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    /// English copy; also the fallback table.
    #[default]
    #[serde(rename = "en")]
    English,
    /// Swahili copy.
    #[serde(rename = "sw")]
    Swahili,
}

impl Language {
    /// Every supported language in display order.
    pub const ALL: [Self; 2] = [Self::English, Self::Swahili];

    /// Two-letter code persisted under the `language` storage key.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Swahili => "sw",
        }
    }

    /// Name of the language written in that language.
    #[must_use]
    pub const fn native_name(self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Swahili => "Kiswahili",
        }
    }

    /// Parse a language code, ignoring case and surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownLanguage`] when the code is not supported.
    pub fn from_code(code: &str) -> Result<Self, UnknownLanguage> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Self::English),
            "sw" | "swahili" | "kiswahili" => Ok(Self::Swahili),
            _ => Err(UnknownLanguage {
                code: code.to_owned(),
            }),
        }
    }

    const fn table(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::English => en::ENTRIES,
            Self::Swahili => sw::ENTRIES,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s)
    }
}

/// Error returned when parsing an unsupported language code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported language code '{code}'")]
pub struct UnknownLanguage {
    /// The rejected input.
    pub code: String,
}

/// Look up `key` in the table for `language` only.
#[must_use]
pub fn lookup(language: Language, key: &str) -> Option<&'static str> {
    language
        .table()
        .iter()
        .find(|(candidate, _)| *candidate == key)
        .map(|(_, text)| *text)
}

/// Translate `key`, falling back to English and then to the key itself.
#[must_use]
pub fn translate<'a>(language: Language, key: &'a str) -> &'a str {
    lookup(language, key)
        .or_else(|| lookup(Language::English, key))
        .unwrap_or(key)
}

/// Keys defined for `language`, in table order.
pub fn keys(language: Language) -> impl Iterator<Item = &'static str> {
    language.table().iter().map(|(key, _)| *key)
}
