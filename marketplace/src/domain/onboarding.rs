//! First-run flow: language choice, introduction and location permission.
//!
//! State lives in the key-value store as plain strings so it survives
//! restarts. Missing or unreadable values fall back to the first-run default.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use tracing::warn;
use translations::Language;

use super::ports::{KeyValueStore, StorageError};
use super::storage_keys;

/// Answer to the location permission prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationPermission {
    Granted,
    Denied,
    #[default]
    Prompt,
}

impl LocationPermission {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::Prompt => "prompt",
        }
    }
}

impl fmt::Display for LocationPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationPermission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "granted" => Ok(Self::Granted),
            "denied" => Ok(Self::Denied),
            "prompt" => Ok(Self::Prompt),
            other => Err(format!("unknown permission state '{other}'")),
        }
    }
}

/// Screen the first-run flow should show next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStep {
    LanguageSelection,
    Introduction,
    Permissions,
    Done,
}

/// Snapshot of the persisted first-run state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingState {
    pub language: Language,
    pub has_selected_language: bool,
    pub onboarding_complete: bool,
    pub location_permission: LocationPermission,
    pub last_opened: Option<DateTime<Utc>>,
}

impl OnboardingState {
    pub fn next_step(&self) -> OnboardingStep {
        if !self.has_selected_language {
            OnboardingStep::LanguageSelection
        } else if !self.onboarding_complete {
            OnboardingStep::Introduction
        } else if self.location_permission == LocationPermission::Prompt {
            OnboardingStep::Permissions
        } else {
            OnboardingStep::Done
        }
    }
}

/// Reads and writes first-run state.
pub struct Onboarding<S: ?Sized> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> Onboarding<S>
where
    S: KeyValueStore + ?Sized,
{
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Current snapshot.
    pub fn state(&self) -> Result<OnboardingState, StorageError> {
        Ok(OnboardingState {
            language: self.language()?,
            has_selected_language: self.flag(storage_keys::HAS_SELECTED_LANGUAGE)?,
            onboarding_complete: self.flag(storage_keys::ONBOARDING_COMPLETE)?,
            location_permission: self.location_permission()?,
            last_opened: self.last_opened()?,
        })
    }

    pub fn next_step(&self) -> Result<OnboardingStep, StorageError> {
        self.state().map(|state| state.next_step())
    }

    /// Stored language, English when unset or unknown.
    pub fn language(&self) -> Result<Language, StorageError> {
        let Some(code) = self.store.get(storage_keys::LANGUAGE)? else {
            return Ok(Language::default());
        };
        Ok(Language::from_code(&code).unwrap_or_else(|error| {
            warn!(%error, "ignoring unknown stored language");
            Language::default()
        }))
    }

    pub fn select_language(&self, language: Language) -> Result<(), StorageError> {
        self.store.set(storage_keys::LANGUAGE, language.code())?;
        self.store.set(storage_keys::HAS_SELECTED_LANGUAGE, "true")
    }

    /// Mark the introduction as seen.
    pub fn complete(&self) -> Result<(), StorageError> {
        self.store.set(storage_keys::ONBOARDING_COMPLETE, "true")
    }

    pub fn location_permission(&self) -> Result<LocationPermission, StorageError> {
        let Some(raw) = self.store.get(storage_keys::PERMISSION_LOCATION)? else {
            return Ok(LocationPermission::Prompt);
        };
        Ok(raw.parse().unwrap_or_else(|error: String| {
            warn!(%error, "ignoring unreadable location permission");
            LocationPermission::Prompt
        }))
    }

    pub fn set_location_permission(
        &self,
        permission: LocationPermission,
    ) -> Result<(), StorageError> {
        self.store
            .set(storage_keys::PERMISSION_LOCATION, permission.as_str())
    }

    /// Record this launch and return its timestamp.
    pub fn touch(&self) -> Result<DateTime<Utc>, StorageError> {
        let now = self.clock.utc();
        self.store
            .set(storage_keys::LAST_OPENED, &now.to_rfc3339())?;
        Ok(now)
    }

    pub fn last_opened(&self) -> Result<Option<DateTime<Utc>>, StorageError> {
        let Some(raw) = self.store.get(storage_keys::LAST_OPENED)? else {
            return Ok(None);
        };
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(at) => Ok(Some(at.with_timezone(&Utc))),
            Err(error) => {
                warn!(%error, "ignoring unreadable last-opened timestamp");
                Ok(None)
            }
        }
    }

    fn flag(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self
            .store
            .get(key)?
            .is_some_and(|raw| raw.trim() == "true"))
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::outbound::storage::InMemoryStore;
    use crate::test_support::{FixtureClock, fixture_timestamp};

    type Flow = Onboarding<InMemoryStore>;

    #[fixture]
    fn store() -> Arc<InMemoryStore> {
        Arc::new(InMemoryStore::default())
    }

    fn flow(store: &Arc<InMemoryStore>) -> Flow {
        Onboarding::new(store.clone(), Arc::new(FixtureClock::at(fixture_timestamp())))
    }

    #[rstest]
    fn first_run_starts_at_language_selection(store: Arc<InMemoryStore>) {
        let state = flow(&store).state().expect("state");
        assert_eq!(state.language, Language::English);
        assert_eq!(state.location_permission, LocationPermission::Prompt);
        assert_eq!(state.next_step(), OnboardingStep::LanguageSelection);
    }

    #[rstest]
    fn steps_advance_in_order(store: Arc<InMemoryStore>) {
        let flow = flow(&store);

        flow.select_language(Language::Swahili).expect("language");
        assert_eq!(flow.next_step().expect("step"), OnboardingStep::Introduction);
        assert_eq!(store.get("language").expect("get").as_deref(), Some("sw"));

        flow.complete().expect("complete");
        assert_eq!(flow.next_step().expect("step"), OnboardingStep::Permissions);

        flow.set_location_permission(LocationPermission::Denied)
            .expect("permission");
        assert_eq!(flow.next_step().expect("step"), OnboardingStep::Done);
        assert_eq!(
            store.get("permission_location").expect("get").as_deref(),
            Some("denied")
        );
    }

    #[rstest]
    fn touch_stores_rfc3339(store: Arc<InMemoryStore>) {
        let flow = flow(&store);
        assert!(flow.last_opened().expect("read").is_none());

        let at = flow.touch().expect("touch");
        assert_eq!(at, fixture_timestamp());
        assert_eq!(flow.last_opened().expect("read"), Some(fixture_timestamp()));
    }

    #[rstest]
    fn unreadable_values_fall_back_to_defaults(store: Arc<InMemoryStore>) {
        store.set("language", "klingon").expect("seed");
        store.set("permission_location", "maybe").expect("seed");
        store.set("lastOpened", "yesterday").expect("seed");

        let state = flow(&store).state().expect("state");
        assert_eq!(state.language, Language::English);
        assert_eq!(state.location_permission, LocationPermission::Prompt);
        assert!(state.last_opened.is_none());
    }
}
