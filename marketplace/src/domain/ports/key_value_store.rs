//! Port for the device-local key-value store.
//!
//! Values are raw JSON strings keyed by the storage keys in
//! [`crate::domain::storage_keys`]. Adapters are synchronous: the store is
//! local and small, matching browser storage semantics.

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::define_port_error;

define_port_error! {
    /// Errors raised by key-value store adapters.
    pub enum StorageError {
        /// The backing medium could not be read or written.
        Io { message: String } => "local storage unavailable: {message}",
        /// A stored value was not valid JSON for the requested type.
        Corrupt { key: String, message: String } =>
            "stored value for '{key}' is unreadable: {message}",
    }
}

/// Raw string storage keyed by name.
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` when absent.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove a value. Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Read and decode a JSON value.
pub fn load_json<S, T>(store: &S, key: &str) -> Result<Option<T>, StorageError>
where
    S: KeyValueStore + ?Sized,
    T: DeserializeOwned,
{
    store
        .get(key)?
        .map(|raw| {
            serde_json::from_str(&raw).map_err(|err| StorageError::corrupt(key, err.to_string()))
        })
        .transpose()
}

/// Encode and write a JSON value.
pub fn save_json<S, T>(store: &S, key: &str, value: &T) -> Result<(), StorageError>
where
    S: KeyValueStore + ?Sized,
    T: Serialize + ?Sized,
{
    let raw =
        serde_json::to_string(value).map_err(|err| StorageError::corrupt(key, err.to_string()))?;
    store.set(key, &raw)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn load_json_reports_corrupt_values() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_get()
            .withf(|key| key == "language")
            .return_once(|_| Ok(Some("not json".to_owned())));

        let err = load_json::<_, String>(&store, "language").expect_err("corrupt");
        assert!(matches!(err, StorageError::Corrupt { ref key, .. } if key == "language"));
    }

    #[rstest]
    fn load_json_passes_through_missing_keys() {
        let mut store = MockKeyValueStore::new();
        store.expect_get().return_once(|_| Ok(None));

        let value: Option<bool> = load_json(&store, "onboardingComplete").expect("load");
        assert!(value.is_none());
    }

    #[rstest]
    fn save_json_writes_encoded_value() {
        let mut store = MockKeyValueStore::new();
        store
            .expect_set()
            .withf(|key, value| key == "hasSelectedLanguage" && value == "true")
            .times(1)
            .return_once(|_, _| Ok(()));

        save_json(&store, "hasSelectedLanguage", &true).expect("save");
    }
}
