//! Key-value store persisted as one JSON document on disk.

use std::collections::BTreeMap;
use std::io;
use std::sync::{Mutex, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs::Dir;
use tracing::debug;

use super::atomic_io::write_atomic;
use crate::domain::ports::{KeyValueStore, StorageError};

/// Name of the document inside the data directory.
pub const STORAGE_FILE: &str = "storage.json";

/// Store backed by `<data_dir>/storage.json`.
///
/// Every mutation rewrites the whole document atomically. A single process
/// owner is assumed; concurrent writers from other processes are not merged.
pub struct FileStore {
    dir: Dir,
    root: Utf8PathBuf,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl FileStore {
    /// Open (creating if needed) the data directory at `root`.
    pub fn open(root: impl AsRef<Utf8Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        Dir::create_ambient_dir_all(&root, ambient_authority())
            .map_err(|err| StorageError::io(format!("creating {root}: {err}")))?;
        let dir = Dir::open_ambient_dir(&root, ambient_authority())
            .map_err(|err| StorageError::io(format!("opening {root}: {err}")))?;
        Ok(Self {
            dir,
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn read_document(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let raw = match self.dir.read_to_string(STORAGE_FILE) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => {
                return Err(StorageError::io(format!(
                    "reading {}: {err}",
                    self.root.join(STORAGE_FILE)
                )));
            }
        };
        serde_json::from_str(&raw)
            .map_err(|err| StorageError::corrupt(STORAGE_FILE, err.to_string()))
    }

    fn update<F>(&self, mutate: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut document = self.read_document()?;
        if !mutate(&mut document) {
            return Ok(());
        }
        let encoded = serde_json::to_string_pretty(&document)
            .map_err(|err| StorageError::corrupt(STORAGE_FILE, err.to_string()))?;
        write_atomic(&self.dir, Utf8Path::new(STORAGE_FILE), &encoded)?;
        debug!(path = %self.root.join(STORAGE_FILE), keys = document.len(), "local storage written");
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_document()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|document| {
            document.insert(key.to_owned(), value.to_owned());
            true
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.update(|document| document.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    use super::*;

    #[fixture]
    fn data_dir() -> (TempDir, Utf8PathBuf) {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().join("dalali")).expect("utf8 path");
        (temp, root)
    }

    #[rstest]
    fn values_survive_reopening(data_dir: (TempDir, Utf8PathBuf)) {
        let (_temp, root) = data_dir;
        let store = FileStore::open(&root).expect("open");
        store.set("language", "sw").expect("set");
        store.set("onboardingComplete", "true").expect("set");
        store.remove("onboardingComplete").expect("remove");

        let reopened = FileStore::open(&root).expect("reopen");
        assert_eq!(reopened.get("language").expect("get").as_deref(), Some("sw"));
        assert!(reopened.get("onboardingComplete").expect("get").is_none());
    }

    #[rstest]
    fn missing_document_reads_as_empty(data_dir: (TempDir, Utf8PathBuf)) {
        let (_temp, root) = data_dir;
        let store = FileStore::open(&root).expect("open");
        assert!(store.get("user").expect("get").is_none());
        store.remove("user").expect("removing a missing key succeeds");
    }

    #[rstest]
    fn corrupt_document_is_reported(data_dir: (TempDir, Utf8PathBuf)) {
        let (_temp, root) = data_dir;
        let store = FileStore::open(&root).expect("open");
        store
            .dir
            .write(STORAGE_FILE, "][")
            .expect("seed corrupt file");

        let err = store.get("user").expect_err("corrupt");
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }

    #[rstest]
    fn leaves_no_temp_files_behind(data_dir: (TempDir, Utf8PathBuf)) {
        let (_temp, root) = data_dir;
        let store = FileStore::open(&root).expect("open");
        store.set("lastOpened", "2026-03-01T08:00:00Z").expect("set");

        let names: Vec<String> = store
            .dir
            .entries()
            .expect("list")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![STORAGE_FILE.to_owned()]);
    }
}
