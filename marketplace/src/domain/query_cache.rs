//! Keyed read cache with explicit invalidation.
//!
//! Reads go through [`QueryCache::fetch`], which records a `{data, loading,
//! error}` [`Resource`] per [`QueryKey`]. Mutations implement [`Invalidates`]
//! to name the keys they make stale; services then re-fetch those keys in
//! full.
//!
//! Each fetch takes a generation number when it starts. A result arriving
//! after a newer fetch has started for the same key is discarded, so a slow
//! stale response never overwrites a fresher one.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use super::{Error, Role, UserId};

/// Identity of a cached read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    ServiceListings { broker_id: UserId },
    ClientRequests { client_id: UserId },
    BrokerRequests { broker_id: UserId },
    Reviews { reviewed_id: UserId },
    BrokerRating { broker_id: UserId },
    Routes { role: Option<Role> },
}

/// Implemented by mutations to declare the reads they make stale.
pub trait Invalidates {
    fn invalidates(&self) -> Vec<QueryKey>;
}

/// Read state exposed to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<Error>,
}

impl<T> Default for Resource<T> {
    fn default() -> Self {
        Self {
            data: None,
            loading: false,
            error: None,
        }
    }
}

impl<T> Resource<T> {
    pub fn is_ready(&self) -> bool {
        self.data.is_some() && !self.loading
    }
}

#[derive(Debug)]
struct Entry<T> {
    resource: Resource<T>,
    generation: u64,
    stale: bool,
}

impl<T> Default for Entry<T> {
    fn default() -> Self {
        Self {
            resource: Resource::default(),
            generation: 0,
            stale: false,
        }
    }
}

/// Resources keyed by [`QueryKey`].
#[derive(Debug)]
pub struct QueryCache<T> {
    entries: Mutex<HashMap<QueryKey, Entry<T>>>,
}

impl<T> Default for QueryCache<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> QueryCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the resource for `key`; idle and empty when never fetched.
    pub fn get(&self, key: &QueryKey) -> Resource<T> {
        self.entries()
            .get(key)
            .map(|entry| entry.resource.clone())
            .unwrap_or_default()
    }

    /// Run `load` for `key` and record its outcome.
    ///
    /// Errors land in [`Resource::error`] and leave earlier data in place.
    pub async fn fetch<F, Fut>(&self, key: QueryKey, load: F) -> Resource<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let generation = self.begin(&key);
        let outcome = load().await;
        self.settle(&key, generation, outcome)
    }

    fn begin(&self, key: &QueryKey) -> u64 {
        let mut entries = self.entries();
        let entry = entries.entry(key.clone()).or_default();
        entry.generation += 1;
        entry.resource.loading = true;
        entry.generation
    }

    fn settle(&self, key: &QueryKey, generation: u64, outcome: Result<T, Error>) -> Resource<T> {
        let mut entries = self.entries();
        let entry = entries.entry(key.clone()).or_default();
        if entry.generation != generation {
            debug!(?key, generation, latest = entry.generation, "discarding stale fetch result");
            return entry.resource.clone();
        }
        match outcome {
            Ok(data) => {
                entry.resource.data = Some(data);
                entry.resource.error = None;
            }
            Err(error) => entry.resource.error = Some(error),
        }
        entry.resource.loading = false;
        entry.stale = false;
        entry.resource.clone()
    }

    /// Mark `key` stale. Returns whether it was cached and needs a re-fetch.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        match self.entries().get_mut(key) {
            Some(entry) => {
                entry.stale = true;
                true
            }
            None => false,
        }
    }

    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.entries().get(key).is_some_and(|entry| entry.stale)
    }

    /// Drop every entry, e.g. on logout.
    pub fn clear(&self) {
        self.entries().clear();
    }
}
