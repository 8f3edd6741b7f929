//! Search analytics that never interfere with the search itself.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::ports::{SearchLog, SearchLogRepository};
use crate::domain::{BrokerFilters, UserId};

/// Records executed searches, swallowing failures.
pub struct SearchLogger<L: ?Sized> {
    sink: Arc<L>,
}

impl<L> SearchLogger<L>
where
    L: SearchLogRepository + ?Sized,
{
    pub fn new(sink: Arc<L>) -> Self {
        Self { sink }
    }

    /// Record one search. Returns whether the entry was written.
    pub async fn record(
        &self,
        user_id: Option<&UserId>,
        filters: &BrokerFilters,
        results_count: usize,
    ) -> bool {
        let filters_json = serde_json::to_value(filters).unwrap_or_else(|error| {
            debug!(%error, "search filters not serialisable; logging without them");
            Value::Null
        });
        let entry = SearchLog {
            user_id: user_id.cloned(),
            search_query: filters.query.trim().to_owned(),
            filters: filters_json,
            results_count,
        };
        match self.sink.record(&entry).await {
            Ok(()) => true,
            Err(error) => {
                warn!(%error, "failed to record search");
                false
            }
        }
    }
}
