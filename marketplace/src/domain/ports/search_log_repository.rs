//! Port for recording broker searches in `search_logs`.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::domain::UserId;

use super::define_port_error;

define_port_error! {
    /// Errors raised by search log adapters.
    pub enum SearchLogError {
        /// The log write did not complete.
        Write { message: String } => "search log write failed: {message}",
    }
}

/// One executed search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchLog {
    pub user_id: Option<UserId>,
    pub search_query: String,
    pub filters: Value,
    pub results_count: usize,
}

/// Append-only search analytics sink.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchLogRepository: Send + Sync {
    async fn record(&self, entry: &SearchLog) -> Result<(), SearchLogError>;
}
