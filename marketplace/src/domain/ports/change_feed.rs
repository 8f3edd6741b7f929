//! Port for backend row-change feeds.
//!
//! One subscription covers one table, delivering insert, update and delete
//! events in backend order. Feeds never replay past events; reconnection is
//! the adapter's concern and is invisible to subscribers.

use std::pin::Pin;

use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ChangeFilter;

use super::define_port_error;

define_port_error! {
    /// Errors raised when opening a change feed.
    pub enum ChangeFeedError {
        /// The feed has shut down.
        Closed => "change feed is closed",
        /// The backend refused the subscription.
        Rejected { table: String, message: String } =>
            "subscription to {table} rejected: {message}",
    }
}

/// Operation tag carried by every change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Untyped change payload as delivered by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChange {
    pub table: String,
    #[serde(rename = "eventType")]
    pub kind: ChangeKind,
    #[serde(default)]
    pub old: Option<Value>,
    #[serde(default)]
    pub new: Option<Value>,
}

impl RawChange {
    /// The row image a filter should be evaluated against.
    pub fn row(&self) -> Option<&Value> {
        match self.kind {
            ChangeKind::Delete => self.old.as_ref(),
            ChangeKind::Insert | ChangeKind::Update => self.new.as_ref(),
        }
    }
}

/// Stream of raw changes for one subscription.
pub type ChangeStream = Pin<Box<dyn Stream<Item = RawChange> + Send>>;

/// Source of per-table change streams.
pub trait ChangeFeed: Send + Sync {
    /// Open an independent channel for `table`, narrowed by `filter`.
    ///
    /// Dropping the returned stream closes the channel.
    fn subscribe(
        &self,
        table: &str,
        filter: Option<&ChangeFilter>,
    ) -> Result<ChangeStream, ChangeFeedError>;
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    fn decodes_supabase_shaped_payloads() {
        let raw: RawChange = serde_json::from_value(json!({
            "table": "service_requests",
            "eventType": "DELETE",
            "old": { "id": "1" },
        }))
        .expect("payload");
        assert_eq!(raw.kind, ChangeKind::Delete);
        assert!(raw.new.is_none());
        assert_eq!(raw.row(), Some(&json!({ "id": "1" })));
    }
}
