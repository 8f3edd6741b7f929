//! In-process change feed over a tokio broadcast channel.
//!
//! Every subscriber gets its own receiver, so channels are independent.
//! Table and row filters are applied before delivery and nothing is
//! replayed: a subscriber only sees changes published after it subscribed.
//! A receiver that falls behind skips the overwritten changes and carries on.

use std::sync::{Mutex, MutexGuard, PoisonError};

use futures_util::stream;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::domain::ChangeFilter;
use crate::domain::ports::{ChangeFeed, ChangeFeedError, ChangeKind, ChangeStream, RawChange};

/// Buffered changes per subscriber before the oldest are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Publishes row changes to in-process subscribers.
pub struct BroadcastChangeFeed {
    sender: Mutex<Option<broadcast::Sender<RawChange>>>,
}

impl Default for BroadcastChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl BroadcastChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Mutex::new(Some(sender)),
        }
    }

    fn sender(&self) -> MutexGuard<'_, Option<broadcast::Sender<RawChange>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver `change` to current subscribers. Returns how many receivers
    /// were live; zero when nobody listens or the feed is closed.
    pub fn publish(&self, change: RawChange) -> usize {
        let Some(sender) = self.sender().clone() else {
            return 0;
        };
        sender.send(change).unwrap_or(0)
    }

    /// Serialise row images and publish them as a change on `table`.
    pub fn publish_row<T: Serialize>(
        &self,
        table: &str,
        kind: ChangeKind,
        old: Option<&T>,
        new: Option<&T>,
    ) -> Result<usize, serde_json::Error> {
        let change = RawChange {
            table: table.to_owned(),
            kind,
            old: old.map(serde_json::to_value).transpose()?,
            new: new.map(serde_json::to_value).transpose()?,
        };
        Ok(self.publish(change))
    }

    /// Shut the feed down. Open streams end and new subscriptions fail.
    pub fn close(&self) {
        if self.sender().take().is_some() {
            debug!("change feed closed");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender()
            .as_ref()
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

struct Channel {
    receiver: broadcast::Receiver<RawChange>,
    table: String,
    filter: Option<ChangeFilter>,
}

impl Channel {
    fn admits(&self, change: &RawChange) -> bool {
        change.table == self.table
            && self
                .filter
                .as_ref()
                .is_none_or(|filter| change.row().is_some_and(|row| filter.matches(row)))
    }
}

impl ChangeFeed for BroadcastChangeFeed {
    fn subscribe(
        &self,
        table: &str,
        filter: Option<&ChangeFilter>,
    ) -> Result<ChangeStream, ChangeFeedError> {
        let receiver = self
            .sender()
            .as_ref()
            .map(broadcast::Sender::subscribe)
            .ok_or(ChangeFeedError::Closed)?;
        let channel = Channel {
            receiver,
            table: table.to_owned(),
            filter: filter.cloned(),
        };
        Ok(Box::pin(stream::unfold(channel, |mut channel| async move {
            loop {
                match channel.receiver.recv().await {
                    Ok(change) if channel.admits(&change) => return Some((change, channel)),
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(table = %channel.table, skipped, "change subscriber lagged");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })))
    }
}
