//! Typed, restartable row-change subscriptions.
//!
//! A [`Subscription`] wraps one channel from a [`ChangeFeed`] and decodes its
//! raw payloads into [`ChangeEvent`]s. It is a plain [`Stream`], so callers
//! can drive it with `StreamExt::next`, or hand it a [`ChangeHandler`] and let
//! [`Subscription::dispatch`] forward events until the channel ends.

use std::fmt;
use std::marker::PhantomData;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::ports::{ChangeFeed, ChangeFeedError, ChangeKind, ChangeStream, RawChange};

/// A decoded row change.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent<T> {
    Insert { new: T },
    /// `old` is only present when the backend ships the full previous row.
    Update { old: Option<T>, new: T },
    Delete { old: T },
}

/// Raw payload could not be turned into a typed event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChangeDecodeError {
    #[error("{kind:?} event on {table} carried no row image")]
    MissingRow { table: String, kind: ChangeKind },
    #[error("{kind:?} event on {table} has an unexpected row shape: {message}")]
    Payload {
        table: String,
        kind: ChangeKind,
        message: String,
    },
}

impl<T: DeserializeOwned> ChangeEvent<T> {
    /// Decode a raw payload by its operation tag.
    pub fn decode(raw: RawChange) -> Result<Self, ChangeDecodeError> {
        let RawChange {
            table,
            kind,
            old,
            new,
        } = raw;
        let required = |image: Option<Value>| -> Result<T, ChangeDecodeError> {
            let value = image.ok_or_else(|| ChangeDecodeError::MissingRow {
                table: table.clone(),
                kind,
            })?;
            serde_json::from_value(value).map_err(|err| ChangeDecodeError::Payload {
                table: table.clone(),
                kind,
                message: err.to_string(),
            })
        };
        match kind {
            ChangeKind::Insert => Ok(Self::Insert { new: required(new)? }),
            ChangeKind::Update => Ok(Self::Update {
                // Partial previous images (primary key only) decode to `None`.
                old: old.and_then(|value| serde_json::from_value(value).ok()),
                new: required(new)?,
            }),
            ChangeKind::Delete => Ok(Self::Delete { old: required(old)? }),
        }
    }
}

impl<T> ChangeEvent<T> {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Self::Insert { .. } => ChangeKind::Insert,
            Self::Update { .. } => ChangeKind::Update,
            Self::Delete { .. } => ChangeKind::Delete,
        }
    }
}

/// Malformed `column=eq.value` filter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid change filter '{input}': expected column=eq.value")]
pub struct ChangeFilterParseError {
    input: String,
}

/// Column-equals-value narrowing applied by the feed before delivery.
///
/// # Examples
/// ```
/// use marketplace::domain::ChangeFilter;
///
/// let filter: ChangeFilter = "client_id=eq.42".parse().unwrap();
/// assert_eq!(filter.column(), "client_id");
/// assert_eq!(filter.value(), "42");
/// assert_eq!(filter.to_string(), "client_id=eq.42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeFilter {
    column: String,
    value: String,
}

impl ChangeFilter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether a row image satisfies the filter.
    ///
    /// Non-string columns compare by their JSON text, so `eq.5` matches `5`.
    pub fn matches(&self, row: &Value) -> bool {
        match row.get(&self.column) {
            Some(Value::String(text)) => text == &self.value,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

impl fmt::Display for ChangeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=eq.{}", self.column, self.value)
    }
}

impl FromStr for ChangeFilter {
    type Err = ChangeFilterParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ChangeFilterParseError {
            input: s.to_owned(),
        };
        let (column, rest) = s.split_once('=').ok_or_else(invalid)?;
        let value = rest.strip_prefix("eq.").ok_or_else(invalid)?;
        let column = column.trim();
        let valid_column = !column.is_empty()
            && column
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
        if !valid_column || value.is_empty() {
            return Err(invalid());
        }
        Ok(Self::eq(column, value))
    }
}

/// Callbacks for decoded changes. Every method defaults to a no-op.
pub trait ChangeHandler<T> {
    fn on_insert(&mut self, _new: T) {}

    fn on_update(&mut self, _old: Option<T>, _new: T) {}

    fn on_delete(&mut self, _old: T) {}
}

/// One live channel on a table, yielding typed events.
pub struct Subscription<T> {
    feed: Arc<dyn ChangeFeed>,
    table: String,
    filter: Option<ChangeFilter>,
    stream: Option<ChangeStream>,
    _rows: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("table", &self.table)
            .field("filter", &self.filter)
            .field("open", &self.stream.is_some())
            .finish_non_exhaustive()
    }
}

impl<T> Subscription<T> {
    /// Open a channel on `table`.
    pub fn open(
        feed: Arc<dyn ChangeFeed>,
        table: impl Into<String>,
        filter: Option<ChangeFilter>,
    ) -> Result<Self, ChangeFeedError> {
        let table = table.into();
        let stream = feed.subscribe(&table, filter.as_ref())?;
        debug!(%table, filter = ?filter.as_ref().map(ToString::to_string), "subscribed to changes");
        Ok(Self {
            feed,
            table,
            filter,
            stream: Some(stream),
            _rows: PhantomData,
        })
    }

    /// Replace the channel on the same table, optionally with a new filter.
    ///
    /// The previous channel is dropped before the new one opens. On error the
    /// subscription is left closed. Handlers are supplied per
    /// [`Self::dispatch`] call, so swapping callbacks needs no restart.
    pub fn restart(&mut self, filter: Option<ChangeFilter>) -> Result<(), ChangeFeedError> {
        let table = self.table.clone();
        self.restart_on(table, filter)
    }

    /// Replace the channel with one on `table` and `filter`.
    ///
    /// Same teardown order as [`Self::restart`].
    pub fn restart_on(
        &mut self,
        table: impl Into<String>,
        filter: Option<ChangeFilter>,
    ) -> Result<(), ChangeFeedError> {
        self.stream = None;
        self.table = table.into();
        self.filter = filter;
        let stream = self.feed.subscribe(&self.table, self.filter.as_ref())?;
        self.stream = Some(stream);
        debug!(table = %self.table, "restarted change subscription");
        Ok(())
    }

    /// Close the channel. Further polls yield `None`.
    pub fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!(table = %self.table, "closed change subscription");
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Server-side filter of the current channel.
    ///
    /// Not named `filter`: that would be shadowed by `StreamExt::filter`.
    pub fn change_filter(&self) -> Option<&ChangeFilter> {
        self.filter.as_ref()
    }
}

impl<T: DeserializeOwned> Subscription<T> {
    /// Forward events to `handler` until the channel ends.
    ///
    /// Undecodable payloads are logged and skipped. Returns the number of
    /// events delivered.
    pub async fn dispatch<H>(&mut self, handler: &mut H) -> usize
    where
        H: ChangeHandler<T> + ?Sized,
    {
        let mut delivered = 0;
        while let Some(event) = self.next().await {
            match event {
                Ok(ChangeEvent::Insert { new }) => handler.on_insert(new),
                Ok(ChangeEvent::Update { old, new }) => handler.on_update(old, new),
                Ok(ChangeEvent::Delete { old }) => handler.on_delete(old),
                Err(error) => {
                    warn!(table = %self.table, %error, "skipping undecodable change");
                    continue;
                }
            }
            delivered += 1;
        }
        delivered
    }
}

impl<T: DeserializeOwned> Stream for Subscription<T> {
    type Item = Result<ChangeEvent<T>, ChangeDecodeError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(stream) = this.stream.as_mut() else {
            return Poll::Ready(None);
        };
        match stream.as_mut().poll_next(cx) {
            Poll::Ready(None) => {
                this.stream = None;
                Poll::Ready(None)
            }
            Poll::Ready(Some(raw)) => Poll::Ready(Some(ChangeEvent::decode(raw))),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests;
