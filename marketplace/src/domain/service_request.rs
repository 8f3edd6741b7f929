//! Service requests and their status state machine.
//!
//! ```text
//! pending -> accepted -> in_progress -> completed
//!    \           \            \
//!     +-----------+------------+--> cancelled
//! ```
//!
//! `completed` and `cancelled` are terminal. History is not kept; the last
//! write wins.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::UserId;

/// Lifecycle status of a [`ServiceRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    InProgress,
    Completed,
    Cancelled,
}

impl RequestStatus {
    /// Snake-case wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether no further transitions are allowed.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// # Examples
    /// ```
    /// use marketplace::domain::RequestStatus;
    ///
    /// assert!(RequestStatus::Pending.can_transition_to(RequestStatus::Accepted));
    /// assert!(RequestStatus::InProgress.can_transition_to(RequestStatus::Cancelled));
    /// assert!(!RequestStatus::Completed.can_transition_to(RequestStatus::Cancelled));
    /// assert!(!RequestStatus::Pending.can_transition_to(RequestStatus::Completed));
    /// ```
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Accepted)
                | (Self::Accepted, Self::InProgress)
                | (Self::InProgress, Self::Completed)
                | (Self::Pending | Self::Accepted | Self::InProgress, Self::Cancelled)
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown request status '{other}'")),
        }
    }
}

/// Errors raised when building or mutating requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceRequestError {
    /// Title was blank.
    #[error("request title must not be empty")]
    EmptyTitle,
    /// A client cannot book themselves.
    #[error("a request cannot be addressed to its own client")]
    SelfRequest,
    /// The status change is not allowed by the state machine.
    #[error("cannot move request from {from} to {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },
}

/// Client input for a new request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewServiceRequest {
    pub title: String,
    pub description: String,
    pub broker_id: UserId,
    pub service_id: Uuid,
    pub proposed_price: Option<u64>,
}

/// A booking or inquiry from a client to a broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub client_id: UserId,
    pub broker_id: UserId,
    pub service_id: Uuid,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub accepted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub proposed_price: Option<u64>,
    #[serde(default)]
    pub broker_response: Option<String>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
}

impl ServiceRequest {
    /// Create a pending request for `client_id`.
    pub fn create(
        client_id: UserId,
        draft: NewServiceRequest,
        now: DateTime<Utc>,
    ) -> Result<Self, ServiceRequestError> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(ServiceRequestError::EmptyTitle);
        }
        if client_id == draft.broker_id {
            return Err(ServiceRequestError::SelfRequest);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            title: title.to_owned(),
            description: draft.description.trim().to_owned(),
            client_id,
            broker_id: draft.broker_id,
            service_id: draft.service_id,
            status: RequestStatus::Pending,
            created_at: now,
            accepted_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            proposed_price: draft.proposed_price,
            broker_response: None,
            cancellation_reason: None,
        })
    }

    /// Move to `next`, stamping the matching transition timestamp.
    pub fn transition(
        &mut self,
        next: RequestStatus,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceRequestError> {
        if !self.status.can_transition_to(next) {
            return Err(ServiceRequestError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        match next {
            RequestStatus::Accepted => self.accepted_at = Some(now),
            RequestStatus::InProgress => self.started_at = Some(now),
            RequestStatus::Completed => self.completed_at = Some(now),
            RequestStatus::Cancelled => self.cancelled_at = Some(now),
            RequestStatus::Pending => {}
        }
        self.status = next;
        Ok(())
    }

    /// Cancel with an optional reason.
    pub fn cancel(
        &mut self,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceRequestError> {
        self.transition(RequestStatus::Cancelled, now)?;
        self.cancellation_reason = reason.filter(|r| !r.trim().is_empty());
        Ok(())
    }

    /// Broker accepts with a response message and optional counter price.
    pub fn accept(
        &mut self,
        response: Option<String>,
        price: Option<u64>,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceRequestError> {
        self.transition(RequestStatus::Accepted, now)?;
        self.broker_response = response.filter(|r| !r.trim().is_empty());
        if price.is_some() {
            self.proposed_price = price;
        }
        Ok(())
    }

    /// Whether `user_id` is the client or the broker on this request.
    pub fn involves(&self, user_id: &UserId) -> bool {
        &self.client_id == user_id || &self.broker_id == user_id
    }

    /// The other party on this request, if `user_id` is one of them.
    pub fn counterparty(&self, user_id: &UserId) -> Option<&UserId> {
        if &self.client_id == user_id {
            Some(&self.broker_id)
        } else if &self.broker_id == user_id {
            Some(&self.client_id)
        } else {
            None
        }
    }
}
