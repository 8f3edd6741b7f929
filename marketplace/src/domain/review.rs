//! Post-completion reviews left by either party of a service request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::UserId;

/// Review validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewValidationError {
    #[error("rating must be between 1 and 5, got {value}")]
    RatingOutOfRange { value: u8 },
    #[error("a user cannot review themselves")]
    SelfReview,
}

/// Star rating in `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ReviewRating(u8);

impl ReviewRating {
    /// Validate a star count.
    ///
    /// # Examples
    /// ```
    /// use marketplace::domain::ReviewRating;
    ///
    /// assert!(ReviewRating::new(5).is_ok());
    /// assert!(ReviewRating::new(0).is_err());
    /// ```
    pub fn new(value: u8) -> Result<Self, ReviewValidationError> {
        if (1..=5).contains(&value) {
            Ok(Self(value))
        } else {
            Err(ReviewValidationError::RatingOutOfRange { value })
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for ReviewRating {
    type Error = ReviewValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ReviewRating> for u8 {
    fn from(value: ReviewRating) -> Self {
        value.0
    }
}

/// Reviewer input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReview {
    pub service_request_id: Uuid,
    pub rating: ReviewRating,
    pub comment: Option<String>,
    pub anonymous: bool,
}

/// A persisted review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub service_request_id: Uuid,
    pub reviewer_id: UserId,
    pub reviewed_id: UserId,
    pub rating: ReviewRating,
    #[serde(default)]
    pub comment: Option<String>,
    /// Hide the reviewer's name when rendered.
    #[serde(default)]
    pub anonymous: bool,
    pub created_at: DateTime<Utc>,
}

impl Review {
    /// Build a review of `reviewed_id` written by `reviewer_id`.
    pub fn create(
        reviewer_id: UserId,
        reviewed_id: UserId,
        draft: NewReview,
        now: DateTime<Utc>,
    ) -> Result<Self, ReviewValidationError> {
        if reviewer_id == reviewed_id {
            return Err(ReviewValidationError::SelfReview);
        }
        Ok(Self {
            id: Uuid::new_v4(),
            service_request_id: draft.service_request_id,
            reviewer_id,
            reviewed_id,
            rating: draft.rating,
            comment: normalise_comment(draft.comment),
            anonymous: draft.anonymous,
            created_at: now,
        })
    }

    /// Replace rating and comment in place.
    pub fn revise(&mut self, rating: ReviewRating, comment: Option<String>) {
        self.rating = rating;
        self.comment = normalise_comment(comment);
    }
}

fn normalise_comment(comment: Option<String>) -> Option<String> {
    comment
        .map(|c| c.trim().to_owned())
        .filter(|c| !c.is_empty())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    #[case(0, false)]
    #[case(1, true)]
    #[case(5, true)]
    #[case(6, false)]
    fn rating_bounds(#[case] value: u8, #[case] ok: bool) {
        assert_eq!(ReviewRating::new(value).is_ok(), ok);
    }

    #[rstest]
    fn rating_rejects_out_of_range_json() {
        let parsed: Result<ReviewRating, _> = serde_json::from_value(json!(9));
        assert!(parsed.is_err());
    }

    #[rstest]
    fn create_blanks_empty_comments_and_rejects_self_review() {
        let reviewer = UserId::random();
        let draft = NewReview {
            service_request_id: Uuid::new_v4(),
            rating: ReviewRating::new(4).expect("rating"),
            comment: Some("   ".to_owned()),
            anonymous: false,
        };
        let review = Review::create(reviewer.clone(), UserId::random(), draft.clone(), Utc::now())
            .expect("review");
        assert!(review.comment.is_none());

        assert_eq!(
            Review::create(reviewer.clone(), reviewer, draft, Utc::now()),
            Err(ReviewValidationError::SelfReview)
        );
    }
}
