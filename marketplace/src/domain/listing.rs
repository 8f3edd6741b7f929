//! Services a broker offers (`broker_services` rows).

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::{PriceTier, UserId};

/// Listing validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListingValidationError {
    #[error("listing title must not be empty")]
    EmptyTitle,
    #[error("listing category must not be empty")]
    EmptyCategory,
    #[error("minimum price {min} exceeds maximum price {max}")]
    InvertedPriceRange { min: u64, max: u64 },
}

/// Broker input for creating or replacing a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewServiceListing {
    pub category: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price_min: Option<u64>,
    #[serde(default)]
    pub price_max: Option<u64>,
    #[serde(default)]
    pub location: Option<String>,
}

impl NewServiceListing {
    /// Trim text fields and check the price range.
    pub fn validate(mut self) -> Result<Self, ListingValidationError> {
        self.title = self.title.trim().to_owned();
        self.category = self.category.trim().to_owned();
        if self.title.is_empty() {
            return Err(ListingValidationError::EmptyTitle);
        }
        if self.category.is_empty() {
            return Err(ListingValidationError::EmptyCategory);
        }
        if let (Some(min), Some(max)) = (self.price_min, self.price_max) {
            if min > max {
                return Err(ListingValidationError::InvertedPriceRange { min, max });
            }
        }
        self.description = self.description.trim().to_owned();
        self.location = self
            .location
            .map(|l| l.trim().to_owned())
            .filter(|l| !l.is_empty());
        Ok(self)
    }
}

/// A published listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceListing {
    pub id: Uuid,
    pub broker_id: UserId,
    pub category: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price_min: Option<u64>,
    #[serde(default)]
    pub price_max: Option<u64>,
    #[serde(default)]
    pub location: Option<String>,
    pub active: bool,
}

impl ServiceListing {
    /// Publish a validated draft for `broker_id`.
    pub fn publish(broker_id: UserId, draft: NewServiceListing) -> Result<Self, ListingValidationError> {
        let draft = draft.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            broker_id,
            category: draft.category,
            title: draft.title,
            description: draft.description,
            price_min: draft.price_min,
            price_max: draft.price_max,
            location: draft.location,
            active: true,
        })
    }

    /// Overwrite the editable fields with a validated draft.
    pub fn apply(&mut self, draft: NewServiceListing) -> Result<(), ListingValidationError> {
        let draft = draft.validate()?;
        self.category = draft.category;
        self.title = draft.title;
        self.description = draft.description;
        self.price_min = draft.price_min;
        self.price_max = draft.price_max;
        self.location = draft.location;
        Ok(())
    }

    pub fn price_tier(&self) -> PriceTier {
        PriceTier::from_range(self.price_min, self.price_max)
    }
}
