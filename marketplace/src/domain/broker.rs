//! Broker view model shown on discovery screens.
//!
//! Profiles are assembled from `broker_services` and `profiles` rows at the
//! adapter boundary and recomputed on every fetch; nothing here is persisted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::UserId;

/// Price range widths (TZS) below which a listing counts as `low`/`medium`.
pub const LOW_PRICE_WIDTH_MAX: u64 = 1_000_000;
/// Upper bound (exclusive) of the `medium` bucket.
pub const MEDIUM_PRICE_WIDTH_MAX: u64 = 10_000_000;

/// Coarse price bucket derived from the width of a listing's price range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceTier {
    Low,
    Medium,
    High,
}

impl PriceTier {
    /// Bucket a price range. Missing bounds count as zero width.
    ///
    /// # Examples
    /// ```
    /// use marketplace::domain::PriceTier;
    ///
    /// assert_eq!(PriceTier::from_range(Some(100_000), Some(500_000)), PriceTier::Low);
    /// assert_eq!(PriceTier::from_range(Some(1_000_000), Some(5_000_000)), PriceTier::Medium);
    /// assert_eq!(PriceTier::from_range(Some(0), Some(50_000_000)), PriceTier::High);
    /// assert_eq!(PriceTier::from_range(None, Some(50_000_000)), PriceTier::Low);
    /// ```
    pub fn from_range(min: Option<u64>, max: Option<u64>) -> Self {
        let width = match (min, max) {
            (Some(min), Some(max)) => max.saturating_sub(min),
            _ => 0,
        };
        if width < LOW_PRICE_WIDTH_MAX {
            Self::Low
        } else if width < MEDIUM_PRICE_WIDTH_MAX {
            Self::Medium
        } else {
            Self::High
        }
    }

    /// Lowercase wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for PriceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown price tier '{other}'")),
        }
    }
}

/// Read the leading decimal number of a distance label such as `"1.2 km"`.
///
/// Returns `None` when the label does not start with a number.
///
/// # Examples
/// ```
/// use marketplace::domain::leading_number;
///
/// assert_eq!(leading_number("1.2 km"), Some(1.2));
/// assert_eq!(leading_number("  15km"), Some(15.0));
/// assert_eq!(leading_number("nearby"), None);
/// ```
pub fn leading_number(label: &str) -> Option<f64> {
    let trimmed = label.trim_start();
    let mut end = 0;
    let mut seen_dot = false;
    for (index, ch) in trimmed.char_indices() {
        match ch {
            '0'..='9' => end = index + 1,
            '.' if !seen_dot => seen_dot = true,
            '-' | '+' if index == 0 => {}
            _ => break,
        }
    }
    trimmed.get(..end)?.parse::<f64>().ok()
}

/// Broker profile as rendered in the discovery list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerProfile {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
    /// Average rating in `0.0..=5.0`.
    pub rating: f64,
    pub review_count: u32,
    /// Distance label including its unit, e.g. `"1.2 km"`.
    pub distance: String,
    #[serde(default)]
    pub specialties: Vec<String>,
    pub verified: bool,
    pub online: bool,
    pub price_level: PriceTier,
}

impl BrokerProfile {
    /// Numeric distance in kilometres, when the label starts with a number.
    pub fn distance_km(&self) -> Option<f64> {
        leading_number(&self.distance)
    }
}
