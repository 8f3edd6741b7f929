//! Pure filtering of an in-memory broker list.
//!
//! A broker passes when every active criterion matches; criteria left at
//! `All` (or unset) always pass. Output preserves input order and is
//! recomputed from scratch on each call.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{BrokerProfile, PriceTier};

/// Service categories offered in the filter sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceType {
    RealEstate,
    CarSales,
    CarRental,
    Land,
    Commercial,
    Rental,
}

impl ServiceType {
    /// Every service type in display order.
    pub const ALL: [Self; 6] = [
        Self::RealEstate,
        Self::CarSales,
        Self::CarRental,
        Self::Land,
        Self::Commercial,
        Self::Rental,
    ];

    /// Kebab-case identifier used in URLs and the CLI.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RealEstate => "real-estate",
            Self::CarSales => "car-sales",
            Self::CarRental => "car-rental",
            Self::Land => "land",
            Self::Commercial => "commercial",
            Self::Rental => "rental",
        }
    }

    /// Lowercase keywords searched for in specialty tags.
    pub const fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::RealEstate => &["real estate", "property", "house", "land"],
            Self::CarSales => &["car"],
            Self::CarRental => &["rental"],
            Self::Land => &["land"],
            Self::Commercial => &["commercial"],
            Self::Rental => &["rent"],
        }
    }

    /// Whether any specialty tag contains one of this type's keywords.
    pub fn matches(self, specialties: &[String]) -> bool {
        specialties.iter().any(|tag| {
            let tag = tag.to_lowercase();
            self.keywords().iter().any(|keyword| tag.contains(keyword))
        })
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == s.trim())
            .ok_or_else(|| format!("unknown service type '{s}'"))
    }
}

/// Minimum-rating thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RatingThreshold {
    #[serde(rename = "3+")]
    ThreePlus,
    #[serde(rename = "4+")]
    FourPlus,
    #[serde(rename = "4.5+")]
    FourHalfPlus,
}

impl RatingThreshold {
    /// Inclusive lower bound on the broker rating.
    pub const fn minimum(self) -> f64 {
        match self {
            Self::ThreePlus => 3.0,
            Self::FourPlus => 4.0,
            Self::FourHalfPlus => 4.5,
        }
    }
}

impl FromStr for RatingThreshold {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "3+" => Ok(Self::ThreePlus),
            "4+" => Ok(Self::FourPlus),
            "4.5+" => Ok(Self::FourHalfPlus),
            other => Err(format!("unknown rating threshold '{other}'")),
        }
    }
}

/// Distance bounds offered in the filter sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistanceBound {
    #[serde(rename = "nearby")]
    Nearby,
    #[serde(rename = "5km")]
    FiveKm,
    #[serde(rename = "10km")]
    TenKm,
    #[serde(rename = "20km")]
    TwentyKm,
}

impl DistanceBound {
    /// Inclusive upper bound in kilometres.
    pub const fn max_km(self) -> f64 {
        match self {
            Self::Nearby => 2.0,
            Self::FiveKm => 5.0,
            Self::TenKm => 10.0,
            Self::TwentyKm => 20.0,
        }
    }

    /// Whether a parsed distance satisfies the bound.
    ///
    /// An unparsable distance never satisfies a bound: a broker whose
    /// distance label has no leading number drops out of every
    /// distance-bounded search.
    pub fn admits(self, distance_km: Option<f64>) -> bool {
        distance_km.is_some_and(|km| km <= self.max_km())
    }
}

impl FromStr for DistanceBound {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "nearby" => Ok(Self::Nearby),
            "5km" => Ok(Self::FiveKm),
            "10km" => Ok(Self::TenKm),
            "20km" => Ok(Self::TwentyKm),
            other => Err(format!("unknown distance bound '{other}'")),
        }
    }
}

/// Word standing for an unset criterion in payloads and on the command line.
pub const ALL_CRITERION: &str = "all";

/// A criterion as users type it: a concrete value or `all`.
///
/// # Examples
/// ```
/// use marketplace::domain::{Criterion, ServiceType};
///
/// let any: Criterion<ServiceType> = "all".parse().unwrap();
/// assert_eq!(any.into_option(), None);
/// let land: Criterion<ServiceType> = "land".parse().unwrap();
/// assert_eq!(land.into_option(), Some(ServiceType::Land));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Criterion<T>(pub Option<T>);

impl<T> Criterion<T> {
    pub fn into_option(self) -> Option<T> {
        self.0
    }
}

impl<T> Default for Criterion<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T: FromStr<Err = String>> FromStr for Criterion<T> {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case(ALL_CRITERION) {
            return Ok(Self(None));
        }
        s.parse().map(|value| Self(Some(value)))
    }
}

/// Serde adapter writing an unset criterion as `"all"` and reading `"all"`,
/// `null` or a missing field back as `None`.
mod criterion_serde {
    use std::fmt::Display;
    use std::str::FromStr;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::ALL_CRITERION;

    pub(super) fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(value) => value.serialize(serializer),
            None => serializer.serialize_str(ALL_CRITERION),
        }
    }

    pub(super) fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        if raw.trim().eq_ignore_ascii_case(ALL_CRITERION) {
            return Ok(None);
        }
        raw.parse().map(Some).map_err(D::Error::custom)
    }
}

/// Filter criteria; `None` means "all".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerFilters {
    #[serde(default)]
    pub query: String,
    #[serde(default, with = "criterion_serde")]
    pub service: Option<ServiceType>,
    #[serde(default, with = "criterion_serde")]
    pub rating: Option<RatingThreshold>,
    #[serde(default, with = "criterion_serde")]
    pub price: Option<PriceTier>,
    #[serde(default, with = "criterion_serde")]
    pub distance: Option<DistanceBound>,
    #[serde(default)]
    pub verified_only: bool,
}

impl BrokerFilters {
    /// Number of active criteria, for the filter badge.
    pub fn active_count(&self) -> usize {
        [
            !self.query.trim().is_empty(),
            self.service.is_some(),
            self.rating.is_some(),
            self.price.is_some(),
            self.distance.is_some(),
            self.verified_only,
        ]
        .into_iter()
        .filter(|active| *active)
        .count()
    }

    /// Clear every criterion.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Whether `broker` satisfies every active criterion.
    pub fn matches(&self, broker: &BrokerProfile) -> bool {
        self.matches_query(broker)
            && self.service.is_none_or(|service| service.matches(&broker.specialties))
            && self
                .rating
                .is_none_or(|rating| broker.rating >= rating.minimum())
            && self.price.is_none_or(|price| broker.price_level == price)
            && self
                .distance
                .is_none_or(|bound| bound.admits(broker.distance_km()))
            && (!self.verified_only || broker.verified)
    }

    fn matches_query(&self, broker: &BrokerProfile) -> bool {
        let query = self.query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        broker.name.to_lowercase().contains(&query)
            || broker
                .specialties
                .iter()
                .any(|tag| tag.to_lowercase().contains(&query))
    }
}

/// Return the brokers matching `filters`, preserving input order.
///
/// # Examples
/// ```
/// use marketplace::domain::{BrokerFilters, filter_brokers};
///
/// let filtered = filter_brokers(&[], &BrokerFilters::default());
/// assert!(filtered.is_empty());
/// ```
pub fn filter_brokers(brokers: &[BrokerProfile], filters: &BrokerFilters) -> Vec<BrokerProfile> {
    brokers
        .iter()
        .filter(|broker| filters.matches(broker))
        .cloned()
        .collect()
}
