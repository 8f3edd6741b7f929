//! Shared fixtures for unit tests.

use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};
use mockable::Clock;

use crate::domain::{BrokerProfile, DisplayName, PriceTier, Role, SessionToken, User, UserId};

/// Fixed instant used by clock-dependent tests.
pub(crate) fn fixture_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0)
        .single()
        .expect("valid fixture timestamp")
}

/// Clock frozen at one instant.
pub(crate) struct FixtureClock {
    utc_now: DateTime<Utc>,
}

impl FixtureClock {
    pub(crate) fn at(utc_now: DateTime<Utc>) -> Self {
        Self { utc_now }
    }
}

impl Clock for FixtureClock {
    fn local(&self) -> DateTime<Local> {
        self.utc_now.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.utc_now
    }
}

pub(crate) fn fixture_clock() -> Arc<dyn Clock> {
    Arc::new(FixtureClock::at(fixture_timestamp()))
}

/// Signed-in user with the given role.
pub(crate) fn signed_in(role: Role) -> User {
    User::new(
        UserId::random(),
        DisplayName::new("Fixture User").expect("fixture name"),
        role,
        SessionToken::new("fixture-token"),
    )
}

/// Broker profile with sensible defaults.
pub(crate) fn broker_profile(name: &str, specialties: &[&str], rating: f64) -> BrokerProfile {
    BrokerProfile {
        id: UserId::random(),
        name: name.to_owned(),
        avatar: None,
        rating,
        review_count: 3,
        distance: "1.2 km".to_owned(),
        specialties: specialties.iter().map(|s| (*s).to_owned()).collect(),
        verified: true,
        online: false,
        price_level: PriceTier::Medium,
    }
}
