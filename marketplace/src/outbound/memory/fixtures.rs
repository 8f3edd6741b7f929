//! Demo brokers around central Dar es Salaam.

use uuid::Uuid;

use crate::domain::{BrokerProfile, PriceTier, UserId};

/// A broker profile pinned to a location.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryEntry {
    pub profile: BrokerProfile,
    pub latitude: f64,
    pub longitude: f64,
}

struct Seed {
    id: u128,
    name: &'static str,
    specialties: &'static [&'static str],
    rating: f64,
    review_count: u32,
    verified: bool,
    online: bool,
    price_level: PriceTier,
    latitude: f64,
    longitude: f64,
}

const SEEDS: [Seed; 6] = [
    Seed {
        id: 0x6f1c_0f5e_5a0e_4d4b_9e55_0c8a_1f00_0001,
        name: "Amina Mwakasege",
        specialties: &["Real Estate", "Land"],
        rating: 4.8,
        review_count: 42,
        verified: true,
        online: true,
        price_level: PriceTier::Medium,
        latitude: -6.7735,
        longitude: 39.2400,
    },
    Seed {
        id: 0x6f1c_0f5e_5a0e_4d4b_9e55_0c8a_1f00_0002,
        name: "Juma Motors",
        specialties: &["Car Sales", "Car Rental"],
        rating: 4.2,
        review_count: 18,
        verified: true,
        online: false,
        price_level: PriceTier::High,
        latitude: -6.8161,
        longitude: 39.2803,
    },
    Seed {
        id: 0x6f1c_0f5e_5a0e_4d4b_9e55_0c8a_1f00_0003,
        name: "Neema Homes",
        specialties: &["House Rent", "Property Management"],
        rating: 4.6,
        review_count: 27,
        verified: false,
        online: true,
        price_level: PriceTier::Low,
        latitude: -6.7924,
        longitude: 39.2083,
    },
    Seed {
        id: 0x6f1c_0f5e_5a0e_4d4b_9e55_0c8a_1f00_0004,
        name: "Baraka Commercial Spaces",
        specialties: &["Commercial", "Office Space"],
        rating: 3.9,
        review_count: 9,
        verified: true,
        online: false,
        price_level: PriceTier::High,
        latitude: -6.8235,
        longitude: 39.2695,
    },
    Seed {
        id: 0x6f1c_0f5e_5a0e_4d4b_9e55_0c8a_1f00_0005,
        name: "Zawadi Plots",
        specialties: &["Land", "Surveying"],
        rating: 4.5,
        review_count: 14,
        verified: true,
        online: true,
        price_level: PriceTier::Medium,
        latitude: -6.6500,
        longitude: 39.1800,
    },
    Seed {
        id: 0x6f1c_0f5e_5a0e_4d4b_9e55_0c8a_1f00_0006,
        name: "Kariakoo Car Hire",
        specialties: &["Car Rental"],
        rating: 3.4,
        review_count: 6,
        verified: false,
        online: true,
        price_level: PriceTier::Low,
        latitude: -6.8190,
        longitude: 39.2730,
    },
];

/// Fixed demo brokers with stable ids.
pub fn demo_brokers() -> Vec<DirectoryEntry> {
    SEEDS
        .iter()
        .map(|seed| DirectoryEntry {
            profile: BrokerProfile {
                id: UserId::from_uuid(Uuid::from_u128(seed.id)),
                name: seed.name.to_owned(),
                avatar: None,
                rating: seed.rating,
                review_count: seed.review_count,
                distance: String::new(),
                specialties: seed.specialties.iter().map(|s| (*s).to_owned()).collect(),
                verified: seed.verified,
                online: seed.online,
                price_level: seed.price_level,
            },
            latitude: seed.latitude,
            longitude: seed.longitude,
        })
        .collect()
}
