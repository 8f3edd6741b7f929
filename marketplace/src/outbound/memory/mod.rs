//! In-process adapters for every data port.
//!
//! Used by offline runs of the CLI and by behaviour tests. Mutations are
//! published to an optional [`BroadcastChangeFeed`] so realtime subscribers
//! see them as they would from the hosted backend.
//!
//! [`BroadcastChangeFeed`]: crate::outbound::realtime::BroadcastChangeFeed

mod fixtures;
mod marketplace;

pub use fixtures::{DirectoryEntry, demo_brokers};
pub use marketplace::{InMemoryMarketplace, MarketplaceSnapshot};
