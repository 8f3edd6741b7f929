//! Change feed adapters.

mod broadcast;
mod supabase;

pub use broadcast::{BroadcastChangeFeed, DEFAULT_CHANNEL_CAPACITY};
pub use supabase::{DEFAULT_HEARTBEAT, SupabaseChangeFeed};
