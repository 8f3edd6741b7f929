//! Outbound adapters implementing domain ports.
//!
//! - **storage**: device-local key-value stores (memory, capability-scoped file)
//! - **identity**: the offline credential store
//! - **supabase**: GoTrue auth and PostgREST tables over `reqwest`
//! - **memory**: process-local tables for offline runs
//! - **realtime**: in-process change feed on a tokio broadcast channel
//!
//! Adapters translate between domain types and wire or storage shapes. They
//! contain no business rules.

pub mod identity;
pub mod memory;
pub mod realtime;
pub mod storage;
pub mod supabase;
