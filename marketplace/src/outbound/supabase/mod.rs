//! Supabase outbound adapters.
//!
//! One [`SupabaseClient`] per project is shared by the GoTrue identity
//! provider and the PostgREST repositories; signing in through the provider
//! authorises later data requests as that user.

mod client;
mod dto;
mod identity;
mod repository;
mod tables;

pub use client::{HttpFailure, SupabaseClient};
pub use identity::SupabaseIdentityProvider;
pub use repository::SupabaseRepository;
