//! Application core of the Dalali Kiganjani broker marketplace.
//!
//! [`domain`] holds the types, services and ports; [`outbound`] implements
//! the ports against local storage, Supabase and in-process channels;
//! [`inbound`] drives the services from the `dalali` command line.

pub mod config;
pub mod domain;
pub mod inbound;
pub mod outbound;

#[cfg(test)]
pub(crate) mod test_support;
