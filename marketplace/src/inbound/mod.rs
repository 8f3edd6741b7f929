//! Inbound adapters that translate user input into domain service calls.

pub mod cli;
