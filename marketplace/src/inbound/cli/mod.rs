//! Command-line adapter.
//!
//! [`Cli`] parses arguments, [`build_state`] wires services for the
//! configured backend and [`run`] executes one command, printing JSON.

mod args;
mod commands;
mod demo;
mod state;

pub use args::{
    BrokerSearchArgs, Cli, Command, ListingArgs, ListingCommand, OnboardingCommand, ProviderArg,
    RequestCommand, ReviewCommand, SignupArgs, SocialLoginArgs,
};
pub use commands::{CliError, run};
pub use demo::run as run_demo;
pub use state::{CliState, CliStatePorts, StartupError, build_state};
