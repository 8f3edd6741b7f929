//! `dalali` entry-point: loads settings, wires services and runs one command.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, fmt};

use marketplace::config::AppSettings;
use marketplace::inbound::cli::{Cli, CliError, Command, build_state, run, run_demo};

fn report(outcome: Result<(), CliError>) -> ExitCode {
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}

/// Application bootstrap.
#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let cli = Cli::parse();
    let mut stdout = io::stdout().lock();

    // The demo brings its own adapters and needs no settings.
    if matches!(cli.command, Command::Demo) {
        return report(run_demo(&mut stdout).await);
    }

    let state = match AppSettings::load()
        .map_err(|e| e.to_string())
        .and_then(|settings| build_state(&settings).map_err(|e| e.to_string()))
    {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "startup failed");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = state.onboarding.touch() {
        warn!(error = %e, "could not record launch time");
    }

    let outcome = run(&state, cli.command, &mut stdout).await;
    if let Err(e) = state.persist() {
        warn!(error = %e, "offline tables not saved");
    }
    report(outcome)
}
