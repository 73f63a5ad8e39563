#![forbid(unsafe_code)]

//! Binary entrypoint that boots the firmware on a host directory.

use std::process::ExitCode;

use mote_app::{AppResult, run_app};

/// Boots the firmware and blocks until it restarts or is interrupted.
#[tokio::main]
async fn main() -> AppResult<ExitCode> {
    Ok(run_app().await?.exit_code())
}
