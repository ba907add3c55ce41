//! Australian Property Intelligence command-line client.
//!
//! Asks the analysis API about property, keeps the session's questions and
//! generated images in a durable local store, and exports the session as a
//! paginated PDF report, a printable HTML page, or a size-bounded email
//! attachment.

mod api;
mod cli;
mod config;
mod confirm;
mod error;
mod export;
mod logging;
mod models;
mod notify;
mod store;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use cli::{execute, Cli};
use notify::StderrSink;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    // Failures have already been shown as notifications.
    match execute(cli, Arc::new(StderrSink)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
