#![warn(clippy::pedantic)]

//! # bina
//!
//! Installs the prebuilt binary of a GitHub release that matches the host.
//!
//! The release-metadata service resolves the version and the per-platform
//! asset URLs and hands them over as an install plan (JSON or TOML). `bina`
//! detects the host, picks the asset, downloads and unpacks it, and copies the
//! executable into the target directory, asking for elevated privileges only
//! when the directory is not writable.
//!
//! ## Subcommands
//!
//! - `install` - Run one installation from a plan
//! - `fail` - Print an error from the release-metadata service and exit 1
//! - `platform` - Print the detected platform key
//!
//! ## Examples
//!
//! ```bash
//! bina install --plan plan.json
//! BINA_PLAN=plan.toml bina install --dry-run
//! bina platform
//! ```

mod commands;
mod config;
mod errors;
mod logging;

use anyhow::Result;
use bina_installer::{ConsoleReporter, Reporter};
use clap::{Parser, Subcommand};
use commands::{fail, install, platform};
use errors::BinaError;

/// Install prebuilt binaries from GitHub releases.
#[derive(Parser)]
#[command(
    name = "bina",
    author,
    version,
    about = "Install prebuilt binaries from GitHub releases",
    after_help = "\
ENVIRONMENT VARIABLES:
    BINA_PLAN       Install plan used when --plan is not given
    GITHUB_TOKEN    Credential for private or rate-limited downloads
    BINA_LOG        Diagnostic log filter (default: warn)
    NO_COLOR        Disable colored output"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for the bina CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Install the binary described by an install plan.
    ///
    /// Detects the host platform, downloads the matching release asset,
    /// unpacks it and copies the executable into the plan's install directory.
    Install(install::InstallArgs),

    /// Report an error from the release-metadata service.
    ///
    /// Prints the message to stderr and exits with status 1.
    Fail(fail::FailArgs),

    /// Print the platform key of this host, e.g. `linux-amd64`.
    Platform,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

/// Prints a fatal error through the critical channel and returns exit code 1.
///
/// Errors that were already shown to the user are not printed again.
fn handle_error(e: &anyhow::Error) -> i32 {
    if let Some(BinaError::Reported) = e.downcast_ref::<BinaError>() {
        return 1;
    }
    tracing::debug!(error = ?e, "fatal error");
    ConsoleReporter::stdio().crit(&fatal_message(e));
    1
}

/// Joins the error chain into one line.
///
/// Causes already spelled out by an outer message are skipped.
fn fatal_message(e: &anyhow::Error) -> String {
    let mut message = e.to_string();
    for cause in e.chain().skip(1) {
        let cause = cause.to_string();
        if !message.contains(&cause) {
            message.push_str(": ");
            message.push_str(&cause);
        }
    }
    message
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Install(args) => install::execute(&args).await,
        Commands::Fail(args) => {
            logging::init(false);
            fail::execute(&args)
        }
        Commands::Platform => {
            logging::init(false);
            platform::execute()
        }
    }
}
