//! Error reporter command.
//!
//! Used when the release-metadata service could not produce a plan, e.g.
//! because the repository has no release. The message is printed and nothing
//! else happens.

use anyhow::Result;
use bina_installer::report::server_error;
use bina_installer::{ConsoleReporter, Reporter};
use clap::Args;

use crate::errors::BinaError;

/// Arguments for the fail command.
#[derive(Args)]
pub struct FailArgs {
    /// Message to print; multiple words are joined with spaces.
    #[clap(required = true, num_args = 1..)]
    pub message: Vec<String>,
}

/// Prints the message through the critical channel.
///
/// # Errors
///
/// Always returns [`BinaError::Reported`] so the process exits with status 1.
pub fn execute(args: &FailArgs) -> Result<()> {
    ConsoleReporter::stdio().crit(&server_error(&args.message.join(" ")));
    Err(BinaError::Reported.into())
}
