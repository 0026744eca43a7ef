//! Install command for the bina CLI.
//!
//! ## Usage
//!
//! ```bash
//! bina install --plan plan.json
//! bina install --plan plan.toml --dry-run
//! BINA_PLAN=plan.json GITHUB_TOKEN=... bina install
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use bina_installer::download::DEFAULT_INACTIVITY_TIMEOUT;
use bina_installer::{
    ConsoleReporter, DownloadOptions, HostInfo, Outcome, RunOptions, Session, credential_from_env,
};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::load_plan;
use crate::errors::BinaError;
use crate::logging;

/// Arguments for the install command.
#[derive(Args)]
pub struct InstallArgs {
    /// Install plan produced by the release-metadata service (JSON or TOML).
    #[clap(long, env = "BINA_PLAN", value_name = "FILE")]
    pub plan: Option<PathBuf>,

    /// Credential for the download; overrides the plan and `GITHUB_TOKEN`.
    #[clap(long, value_name = "TOKEN")]
    pub token: Option<String>,

    /// Seconds without receiving data before the download is abandoned.
    #[clap(
        long,
        value_name = "SECS",
        default_value_t = DEFAULT_INACTIVITY_TIMEOUT.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: u64,

    /// Show what would be downloaded and installed, then stop.
    #[clap(long)]
    pub dry_run: bool,
}

/// Executes the install command.
///
/// # Process
///
/// 1. Load the plan and set up logging from its debug flag
/// 2. Resolve the credential
/// 3. Run the installation, cancelling on Ctrl-C
///
/// # Errors
///
/// Returns an error if the plan is missing or invalid, or if any stage of the
/// installation fails.
pub async fn execute(args: &InstallArgs) -> Result<()> {
    let plan_path = args.plan.as_ref().ok_or(BinaError::NoPlan)?;
    let plan = load_plan(plan_path)?;
    logging::init(plan.request.debug);
    debug!(plan = %plan_path.display(), repo = %plan.repo, "loaded install plan");

    let explicit = args.token.as_deref().or(plan.request.token.as_deref());
    let credential = credential_from_env(explicit);

    let options = RunOptions {
        dry_run: args.dry_run,
        download: DownloadOptions {
            inactivity_timeout: Duration::from_secs(args.timeout),
            ..DownloadOptions::default()
        },
        workspace_parent: None,
    };

    let reporter = ConsoleReporter::stdio();
    let mut session = Session::new(plan, &reporter, options)?.with_credential(credential);
    let host = HostInfo::detect().context("failed to detect host platform")?;

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("interrupt received, cancelling");
                cancel.cancel();
            }
        }
    });

    let outcome = session.run(&host, &cancel).await;
    watcher.abort();

    match outcome? {
        Outcome::Installed(path) => debug!(path = %path.display(), "installed"),
        Outcome::DryRun { url, .. } => debug!(url = %url, "dry run finished"),
    }
    Ok(())
}
