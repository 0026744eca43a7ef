//! The installation pipeline.
//!
//! A [`Session`] walks the stages in a fixed order and stops at the first
//! failure:
//!
//! ```text
//! Start → Detect → Resolve → Download → Extract → Unwrap → Install → Done
//!                                                                 ↘ Failed
//! ```
//!
//! The cancellation token is checked before every stage and raced against
//! every download chunk. The temporary workspace is dropped on every exit path.

use std::fmt;
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::archive::{extract_archive, unwrap_root};
use crate::download::{DownloadOptions, Downloader};
use crate::errors::{InstallError, PlanError};
use crate::install::{AccessProbe, Elevation, Installer, WriteProbe, system_elevation};
use crate::platform::{HostInfo, Platform};
use crate::report::Reporter;
use crate::request::{Credential, InstallPlan};
use crate::table::{AssetMapping, SupportTable};
use crate::workspace::ExecutionContext;

/// Position of a run in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Detect,
    Resolve,
    Download,
    Extract,
    Unwrap,
    Install,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::Detect => "detect",
            Stage::Resolve => "resolve",
            Stage::Download => "download",
            Stage::Extract => "extract",
            Stage::Unwrap => "unwrap",
            Stage::Install => "install",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Knobs that do not come from the install plan.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Stop after resolving and report what would happen.
    pub dry_run: bool,
    pub download: DownloadOptions,
    /// Parent of the temporary workspace; the system temp dir when unset.
    pub workspace_parent: Option<PathBuf>,
}

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The binary now lives at this path.
    Installed(PathBuf),
    /// Nothing was touched.
    DryRun { url: String, install_dir: PathBuf },
}

/// One installation run over a validated plan.
pub struct Session<'a> {
    plan: InstallPlan,
    table: SupportTable,
    credential: Option<Credential>,
    reporter: &'a dyn Reporter,
    probe: Box<dyn WriteProbe>,
    elevation: Box<dyn Elevation>,
    options: RunOptions,
    stage: Stage,
}

impl<'a> Session<'a> {
    /// Validates the plan and prepares a run with the host's write probe and
    /// escalation strategy.
    ///
    /// # Errors
    ///
    /// Returns a [`PlanError`] if the plan's platform list has duplicate keys.
    pub fn new(
        plan: InstallPlan,
        reporter: &'a dyn Reporter,
        options: RunOptions,
    ) -> Result<Self, PlanError> {
        let table = SupportTable::new(&plan.repo, &plan.bin, &plan.platforms)?;
        Ok(Self {
            plan,
            table,
            credential: None,
            reporter,
            probe: Box::new(AccessProbe),
            elevation: system_elevation(),
            options,
            stage: Stage::Start,
        })
    }

    #[must_use]
    pub fn with_credential(mut self, credential: Option<Credential>) -> Self {
        self.credential = credential;
        self
    }

    #[must_use]
    pub fn with_probe(mut self, probe: Box<dyn WriteProbe>) -> Self {
        self.probe = probe;
        self
    }

    #[must_use]
    pub fn with_elevation(mut self, elevation: Box<dyn Elevation>) -> Self {
        self.elevation = elevation;
        self
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub fn table(&self) -> &SupportTable {
        &self.table
    }

    /// Runs the pipeline for `host`.
    ///
    /// # Errors
    ///
    /// Returns the first stage failure, or [`InstallError::Cancelled`] if
    /// `cancel` fired. The session is then in [`Stage::Failed`].
    pub async fn run(
        &mut self,
        host: &HostInfo,
        cancel: &CancellationToken,
    ) -> Result<Outcome, InstallError> {
        match self.execute(host, cancel).await {
            Ok(outcome) => {
                self.transition(Stage::Done);
                Ok(outcome)
            }
            Err(e) => {
                debug!(stage = %self.stage, error = %e, "run failed");
                self.transition(Stage::Failed);
                Err(e)
            }
        }
    }

    async fn execute(
        &mut self,
        host: &HostInfo,
        cancel: &CancellationToken,
    ) -> Result<Outcome, InstallError> {
        self.advance(Stage::Detect, cancel)?;
        debug!(os = %host.os, arch = %host.arch, "detected host");
        let platform = Platform::from_host(host)?;

        self.advance(Stage::Resolve, cancel)?;
        let mapping = self.table.resolve(&platform.key())?.clone();
        debug!(platform = %platform, url = %mapping.download_url, "resolved asset");

        // Only once the host is known to be supported.
        if self.plan.request.use_auto_generated_config {
            self.reporter.warn(&format!(
                "Using auto generated config because {} doesn't have a bina.json file in its release",
                self.plan.repo.reference()
            ));
            self.reporter.warn("This might not work for some projects");
        }

        let request = &self.plan.request;
        if request.original_version != request.resolved_version {
            self.reporter.info(&format!(
                "Resolved version {} to {}",
                request.original_version, request.resolved_version
            ));
        }

        if self.options.dry_run {
            return Ok(self.dry_run(&mapping));
        }

        let ctx = match &self.options.workspace_parent {
            Some(parent) => ExecutionContext::new_in(parent, &mapping.asset_file_name)?,
            None => ExecutionContext::new(&mapping.asset_file_name)?,
        };

        self.advance(Stage::Download, cancel)?;
        self.reporter.info(&format!(
            "Downloading asset for {} {}",
            platform.os.as_str(),
            platform.arch.as_str()
        ));
        let downloader = Downloader::new(self.credential.as_ref(), &self.options.download)?;
        downloader
            .fetch(&mapping.download_url, ctx.download_path(), cancel)
            .await?;

        self.advance(Stage::Extract, cancel)?;
        let extract_dir = ctx.extract_dir();
        extract_archive(ctx.download_path(), &extract_dir)?;

        self.advance(Stage::Unwrap, cancel)?;
        let root = unwrap_root(&extract_dir, &mapping.asset_file_name);

        self.advance(Stage::Install, cancel)?;
        let binary = root.join(&mapping.binary_path_in_asset);
        debug!(binary = %binary.display(), "installing");
        let installer = Installer::new(self.probe.as_ref(), self.elevation.as_ref(), self.reporter);
        let dest = installer.install(&binary, &self.plan.bin.install_dir, &self.plan.bin.name)?;

        self.reporter.info("Installation complete");
        Ok(Outcome::Installed(dest))
    }

    fn dry_run(&self, mapping: &AssetMapping) -> Outcome {
        self.reporter.info(&format!(
            "Would download {} from {}",
            mapping.asset_file_name, mapping.download_url
        ));
        self.reporter.info(&format!(
            "Would install {} to {}",
            mapping.binary_path_in_asset,
            self.plan.bin.install_dir.display()
        ));
        Outcome::DryRun {
            url: mapping.download_url.clone(),
            install_dir: self.plan.bin.install_dir.clone(),
        }
    }

    fn advance(&mut self, next: Stage, cancel: &CancellationToken) -> Result<(), InstallError> {
        if cancel.is_cancelled() {
            return Err(InstallError::Cancelled);
        }
        self.transition(next);
        Ok(())
    }

    fn transition(&mut self, next: Stage) {
        debug!(from = %self.stage, to = %next, "stage transition");
        self.stage = next;
    }
}
