#![warn(clippy::pedantic)]
//! Installer core for prebuilt release binaries.
//!
//! Given an [`InstallPlan`] produced by the release-metadata service, this
//! crate finds the asset that matches the running host, downloads it, unpacks
//! it and copies the executable into the target directory.
//!
//! ## Pipeline
//!
//! ```text
//! uname → Platform → SupportTable → Downloader → extract_archive → unwrap_root → Installer
//! ```
//!
//! Each step lives in its own module and can be used on its own. [`Session`]
//! chains them, prints the user-facing messages through a [`Reporter`] and
//! owns the temporary workspace for the duration of one run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bina_installer::{ConsoleReporter, HostInfo, InstallPlan, RunOptions, Session};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn install(plan: InstallPlan) -> anyhow::Result<()> {
//! let reporter = ConsoleReporter::stdio();
//! let mut session = Session::new(plan, &reporter, RunOptions::default())?;
//! session.run(&HostInfo::detect()?, &CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! Every failure of a run is an [`InstallError`] and is fatal. Problems with
//! the plan itself are reported as [`PlanError`] before a run starts.

pub mod archive;
pub mod download;
pub mod errors;
pub mod install;
pub mod platform;
pub mod report;
pub mod request;
pub mod run;
pub mod table;
pub mod workspace;

pub use archive::{ArchiveFormat, extract_archive, unwrap_root};
pub use download::{DownloadOptions, Downloader};
pub use errors::{DownloadFailure, InstallError, InstallFailure, PlanError};
pub use install::{AccessProbe, Elevation, Installer, NoElevation, SudoElevation, WriteProbe};
pub use platform::{Arch, HostInfo, Os, Platform};
pub use report::{ConsoleReporter, Reporter};
pub use request::{Credential, InstallPlan, credential_from_env};
pub use run::{Outcome, RunOptions, Session, Stage};
pub use table::{AssetMapping, SupportTable};
pub use workspace::ExecutionContext;
