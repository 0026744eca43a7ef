//! Error types for the bina CLI.
//!
//! Failures of the installation itself are `bina_installer::InstallError` and
//! `PlanError`; this enum only covers conditions owned by the front end.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BinaError {
    /// No install plan was given on the command line or in the environment.
    #[error("no install plan given: pass --plan FILE or set BINA_PLAN")]
    NoPlan,

    /// The message was already printed; only the exit status is left.
    #[error("error already reported")]
    Reported,
}
