//! Prints the platform key of the running host.

use anyhow::{Context, Result};
use bina_installer::{HostInfo, Platform};

/// Executes the platform command.
///
/// # Errors
///
/// Returns an error if the host cannot be identified or is not supported.
pub fn execute() -> Result<()> {
    let host = HostInfo::detect().context("failed to detect host platform")?;
    tracing::debug!(os = %host.os, arch = %host.arch, "raw host names");
    let platform = Platform::from_host(&host)?;
    println!("{platform}");
    Ok(())
}
