//! Placing the binary into the install directory.
//!
//! A writable directory gets a plain copy: the binary is written to a hidden
//! sibling, made executable and renamed over the destination, which also
//! replaces a binary that is currently running. A directory the user cannot
//! write to is handed to an [`Elevation`] strategy, exactly once.

use std::fs::File;
use std::path::{Component, Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::errors::{InstallError, InstallFailure};
use crate::report::Reporter;

/// Decides whether the current user may create files in a directory.
pub trait WriteProbe: Send + Sync {
    fn is_writable(&self, dir: &Path) -> bool;
}

/// Asks the operating system: `access(2)` with `W_OK` on Unix, the read-only
/// attribute elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessProbe;

impl WriteProbe for AccessProbe {
    #[cfg(unix)]
    fn is_writable(&self, dir: &Path) -> bool {
        nix::unistd::access(dir, nix::unistd::AccessFlags::W_OK).is_ok()
    }

    #[cfg(not(unix))]
    fn is_writable(&self, dir: &Path) -> bool {
        std::fs::metadata(dir).is_ok_and(|m| !m.permissions().readonly())
    }
}

/// Places a file where the current user may not write.
pub trait Elevation: Send + Sync {
    /// Installs `src` as `dest` with mode 0755, creating `dest_dir` if needed.
    ///
    /// # Errors
    ///
    /// Returns the reason the elevated copy did not happen.
    fn install(&self, src: &Path, dest_dir: &Path, dest: &Path) -> Result<(), InstallFailure>;
}

/// Runs `install(1)` through `sudo` or `doas`.
#[derive(Debug, Clone)]
pub struct SudoElevation {
    program: PathBuf,
}

impl SudoElevation {
    /// Programs tried in order.
    pub const CANDIDATES: [&'static str; 2] = ["sudo", "doas"];

    /// Finds the first escalation program on `PATH`.
    #[must_use]
    pub fn locate() -> Option<Self> {
        Self::CANDIDATES
            .iter()
            .find_map(|name| which::which(name).ok())
            .map(Self::with_program)
    }

    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Builds the single elevated command for one installation.
    #[must_use]
    pub fn command(&self, src: &Path, dest_dir: &Path, dest: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        if dest_dir.is_dir() {
            cmd.args(["install", "-m", "755"]).arg(src).arg(dest);
        } else {
            cmd.args([
                "sh",
                "-c",
                r#"mkdir -p "$1" && install -m 755 "$2" "$3""#,
                "bina",
            ])
            .arg(dest_dir)
            .arg(src)
            .arg(dest);
        }
        cmd
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .map_or_else(|| self.program.display().to_string(), |n| n.to_string_lossy().into_owned())
    }
}

impl Elevation for SudoElevation {
    fn install(&self, src: &Path, dest_dir: &Path, dest: &Path) -> Result<(), InstallFailure> {
        let mut cmd = self.command(src, dest_dir, dest);
        debug!(?cmd, "running elevated install");

        let status = cmd.status().map_err(|source| InstallFailure::Copy {
            message: format!("failed to run {}", self.program.display()),
            source,
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(InstallFailure::PermissionEscalationDenied {
                program: self.program_name(),
                status: status.to_string(),
            })
        }
    }
}

/// Used where no escalation program exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoElevation;

impl Elevation for NoElevation {
    fn install(&self, _src: &Path, _dest_dir: &Path, _dest: &Path) -> Result<(), InstallFailure> {
        Err(InstallFailure::EscalationUnavailable)
    }
}

/// Returns the escalation strategy available on this host.
#[must_use]
pub fn system_elevation() -> Box<dyn Elevation> {
    match SudoElevation::locate() {
        Some(sudo) => {
            debug!(program = %sudo.program.display(), "found privilege escalation program");
            Box::new(sudo)
        }
        None => Box::new(NoElevation),
    }
}

/// Expands a leading `~` to the home directory.
#[must_use]
pub fn expand_home(path: &Path) -> PathBuf {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => match dirs::home_dir() {
            Some(home) => home.join(components.as_path()),
            None => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}

/// Copies an extracted binary into its install directory.
pub struct Installer<'a> {
    probe: &'a dyn WriteProbe,
    elevation: &'a dyn Elevation,
    reporter: &'a dyn Reporter,
}

impl<'a> Installer<'a> {
    pub fn new(
        probe: &'a dyn WriteProbe,
        elevation: &'a dyn Elevation,
        reporter: &'a dyn Reporter,
    ) -> Self {
        Self {
            probe,
            elevation,
            reporter,
        }
    }

    /// Installs `binary` into `install_dir` and returns the destination path.
    ///
    /// The destination keeps the binary's file name. `bin_name` is only used
    /// in messages.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::InstallFailed`] if the binary is missing, the
    /// copy fails, or elevation is refused or unavailable.
    pub fn install(
        &self,
        binary: &Path,
        install_dir: &Path,
        bin_name: &str,
    ) -> Result<PathBuf, InstallError> {
        let dir = std::path::absolute(expand_home(install_dir))
            .map_err(|e| copy_error(install_dir, "failed to resolve install directory", e))?;

        if !binary.is_file() {
            return Err(copy_error(
                &dir,
                &format!("binary {} not found in asset", binary.display()),
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }

        let dir = match std::fs::create_dir_all(&dir) {
            Ok(()) => std::fs::canonicalize(&dir).unwrap_or(dir),
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                debug!(dir = %dir.display(), "cannot create install directory unprivileged");
                dir
            }
            Err(e) => return Err(copy_error(&dir, "failed to create install directory", e)),
        };

        let file_name = binary.file_name().ok_or_else(|| {
            copy_error(
                &dir,
                &format!("{} has no file name", binary.display()),
                std::io::Error::from(std::io::ErrorKind::InvalidInput),
            )
        })?;
        let dest = dir.join(file_name);

        if dir.is_dir() && self.probe.is_writable(&dir) {
            self.reporter
                .info(&format!("Installing {bin_name} to {}", dir.display()));
            copy_executable(binary, &dir, &dest)?;
        } else {
            self.reporter.warn(&format!(
                "Permissions required for installation to {}",
                dir.display()
            ));
            self.elevation
                .install(binary, &dir, &dest)
                .map_err(|kind| InstallError::install(&dir, kind))?;
        }

        debug!(dest = %dest.display(), "binary installed");
        Ok(dest)
    }
}

fn copy_error(dir: &Path, message: &str, source: std::io::Error) -> InstallError {
    InstallError::install(
        dir,
        InstallFailure::Copy {
            message: message.to_string(),
            source,
        },
    )
}

/// Writes `src` to a hidden sibling of `dest`, sets mode 0755 and renames it
/// into place.
fn copy_executable(src: &Path, dir: &Path, dest: &Path) -> Result<(), InstallError> {
    let mut staged = tempfile::Builder::new()
        .prefix(".bina-")
        .tempfile_in(dir)
        .map_err(|e| copy_error(dir, "failed to create staging file", e))?;

    let mut input = File::open(src)
        .map_err(|e| copy_error(dir, &format!("failed to open {}", src.display()), e))?;
    std::io::copy(&mut input, staged.as_file_mut())
        .map_err(|e| copy_error(dir, &format!("failed to copy {}", src.display()), e))?;

    set_executable(staged.path())
        .map_err(|e| copy_error(dir, "failed to set executable permissions", e))?;

    staged.persist(dest).map_err(|e| {
        copy_error(
            dir,
            &format!("failed to move binary into {}", dest.display()),
            e.error,
        )
    })?;
    Ok(())
}

#[cfg(unix)]
fn set_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn set_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
