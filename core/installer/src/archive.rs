//! Archive extraction and root-unwrap.
//!
//! The format is chosen from the archive's file name. Tar-family archives keep
//! their directory structure and permission bits; zip archives are flattened
//! the way `unzip -j` does it.

use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::debug;

use crate::errors::InstallError;

/// Supported archive formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarBz2,
    TarXz,
    Tar,
    Zip,
}

/// Recognized suffixes in matching order.
pub const ARCHIVE_EXTENSIONS: [(&str, ArchiveFormat); 9] = [
    (".tar.gz", ArchiveFormat::TarGz),
    (".tgz", ArchiveFormat::TarGz),
    (".tar.bz2", ArchiveFormat::TarBz2),
    (".tbz2", ArchiveFormat::TarBz2),
    (".tbz", ArchiveFormat::TarBz2),
    (".tar.xz", ArchiveFormat::TarXz),
    (".txz", ArchiveFormat::TarXz),
    (".tar", ArchiveFormat::Tar),
    (".zip", ArchiveFormat::Zip),
];

impl ArchiveFormat {
    /// Picks the format from the suffix of `path`'s file name.
    #[must_use]
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_string_lossy();
        ARCHIVE_EXTENSIONS
            .iter()
            .find(|(suffix, _)| name.ends_with(suffix))
            .map(|(_, format)| *format)
    }
}

/// Extracts `archive` into `dest_dir`, creating it if needed.
///
/// # Errors
///
/// Returns [`InstallError::UnknownArchiveFormat`] for an unrecognized suffix
/// and [`InstallError::ExtractionFailed`] if the archive is corrupt, contains
/// an unsafe path, or cannot be written out.
pub fn extract_archive(archive: &Path, dest_dir: &Path) -> Result<ArchiveFormat, InstallError> {
    let format = ArchiveFormat::detect(archive).ok_or_else(|| {
        InstallError::UnknownArchiveFormat {
            archive: archive.to_path_buf(),
        }
    })?;
    debug!(archive = %archive.display(), ?format, dest = %dest_dir.display(), "extracting");

    std::fs::create_dir_all(dest_dir).map_err(|e| {
        InstallError::extraction(
            archive,
            format!("failed to create directory {}", dest_dir.display()),
            e,
        )
    })?;

    let file = File::open(archive)
        .map_err(|e| InstallError::extraction(archive, "failed to open archive", e))?;

    match format {
        ArchiveFormat::TarGz => extract_tar(GzDecoder::new(file), archive, dest_dir)?,
        ArchiveFormat::TarBz2 => {
            extract_tar(bzip2::read::BzDecoder::new(file), archive, dest_dir)?;
        }
        ArchiveFormat::TarXz => extract_tar(xz2::read::XzDecoder::new(file), archive, dest_dir)?,
        ArchiveFormat::Tar => extract_tar(file, archive, dest_dir)?,
        ArchiveFormat::Zip => extract_zip_flat(file, archive, dest_dir)?,
    }

    Ok(format)
}

fn extract_tar<R: Read>(reader: R, archive: &Path, dest_dir: &Path) -> Result<(), InstallError> {
    let mut tar = Archive::new(reader);
    tar.set_preserve_permissions(true);

    let entries = tar
        .entries()
        .map_err(|e| InstallError::extraction(archive, "failed to read tar entries", e))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| InstallError::extraction(archive, "failed to read tar entry", e))?;

        let entry_path = entry
            .path()
            .map_err(|e| InstallError::extraction(archive, "failed to get entry path", e))?
            .into_owned();

        if entry_path.is_absolute()
            || entry_path
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(InstallError::ExtractionFailed {
                archive: archive.to_path_buf(),
                message: format!(
                    "refusing to extract path with parent directory or absolute reference: {}",
                    entry_path.display()
                ),
                source: None,
            });
        }

        entry.unpack_in(dest_dir).map_err(|e| {
            InstallError::extraction(
                archive,
                format!("failed to extract {}", entry_path.display()),
                e,
            )
        })?;
    }

    Ok(())
}

/// Writes every file entry into `dest_dir` under its bare file name.
fn extract_zip_flat(file: File, archive: &Path, dest_dir: &Path) -> Result<(), InstallError> {
    let corrupt = |e: zip::result::ZipError| InstallError::ExtractionFailed {
        archive: archive.to_path_buf(),
        message: format!("failed to read ZIP archive: {e}"),
        source: None,
    };

    let mut zip = zip::ZipArchive::new(file).map_err(corrupt)?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(corrupt)?;
        if entry.is_dir() {
            continue;
        }

        let Some(name) = Path::new(entry.name()).file_name().map(ToOwned::to_owned) else {
            continue;
        };
        let output_path = dest_dir.join(name);

        let mut outfile = File::create(&output_path).map_err(|e| {
            InstallError::extraction(
                archive,
                format!("failed to create file {}", output_path.display()),
                e,
            )
        })?;
        std::io::copy(&mut entry, &mut outfile).map_err(|e| {
            InstallError::extraction(
                archive,
                format!("failed to extract {}", output_path.display()),
                e,
            )
        })?;

        if let Some(mode) = entry.unix_mode() {
            restore_mode(&output_path, mode).map_err(|e| {
                InstallError::extraction(
                    archive,
                    format!("failed to set permissions on {}", output_path.display()),
                    e,
                )
            })?;
        }
    }

    Ok(())
}

#[cfg(unix)]
fn restore_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn restore_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

/// Returns the directory later stages treat as the archive root.
///
/// Each known suffix is stripped from `asset_file_name` in table order as long
/// as something remains. If `extract_dir` holds a directory with the stripped
/// name, that directory is the root; otherwise `extract_dir` is.
///
/// Only the asset's name is consulted, never the archive's actual top-level
/// entry, so a publisher whose folder is named differently ends up with the
/// flat root.
#[must_use]
pub fn unwrap_root(extract_dir: &Path, asset_file_name: &str) -> PathBuf {
    let candidate = strip_archive_suffixes(asset_file_name);
    let nested = extract_dir.join(&candidate);
    debug!(candidate = %candidate, exists = nested.is_dir(), "root-unwrap candidate");

    if !candidate.is_empty() && nested.is_dir() {
        nested
    } else {
        extract_dir.to_path_buf()
    }
}

fn strip_archive_suffixes(asset_file_name: &str) -> String {
    let mut name = Path::new(asset_file_name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    for (suffix, _) in ARCHIVE_EXTENSIONS {
        if let Some(stem) = name.strip_suffix(suffix)
            && !stem.is_empty()
        {
            name = stem.to_string();
        }
    }
    name
}
