//! Error types for the installation pipeline.
//!
//! Every variant of [`InstallError`] is fatal to a run. The front end prints it
//! once through the critical channel and exits with status 1. [`PlanError`]
//! covers problems found while loading or validating an install plan, before
//! any stage starts.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Why a download did not produce a complete file.
#[derive(Debug, Error)]
pub enum DownloadFailure {
    /// The server answered with something other than `200 OK`.
    #[error("got {0} response from server")]
    HttpStatus(u16),

    /// DNS, TLS, connection or body transfer failure.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// No connection or no data within the configured window.
    #[error("no data received for {} seconds", .0.as_secs())]
    Timeout(Duration),

    /// The local destination could not be written.
    #[error("could not write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Why the binary could not be placed into the install directory.
#[derive(Debug, Error)]
pub enum InstallFailure {
    /// The elevated copy ran but did not succeed (wrong password, refused, ...).
    #[error("elevated copy via {program} exited with {status}")]
    PermissionEscalationDenied { program: String, status: String },

    /// No elevation mechanism exists on this host.
    #[error("no privilege escalation program (sudo, doas) is available")]
    EscalationUnavailable,

    /// Copying, renaming or setting permissions failed.
    #[error("{message}: {source}")]
    Copy {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal failure of an installation run.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("operating system '{raw}' got converted to '{normalized}' which is not supported by bina")]
    UnsupportedOs { raw: String, normalized: String },

    #[error("architecture '{raw}' got converted to '{normalized}' which is not supported by bina")]
    UnsupportedArch { raw: String, normalized: String },

    #[error("platform {platform} is not supported by {repo}.")]
    UnsupportedPlatform { repo: String, platform: String },

    #[error("Error downloading {url}, {kind}")]
    DownloadFailed {
        url: String,
        #[source]
        kind: DownloadFailure,
    },

    #[error("could not create HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("invalid value for header '{0}'")]
    InvalidHeader(String),

    #[error("unknown archive format for {}", .archive.display())]
    UnknownArchiveFormat { archive: PathBuf },

    #[error("failed to extract {}: {message}", .archive.display())]
    ExtractionFailed {
        archive: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("installation to {} failed: {kind}", .dir.display())]
    InstallFailed {
        dir: PathBuf,
        #[source]
        kind: InstallFailure,
    },

    #[error("could not prepare temporary workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("installation cancelled")]
    Cancelled,
}

impl InstallError {
    /// Creates a `DownloadFailed` error for `url`.
    #[must_use]
    pub fn download(url: impl Into<String>, kind: DownloadFailure) -> Self {
        Self::DownloadFailed {
            url: url.into(),
            kind,
        }
    }

    /// Creates an `ExtractionFailed` error caused by an I/O error.
    #[must_use]
    pub fn extraction(
        archive: impl Into<PathBuf>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::ExtractionFailed {
            archive: archive.into(),
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates an `InstallFailed` error for the target directory.
    #[must_use]
    pub fn install(dir: impl Into<PathBuf>, kind: InstallFailure) -> Self {
        Self::InstallFailed {
            dir: dir.into(),
            kind,
        }
    }

    /// Returns the HTTP status recorded by a failed download, if any.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::DownloadFailed {
                kind: DownloadFailure::HttpStatus(code),
                ..
            } => Some(*code),
            _ => None,
        }
    }
}

/// Problems with an install plan, detected before a run starts.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("could not read install plan {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse install plan {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("duplicate platform '{key}' in install plan")]
    DuplicatePlatform { key: String },
}
