//! Install plan data model.
//!
//! An [`InstallPlan`] is produced upstream by the release-metadata resolver:
//! versions are already resolved and every platform already has a concrete
//! asset URL. The installer only consumes it.
//!
//! Field names follow snake_case; the camelCase spellings used by the
//! release-metadata API (`installDir`, `fileInAsset`, ...) are accepted as
//! aliases.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Environment variable consulted when the plan carries no credential.
pub const CREDENTIAL_ENV: &str = "GITHUB_TOKEN";

/// Source repository of the release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

impl Repository {
    /// Returns `owner/name`.
    #[must_use]
    pub fn reference(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Returns the canonical location, e.g. `github.com/owner/name`.
    #[must_use]
    pub fn url(&self) -> String {
        format!("github.com/{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// The executable to produce and where it goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinarySpec {
    /// Logical name of the executable.
    pub name: String,
    /// Target directory. Created if missing; `~` expands to the home directory.
    #[serde(alias = "installDir")]
    pub install_dir: PathBuf,
    /// Path of the binary inside every asset, overriding the per-platform value.
    #[serde(default, alias = "fileInAsset")]
    pub file_in_asset: Option<String>,
}

/// A downloadable release asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub name: String,
    pub url: String,
}

/// One entry of the plan's platform list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformAsset {
    /// Platform key, e.g. `linux-amd64`.
    pub platform: String,
    /// Path of the binary inside the asset.
    pub file: String,
    pub asset: AssetRef,
}

/// Resolved parameters of one installation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRequest {
    /// Version label as the user wrote it, e.g. `latest`.
    #[serde(alias = "originalVersion")]
    pub original_version: String,
    /// Concrete release version, e.g. `v1.2.0`.
    #[serde(alias = "resolvedVersion")]
    pub resolved_version: String,
    /// Endpoint of the release-metadata service that produced the plan.
    #[serde(default)]
    pub api: String,
    /// Explicit credential; wins over [`CREDENTIAL_ENV`].
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub debug: bool,
    /// Set when the release had no config of its own and one was generated.
    #[serde(default, alias = "useAutoGeneratedConfig")]
    pub use_auto_generated_config: bool,
}

/// Everything the installer needs for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallPlan {
    pub repo: Repository,
    pub bin: BinarySpec,
    pub platforms: Vec<PlatformAsset>,
    #[serde(flatten)]
    pub request: InstallRequest,
}

/// A credential for authenticated downloads.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns the secret value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns the `Authorization` header value.
    #[must_use]
    pub fn authorization(&self) -> String {
        format!("token {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Picks the credential: explicit value first, then the environment value.
///
/// Empty or whitespace-only values count as absent.
#[must_use]
pub fn resolve_credential(explicit: Option<&str>, environment: Option<&str>) -> Option<Credential> {
    [explicit, environment]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(|value| Credential(value.to_string()))
}

/// Resolves the credential against the real process environment.
#[must_use]
pub fn credential_from_env(explicit: Option<&str>) -> Option<Credential> {
    let environment = std::env::var(CREDENTIAL_ENV).ok();
    resolve_credential(explicit, environment.as_deref())
}
