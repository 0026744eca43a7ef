//! Support table: the closed mapping from platform key to release asset.

use std::collections::BTreeMap;

use crate::errors::{InstallError, PlanError};
use crate::request::{BinarySpec, PlatformAsset, Repository};

/// Where to fetch the asset for one platform and where the binary sits in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMapping {
    pub download_url: String,
    pub asset_file_name: String,
    pub binary_path_in_asset: String,
}

/// Immutable platform key → [`AssetMapping`] table.
///
/// Keys are unique by construction.
#[derive(Debug, Clone)]
pub struct SupportTable {
    repo: Repository,
    entries: BTreeMap<String, AssetMapping>,
}

impl SupportTable {
    /// Builds the table from the plan's platform list.
    ///
    /// `bin.file_in_asset`, when set, replaces every entry's binary path.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::DuplicatePlatform`] if two entries share a key.
    /// An empty list is accepted; every lookup then fails.
    pub fn new(
        repo: &Repository,
        bin: &BinarySpec,
        platforms: &[PlatformAsset],
    ) -> Result<Self, PlanError> {
        let mut entries = BTreeMap::new();
        for entry in platforms {
            let mapping = AssetMapping {
                download_url: entry.asset.url.clone(),
                asset_file_name: entry.asset.name.clone(),
                binary_path_in_asset: bin
                    .file_in_asset
                    .clone()
                    .unwrap_or_else(|| entry.file.clone()),
            };
            if entries.insert(entry.platform.clone(), mapping).is_some() {
                return Err(PlanError::DuplicatePlatform {
                    key: entry.platform.clone(),
                });
            }
        }

        Ok(Self {
            repo: repo.clone(),
            entries,
        })
    }

    /// Returns the mapping for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::UnsupportedPlatform`] naming the repository and
    /// the key if the release has no asset for it.
    pub fn resolve(&self, key: &str) -> Result<&AssetMapping, InstallError> {
        self.entries
            .get(key)
            .ok_or_else(|| InstallError::UnsupportedPlatform {
                repo: self.repo.url(),
                platform: key.to_string(),
            })
    }

    /// Iterates over the supported platform keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
