//! Per-run temporary workspace.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::errors::InstallError;

/// Name of the extraction subdirectory.
const UNPACK_DIR: &str = "unpack";

/// A uniquely named `bina-XXXXXX` directory owned by one run.
///
/// Dropping the context removes the directory and everything in it.
#[derive(Debug)]
pub struct ExecutionContext {
    dir: TempDir,
    download_path: PathBuf,
}

impl ExecutionContext {
    /// Creates the workspace in the system temporary directory.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Workspace`] if the directory cannot be created.
    pub fn new(asset_file_name: &str) -> Result<Self, InstallError> {
        let dir = tempfile::Builder::new()
            .prefix("bina-")
            .tempdir()
            .map_err(InstallError::Workspace)?;
        Ok(Self::in_dir(dir, asset_file_name))
    }

    /// Creates the workspace below `parent`.
    ///
    /// # Errors
    ///
    /// Returns [`InstallError::Workspace`] if the directory cannot be created.
    pub fn new_in(parent: &Path, asset_file_name: &str) -> Result<Self, InstallError> {
        let dir = tempfile::Builder::new()
            .prefix("bina-")
            .tempdir_in(parent)
            .map_err(InstallError::Workspace)?;
        Ok(Self::in_dir(dir, asset_file_name))
    }

    fn in_dir(dir: TempDir, asset_file_name: &str) -> Self {
        let file_name = Path::new(asset_file_name)
            .file_name()
            .map_or_else(|| "asset".into(), ToOwned::to_owned);
        let download_path = dir.path().join(file_name);
        debug!(tmp = %dir.path().display(), file = %download_path.display(), "workspace ready");
        Self { dir, download_path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the asset is downloaded to.
    #[must_use]
    pub fn download_path(&self) -> &Path {
        &self.download_path
    }

    /// Where the asset is extracted to.
    #[must_use]
    pub fn extract_dir(&self) -> PathBuf {
        self.dir.path().join(UNPACK_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_and_cleanup() {
        let parent = tempfile::tempdir().unwrap();
        let ctx = ExecutionContext::new_in(parent.path(), "repo_v1.2.0_linux_amd64.tar.gz").unwrap();
        let root = ctx.path().to_path_buf();

        assert!(root.is_dir());
        assert!(
            root.file_name()
                .unwrap()
                .to_string_lossy()
                .starts_with("bina-")
        );
        assert_eq!(ctx.download_path(), root.join("repo_v1.2.0_linux_amd64.tar.gz"));
        assert_eq!(ctx.extract_dir(), root.join("unpack"));

        std::fs::write(ctx.download_path(), b"data").unwrap();
        drop(ctx);
        assert!(!root.exists());
    }

    #[test]
    fn asset_name_with_directories_is_reduced_to_file_name() {
        let parent = tempfile::tempdir().unwrap();
        let ctx = ExecutionContext::new_in(parent.path(), "../../etc/tool.zip").unwrap();
        assert_eq!(ctx.download_path(), ctx.path().join("tool.zip"));
    }

    #[test]
    fn runs_get_distinct_directories() {
        let parent = tempfile::tempdir().unwrap();
        let a = ExecutionContext::new_in(parent.path(), "a.zip").unwrap();
        let b = ExecutionContext::new_in(parent.path(), "a.zip").unwrap();
        assert_ne!(a.path(), b.path());
    }
}
