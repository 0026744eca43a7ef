//! Install plan loading.
//!
//! A plan whose file name ends in `.toml` is read as TOML, anything else as
//! JSON, which is what the release-metadata service emits.

use std::path::Path;

use bina_installer::{InstallPlan, PlanError};

/// Serialization format of a plan file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanFormat {
    Json,
    Toml,
}

impl PlanFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => PlanFormat::Toml,
            _ => PlanFormat::Json,
        }
    }
}

/// Reads and parses the plan at `path`.
///
/// # Errors
///
/// Returns [`PlanError::Read`] if the file cannot be read and
/// [`PlanError::Parse`] if it is not a valid plan.
pub fn load_plan(path: &Path) -> Result<InstallPlan, PlanError> {
    let text = std::fs::read_to_string(path).map_err(|source| PlanError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    parse_plan(&text, PlanFormat::from_path(path)).map_err(|message| PlanError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

fn parse_plan(text: &str, format: PlanFormat) -> Result<InstallPlan, String> {
    match format {
        PlanFormat::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
        PlanFormat::Toml => toml::from_str(text).map_err(|e| e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use std::path::PathBuf;

    const TOML_PLAN: &str = r#"
original_version = "latest"
resolved_version = "v1.2.0"
useAutoGeneratedConfig = true

[repo]
owner = "owner"
name = "repo"

[bin]
name = "repo"
install_dir = "~/.local/bin"

[[platforms]]
platform = "linux-amd64"
file = "repo"
asset = { name = "repo_v1.2.0_linux_amd64.tar.gz", url = "https://example.com/repo_v1.2.0_linux_amd64.tar.gz" }
"#;

    #[test]
    fn format_follows_extension() {
        assert_eq!(PlanFormat::from_path(Path::new("plan.toml")), PlanFormat::Toml);
        assert_eq!(PlanFormat::from_path(Path::new("PLAN.TOML")), PlanFormat::Toml);
        assert_eq!(PlanFormat::from_path(Path::new("plan.json")), PlanFormat::Json);
        assert_eq!(PlanFormat::from_path(Path::new("plan")), PlanFormat::Json);
    }

    #[test]
    fn toml_plan_parses() {
        let plan = parse_plan(TOML_PLAN, PlanFormat::Toml).unwrap();
        assert_eq!(plan.repo.reference(), "owner/repo");
        assert_eq!(plan.bin.install_dir, PathBuf::from("~/.local/bin"));
        assert_eq!(plan.platforms[0].asset.name, "repo_v1.2.0_linux_amd64.tar.gz");
        assert!(plan.request.use_auto_generated_config);
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = load_plan(Path::new("/nonexistent/bina/plan.json")).unwrap_err();
        assert!(matches!(err, PlanError::Read { .. }));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let dir = assert_fs::TempDir::new().unwrap();
        let plan = dir.child("plan.json");
        plan.write_str("{ not json").unwrap();
        let err = load_plan(plan.path()).unwrap_err();
        assert!(matches!(err, PlanError::Parse { .. }));
    }
}
