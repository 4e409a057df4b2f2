//! Configuration for sift.
//!
//! SIFT_ROOT resolution order:
//! 1. Explicit path passed to Config::with_root()
//! 2. SIFT_ROOT environment variable
//! 3. Default: ~/.local/share/sift
//!
//! ```toml
//! [compile]
//! inject_default_status = true
//!
//! [presets.warehouse]
//! platform = ["snowflake", "bigquery"]
//!
//! [presets.prod-tables]
//! and = [{ env = "PROD" }, { entity_subtype = "Table" }]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::compile::CompileOptions;
use crate::{Error, Filter, Result};

/// sift configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding config.toml.
    #[serde(skip)]
    pub sift_root: PathBuf,

    /// Compiler settings.
    #[serde(default)]
    pub compile: CompileOptions,

    /// Named filters, referenced by `sq compile --preset NAME`.
    #[serde(default)]
    pub presets: BTreeMap<String, Filter>,
}

impl Config {
    /// Create a new config with the given SIFT_ROOT.
    pub fn with_root(sift_root: impl Into<PathBuf>) -> Self {
        Self {
            sift_root: sift_root.into(),
            compile: CompileOptions::default(),
            presets: BTreeMap::new(),
        }
    }

    /// Create a config using default SIFT_ROOT resolution.
    pub fn default_location() -> Result<Self> {
        Ok(Self::with_root(resolve_sift_root()?))
    }

    /// Load config from SIFT_ROOT/config.toml, or create default.
    pub fn load() -> Result<Self> {
        let sift_root = resolve_sift_root()?;
        Self::load_from(&sift_root)
    }

    /// Load config from a specific SIFT_ROOT.
    pub fn load_from(sift_root: &Path) -> Result<Self> {
        let config_path = sift_root.join("config.toml");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            let mut config = Self::parse(&contents).inspect_err(|e| {
                warn!(path = %config_path.display(), error = %e, "config file could not be loaded");
            })?;
            // Ensure sift_root matches the actual location
            config.sift_root = sift_root.to_path_buf();
            debug!(path = %config_path.display(), presets = config.presets.len(), "loaded config");
            Ok(config)
        } else {
            Ok(Self::with_root(sift_root))
        }
    }

    /// Parse config from a TOML string. Presets are validated as filters.
    pub fn parse(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save config to SIFT_ROOT/config.toml.
    pub fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.sift_root)?;
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(self.config_path(), contents)?;
        Ok(())
    }

    /// Path to the config file.
    pub fn config_path(&self) -> PathBuf {
        self.sift_root.join("config.toml")
    }

    // Presets

    pub fn preset(&self, name: &str) -> Result<&Filter> {
        self.presets
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("preset '{}'", name)))
    }

    /// Add or replace a preset. Returns the filter it replaced, if any.
    pub fn add_preset(
        &mut self,
        name: impl Into<String>,
        filter: Filter,
    ) -> Result<Option<Filter>> {
        let name = name.into();
        if !is_valid_preset_name(&name) {
            return Err(Error::Config(format!(
                "Invalid preset name '{}': use letters, digits, '-' and '_'",
                name
            )));
        }
        Ok(self.presets.insert(name, filter))
    }

    pub fn remove_preset(&mut self, name: &str) -> Result<Filter> {
        self.presets
            .remove(name)
            .ok_or_else(|| Error::NotFound(format!("preset '{}'", name)))
    }

    /// Presets whose name matches a glob pattern, in name order.
    pub fn presets_matching<'a>(
        &'a self,
        pattern: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a Filter)> {
        self.presets
            .iter()
            .filter(move |(name, _)| glob_match::glob_match(pattern, name.as_str()))
            .map(|(name, filter)| (name.as_str(), filter))
    }
}

fn is_valid_preset_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Resolve SIFT_ROOT using the standard resolution order.
fn resolve_sift_root() -> Result<PathBuf> {
    // 1. Environment variable
    if let Ok(path) = std::env::var("SIFT_ROOT") {
        return Ok(PathBuf::from(path));
    }

    // 2. XDG data directory (via directories crate)
    if let Some(proj_dirs) = ProjectDirs::from("", "", "sift") {
        return Ok(proj_dirs.data_dir().to_path_buf());
    }

    // 3. Fallback to ~/.local/share/sift
    let home = std::env::var("HOME")
        .map_err(|_| Error::Config("Could not determine home directory".to_string()))?;
    Ok(PathBuf::from(home).join(".local/share/sift"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_with_root() {
        let config = Config::with_root("/tmp/test-sift");
        assert_eq!(config.sift_root, PathBuf::from("/tmp/test-sift"));
        assert!(config.compile.inject_default_status);
        assert!(config.presets.is_empty());
        assert_eq!(config.config_path(), PathBuf::from("/tmp/test-sift/config.toml"));
    }

    #[test]
    fn test_parse_presets() {
        let config = Config::parse(
            r#"
[compile]
inject_default_status = false

[presets.warehouse]
platform = ["snowflake", "bigquery"]

[presets.prod-tables]
and = [{ env = "PROD" }, { entity_subtype = "Table" }]
"#,
        )
        .unwrap();

        assert!(!config.compile.inject_default_status);
        assert_eq!(
            config.preset("warehouse").unwrap(),
            &Filter::platform(["snowflake", "bigquery"]).unwrap()
        );
        assert_eq!(
            config.preset("prod-tables").unwrap(),
            &Filter::and([Filter::env(["PROD"]), Filter::entity_subtype(["Table"])])
        );
    }

    #[test]
    fn test_parse_rejects_invalid_preset() {
        let err = Config::parse(
            r#"
[presets.bad]
domain = "marketing"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("marketing"));
    }

    #[test]
    fn test_missing_compile_section_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert!(config.compile.inject_default_status);
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let sift_root = tmp.path().join("sift");

        let mut config = Config::with_root(&sift_root);
        config
            .add_preset(
                "nested",
                Filter::and([
                    Filter::or([Filter::entity_type(["dataset"]), Filter::entity_type(["chart"])]),
                    Filter::not(Filter::platform(["snowflake"]).unwrap()).unwrap(),
                    Filter::container(["urn:li:container:abc"], true).unwrap(),
                ]),
            )
            .unwrap();
        config
            .add_preset("deleted", Filter::soft_deleted(crate::SoftDeletedMode::OnlySoftDeleted))
            .unwrap();
        config.save().unwrap();

        let loaded = Config::load_from(&sift_root).unwrap();
        assert_eq!(loaded.sift_root, sift_root);
        assert_eq!(loaded.presets, config.presets);
    }

    #[test]
    fn test_load_missing_file_gives_default() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load_from(tmp.path()).unwrap();
        assert!(config.presets.is_empty());
    }

    #[test]
    fn test_add_and_remove_preset() {
        let mut config = Config::with_root("/tmp/test-sift");
        assert!(config.add_preset("prod", Filter::env(["PROD"])).unwrap().is_none());
        let replaced = config.add_preset("prod", Filter::env(["PROD", "DEV"])).unwrap();
        assert_eq!(replaced, Some(Filter::env(["PROD"])));

        assert!(config.add_preset("has space", Filter::env(["PROD"])).is_err());

        config.remove_preset("prod").unwrap();
        assert!(matches!(config.remove_preset("prod"), Err(Error::NotFound(_))));
        assert!(matches!(config.preset("prod"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_presets_matching() {
        let mut config = Config::with_root("/tmp/test-sift");
        config.add_preset("prod-tables", Filter::env(["PROD"])).unwrap();
        config.add_preset("prod-views", Filter::env(["PROD"])).unwrap();
        config.add_preset("dev-tables", Filter::env(["DEV"])).unwrap();

        let names: Vec<&str> = config.presets_matching("prod-*").map(|(n, _)| n).collect();
        assert_eq!(names, vec!["prod-tables", "prod-views"]);

        let all: Vec<&str> = config.presets_matching("*").map(|(n, _)| n).collect();
        assert_eq!(all, vec!["dev-tables", "prod-tables", "prod-views"]);
    }
}
