//! # Vault Configuration
//!
//! TOML-based tuning for reconstruction.

use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Lowest pass limit the attachment resolver will accept
pub const MIN_RESOLVE_PASSES: usize = 200;

/// Vault engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bevy::prelude::Resource)]
pub struct VaultConfig {
    /// Upper bound on attachment resolver passes (never below 200)
    #[serde(default = "default_max_passes")]
    pub max_resolve_passes: usize,

    /// Vertical gap between staged tray items, in meters
    #[serde(default = "default_tray_spacing")]
    pub tray_spacing: f32,

    /// Drop rounds beyond a container's capacity instead of overfilling it
    #[serde(default = "default_true")]
    pub truncate_overfull_containers: bool,

    /// Extension used when saving without one ("vault" or "json")
    #[serde(default = "default_extension")]
    pub default_extension: String,
}

fn default_max_passes() -> usize { MIN_RESOLVE_PASSES }
fn default_tray_spacing() -> f32 { 0.1 }
fn default_true() -> bool { true }
fn default_extension() -> String { crate::format::EXTENSION_RON.to_string() }

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            max_resolve_passes: default_max_passes(),
            tray_spacing: default_tray_spacing(),
            truncate_overfull_containers: true,
            default_extension: default_extension(),
        }
    }
}

impl VaultConfig {
    /// Load from TOML file or return default
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse vault config: {}", e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read vault config: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Save to TOML file
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Effective resolver pass limit
    pub fn resolve_pass_limit(&self) -> usize {
        if self.max_resolve_passes < MIN_RESOLVE_PASSES {
            tracing::warn!(
                configured = self.max_resolve_passes,
                floor = MIN_RESOLVE_PASSES,
                "max_resolve_passes below floor, clamping"
            );
        }
        self.max_resolve_passes.max(MIN_RESOLVE_PASSES)
    }

    /// Save a snapshot, falling back to `default_extension` when the path has none
    pub fn save_snapshot(&self, snapshot: &Snapshot, path: &Path) -> crate::Result<PathBuf> {
        crate::format::save_snapshot_with_default(snapshot, path, &self.default_extension)
    }

    pub fn with_tray_spacing(mut self, spacing: f32) -> Self {
        self.tray_spacing = spacing;
        self
    }
}

/// Example TOML configuration file
pub const EXAMPLE_CONFIG: &str = r#"
# Vault configuration
# Save as vault.toml next to your vault files

# Upper bound on attachment resolver passes (values below 200 are raised to 200)
max_resolve_passes = 200

# Vertical gap between loose clips / speedloaders when spawning, in meters
tray_spacing = 0.1

# Drop rounds that do not fit a container instead of overfilling it
truncate_overfull_containers = true

# Extension used when saving without one: "vault" (RON) or "json"
default_extension = "vault"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_example_config_parses() {
        let config: VaultConfig = toml::from_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config, VaultConfig::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: VaultConfig = toml::from_str("tray_spacing = 0.25").unwrap();
        assert_eq!(config.tray_spacing, 0.25);
        assert_eq!(config.max_resolve_passes, 200);
        assert!(config.truncate_overfull_containers);
    }

    #[test]
    fn test_pass_limit_floor() {
        let config = VaultConfig {
            max_resolve_passes: 3,
            ..Default::default()
        };
        assert_eq!(config.resolve_pass_limit(), MIN_RESOLVE_PASSES);

        let config = VaultConfig {
            max_resolve_passes: 500,
            ..Default::default()
        };
        assert_eq!(config.resolve_pass_limit(), 500);
    }

    #[test]
    fn test_load_or_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vault.toml");

        assert_eq!(VaultConfig::load_or_default(&path), VaultConfig::default());

        let config = VaultConfig::default().with_tray_spacing(0.5);
        config.save(&path).unwrap();
        assert_eq!(VaultConfig::load_or_default(&path), config);

        std::fs::write(&path, "tray_spacing = \"wide\"").unwrap();
        assert_eq!(VaultConfig::load_or_default(&path), VaultConfig::default());
    }

    #[test]
    fn test_save_snapshot_default_extension() {
        let dir = tempdir().unwrap();
        let config: VaultConfig = toml::from_str("default_extension = \"json\"").unwrap();

        let written = config
            .save_snapshot(&Snapshot::new("carbine"), &dir.path().join("carbine"))
            .unwrap();
        assert_eq!(written.extension().unwrap(), "json");
        assert!(crate::format::load_snapshot(&written).is_ok());
    }
}
