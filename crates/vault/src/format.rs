//! # Vault File Format (.vault / .json)
//!
//! Snapshots are plain data, so they serialize to any structured format.
//! Two are supported on disk:
//!
//! - `.vault` - Pretty RON, the human-editable house format
//! - `.json` - JSON, for interop with external vault tooling
//!
//! The extension picks the codec. Field names and the `role` /
//! `attached_to` / `mount_slot` encoding are the wire contract.
//!
//! ## Usage
//! ```rust,ignore
//! use vault_engine::format::{load_snapshot, save_snapshot};
//!
//! let snapshot = load_snapshot("carbine.json")?;
//! save_snapshot(&snapshot, "carbine.vault")?;
//! ```

use crate::error::{Result, VaultError};
use crate::snapshot::{Snapshot, FORMAT_VERSION};
use std::io::Write;
use std::path::{Path, PathBuf};

// ============================================================================
// Constants
// ============================================================================

/// RON vault file extension
pub const EXTENSION_RON: &str = "vault";

/// JSON vault file extension
pub const EXTENSION_JSON: &str = "json";

/// All extensions `load_snapshot` accepts
pub const VALID_EXTENSIONS: &[&str] = &[EXTENSION_RON, EXTENSION_JSON];

/// Prefix shared by every snapshot format tag
const FORMAT_PREFIX: &str = "vault_";

/// On-disk encoding of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VaultFormat {
    Ron,
    Json,
}

impl VaultFormat {
    /// Pick the codec from a path's extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        Self::from_extension(&ext)
    }

    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext {
            EXTENSION_RON => Ok(VaultFormat::Ron),
            EXTENSION_JSON => Ok(VaultFormat::Json),
            other => Err(VaultError::UnsupportedExtension(other.to_string())),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            VaultFormat::Ron => EXTENSION_RON,
            VaultFormat::Json => EXTENSION_JSON,
        }
    }
}

// ============================================================================
// String codecs
// ============================================================================

/// Encode a snapshot as pretty JSON
pub fn to_json_string(snapshot: &Snapshot) -> Result<String> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

/// Decode a snapshot from JSON and check its format tag
pub fn from_json_str(content: &str) -> Result<Snapshot> {
    let snapshot: Snapshot = serde_json::from_str(content)?;
    check_version(snapshot)
}

/// Encode a snapshot as pretty RON
pub fn to_ron_string(snapshot: &Snapshot) -> Result<String> {
    let pretty = ron::ser::PrettyConfig::new()
        .depth_limit(8)
        .separate_tuple_members(false)
        .enumerate_arrays(false)
        .new_line("\n".to_string())
        .indentor("    ".to_string());

    Ok(ron::ser::to_string_pretty(snapshot, pretty)?)
}

/// Decode a snapshot from RON and check its format tag
pub fn from_ron_str(content: &str) -> Result<Snapshot> {
    let snapshot: Snapshot = ron::from_str(content)?;
    check_version(snapshot)
}

/// Decode with an explicit codec
pub fn from_str(content: &str, format: VaultFormat) -> Result<Snapshot> {
    match format {
        VaultFormat::Ron => from_ron_str(content),
        VaultFormat::Json => from_json_str(content),
    }
}

/// Encode with an explicit codec
pub fn to_string(snapshot: &Snapshot, format: VaultFormat) -> Result<String> {
    match format {
        VaultFormat::Ron => to_ron_string(snapshot),
        VaultFormat::Json => to_json_string(snapshot),
    }
}

fn check_version(snapshot: Snapshot) -> Result<Snapshot> {
    if !snapshot.format.starts_with(FORMAT_PREFIX) {
        return Err(VaultError::VersionMismatch {
            expected: FORMAT_VERSION.to_string(),
            found: snapshot.format,
        });
    }
    Ok(snapshot)
}

// ============================================================================
// Files
// ============================================================================

/// Load a `.vault` or `.json` snapshot file
pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<Snapshot> {
    let path = path.as_ref();
    let format = VaultFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)?;
    from_str(&content, format)
}

/// Load a snapshot file without blocking the async runtime
pub async fn load_snapshot_async<P: AsRef<Path>>(path: P) -> Result<Snapshot> {
    let path = path.as_ref();
    let format = VaultFormat::from_path(path)?;
    let content = tokio::fs::read_to_string(path).await?;
    from_str(&content, format)
}

/// Save a snapshot; the extension picks the codec.
///
/// Returns the path actually written: a missing or unknown extension is
/// replaced with `default_ext`.
pub fn save_snapshot_with_default<P: AsRef<Path>>(
    snapshot: &Snapshot,
    path: P,
    default_ext: &str,
) -> Result<PathBuf> {
    let path = path.as_ref();
    let path = match VaultFormat::from_path(path) {
        Ok(_) => path.to_path_buf(),
        Err(_) => path.with_extension(VaultFormat::from_extension(default_ext)?.extension()),
    };
    let format = VaultFormat::from_path(&path)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = to_string(snapshot, format)?;
    let mut file = std::fs::File::create(&path)?;
    file.write_all(content.as_bytes())?;

    tracing::debug!(path = %path.display(), parts = snapshot.parts.len(), "Saved vault snapshot");
    Ok(path)
}

/// Save a snapshot, defaulting to `.vault` when the extension is not recognized
pub fn save_snapshot<P: AsRef<Path>>(snapshot: &Snapshot, path: P) -> Result<PathBuf> {
    save_snapshot_with_default(snapshot, path, EXTENSION_RON)
}

/// Check if a path has a vault snapshot extension
pub fn is_vault_file<P: AsRef<Path>>(path: P) -> bool {
    VaultFormat::from_path(path.as_ref()).is_ok()
}
