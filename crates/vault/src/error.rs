//! Error types for vault-engine
//!
//! ## Table of Contents
//! 1. VaultError - Main error enum
//! 2. Result type alias

use crate::catalog::CatalogError;
use bevy::prelude::Entity;
use thiserror::Error;

/// Result type alias for vault operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Errors that can occur while capturing, persisting or reconstructing a vault snapshot
#[derive(Error, Debug)]
pub enum VaultError {
    /// Snapshot has no part with the Root role; reconstruction cannot start
    #[error("Snapshot '{file_name}' has no root part")]
    MissingRoot { file_name: String },

    /// Completeness check failed before reconstruction
    #[error("Snapshot references content missing from the catalog: {missing:?}")]
    IncompleteSnapshot { missing: Vec<String> },

    /// Content catalog failed to load a descriptor
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    /// Entity is not a live vault part
    #[error("Entity {0} is not a vault part")]
    NotAPart(Entity),

    /// Mount slot index does not exist on the parent part
    #[error("Mount slot {slot} out of range on {parent} ({available} mounts)")]
    MountOutOfRange {
        parent: Entity,
        slot: u32,
        available: usize,
    },

    /// Part has no magazine well to load into
    #[error("Entity {0} has no magazine well")]
    NoMagazineWell(Entity),

    /// Snapshot part index has no spawned entity
    #[error("Snapshot part {0} was never spawned")]
    UnknownPart(u32),

    /// Part cannot hold rounds
    #[error("Entity {0} is not an ammo container")]
    NotAContainer(Entity),

    /// Attaching would make a part its own ancestor
    #[error("Cannot attach {child} to {parent}: parent is mounted on the child")]
    AttachCycle { child: Entity, parent: Entity },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// RON encode/decode error
    #[error("RON error: {0}")]
    Ron(String),

    /// Snapshot format tag not recognized
    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },

    /// File extension is neither a JSON nor a RON vault file
    #[error("Unsupported vault file extension '{0}'")]
    UnsupportedExtension(String),
}

impl From<ron::error::SpannedError> for VaultError {
    fn from(e: ron::error::SpannedError) -> Self {
        VaultError::Ron(e.to_string())
    }
}

impl From<ron::Error> for VaultError {
    fn from(e: ron::Error) -> Self {
        VaultError::Ron(e.to_string())
    }
}
