//! # vault-engine
//!
//! Capture a fully assembled composite item (base item, magazine, a tree of
//! attachments, loaded rounds and free-form per-part state) into a flat,
//! position-independent snapshot, and rebuild an equivalent live item from
//! that snapshot later, anywhere in the world.
//!
//! Live items are Bevy ECS entities. Snapshots are plain serde data with
//! parent/child edges stored as part indices.
//!
//! ## Features
//! - `capture`: live composite -> `Snapshot`
//! - `Reconstructor`: `Snapshot` + `ContentCatalog` -> live composite, with
//!   tolerant fixed-point attachment resolution
//! - `all_parts_available`: completeness gate before spawning
//! - `.vault` (RON) and `.json` snapshot files
//!
//! ## Table of Contents
//! 1. Error types (`error`)
//! 2. Configuration (`config`)
//! 3. Pose helpers (`math`)
//! 4. Snapshot model (`snapshot`)
//! 5. Snapshot files (`format`)
//! 6. Content catalog (`catalog`)
//! 7. Live components (`components`)
//! 8. Live graph operations (`hierarchy`)
//! 9. Capture (`capture`)
//! 10. Completeness check (`completeness`)
//! 11. Attachment resolver (`resolve`)
//! 12. Reconstruction (`reconstruct`)

pub mod capture;
pub mod catalog;
pub mod completeness;
pub mod components;
pub mod config;
pub mod error;
pub mod format;
pub mod hierarchy;
pub mod math;
pub mod reconstruct;
pub mod resolve;
pub mod snapshot;

#[cfg(test)]
mod test_support;

pub use capture::{capture, CaptureOptions, RootRotationReset};
pub use catalog::{
    load_batch, CatalogError, CatalogManifest, ContentCatalog, ContentDescriptor, MemoryCatalog,
    MountPointDef, PartKind,
};
pub use completeness::{all_parts_available, live_parts_available, missing_content};
pub use config::VaultConfig;
pub use error::{Result, VaultError};
pub use format::{load_snapshot, load_snapshot_async, save_snapshot};
pub use reconstruct::{Phase, Reconstruction, Reconstructor};
pub use resolve::{resolve_attachments, ResolveOutcome};
pub use snapshot::{
    FireControl, FireSelectorMode, FireSelectorModeType, PartIndex, PartRecord, PartRole,
    RoundClass, Snapshot, SnapshotIssue, SpringTiming, TransformData, FORMAT_VERSION,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::capture::{capture, CaptureOptions};
    pub use crate::catalog::{ContentCatalog, ContentDescriptor, MemoryCatalog, MountPointDef, PartKind};
    pub use crate::completeness::{all_parts_available, live_parts_available};
    pub use crate::components::{
        AmmoContainer, Attachable, AttachmentMounts, Chambers, FireControlState, LoadedInto,
        MagazineWell, MountPoint, MountedOn, PartFlags, SavedFlags, VaultItem,
    };
    pub use crate::config::VaultConfig;
    pub use crate::error::{Result, VaultError};
    pub use crate::format::{load_snapshot, save_snapshot};
    pub use crate::reconstruct::{Reconstruction, Reconstructor};
    pub use crate::snapshot::{PartRecord, PartRole, RoundClass, Snapshot};
}
