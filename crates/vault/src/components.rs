//! Live composite object components
//!
//! Every live part is an entity carrying `VaultItem`. Its `Transform` is the
//! local pose relative to whatever it hangs off (`MountedOn` / `LoadedInto`),
//! or the world pose for free parts.
//!
//! ## Table of Contents
//! 1. VaultItem / PartFlags - Identity and opaque per-part state
//! 2. AttachmentMounts / MountedOn / Attachable - Attachment graph
//! 3. MagazineWell / LoadedInto - Magazine slot
//! 4. AmmoContainer / Chambers - Loaded rounds
//! 5. SavedFlags / FireControlState - Base item state

use crate::catalog::{MountPointDef, PartKind};
use crate::snapshot::{FireSelectorMode, RoundClass, SpringTiming};
use bevy::prelude::*;
use std::collections::BTreeMap;

// ============================================================================
// 1. Identity
// ============================================================================

/// Marks an entity as a live vault part
#[derive(Component, Debug, Clone, PartialEq)]
pub struct VaultItem {
    /// Catalog key this part was spawned from
    pub content_id: String,
    pub kind: PartKind,
}

/// Opaque per-part state, round-tripped without interpretation
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct PartFlags(pub BTreeMap<String, String>);

impl PartFlags {
    /// Current flags as a detached copy
    pub fn get_flags(&self) -> BTreeMap<String, String> {
        self.0.clone()
    }

    /// Merge flags in; existing keys are overwritten
    pub fn apply_flags(&mut self, flags: &BTreeMap<String, String>) {
        self.0
            .extend(flags.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

// ============================================================================
// 2. Attachment graph
// ============================================================================

/// One live mount point
#[derive(Debug, Clone, PartialEq)]
pub struct MountPoint {
    pub name: String,
    /// Pose relative to the owning part
    pub local: Transform,
    pub can_rescale: bool,
    pub scale: f32,
    /// Attachments on this mount, in attach order
    pub attached: Vec<Entity>,
}

impl From<&MountPointDef> for MountPoint {
    fn from(def: &MountPointDef) -> Self {
        Self {
            name: def.name.clone(),
            local: def.pose.into(),
            can_rescale: def.can_rescale,
            scale: def.scale,
            attached: Vec::new(),
        }
    }
}

/// Ordered mount points of a part; indexed by mount slot
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct AttachmentMounts(pub Vec<MountPoint>);

impl AttachmentMounts {
    pub fn get(&self, slot: u32) -> Option<&MountPoint> {
        self.0.get(slot as usize)
    }

    pub fn get_mut(&mut self, slot: u32) -> Option<&mut MountPoint> {
        self.0.get_mut(slot as usize)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Attached entities, mount by mount
    pub fn attached(&self) -> impl Iterator<Item = Entity> + '_ {
        self.0.iter().flat_map(|m| m.attached.iter().copied())
    }

    /// Forget `child` on every mount
    pub(crate) fn release(&mut self, child: Entity) {
        for mount in &mut self.0 {
            mount.attached.retain(|e| *e != child);
        }
    }
}

/// Edge from an attachment to the part it is mounted on
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MountedOn {
    pub parent: Entity,
    pub slot: u32,
}

/// Part can be mounted on another part
#[derive(Component, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Attachable {
    /// Rescales itself to fit mounts that allow it
    pub can_scale_to_mount: bool,
}

// ============================================================================
// 3. Magazine slot
// ============================================================================

/// Where a detachable magazine sits on a firearm
#[derive(Component, Debug, Clone, PartialEq)]
pub struct MagazineWell {
    /// Magazine pose relative to the firearm
    pub mount: Transform,
    pub loaded: Option<Entity>,
}

/// Edge from a magazine to the firearm it is loaded into
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedInto(pub Entity);

// ============================================================================
// 4. Rounds
// ============================================================================

/// Ordered round storage (magazine, clip, speedloader, integrated tube)
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct AmmoContainer {
    pub capacity: usize,
    /// Rounds in load order
    pub rounds: Vec<RoundClass>,
    /// Never runs dry; cleared whenever rounds are loaded from a vault
    pub infinite: bool,
    /// Built into its firearm rather than a separate part
    pub integrated: bool,
}

impl AmmoContainer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    pub fn is_full(&self) -> bool {
        self.rounds.len() >= self.capacity
    }
}

/// Firing chambers of a base item
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct Chambers {
    pub count: usize,
    /// Loaded rounds in chamber order
    pub loaded: Vec<RoundClass>,
}

// ============================================================================
// 5. Base item state
// ============================================================================

/// Root-level free-form state
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct SavedFlags(pub Vec<String>);

/// Live fire-control settings of a firearm
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct FireControlState {
    pub selector_modes: Vec<FireSelectorMode>,
    pub spring: SpringTiming,
}
