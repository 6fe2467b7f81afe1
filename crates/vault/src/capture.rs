//! # Capture Engine
//!
//! Flattens a live composite (root, magazine, every attachment and any loose
//! tray containers) into a position-independent `Snapshot`.
//!
//! Poses are recorded in the root's frame with the root's rotation reset to
//! identity, so a snapshot does not depend on where or how the item was held.
//! The reset lives inside `RootRotationReset`, which restores the rotation
//! when dropped.
//!
//! ## Table of Contents
//! 1. CaptureOptions
//! 2. RootRotationReset - scoped rotation reset
//! 3. capture

use crate::components::{
    AmmoContainer, Chambers, FireControlState, MagazineWell, MountedOn, PartFlags, SavedFlags,
    VaultItem,
};
use crate::error::{Result, VaultError};
use crate::hierarchy::{collect_composite, global_transform, loaded_magazine};
use crate::math;
use crate::snapshot::{FireControl, PartIndex, PartRecord, PartRole, RoundClass, Snapshot};
use bevy::prelude::*;
use chrono::Utc;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use tracing::{info, warn};

// ============================================================================
// 1. CaptureOptions
// ============================================================================

/// What to capture besides the composite itself
#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    /// Name stored in the snapshot
    pub file_name: String,
    /// Loose clips / speedloaders to store alongside the item
    pub tray_items: Vec<Entity>,
    /// Record the firearm's fire-control settings as enabled overrides
    pub capture_fire_control: bool,
}

impl CaptureOptions {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Default::default()
        }
    }

    pub fn with_tray_items(mut self, tray_items: impl IntoIterator<Item = Entity>) -> Self {
        self.tray_items = tray_items.into_iter().collect();
        self
    }

    pub fn with_fire_control(mut self) -> Self {
        self.capture_fire_control = true;
        self
    }
}

// ============================================================================
// 2. RootRotationReset
// ============================================================================

/// Holds the world with a part's rotation set to identity; restores it on drop
pub struct RootRotationReset<'w> {
    world: &'w mut World,
    root: Entity,
    saved: Quat,
}

impl<'w> RootRotationReset<'w> {
    pub fn new(world: &'w mut World, root: Entity) -> Result<Self> {
        let saved = {
            let mut transform = world
                .get_mut::<Transform>(root)
                .ok_or(VaultError::NotAPart(root))?;
            std::mem::replace(&mut transform.rotation, Quat::IDENTITY)
        };
        Ok(Self { world, root, saved })
    }

    /// Rotation that will be restored
    pub fn saved_rotation(&self) -> Quat {
        self.saved
    }
}

impl Deref for RootRotationReset<'_> {
    type Target = World;

    fn deref(&self) -> &World {
        self.world
    }
}

impl DerefMut for RootRotationReset<'_> {
    fn deref_mut(&mut self) -> &mut World {
        self.world
    }
}

impl Drop for RootRotationReset<'_> {
    fn drop(&mut self) {
        if let Some(mut transform) = self.world.get_mut::<Transform>(self.root) {
            transform.rotation = self.saved;
        }
    }
}

// ============================================================================
// 3. capture
// ============================================================================

/// Capture the composite rooted at `root` into a snapshot.
///
/// The live object is only read; its rotation is back in place on return.
pub fn capture(world: &mut World, root: Entity, options: &CaptureOptions) -> Result<Snapshot> {
    if world.get::<VaultItem>(root).is_none() {
        return Err(VaultError::NotAPart(root));
    }

    let guard = RootRotationReset::new(world, root)?;
    let world: &World = &guard;

    let root_global = global_transform(world, root).ok_or(VaultError::NotAPart(root))?;
    let mut entities = collect_composite(world, root)?;
    let composite_len = entities.len();

    for &tray in &options.tray_items {
        if world.get::<VaultItem>(tray).is_none() {
            warn!(entity = %tray, "Tray item is not a vault part, skipping");
        } else if !entities.contains(&tray) {
            entities.push(tray);
        }
    }

    let indices: HashMap<Entity, PartIndex> = entities
        .iter()
        .enumerate()
        .map(|(i, &e)| (e, i as PartIndex))
        .collect();
    let magazine = world.get::<MagazineWell>(root).and_then(|w| w.loaded);

    let mut parts = Vec::with_capacity(entities.len());
    for (i, &entity) in entities.iter().enumerate() {
        let role = if i == 0 {
            PartRole::Root
        } else if Some(entity) == magazine {
            PartRole::Magazine
        } else if i >= composite_len {
            PartRole::TrayItem
        } else {
            PartRole::Attachment
        };
        let content_id = world
            .get::<VaultItem>(entity)
            .map(|item| item.content_id.clone())
            .unwrap_or_default();
        let mut record = PartRecord::new(i as PartIndex, content_id, role);

        if role != PartRole::Root {
            let global = global_transform(world, entity).ok_or(VaultError::NotAPart(entity))?;
            record = record.with_pose(
                math::inverse_transform_point(&root_global, global.translation),
                math::forward(global.rotation),
                math::up(global.rotation),
            );
        }
        if role == PartRole::Attachment {
            if let Some(mounted) = world.get::<MountedOn>(entity) {
                record.attached_to = indices.get(&mounted.parent).copied();
                record.mount_slot = mounted.slot;
            }
        }
        if let Some(flags) = world.get::<PartFlags>(entity) {
            record.flags = flags.get_flags();
        }
        if role == PartRole::TrayItem {
            if let Some(ammo) = world.get::<AmmoContainer>(entity) {
                record.rounds = ammo.rounds.clone();
            }
        }
        parts.push(record);
    }

    let first_tray_container = || {
        entities[composite_len..]
            .iter()
            .find(|&&tray| world.get::<AmmoContainer>(tray).is_some())
            .copied()
    };
    let rounds_in_container: Vec<RoundClass> = loaded_magazine(world, root)
        .or_else(first_tray_container)
        .and_then(|container| world.get::<AmmoContainer>(container))
        .map(|ammo| ammo.rounds.clone())
        .unwrap_or_default();

    let fire_control = if options.capture_fire_control {
        world.get::<FireControlState>(root).map(|state| FireControl {
            override_fire_rate: true,
            override_fire_selectors: true,
            selector_modes: state.selector_modes.clone(),
            spring: state.spring,
        })
    } else {
        None
    };

    let snapshot = Snapshot {
        file_name: options.file_name.clone(),
        created_at: Some(Utc::now()),
        parts,
        rounds_in_container,
        rounds_in_chambers: world
            .get::<Chambers>(root)
            .map(|c| c.loaded.clone())
            .unwrap_or_default(),
        saved_flags: world
            .get::<SavedFlags>(root)
            .map(|f| f.0.clone())
            .unwrap_or_default(),
        fire_control,
        ..Default::default()
    };
    drop(guard);

    info!(
        file_name = %snapshot.file_name,
        parts = snapshot.parts.len(),
        rounds = snapshot.rounds_in_container.len(),
        "Captured vault snapshot"
    );
    Ok(snapshot)
}
