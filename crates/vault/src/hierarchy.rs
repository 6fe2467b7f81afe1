//! # Live Composite Graph
//!
//! Operations on the live side of the vault: spawning parts from catalog
//! descriptors, walking mount chains to world space, attaching/detaching,
//! loading magazines and rounds, and enumerating a composite.
//!
//! A part's `Transform` is local to its mount parent, so moving or rotating
//! a part carries everything mounted on it.
//!
//! ## Table of Contents
//! 1. Spawning
//! 2. Poses (global_transform, set_global_transform, mount_transform)
//! 3. Attachments (attach_to_mount, snap_to_mount, detach, scale_to_mount)
//! 4. Ammunition (load_magazine, loaded_magazine, load_rounds)
//! 5. Enumeration (collect_composite)

use crate::catalog::{ContentDescriptor, PartKind};
use crate::components::{
    AmmoContainer, Attachable, AttachmentMounts, Chambers, FireControlState, LoadedInto,
    MagazineWell, MountPoint, MountedOn, PartFlags, SavedFlags, VaultItem,
};
use crate::error::{Result, VaultError};
use crate::math;
use crate::snapshot::RoundClass;
use bevy::prelude::*;
use std::collections::HashSet;
use tracing::{debug, warn};

// ============================================================================
// 1. Spawning
// ============================================================================

/// Spawn a free part from its catalog descriptor
pub fn spawn_part(world: &mut World, descriptor: &ContentDescriptor, transform: Transform) -> Entity {
    let mut entity = world.spawn((
        VaultItem {
            content_id: descriptor.content_id.clone(),
            kind: descriptor.kind,
        },
        transform,
        PartFlags::default(),
        AttachmentMounts(descriptor.mounts.iter().map(MountPoint::from).collect()),
    ));

    if descriptor.kind == PartKind::Attachment || descriptor.can_scale_to_mount {
        entity.insert(Attachable {
            can_scale_to_mount: descriptor.can_scale_to_mount,
        });
    }
    if let Some(well) = descriptor.magazine_well {
        entity.insert(MagazineWell {
            mount: well.into(),
            loaded: None,
        });
    }
    if descriptor.kind.is_ammo_container() || descriptor.integrated_magazine {
        entity.insert(AmmoContainer {
            capacity: descriptor.ammo_capacity,
            integrated: descriptor.integrated_magazine,
            ..Default::default()
        });
    }
    if descriptor.chamber_count > 0 {
        entity.insert(Chambers {
            count: descriptor.chamber_count,
            loaded: Vec::new(),
        });
    }
    if descriptor.kind == PartKind::Firearm {
        entity.insert(SavedFlags::default());
    }
    if let Some(fire_control) = &descriptor.fire_control {
        entity.insert(FireControlState {
            selector_modes: fire_control.selector_modes.clone(),
            spring: fire_control.spring,
        });
    }

    let id = entity.id();
    debug!(entity = %id, content_id = %descriptor.content_id, "Spawned vault part");
    id
}

fn require_part(world: &World, entity: Entity) -> Result<()> {
    match world.get::<VaultItem>(entity) {
        Some(_) => Ok(()),
        None => Err(VaultError::NotAPart(entity)),
    }
}

/// Part this entity is mounted on or loaded into
pub fn parent_of(world: &World, entity: Entity) -> Option<Entity> {
    world
        .get::<MountedOn>(entity)
        .map(|m| m.parent)
        .or_else(|| world.get::<LoadedInto>(entity).map(|l| l.0))
}

/// Whether `ancestor` appears in the parent chain of `entity`
fn is_ancestor(world: &World, ancestor: Entity, entity: Entity) -> bool {
    let mut visited = HashSet::from([entity]);
    let mut current = entity;
    while let Some(parent) = parent_of(world, current) {
        if parent == ancestor {
            return true;
        }
        if !visited.insert(parent) {
            return false;
        }
        current = parent;
    }
    false
}

// ============================================================================
// 2. Poses
// ============================================================================

/// World pose of a part, composed along its mount chain.
///
/// Returns `None` if the entity has no `Transform`. A looping chain is cut
/// at the first repeated entity.
pub fn global_transform(world: &World, entity: Entity) -> Option<Transform> {
    let mut chain = vec![*world.get::<Transform>(entity)?];
    let mut visited = HashSet::from([entity]);
    let mut current = entity;

    while let Some(parent) = parent_of(world, current) {
        if !visited.insert(parent) {
            warn!(entity = %entity, "Mount chain loops back on itself");
            break;
        }
        let Some(local) = world.get::<Transform>(parent) else {
            break;
        };
        chain.push(*local);
        current = parent;
    }

    Some(
        chain
            .into_iter()
            .rev()
            .fold(Transform::IDENTITY, |acc, local| acc.mul_transform(local)),
    )
}

/// Move a part so its world pose becomes `global`
pub fn set_global_transform(world: &mut World, entity: Entity, global: Transform) -> Result<()> {
    let local = match parent_of(world, entity).and_then(|p| global_transform(world, p)) {
        Some(parent_global) => math::relative_to(&parent_global, &global),
        None => global,
    };
    let mut transform = world
        .get_mut::<Transform>(entity)
        .ok_or(VaultError::NotAPart(entity))?;
    *transform = local;
    Ok(())
}

fn mount_point(world: &World, parent: Entity, slot: u32) -> Result<&MountPoint> {
    let mounts = world
        .get::<AttachmentMounts>(parent)
        .ok_or(VaultError::NotAPart(parent))?;
    mounts.get(slot).ok_or(VaultError::MountOutOfRange {
        parent,
        slot,
        available: mounts.len(),
    })
}

/// World pose of mount `slot` on `parent`
pub fn mount_transform(world: &World, parent: Entity, slot: u32) -> Result<Transform> {
    let local = mount_point(world, parent, slot)?.local;
    let parent_global = global_transform(world, parent).ok_or(VaultError::NotAPart(parent))?;
    Ok(parent_global.mul_transform(local))
}

// ============================================================================
// 3. Attachments
// ============================================================================

/// Mount `child` on `parent` at `slot`, keeping the child's world pose.
///
/// The child is detached from wherever it was first. Fails without touching
/// the world if the slot does not exist or the parent hangs off the child.
pub fn attach_to_mount(world: &mut World, child: Entity, parent: Entity, slot: u32) -> Result<()> {
    require_part(world, child)?;
    require_part(world, parent)?;
    mount_point(world, parent, slot)?;
    if child == parent || is_ancestor(world, child, parent) {
        return Err(VaultError::AttachCycle { child, parent });
    }

    let child_global = global_transform(world, child).ok_or(VaultError::NotAPart(child))?;
    detach(world, child)?;
    let parent_global = global_transform(world, parent).ok_or(VaultError::NotAPart(parent))?;

    world
        .get_entity_mut(child)
        .map_err(|_| VaultError::NotAPart(child))?
        .insert(MountedOn { parent, slot });
    if let Some(mut mounts) = world.get_mut::<AttachmentMounts>(parent) {
        if let Some(mount) = mounts.0.get_mut(slot as usize) {
            mount.attached.push(child);
        }
    }
    if let Some(mut transform) = world.get_mut::<Transform>(child) {
        *transform = math::relative_to(&parent_global, &child_global);
    }

    debug!(child = %child, parent = %parent, slot, "Attached part");
    Ok(())
}

/// Mount `child` on `parent` and move it onto the mount point itself
pub fn snap_to_mount(world: &mut World, child: Entity, parent: Entity, slot: u32) -> Result<()> {
    attach_to_mount(world, child, parent, slot)?;
    let local = mount_point(world, parent, slot)?.local;
    let mut transform = world
        .get_mut::<Transform>(child)
        .ok_or(VaultError::NotAPart(child))?;
    transform.translation = local.translation;
    transform.rotation = local.rotation;
    Ok(())
}

/// Free a part from its mount or magazine well, keeping its world pose.
///
/// Returns `false` if the part was already free.
pub fn detach(world: &mut World, child: Entity) -> Result<bool> {
    require_part(world, child)?;
    let Some(parent) = parent_of(world, child) else {
        return Ok(false);
    };
    let global = global_transform(world, child).ok_or(VaultError::NotAPart(child))?;

    world
        .get_entity_mut(child)
        .map_err(|_| VaultError::NotAPart(child))?
        .remove::<(MountedOn, LoadedInto)>();
    if let Some(mut mounts) = world.get_mut::<AttachmentMounts>(parent) {
        mounts.release(child);
    }
    if let Some(mut well) = world.get_mut::<MagazineWell>(parent) {
        if well.loaded == Some(child) {
            well.loaded = None;
        }
    }
    if let Some(mut transform) = world.get_mut::<Transform>(child) {
        *transform = global;
    }
    Ok(true)
}

/// Rescale `child` to the mount's scale when both sides allow it.
///
/// Returns whether the scale changed.
pub fn scale_to_mount(world: &mut World, child: Entity, parent: Entity, slot: u32) -> Result<bool> {
    let mount = mount_point(world, parent, slot)?;
    let (can_rescale, scale) = (mount.can_rescale, mount.scale);
    let can_scale = world
        .get::<Attachable>(child)
        .is_some_and(|a| a.can_scale_to_mount);
    if !(can_rescale && can_scale) {
        return Ok(false);
    }

    let mut transform = world
        .get_mut::<Transform>(child)
        .ok_or(VaultError::NotAPart(child))?;
    transform.scale = Vec3::splat(scale);
    Ok(true)
}

// ============================================================================
// 4. Ammunition
// ============================================================================

/// Seat `magazine` in the firearm's magazine well, ejecting any other magazine
pub fn load_magazine(world: &mut World, magazine: Entity, firearm: Entity) -> Result<()> {
    require_part(world, magazine)?;
    let well = world
        .get::<MagazineWell>(firearm)
        .ok_or(VaultError::NoMagazineWell(firearm))?;
    let (mount, previous) = (well.mount, well.loaded);
    if magazine == firearm {
        return Err(VaultError::AttachCycle {
            child: magazine,
            parent: firearm,
        });
    }

    if let Some(previous) = previous.filter(|p| *p != magazine) {
        detach(world, previous)?;
    }
    detach(world, magazine)?;

    world
        .get_entity_mut(magazine)
        .map_err(|_| VaultError::NotAPart(magazine))?
        .insert(LoadedInto(firearm));
    if let Some(mut well) = world.get_mut::<MagazineWell>(firearm) {
        well.loaded = Some(magazine);
    }
    if let Some(mut transform) = world.get_mut::<Transform>(magazine) {
        transform.translation = mount.translation;
        transform.rotation = mount.rotation;
    }

    debug!(magazine = %magazine, firearm = %firearm, "Loaded magazine");
    Ok(())
}

/// Magazine currently feeding a firearm; an integrated magazine is the firearm itself
pub fn loaded_magazine(world: &World, firearm: Entity) -> Option<Entity> {
    if let Some(loaded) = world.get::<MagazineWell>(firearm).and_then(|w| w.loaded) {
        return Some(loaded);
    }
    world
        .get::<AmmoContainer>(firearm)
        .filter(|ammo| ammo.integrated)
        .map(|_| firearm)
}

/// Replace a container's rounds with `rounds`, in order.
///
/// With `truncate`, rounds past the container's capacity are dropped.
/// Clears `infinite`. Returns the number of rounds loaded.
pub fn load_rounds(
    world: &mut World,
    container: Entity,
    rounds: &[RoundClass],
    truncate: bool,
) -> Result<usize> {
    let mut ammo = world
        .get_mut::<AmmoContainer>(container)
        .ok_or(VaultError::NotAContainer(container))?;

    let keep = if truncate {
        rounds.len().min(ammo.capacity)
    } else {
        rounds.len()
    };
    if keep < rounds.len() {
        warn!(
            container = %container,
            capacity = ammo.capacity,
            dropped = rounds.len() - keep,
            "Container overfull, dropping rounds"
        );
    }

    ammo.rounds = rounds[..keep].to_vec();
    ammo.infinite = false;
    Ok(keep)
}

// ============================================================================
// 5. Enumeration
// ============================================================================

/// Every part of the composite rooted at `root`, in capture order.
///
/// Root first, then its loaded (non-integrated) magazine, then attachments
/// depth-first: the root's mounts in order, then the magazine's mounts.
pub fn collect_composite(world: &World, root: Entity) -> Result<Vec<Entity>> {
    require_part(world, root)?;

    let mut order = vec![root];
    let mut seen = HashSet::from([root]);

    let magazine = world
        .get::<MagazineWell>(root)
        .and_then(|w| w.loaded)
        .filter(|m| world.get::<VaultItem>(*m).is_some());
    if let Some(magazine) = magazine {
        if seen.insert(magazine) {
            order.push(magazine);
        }
    }

    collect_attachments(world, root, &mut order, &mut seen);
    if let Some(magazine) = magazine {
        collect_attachments(world, magazine, &mut order, &mut seen);
    }
    Ok(order)
}

fn collect_attachments(world: &World, part: Entity, order: &mut Vec<Entity>, seen: &mut HashSet<Entity>) {
    let Some(mounts) = world.get::<AttachmentMounts>(part) else {
        return;
    };
    for child in mounts.attached().collect::<Vec<_>>() {
        if world.get::<VaultItem>(child).is_none() || !seen.insert(child) {
            continue;
        }
        order.push(child);
        collect_attachments(world, child, order, seen);
    }
}
