//! # Reconstruction Engine
//!
//! Rebuilds a live composite from a `Snapshot` at a target pose.
//!
//! ## Phases
//! 1. **Gather** - load every distinct content id as one batch (the only await)
//! 2. **Instantiate** - spawn one entity per record; root at the target
//!    position with identity rotation, magazine into the well, tray items
//!    stacked upward, attachments queued
//! 3. **Resolve** - fixed-point attachment of queued parts (see `resolve`)
//! 4. **Finalize** - chambers, root flags, root rotation, fire control
//!
//! A missing root fails before anything is spawned. Unresolvable attachments
//! do not: they stay spawned, unattached, and are listed in the outcome.

use crate::catalog::{load_batch, ContentCatalog, ContentDescriptor};
use crate::completeness;
use crate::components::{AmmoContainer, Chambers, FireControlState, PartFlags, SavedFlags};
use crate::config::VaultConfig;
use crate::error::{Result, VaultError};
use crate::hierarchy;
use crate::math;
use crate::resolve::{resolve_attachments, ResolveOutcome};
use crate::snapshot::{FireControl, PartIndex, PartRecord, PartRole, Snapshot};
use bevy::prelude::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reconstruction state, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Gather,
    Instantiate,
    Resolve,
    Finalize,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Gather => "gather",
            Phase::Instantiate => "instantiate",
            Phase::Resolve => "resolve",
            Phase::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

/// Live result of a reconstruction
#[derive(Debug, Clone)]
pub struct Reconstruction {
    /// The base item
    pub root: Entity,
    /// Spawned entity for every part index
    pub parts: BTreeMap<PartIndex, Entity>,
    pub outcome: ResolveOutcome,
}

impl Reconstruction {
    pub fn entity(&self, index: PartIndex) -> Option<Entity> {
        self.parts.get(&index).copied()
    }
}

/// Attachments waiting for the resolver, plus what was placed up front
struct Instantiated<'s> {
    base: Entity,
    parts: BTreeMap<PartIndex, Entity>,
    resolved: BTreeSet<PartIndex>,
    pending: Vec<&'s PartRecord>,
}

type Descriptors = HashMap<String, Arc<ContentDescriptor>>;

/// Spawns snapshots back into a world using a content catalog
pub struct Reconstructor {
    catalog: Arc<dyn ContentCatalog>,
    config: VaultConfig,
}

impl Reconstructor {
    pub fn new(catalog: Arc<dyn ContentCatalog>) -> Self {
        Self {
            catalog,
            config: VaultConfig::default(),
        }
    }

    pub fn with_config(mut self, config: VaultConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn catalog(&self) -> &dyn ContentCatalog {
        self.catalog.as_ref()
    }

    /// Run the completeness check, then `spawn`
    pub async fn spawn_checked(
        &self,
        world: &mut World,
        snapshot: &Snapshot,
        position: Vec3,
        rotation: Quat,
    ) -> Result<Reconstruction> {
        let missing = completeness::missing_content(snapshot, self.catalog());
        if !missing.is_empty() {
            return Err(VaultError::IncompleteSnapshot { missing });
        }
        self.spawn(world, snapshot, position, rotation).await
    }

    /// Spawn `snapshot` with its root at `position` / `rotation`
    pub async fn spawn(
        &self,
        world: &mut World,
        snapshot: &Snapshot,
        position: Vec3,
        rotation: Quat,
    ) -> Result<Reconstruction> {
        let root_record = snapshot.root().ok_or_else(|| VaultError::MissingRoot {
            file_name: snapshot.file_name.clone(),
        })?;

        debug!(phase = %Phase::Gather, file_name = %snapshot.file_name, "Reconstructing");
        let descriptors = load_batch(self.catalog(), snapshot.content_ids()).await?;

        debug!(phase = %Phase::Instantiate, parts = snapshot.parts.len(), "Reconstructing");
        let Instantiated {
            base,
            parts,
            resolved,
            pending,
        } = self.instantiate(world, snapshot, root_record, &descriptors, position, rotation)?;

        debug!(phase = %Phase::Resolve, pending = pending.len(), "Reconstructing");
        let base_global = hierarchy::global_transform(world, base).ok_or(VaultError::NotAPart(base))?;
        let outcome = resolve_attachments(
            pending,
            resolved,
            self.config.resolve_pass_limit(),
            |record| place_attachment(world, &parts, base_global, record),
        );

        debug!(phase = %Phase::Finalize, "Reconstructing");
        self.finalize(world, snapshot, base, rotation)?;

        info!(
            file_name = %snapshot.file_name,
            parts = parts.len(),
            passes = outcome.passes,
            unresolved = outcome.unresolved.len() + outcome.rejected.len(),
            "Reconstructed vault snapshot"
        );
        Ok(Reconstruction {
            root: base,
            parts,
            outcome,
        })
    }

    fn instantiate<'s>(
        &self,
        world: &mut World,
        snapshot: &'s Snapshot,
        root_record: &'s PartRecord,
        descriptors: &Descriptors,
        position: Vec3,
        rotation: Quat,
    ) -> Result<Instantiated<'s>> {
        let base = hierarchy::spawn_part(
            world,
            lookup_descriptor(descriptors, &root_record.content_id)?,
            Transform::from_translation(position),
        );
        apply_part_flags(world, base, root_record);

        let mut parts = BTreeMap::from([(root_record.index, base)]);
        let mut resolved = BTreeSet::from([root_record.index]);
        let mut pending = Vec::new();
        let mut tray_slot = 0usize;
        let truncate = self.config.truncate_overfull_containers;

        // Snapshots without per-record rounds and without a magazine keep
        // their tray ammo in `rounds_in_container`.
        let per_container_rounds = snapshot.parts.iter().any(|part| !part.rounds.is_empty());
        let has_magazine = hierarchy::loaded_magazine(world, base).is_some()
            || snapshot.parts.iter().any(|part| part.role == PartRole::Magazine);
        let shared_tray_rounds = if per_container_rounds || has_magazine {
            Vec::new()
        } else {
            snapshot.rounds_in_container.clone()
        };

        for record in &snapshot.parts {
            if std::ptr::eq(record, root_record) {
                continue;
            }
            if parts.contains_key(&record.index) {
                warn!(index = record.index, content_id = %record.content_id, "Duplicate part index, keeping first");
                continue;
            }
            let descriptor = lookup_descriptor(descriptors, &record.content_id)?;

            let entity = match record.role {
                PartRole::Root => {
                    warn!(index = record.index, "Extra root part, ignoring");
                    continue;
                }
                PartRole::Magazine => {
                    let free = Transform::from_translation(position).with_rotation(rotation);
                    let entity = hierarchy::spawn_part(world, descriptor, free);
                    if let Err(e) = hierarchy::load_magazine(world, entity, base) {
                        warn!(index = record.index, error = %e, "Magazine left unloaded");
                    }
                    resolved.insert(record.index);
                    entity
                }
                PartRole::TrayItem => {
                    let offset = tray_slot as f32 * self.config.tray_spacing * Vec3::Y;
                    tray_slot += 1;
                    let staged = Transform::from_translation(position + offset).with_rotation(rotation);
                    let entity = hierarchy::spawn_part(world, descriptor, staged);
                    let tray_rounds = if per_container_rounds {
                        &record.rounds
                    } else {
                        &shared_tray_rounds
                    };
                    if !tray_rounds.is_empty() && world.get::<AmmoContainer>(entity).is_some() {
                        hierarchy::load_rounds(world, entity, tray_rounds, truncate)?;
                    }
                    resolved.insert(record.index);
                    entity
                }
                PartRole::Attachment => {
                    pending.push(record);
                    hierarchy::spawn_part(world, descriptor, Transform::IDENTITY)
                }
            };

            apply_part_flags(world, entity, record);
            parts.insert(record.index, entity);
        }

        if !snapshot.rounds_in_container.is_empty() {
            if let Some(magazine) = hierarchy::loaded_magazine(world, base) {
                hierarchy::load_rounds(world, magazine, &snapshot.rounds_in_container, truncate)?;
            }
        }

        Ok(Instantiated {
            base,
            parts,
            resolved,
            pending,
        })
    }

    fn finalize(&self, world: &mut World, snapshot: &Snapshot, base: Entity, rotation: Quat) -> Result<()> {
        let chambered = &snapshot.rounds_in_chambers;
        match world.get_mut::<Chambers>(base) {
            Some(mut chambers) => {
                if chambered.len() > chambers.count {
                    warn!(
                        count = chambers.count,
                        dropped = chambered.len() - chambers.count,
                        "More chambered rounds than chambers"
                    );
                }
                let count = chambers.count;
                chambers.loaded = chambered.iter().take(count).cloned().collect();
            }
            None if !chambered.is_empty() => {
                warn!(entity = %base, "Base item has no chambers, dropping chambered rounds");
            }
            None => {}
        }

        let mut entity = world
            .get_entity_mut(base)
            .map_err(|_| VaultError::NotAPart(base))?;
        if !snapshot.saved_flags.is_empty() {
            entity.insert(SavedFlags(snapshot.saved_flags.clone()));
        }
        if let Some(mut transform) = entity.get_mut::<Transform>() {
            transform.rotation = rotation;
        }
        if let Some(fire_control) = snapshot.fire_control.as_ref().filter(|fc| fc.is_enabled()) {
            let state = apply_fire_control(entity.get::<FireControlState>().cloned(), fire_control);
            entity.insert(state);
        }
        Ok(())
    }
}

fn lookup_descriptor<'d>(descriptors: &'d Descriptors, content_id: &str) -> Result<&'d ContentDescriptor> {
    descriptors
        .get(content_id)
        .map(Arc::as_ref)
        .ok_or_else(|| crate::catalog::CatalogError::NotFound(content_id.to_string()).into())
}

fn apply_part_flags(world: &mut World, entity: Entity, record: &PartRecord) {
    if let Some(mut flags) = world.get_mut::<PartFlags>(entity) {
        flags.apply_flags(&record.flags);
    }
}

/// Place one attachment whose parent is already in the world
fn place_attachment(
    world: &mut World,
    parts: &BTreeMap<PartIndex, Entity>,
    base_global: Transform,
    record: &PartRecord,
) -> Result<()> {
    let entity = parts
        .get(&record.index)
        .copied()
        .ok_or(VaultError::UnknownPart(record.index))?;
    let parent_index = record.attached_to.ok_or(VaultError::UnknownPart(record.index))?;
    let parent = parts
        .get(&parent_index)
        .copied()
        .ok_or(VaultError::UnknownPart(parent_index))?;

    // Reject before moving anything
    hierarchy::mount_transform(world, parent, record.mount_slot)?;

    let global = Transform {
        translation: base_global.transform_point(record.offset()),
        rotation: math::look_rotation(record.forward(), record.up()),
        scale: Vec3::ONE,
    };
    hierarchy::set_global_transform(world, entity, global)?;
    hierarchy::attach_to_mount(world, entity, parent, record.mount_slot)?;
    hierarchy::scale_to_mount(world, entity, parent, record.mount_slot)?;

    debug!(index = record.index, parent = parent_index, slot = record.mount_slot, "Placed attachment");
    Ok(())
}

/// Overlay the enabled parts of `fire_control` on the live state
fn apply_fire_control(current: Option<FireControlState>, fire_control: &FireControl) -> FireControlState {
    let mut state = current.unwrap_or_default();
    if fire_control.override_fire_selectors {
        state.selector_modes = fire_control.selector_modes.clone();
    }
    if fire_control.override_fire_rate {
        state.spring = fire_control.spring;
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{capture, CaptureOptions};
    use crate::catalog::{CatalogError, MemoryCatalog};
    use crate::components::{MagazineWell, MountedOn, VaultItem};
    use crate::snapshot::{FireSelectorMode, FireSelectorModeType, SpringTiming};
    use crate::test_support::{self, rounds};

    fn reconstructor() -> (Arc<MemoryCatalog>, Reconstructor) {
        let catalog = Arc::new(test_support::catalog());
        (catalog.clone(), Reconstructor::new(catalog))
    }

    fn target() -> (Vec3, Quat) {
        (Vec3::new(2.0, 1.0, -3.0), Quat::from_rotation_y(1.2))
    }

    fn part_count(world: &mut World) -> usize {
        let mut query = world.query::<&VaultItem>();
        query.iter(world).count()
    }

    #[tokio::test]
    async fn test_example_snapshot() {
        let (_, reconstructor) = reconstructor();
        let mut world = World::new();
        let snapshot = test_support::example_snapshot();
        let (position, rotation) = target();

        let result = reconstructor.spawn(&mut world, &snapshot, position, rotation).await.unwrap();
        assert_eq!(result.parts.len(), 4);
        assert_eq!(result.outcome.passes, 2);
        assert_eq!(result.outcome.attached, vec![2, 3]);
        assert!(result.outcome.is_complete());

        let root = result.root;
        let (magazine, rail, scope) = (
            result.entity(1).unwrap(),
            result.entity(2).unwrap(),
            result.entity(3).unwrap(),
        );
        assert_eq!(world.get::<MountedOn>(rail), Some(&MountedOn { parent: root, slot: 0 }));
        assert_eq!(world.get::<MountedOn>(scope), Some(&MountedOn { parent: rail, slot: 0 }));
        assert_eq!(world.get::<MagazineWell>(root).unwrap().loaded, Some(magazine));

        let ammo = world.get::<AmmoContainer>(magazine).unwrap();
        assert_eq!(ammo.rounds, rounds(&["A", "B", "C"]));
        assert!(!ammo.infinite);

        // Root rotation was applied last and the attachments followed it
        let root_pose = world.get::<Transform>(root).unwrap();
        assert_eq!(root_pose.rotation, rotation);
        let rail_global = hierarchy::global_transform(&world, rail).unwrap();
        let expected = position + rotation * Vec3::new(0.0, 0.05, -0.1);
        assert!(rail_global.translation.distance(expected) < 1e-4);

        // Scope sits on a rescaling mount and can rescale itself
        assert_eq!(world.get::<Transform>(scope).unwrap().scale, Vec3::splat(1.5));
    }

    #[tokio::test]
    async fn test_capture_round_trip() {
        let (catalog, reconstructor) = reconstructor();
        let mut world = World::new();
        let held = Transform::from_xyz(0.5, 1.5, 0.0).with_rotation(Quat::from_rotation_x(0.6));
        let rifle = test_support::build_rifle(&mut world, &catalog, held);
        let options = CaptureOptions::new("rifle").with_fire_control();

        let first = capture(&mut world, rifle.root, &options).unwrap();
        let (position, rotation) = target();
        let rebuilt = reconstructor.spawn(&mut world, &first, position, rotation).await.unwrap();
        let second = capture(&mut world, rebuilt.root, &options).unwrap();

        assert!(first.structurally_eq(&second, 1e-4), "{:#?}\n{:#?}", first, second);
    }

    #[tokio::test]
    async fn test_round_trip_with_tray_containers() {
        let (catalog, reconstructor) = reconstructor();
        let mut world = World::new();
        let held = Transform::from_xyz(0.5, 1.5, 0.0).with_rotation(Quat::from_rotation_x(0.6));
        let rifle = test_support::build_rifle(&mut world, &catalog, held);
        let (position, rotation) = target();

        // Staged where the first tray slot of a rebuilt item lands
        let clip_pose = Transform::from_translation(held.translation).with_rotation(rotation);
        let clip = test_support::spawn(&mut world, &catalog, "StripperClip", clip_pose);
        hierarchy::load_rounds(&mut world, clip, &rounds(&["D", "E"]), true).unwrap();

        let first = capture(&mut world, rifle.root, &CaptureOptions::new("rifle").with_tray_items([clip])).unwrap();
        assert_eq!(first.rounds_in_container, rounds(&["A", "B", "C"]));
        assert_eq!(first.parts[5].rounds, rounds(&["D", "E"]));

        let rebuilt = reconstructor.spawn(&mut world, &first, position, rotation).await.unwrap();
        let rebuilt_clip = rebuilt.entity(5).unwrap();
        let magazine = rebuilt.entity(1).unwrap();
        assert_eq!(world.get::<AmmoContainer>(magazine).unwrap().rounds, rounds(&["A", "B", "C"]));
        assert_eq!(world.get::<AmmoContainer>(rebuilt_clip).unwrap().rounds, rounds(&["D", "E"]));

        let options = CaptureOptions::new("rifle").with_tray_items([rebuilt_clip]);
        let second = capture(&mut world, rebuilt.root, &options).unwrap();
        assert!(first.structurally_eq(&second, 1e-4), "{:#?}\n{:#?}", first, second);
    }

    #[tokio::test]
    async fn test_pose_independence() {
        let (_, reconstructor) = reconstructor();
        let mut world = World::new();
        let snapshot = test_support::example_snapshot();
        let options = CaptureOptions::new("example");

        let a = reconstructor
            .spawn(&mut world, &snapshot, Vec3::ZERO, Quat::IDENTITY)
            .await
            .unwrap();
        let b = reconstructor
            .spawn(&mut world, &snapshot, Vec3::new(100.0, -5.0, 3.0), Quat::from_rotation_z(2.5))
            .await
            .unwrap();

        let first = capture(&mut world, a.root, &options).unwrap();
        let second = capture(&mut world, b.root, &options).unwrap();
        assert!(first.structurally_eq(&second, 1e-4));
        assert!(first.structurally_eq(&snapshot, 1e-4));
    }

    #[tokio::test]
    async fn test_dangling_reference_tolerated() {
        let (_, reconstructor) = reconstructor();
        let mut world = World::new();
        let mut snapshot = test_support::example_snapshot();
        snapshot.parts.push(PartRecord::new(4, "Laser", PartRole::Attachment).attached(42, 0));
        let (position, rotation) = target();

        let result = reconstructor.spawn(&mut world, &snapshot, position, rotation).await.unwrap();
        assert_eq!(result.outcome.attached, vec![2, 3]);
        assert_eq!(result.outcome.unresolved, vec![4]);

        let (root, rail, scope) = (result.root, result.entity(2).unwrap(), result.entity(3).unwrap());
        assert_eq!(world.get::<MountedOn>(rail), Some(&MountedOn { parent: root, slot: 0 }));
        assert_eq!(world.get::<MountedOn>(scope), Some(&MountedOn { parent: rail, slot: 0 }));
        for (entity, offset) in [(rail, Vec3::new(0.0, 0.05, -0.1)), (scope, Vec3::new(0.0, 0.07, -0.1))] {
            let global = hierarchy::global_transform(&world, entity).unwrap();
            let expected = position + rotation * offset;
            assert!(global.translation.distance(expected) < 1e-4, "{entity}: {:?}", global.translation);
        }

        let laser = result.entity(4).unwrap();
        assert!(world.get::<MountedOn>(laser).is_none());
        assert_eq!(*world.get::<Transform>(laser).unwrap(), Transform::IDENTITY);
    }

    #[tokio::test]
    async fn test_bad_mount_slot_rejected() {
        let (_, reconstructor) = reconstructor();
        let mut world = World::new();
        let mut snapshot = test_support::example_snapshot();
        snapshot.parts[2].mount_slot = 7;

        let result = reconstructor
            .spawn(&mut world, &snapshot, Vec3::ZERO, Quat::IDENTITY)
            .await
            .unwrap();
        assert_eq!(result.outcome.rejected, vec![2]);
        assert_eq!(result.outcome.unresolved, vec![3]);
        let rail = result.entity(2).unwrap();
        assert!(world.get::<MountedOn>(rail).is_none());
        assert_eq!(*world.get::<Transform>(rail).unwrap(), Transform::IDENTITY);
    }

    #[tokio::test]
    async fn test_missing_root_spawns_nothing() {
        let (catalog, reconstructor) = reconstructor();
        let mut world = World::new();
        let mut snapshot = test_support::example_snapshot();
        snapshot.parts.remove(0);

        let result = reconstructor.spawn(&mut world, &snapshot, Vec3::ZERO, Quat::IDENTITY).await;
        assert!(matches!(result, Err(VaultError::MissingRoot { file_name }) if file_name == "example"));
        assert_eq!(part_count(&mut world), 0);
        assert_eq!(catalog.stats.requests(), 0);
    }

    #[tokio::test]
    async fn test_completeness_gate() {
        let (catalog, reconstructor) = reconstructor();
        let mut world = World::new();
        let snapshot = test_support::example_snapshot();
        catalog.remove("Scope");

        let result = reconstructor
            .spawn_checked(&mut world, &snapshot, Vec3::ZERO, Quat::IDENTITY)
            .await;
        assert!(matches!(result, Err(VaultError::IncompleteSnapshot { missing }) if missing == vec!["Scope".to_string()]));
        assert_eq!(catalog.stats.requests(), 0);

        // Without the gate the failed load surfaces as an error value
        let result = reconstructor.spawn(&mut world, &snapshot, Vec3::ZERO, Quat::IDENTITY).await;
        assert!(matches!(result, Err(VaultError::Catalog(CatalogError::NotFound(id))) if id == "Scope"));
        assert_eq!(part_count(&mut world), 0);
    }

    #[tokio::test]
    async fn test_gather_loads_each_id_once() {
        let (catalog, reconstructor) = reconstructor();
        let mut world = World::new();
        let snapshot = test_support::chain_snapshot(4);

        let result = reconstructor
            .spawn(&mut world, &snapshot, Vec3::ZERO, Quat::IDENTITY)
            .await
            .unwrap();
        assert_eq!(result.outcome.passes, 4);
        assert_eq!(catalog.stats.requests(), 2);
        assert_eq!(catalog.load_log(), vec!["Rail".to_string(), "Rifle".to_string()]);
    }

    #[tokio::test]
    async fn test_tray_layout() {
        let (_, reconstructor) = reconstructor();
        let mut world = World::new();
        let mut snapshot = Snapshot::new("revolver kit");
        snapshot.parts = vec![
            PartRecord::new(0, "Rifle", PartRole::Root),
            PartRecord::new(1, "Speedloader", PartRole::TrayItem),
            PartRecord::new(2, "StripperClip", PartRole::TrayItem),
        ];
        snapshot.rounds_in_container = rounds(&["A", "B", "C", "D", "E", "F", "G"]);
        let (position, rotation) = target();

        let result = reconstructor.spawn(&mut world, &snapshot, position, rotation).await.unwrap();
        let speedloader = result.entity(1).unwrap();
        let clip = result.entity(2).unwrap();

        let pose = world.get::<Transform>(speedloader).unwrap();
        assert!(pose.translation.distance(position) < 1e-6);
        assert_eq!(pose.rotation, rotation);
        let pose = world.get::<Transform>(clip).unwrap();
        assert!(pose.translation.distance(position + 0.1 * Vec3::Y) < 1e-6);

        assert_eq!(world.get::<AmmoContainer>(speedloader).unwrap().rounds.len(), 6);
        assert_eq!(
            world.get::<AmmoContainer>(clip).unwrap().rounds,
            rounds(&["A", "B", "C", "D", "E"])
        );
    }

    #[tokio::test]
    async fn test_finalize_state() {
        let (_, reconstructor) = reconstructor();
        let mut world = World::new();
        let mut snapshot = test_support::example_snapshot();
        snapshot.rounds_in_chambers = rounds(&["X", "Y"]);
        snapshot.saved_flags = vec!["hammer_cocked".to_string()];
        snapshot.parts[2].flags.insert("rail_cover".into(), "on".into());

        let result = reconstructor
            .spawn(&mut world, &snapshot, Vec3::ZERO, Quat::IDENTITY)
            .await
            .unwrap();
        assert_eq!(world.get::<Chambers>(result.root).unwrap().loaded, rounds(&["X"]));
        assert_eq!(world.get::<SavedFlags>(result.root).unwrap().0, vec!["hammer_cocked".to_string()]);
        let rail_flags = world.get::<PartFlags>(result.entity(2).unwrap()).unwrap();
        assert_eq!(rail_flags.0.get("rail_cover").map(String::as_str), Some("on"));
    }

    #[tokio::test]
    async fn test_fire_control_overrides() {
        let (_, reconstructor) = reconstructor();
        let mut world = World::new();
        let spring = SpringTiming {
            speed_forward: 30.0,
            speed_rearward: 25.0,
            spring_stiffness: 12.0,
        };
        let mut snapshot = test_support::example_snapshot();
        snapshot.fire_control = Some(FireControl {
            override_fire_rate: true,
            override_fire_selectors: false,
            selector_modes: vec![FireSelectorMode {
                selector_position: 45.0,
                mode: FireSelectorModeType::FullAuto,
                burst_amount: -1,
            }],
            spring,
        });

        let result = reconstructor
            .spawn(&mut world, &snapshot, Vec3::ZERO, Quat::IDENTITY)
            .await
            .unwrap();
        let state = world.get::<FireControlState>(result.root).unwrap();
        assert_eq!(state.spring, spring);
        // Selector override was off, factory modes stay
        assert_eq!(state.selector_modes.len(), 2);
        assert_eq!(state.selector_modes[1].mode, FireSelectorModeType::Single);

        snapshot.fire_control = Some(FireControl {
            spring,
            ..Default::default()
        });
        let result = reconstructor
            .spawn(&mut world, &snapshot, Vec3::ZERO, Quat::IDENTITY)
            .await
            .unwrap();
        assert_eq!(world.get::<FireControlState>(result.root).unwrap().spring.speed_forward, 10.0);
    }

    #[tokio::test]
    async fn test_duplicate_index_keeps_first() {
        let (_, reconstructor) = reconstructor();
        let mut world = World::new();
        let mut snapshot = test_support::example_snapshot();
        snapshot.parts.push(PartRecord::new(3, "Laser", PartRole::Attachment).attached(0, 1));

        let result = reconstructor
            .spawn(&mut world, &snapshot, Vec3::ZERO, Quat::IDENTITY)
            .await
            .unwrap();
        assert_eq!(result.parts.len(), 4);
        let scope = result.entity(3).unwrap();
        assert_eq!(world.get::<VaultItem>(scope).unwrap().content_id, "Scope");
        assert_eq!(part_count(&mut world), 4);
    }

    #[tokio::test]
    async fn test_pass_limit_floor_from_config() {
        let (catalog, _) = reconstructor();
        let config = VaultConfig {
            max_resolve_passes: 1,
            ..Default::default()
        };
        let reconstructor = Reconstructor::new(catalog).with_config(config);
        let mut world = World::new();

        let result = reconstructor
            .spawn(&mut world, &test_support::chain_snapshot(3), Vec3::ZERO, Quat::IDENTITY)
            .await
            .unwrap();
        assert_eq!(result.outcome.passes, 3);
        assert!(result.outcome.is_complete());
    }
}
