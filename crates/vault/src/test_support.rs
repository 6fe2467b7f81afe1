//! Shared fixtures for unit tests

use crate::catalog::{ContentDescriptor, MemoryCatalog, MountPointDef, PartKind};
use crate::hierarchy;
use crate::snapshot::{
    FireControl, FireSelectorMode, FireSelectorModeType, PartRecord, PartRole, RoundClass, Snapshot,
    SpringTiming, TransformData,
};
use bevy::prelude::*;

/// Catalog with a small rifle kit, loose ammo containers and a tube-fed shotgun
pub fn catalog() -> MemoryCatalog {
    let catalog = MemoryCatalog::new();

    catalog.register(
        ContentDescriptor::new("Rifle", PartKind::Firearm)
            .with_chambers(1)
            .with_mount(MountPointDef::new("top_rail", [0.0, 0.05, -0.1]))
            .with_mount(MountPointDef::new("under_rail", [0.0, -0.03, -0.3]).rescaling(0.8))
            .with_magazine_well(TransformData::at([0.0, -0.08, 0.05]))
            .with_fire_control(FireControl {
                selector_modes: vec![
                    FireSelectorMode {
                        selector_position: 0.0,
                        mode: FireSelectorModeType::Safe,
                        burst_amount: -1,
                    },
                    FireSelectorMode {
                        selector_position: 90.0,
                        mode: FireSelectorModeType::Single,
                        burst_amount: -1,
                    },
                ],
                spring: SpringTiming {
                    speed_forward: 10.0,
                    speed_rearward: 8.0,
                    spring_stiffness: 5.0,
                },
                ..Default::default()
            }),
    );
    catalog.register(ContentDescriptor::new("RifleMag", PartKind::Magazine).with_capacity(30));
    catalog.register(
        ContentDescriptor::new("Rail", PartKind::Attachment)
            .with_mount(MountPointDef::new("rail_slot", [0.0, 0.02, 0.0]).rescaling(1.5)),
    );
    catalog.register(ContentDescriptor::new("Scope", PartKind::Attachment).scales_to_mount());
    catalog.register(ContentDescriptor::new("Laser", PartKind::Attachment));
    catalog.register(ContentDescriptor::new("StripperClip", PartKind::Clip).with_capacity(5));
    catalog.register(ContentDescriptor::new("Speedloader", PartKind::Speedloader).with_capacity(6));

    let mut tube = ContentDescriptor::new("TubeShotgun", PartKind::Firearm)
        .with_capacity(5)
        .with_chambers(1);
    tube.integrated_magazine = true;
    catalog.register(tube);

    catalog
}

/// Spawn a registered part
pub fn spawn(world: &mut World, catalog: &MemoryCatalog, content_id: &str, transform: Transform) -> Entity {
    let descriptor = catalog
        .get(content_id)
        .unwrap_or_else(|| panic!("fixture catalog has no {content_id}"));
    hierarchy::spawn_part(world, &descriptor, transform)
}

/// Handles of the live rifle built by `build_rifle`
#[derive(Debug, Clone, Copy)]
pub struct LiveRifle {
    pub root: Entity,
    pub magazine: Entity,
    pub rail: Entity,
    pub scope: Entity,
    pub laser: Entity,
}

/// Rifle at `transform` with a loaded magazine [A, B, C], a chambered round,
/// a rail on the top mount carrying a scope, and a laser on the under mount
pub fn build_rifle(world: &mut World, catalog: &MemoryCatalog, transform: Transform) -> LiveRifle {
    let root = spawn(world, catalog, "Rifle", transform);
    let magazine = spawn(world, catalog, "RifleMag", Transform::IDENTITY);
    let rail = spawn(world, catalog, "Rail", Transform::IDENTITY);
    let scope = spawn(world, catalog, "Scope", Transform::IDENTITY);
    let laser = spawn(world, catalog, "Laser", Transform::IDENTITY);

    hierarchy::load_magazine(world, magazine, root).unwrap();
    hierarchy::load_rounds(world, magazine, &rounds(&["A", "B", "C"]), true).unwrap();
    hierarchy::snap_to_mount(world, rail, root, 0).unwrap();
    hierarchy::snap_to_mount(world, scope, rail, 0).unwrap();
    hierarchy::snap_to_mount(world, laser, root, 1).unwrap();

    // Give the scope a pose of its own so orientation capture is exercised
    world.get_mut::<Transform>(scope).unwrap().rotation = Quat::from_rotation_z(0.25);

    world
        .get_mut::<crate::components::Chambers>(root)
        .unwrap()
        .loaded = rounds(&["Tracer"]);
    world
        .get_mut::<crate::components::PartFlags>(rail)
        .unwrap()
        .0
        .insert("rail_cover".to_string(), "off".to_string());
    world.get_mut::<crate::components::SavedFlags>(root).unwrap().0 = vec!["bolt_closed".to_string()];

    LiveRifle {
        root,
        magazine,
        rail,
        scope,
        laser,
    }
}

pub fn rounds(classes: &[&str]) -> Vec<RoundClass> {
    classes.iter().copied().map(RoundClass::from).collect()
}

/// Four-part snapshot: rifle, magazine, rail on the rifle, scope on the rail
pub fn example_snapshot() -> Snapshot {
    let mut snapshot = Snapshot::new("example");
    snapshot.parts = vec![
        PartRecord::new(0, "Rifle", PartRole::Root),
        PartRecord::new(1, "RifleMag", PartRole::Magazine)
            .with_pose(Vec3::new(0.0, -0.08, 0.05), Vec3::NEG_Z, Vec3::Y),
        PartRecord::new(2, "Rail", PartRole::Attachment)
            .attached(0, 0)
            .with_pose(Vec3::new(0.0, 0.05, -0.1), Vec3::NEG_Z, Vec3::Y),
        PartRecord::new(3, "Scope", PartRole::Attachment)
            .attached(2, 0)
            .with_pose(Vec3::new(0.0, 0.07, -0.1), Vec3::NEG_Z, Vec3::Y),
    ];
    snapshot.rounds_in_container = rounds(&["A", "B", "C"]);
    snapshot
}

/// Attachment chain `depth` parts long hanging off a rifle root
pub fn chain_snapshot(depth: u32) -> Snapshot {
    let mut snapshot = Snapshot::new("chain");
    snapshot.parts.push(PartRecord::new(0, "Rifle", PartRole::Root));
    for index in 1..=depth {
        snapshot.parts.push(
            PartRecord::new(index, "Rail", PartRole::Attachment)
                .attached(index - 1, 0)
                .with_pose(Vec3::new(0.0, 0.02 * index as f32, 0.0), Vec3::NEG_Z, Vec3::Y),
        );
    }
    snapshot
}
