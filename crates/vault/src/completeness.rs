//! Completeness check: does every referenced content id resolve right now?
//!
//! A precondition gate before reconstruction. No partial credit.

use crate::catalog::ContentCatalog;
use crate::components::VaultItem;
use crate::hierarchy;
use crate::snapshot::Snapshot;
use bevy::prelude::{Entity, World};

/// True iff every part's content id exists in the catalog
pub fn all_parts_available(snapshot: &Snapshot, catalog: &dyn ContentCatalog) -> bool {
    snapshot.content_ids().into_iter().all(|id| catalog.exists(id))
}

/// Distinct content ids the catalog cannot resolve, sorted
pub fn missing_content(snapshot: &Snapshot, catalog: &dyn ContentCatalog) -> Vec<String> {
    snapshot
        .content_ids()
        .into_iter()
        .filter(|id| !catalog.exists(id))
        .map(str::to_string)
        .collect()
}

/// Same check over a live composite. A root that is not a vault part fails.
pub fn live_parts_available(world: &World, root: Entity, catalog: &dyn ContentCatalog) -> bool {
    let Ok(parts) = hierarchy::collect_composite(world, root) else {
        return false;
    };
    parts.into_iter().all(|part| {
        world
            .get::<VaultItem>(part)
            .is_some_and(|item| catalog.exists(&item.content_id))
    })
}
