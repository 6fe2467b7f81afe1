//! # Vault Snapshot Model
//!
//! Flat, position-independent record of a composite item: one base item,
//! its magazine, every attachment (recursively) and any loose ammo containers.
//! Parent/child edges are plain part indices so the whole thing survives
//! serialization unchanged.
//!
//! ## Table of Contents
//! 1. Snapshot - Root container with ammo, flags and fire control
//! 2. PartRecord / PartRole - One captured part
//! 3. RoundClass - Opaque round type reference
//! 4. FireControl - Optional selector/spring overrides
//! 5. TransformData - Serializable pose
//! 6. Validation (SnapshotIssue)

use bevy::math::{Quat, Vec3};
use bevy::prelude::Transform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Current snapshot format tag
pub const FORMAT_VERSION: &str = "vault_v1";

/// Index of a part inside one snapshot
pub type PartIndex = u32;

/// Index reserved for the root part
pub const ROOT_INDEX: PartIndex = 0;

// ============================================================================
// 1. Snapshot
// ============================================================================

/// Complete vault file for one composite item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Format tag for compatibility checking
    #[serde(default = "default_format")]
    pub format: String,

    /// Display / file name of the vault entry
    #[serde(default)]
    pub file_name: String,

    /// When the snapshot was captured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// All captured parts (flat list, hierarchy via `attached_to`)
    pub parts: Vec<PartRecord>,

    /// Rounds in the single magazine / clip / speedloader present at capture, in load order.
    ///
    /// This is the loaded magazine when there is one, otherwise the first tray
    /// container. Tray containers also carry their own rounds on their record.
    #[serde(default)]
    pub rounds_in_container: Vec<RoundClass>,

    /// Rounds sitting in the base item's chambers, in chamber order
    #[serde(default)]
    pub rounds_in_chambers: Vec<RoundClass>,

    /// Root-level free-form state
    #[serde(default)]
    pub saved_flags: Vec<String>,

    /// Fire-control overrides, applied only when enabled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fire_control: Option<FireControl>,
}

fn default_format() -> String {
    FORMAT_VERSION.to_string()
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            format: default_format(),
            file_name: String::new(),
            created_at: None,
            parts: Vec::new(),
            rounds_in_container: Vec::new(),
            rounds_in_chambers: Vec::new(),
            saved_flags: Vec::new(),
            fire_control: None,
        }
    }
}

impl Snapshot {
    /// Create an empty snapshot with the given file name
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            ..Default::default()
        }
    }

    /// First part carrying the Root role
    pub fn root(&self) -> Option<&PartRecord> {
        self.parts.iter().find(|p| p.role == PartRole::Root)
    }

    /// Content id of the base item
    pub fn root_content_id(&self) -> Option<&str> {
        self.root().map(|p| p.content_id.as_str())
    }

    /// Look up a part by its index
    pub fn part(&self, index: PartIndex) -> Option<&PartRecord> {
        self.parts.iter().find(|p| p.index == index)
    }

    /// Distinct content ids referenced by this snapshot, sorted
    pub fn content_ids(&self) -> BTreeSet<&str> {
        self.parts.iter().map(|p| p.content_id.as_str()).collect()
    }

    /// Parts classified as attachments, in snapshot order
    pub fn attachments(&self) -> impl Iterator<Item = &PartRecord> {
        self.parts.iter().filter(|p| p.role == PartRole::Attachment)
    }

    /// True when `validate` reports nothing
    pub fn is_well_formed(&self) -> bool {
        self.validate().is_empty()
    }

    /// Check the structural invariants of the part list.
    ///
    /// Reconstruction tolerates most of these problems; this is for tooling
    /// that wants to reject or repair bad files up front.
    pub fn validate(&self) -> Vec<SnapshotIssue> {
        let mut issues = Vec::new();

        let roots: Vec<&PartRecord> = self.parts.iter().filter(|p| p.role == PartRole::Root).collect();
        match roots.as_slice() {
            [] => issues.push(SnapshotIssue::MissingRoot),
            [root] => {
                if root.index != ROOT_INDEX {
                    issues.push(SnapshotIssue::RootNotFirst { index: root.index });
                }
            }
            many => issues.push(SnapshotIssue::MultipleRoots { count: many.len() }),
        }

        let mut seen = HashSet::new();
        for part in &self.parts {
            if !seen.insert(part.index) {
                issues.push(SnapshotIssue::DuplicateIndex { index: part.index });
            }
        }

        for part in &self.parts {
            match (part.role, part.attached_to) {
                (PartRole::Attachment, None) => {
                    issues.push(SnapshotIssue::AttachmentWithoutParent { index: part.index });
                }
                (PartRole::Attachment, Some(parent)) if parent == part.index => {
                    issues.push(SnapshotIssue::SelfAttached { index: part.index });
                }
                (PartRole::Attachment, Some(parent)) if !seen.contains(&parent) => {
                    issues.push(SnapshotIssue::DanglingParent { index: part.index, parent });
                }
                (PartRole::Attachment, Some(_)) => {}
                (_, Some(parent)) => {
                    issues.push(SnapshotIssue::UnexpectedParent { index: part.index, parent });
                }
                (_, None) => {}
            }
        }

        for index in self.cyclic_parts() {
            issues.push(SnapshotIssue::Cycle { index });
        }

        issues
    }

    /// Attachment indices whose parent chain loops back on itself
    fn cyclic_parts(&self) -> Vec<PartIndex> {
        let parents: HashMap<PartIndex, PartIndex> = self
            .attachments()
            .filter_map(|p| p.attached_to.map(|parent| (p.index, parent)))
            .filter(|(index, parent)| index != parent)
            .collect();

        let mut cyclic = BTreeSet::new();
        for &start in parents.keys() {
            let mut visited = HashSet::new();
            let mut current = start;
            while let Some(&parent) = parents.get(&current) {
                if !visited.insert(current) {
                    cyclic.extend(visited.iter().copied().filter(|i| on_cycle(&parents, *i)));
                    break;
                }
                current = parent;
            }
        }
        cyclic.into_iter().collect()
    }

    /// Longest chain of attachments hanging off a non-attachment part.
    ///
    /// Returns 0 when there are no attachments. Unreachable attachments
    /// (dangling, parentless or cyclic) do not count.
    pub fn attachment_depth(&self) -> usize {
        let roles: HashMap<PartIndex, PartRole> = self.parts.iter().map(|p| (p.index, p.role)).collect();
        let mut depth: HashMap<PartIndex, usize> = self
            .parts
            .iter()
            .filter(|p| p.role != PartRole::Attachment)
            .map(|p| (p.index, 0))
            .collect();

        // Layered relaxation; terminates because each round adds at least one entry
        loop {
            let mut progressed = false;
            for part in self.attachments() {
                if depth.contains_key(&part.index) {
                    continue;
                }
                let Some(parent) = part.attached_to else { continue };
                if !roles.contains_key(&parent) {
                    continue;
                }
                if let Some(&d) = depth.get(&parent) {
                    depth.insert(part.index, d + 1);
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }

        depth.values().copied().max().unwrap_or(0)
    }

    /// Structural equality used for round-trip checks.
    ///
    /// Compares part count, order, roles, content ids, edges, flags, ammo and
    /// root state exactly, and poses within `epsilon`.
    pub fn structurally_eq(&self, other: &Snapshot, epsilon: f32) -> bool {
        self.parts.len() == other.parts.len()
            && self
                .parts
                .iter()
                .zip(&other.parts)
                .all(|(a, b)| a.structurally_eq(b, epsilon))
            && self.rounds_in_container == other.rounds_in_container
            && self.rounds_in_chambers == other.rounds_in_chambers
            && self.saved_flags == other.saved_flags
            && self.fire_control == other.fire_control
    }
}

/// Whether `index` can reach itself by following parent edges
fn on_cycle(parents: &HashMap<PartIndex, PartIndex>, index: PartIndex) -> bool {
    let mut current = index;
    for _ in 0..=parents.len() {
        match parents.get(&current) {
            Some(&parent) if parent == index => return true,
            Some(&parent) => current = parent,
            None => return false,
        }
    }
    false
}

// ============================================================================
// 2. PartRecord
// ============================================================================

/// Mutually exclusive classification of a captured part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartRole {
    /// The base item; always index 0
    Root,
    /// Detachable magazine loaded in the base item
    Magazine,
    /// Mounted on another part of the composite
    Attachment,
    /// Loose ammo container (clip, speedloader) staged next to the base item
    TrayItem,
}

/// One node of the captured composite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartRecord {
    /// Unique within the snapshot
    pub index: PartIndex,

    /// Catalog key for the part's loadable representation
    pub content_id: String,

    /// Position in the root's reset-rotation frame
    #[serde(default)]
    pub position_offset: [f32; 3],

    /// Forward basis vector in the root's reset-rotation frame
    #[serde(default = "default_forward")]
    pub orientation_forward: [f32; 3],

    /// Up basis vector in the root's reset-rotation frame
    #[serde(default = "default_up")]
    pub orientation_up: [f32; 3],

    /// Parent part index (attachments only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_to: Option<PartIndex>,

    /// Mount point index on the parent (attachments only)
    #[serde(default)]
    pub mount_slot: u32,

    pub role: PartRole,

    /// Opaque per-part state
    #[serde(default)]
    pub flags: BTreeMap<String, String>,

    /// Rounds held by a tray container, in load order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rounds: Vec<RoundClass>,
}

fn default_forward() -> [f32; 3] {
    Vec3::NEG_Z.to_array()
}

fn default_up() -> [f32; 3] {
    Vec3::Y.to_array()
}

impl PartRecord {
    /// Part with an identity pose and no flags
    pub fn new(index: PartIndex, content_id: impl Into<String>, role: PartRole) -> Self {
        Self {
            index,
            content_id: content_id.into(),
            position_offset: [0.0; 3],
            orientation_forward: default_forward(),
            orientation_up: default_up(),
            attached_to: None,
            mount_slot: 0,
            role,
            flags: BTreeMap::new(),
            rounds: Vec::new(),
        }
    }

    /// Mark as an attachment on `parent` at `mount_slot`
    pub fn attached(mut self, parent: PartIndex, mount_slot: u32) -> Self {
        self.role = PartRole::Attachment;
        self.attached_to = Some(parent);
        self.mount_slot = mount_slot;
        self
    }

    /// Set the captured pose
    pub fn with_pose(mut self, offset: Vec3, forward: Vec3, up: Vec3) -> Self {
        self.position_offset = offset.to_array();
        self.orientation_forward = forward.to_array();
        self.orientation_up = up.to_array();
        self
    }

    /// Add a flag
    pub fn with_flag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.flags.insert(key.into(), value.into());
        self
    }

    pub fn offset(&self) -> Vec3 {
        Vec3::from_array(self.position_offset)
    }

    pub fn forward(&self) -> Vec3 {
        Vec3::from_array(self.orientation_forward)
    }

    pub fn up(&self) -> Vec3 {
        Vec3::from_array(self.orientation_up)
    }

    fn structurally_eq(&self, other: &PartRecord, epsilon: f32) -> bool {
        self.index == other.index
            && self.content_id == other.content_id
            && self.role == other.role
            && self.attached_to == other.attached_to
            && (self.attached_to.is_none() || self.mount_slot == other.mount_slot)
            && self.flags == other.flags
            && self.rounds == other.rounds
            && self.offset().abs_diff_eq(other.offset(), epsilon)
            && self.forward().abs_diff_eq(other.forward(), epsilon)
            && self.up().abs_diff_eq(other.up(), epsilon)
    }
}

// ============================================================================
// 3. RoundClass
// ============================================================================

/// Opaque identifier for one loaded round's type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoundClass(pub String);

impl RoundClass {
    pub fn new(class: impl Into<String>) -> Self {
        Self(class.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoundClass {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for RoundClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// 4. FireControl
// ============================================================================

/// Selector mode kinds shared by every action type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FireSelectorModeType {
    Safe,
    Single,
    Burst,
    FullAuto,
    SuperFastBurst,
}

/// One selector position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireSelectorMode {
    pub selector_position: f32,
    pub mode: FireSelectorModeType,
    /// Rounds per burst; -1 when the action has no burst counter
    #[serde(default = "default_burst")]
    pub burst_amount: i32,
}

fn default_burst() -> i32 {
    -1
}

/// Main spring timing of the action
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpringTiming {
    pub speed_forward: f32,
    pub speed_rearward: f32,
    pub spring_stiffness: f32,
}

/// Fire-control override block
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FireControl {
    /// Apply `spring` on spawn
    #[serde(default)]
    pub override_fire_rate: bool,

    /// Apply `selector_modes` on spawn
    #[serde(default)]
    pub override_fire_selectors: bool,

    #[serde(default)]
    pub selector_modes: Vec<FireSelectorMode>,

    #[serde(default)]
    pub spring: SpringTiming,
}

impl FireControl {
    /// True when at least one override is switched on
    pub fn is_enabled(&self) -> bool {
        self.override_fire_rate || self.override_fire_selectors
    }
}

// ============================================================================
// 5. TransformData
// ============================================================================

/// Serializable pose (position + quaternion x, y, z, w + scale)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformData {
    #[serde(default)]
    pub position: [f32; 3],
    #[serde(default = "default_rotation")]
    pub rotation: [f32; 4],
    #[serde(default = "default_scale")]
    pub scale: [f32; 3],
}

fn default_rotation() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

fn default_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

impl Default for TransformData {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 0.0],
            rotation: default_rotation(),
            scale: default_scale(),
        }
    }
}

impl TransformData {
    pub fn at(position: [f32; 3]) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }
}

impl From<Transform> for TransformData {
    fn from(t: Transform) -> Self {
        Self {
            position: t.translation.to_array(),
            rotation: t.rotation.to_array(),
            scale: t.scale.to_array(),
        }
    }
}

impl From<TransformData> for Transform {
    fn from(t: TransformData) -> Self {
        Transform {
            translation: Vec3::from_array(t.position),
            rotation: Quat::from_array(t.rotation).normalize(),
            scale: Vec3::from_array(t.scale),
        }
    }
}

// ============================================================================
// 6. Validation
// ============================================================================

/// Structural problem found by `Snapshot::validate`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotIssue {
    #[error("no part has the Root role")]
    MissingRoot,

    #[error("{count} parts have the Root role")]
    MultipleRoots { count: usize },

    #[error("root part has index {index}, expected 0")]
    RootNotFirst { index: PartIndex },

    #[error("index {index} is used by more than one part")]
    DuplicateIndex { index: PartIndex },

    #[error("attachment {index} has no parent")]
    AttachmentWithoutParent { index: PartIndex },

    #[error("attachment {index} references missing part {parent}")]
    DanglingParent { index: PartIndex, parent: PartIndex },

    #[error("attachment {index} is attached to itself")]
    SelfAttached { index: PartIndex },

    #[error("non-attachment {index} carries parent {parent}")]
    UnexpectedParent { index: PartIndex, parent: PartIndex },

    #[error("attachment {index} is part of a parent cycle")]
    Cycle { index: PartIndex },
}
