//! # Content Catalog
//!
//! Maps content ids to spawnable part descriptors. Reconstruction only ever
//! talks to the catalog through the `ContentCatalog` trait, passed in
//! explicitly per call.
//!
//! ## Table of Contents
//! 1. CatalogError - Lookup / load failures
//! 2. ContentDescriptor - Static metadata for one kind of part
//! 3. ContentCatalog - Async catalog contract + batch loading
//! 4. MemoryCatalog - DashMap-backed catalog with load statistics
//! 5. CatalogManifest - RON manifest of descriptors

use crate::snapshot::{FireControl, TransformData};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

// ============================================================================
// 1. CatalogError
// ============================================================================

/// Error types for content lookup
#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("Content not found: {0}")]
    NotFound(String),

    #[error("Failed to load {content_id}: {reason}")]
    Load { content_id: String, reason: String },

    #[error("Invalid catalog manifest: {0}")]
    Manifest(String),
}

// ============================================================================
// 2. ContentDescriptor
// ============================================================================

/// What kind of object a content id spawns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartKind {
    Firearm,
    Magazine,
    Clip,
    Speedloader,
    Attachment,
    Prop,
}

impl PartKind {
    /// Kinds that hold a sequence of rounds
    pub fn is_ammo_container(self) -> bool {
        matches!(self, PartKind::Magazine | PartKind::Clip | PartKind::Speedloader)
    }
}

/// One attachment mount point on a part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MountPointDef {
    #[serde(default)]
    pub name: String,

    /// Pose relative to the owning part
    #[serde(default)]
    pub pose: TransformData,

    /// Whether attachments mounted here may rescale themselves
    #[serde(default)]
    pub can_rescale: bool,

    /// Uniform scale applied to rescalable attachments
    #[serde(default = "default_mount_scale")]
    pub scale: f32,
}

fn default_mount_scale() -> f32 {
    1.0
}

impl MountPointDef {
    pub fn new(name: impl Into<String>, position: [f32; 3]) -> Self {
        Self {
            name: name.into(),
            pose: TransformData::at(position),
            can_rescale: false,
            scale: 1.0,
        }
    }

    pub fn rescaling(mut self, scale: f32) -> Self {
        self.can_rescale = true;
        self.scale = scale;
        self
    }
}

/// Static metadata the catalog yields for a content id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDescriptor {
    pub content_id: String,

    pub kind: PartKind,

    /// Maximum rounds for magazines, clips and speedloaders
    #[serde(default)]
    pub ammo_capacity: usize,

    /// Number of chambers on a firearm
    #[serde(default)]
    pub chamber_count: usize,

    /// Ordered attachment mount points
    #[serde(default)]
    pub mounts: Vec<MountPointDef>,

    /// Where a magazine sits when loaded (firearms only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub magazine_well: Option<TransformData>,

    /// Magazine is built into the firearm and never captured separately
    #[serde(default)]
    pub integrated_magazine: bool,

    /// Attachment can rescale itself to fit a mount
    #[serde(default)]
    pub can_scale_to_mount: bool,

    /// Factory fire-control settings (firearms only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fire_control: Option<FireControl>,
}

impl ContentDescriptor {
    pub fn new(content_id: impl Into<String>, kind: PartKind) -> Self {
        Self {
            content_id: content_id.into(),
            kind,
            ammo_capacity: 0,
            chamber_count: 0,
            mounts: Vec::new(),
            magazine_well: None,
            integrated_magazine: false,
            can_scale_to_mount: false,
            fire_control: None,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.ammo_capacity = capacity;
        self
    }

    pub fn with_chambers(mut self, count: usize) -> Self {
        self.chamber_count = count;
        self
    }

    pub fn with_mount(mut self, mount: MountPointDef) -> Self {
        self.mounts.push(mount);
        self
    }

    pub fn with_magazine_well(mut self, pose: TransformData) -> Self {
        self.magazine_well = Some(pose);
        self
    }

    pub fn with_fire_control(mut self, fire_control: FireControl) -> Self {
        self.fire_control = Some(fire_control);
        self
    }

    pub fn scales_to_mount(mut self) -> Self {
        self.can_scale_to_mount = true;
        self
    }
}

// ============================================================================
// 3. ContentCatalog
// ============================================================================

/// Catalog contract consumed by the completeness check and reconstruction
#[async_trait]
pub trait ContentCatalog: Send + Sync {
    /// Synchronous existence check
    fn exists(&self, content_id: &str) -> bool;

    /// Load the descriptor for a content id
    async fn load(&self, content_id: &str) -> Result<Arc<ContentDescriptor>, CatalogError>;

    /// Catalog name for logging
    fn name(&self) -> &str {
        "catalog"
    }
}

/// Load every distinct id as one batch and wait for all of them.
///
/// Ids are de-duplicated before any request is issued. The first failure
/// fails the whole batch.
pub async fn load_batch<'a, I>(
    catalog: &dyn ContentCatalog,
    content_ids: I,
) -> Result<HashMap<String, Arc<ContentDescriptor>>, CatalogError>
where
    I: IntoIterator<Item = &'a str>,
{
    let distinct: BTreeSet<&str> = content_ids.into_iter().collect();
    debug!(catalog = catalog.name(), count = distinct.len(), "Loading content batch");

    let loads = distinct.iter().map(|id| catalog.load(id));
    let descriptors = futures::future::try_join_all(loads).await?;

    Ok(distinct
        .into_iter()
        .map(str::to_string)
        .zip(descriptors)
        .collect())
}

// ============================================================================
// 4. MemoryCatalog
// ============================================================================

/// Load statistics for a catalog
#[derive(Debug, Default)]
pub struct CatalogStats {
    pub load_requests: AtomicUsize,
    pub load_misses: AtomicUsize,
}

impl CatalogStats {
    pub fn requests(&self) -> usize {
        self.load_requests.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> usize {
        self.load_misses.load(Ordering::Relaxed)
    }
}

/// In-memory catalog backed by a concurrent map
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    entries: DashMap<String, Arc<ContentDescriptor>>,

    /// Performance statistics
    pub stats: CatalogStats,

    /// Ids in the order they were requested
    load_log: Mutex<Vec<String>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a parsed manifest
    pub fn from_manifest(manifest: CatalogManifest) -> Self {
        let catalog = Self::new();
        for descriptor in manifest.items {
            catalog.register(descriptor);
        }
        catalog
    }

    /// Parse a RON manifest string
    pub fn from_manifest_str(content: &str) -> Result<Self, CatalogError> {
        let manifest: CatalogManifest =
            ron::from_str(content).map_err(|e| CatalogError::Manifest(e.to_string()))?;
        Ok(Self::from_manifest(manifest))
    }

    /// Load a RON manifest file
    pub fn from_manifest_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Manifest(format!("{}: {}", path.display(), e)))?;
        let catalog = Self::from_manifest_str(&content)?;
        info!(path = %path.display(), items = catalog.len(), "Loaded catalog manifest");
        Ok(catalog)
    }

    /// Add or replace a descriptor
    pub fn register(&self, descriptor: ContentDescriptor) {
        self.entries
            .insert(descriptor.content_id.clone(), Arc::new(descriptor));
    }

    /// Remove a descriptor (e.g. its content pack was unloaded)
    pub fn remove(&self, content_id: &str) -> Option<Arc<ContentDescriptor>> {
        self.entries.remove(content_id).map(|(_, d)| d)
    }

    /// Synchronous lookup without touching statistics
    pub fn get(&self, content_id: &str) -> Option<Arc<ContentDescriptor>> {
        self.entries.get(content_id).map(|d| Arc::clone(d.value()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids passed to `load`, in request order
    pub fn load_log(&self) -> Vec<String> {
        self.load_log.lock().clone()
    }
}

#[async_trait]
impl ContentCatalog for MemoryCatalog {
    fn exists(&self, content_id: &str) -> bool {
        self.entries.contains_key(content_id)
    }

    async fn load(&self, content_id: &str) -> Result<Arc<ContentDescriptor>, CatalogError> {
        self.stats.load_requests.fetch_add(1, Ordering::Relaxed);
        self.load_log.lock().push(content_id.to_string());

        // Loads complete on a later poll, like a real asset fetch
        tokio::task::yield_now().await;

        match self.get(content_id) {
            Some(descriptor) => Ok(descriptor),
            None => {
                self.stats.load_misses.fetch_add(1, Ordering::Relaxed);
                Err(CatalogError::NotFound(content_id.to_string()))
            }
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}

// ============================================================================
// 5. CatalogManifest
// ============================================================================

/// RON list of descriptors
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogManifest {
    pub items: Vec<ContentDescriptor>,
}
