//! Hooks that inject extra triangles into a tile after triangulation.

use std::{
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock},
};

use crate::{bounding_volume::BoundingVolume, math::Aabb3d, mesh::GeneratedMesh};

/// Identifies a registered [`TileGeneratorExtension`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct ExtensionId(pub u32);

/// What an extension gets to know about the tile being generated.
#[derive(Debug, Clone, Copy)]
pub struct ExtensionParams<'a> {
    /// The tile box in world space.
    pub tile_aabb: Aabb3d,
    /// The tile box grown by the border band.
    pub extended_aabb: Aabb3d,
    /// The agent type the tile is built for.
    pub agent_type_id: u32,
    /// The boundary volume of the mesh, if any.
    pub boundary: Option<&'a BoundingVolume>,
    /// The exclusion volumes.
    pub exclusions: &'a [BoundingVolume],
}

/// A hook adding triangles to generated tiles, e.g. for off-mesh connections or custom geometry.
pub trait TileGeneratorExtension: Send + Sync {
    /// Adds triangles to `mesh`, usually with [`GeneratedMesh::add_triangles_world`].
    ///
    /// Returning `false` stops the remaining extensions from running.
    fn generate(&self, params: &ExtensionParams, mesh: &mut GeneratedMesh) -> bool;
}

impl<F> TileGeneratorExtension for F
where
    F: Fn(&ExtensionParams, &mut GeneratedMesh) -> bool + Send + Sync,
{
    fn generate(&self, params: &ExtensionParams, mesh: &mut GeneratedMesh) -> bool {
        self(params, mesh)
    }
}

/// A thread-safe registry of [`TileGeneratorExtension`]s, shared between generator threads.
///
/// Extensions run in ascending [`ExtensionId`] order.
#[derive(Default)]
pub struct TileGeneratorExtensions {
    extensions: RwLock<BTreeMap<ExtensionId, Arc<dyn TileGeneratorExtension>>>,
}

impl std::fmt::Debug for TileGeneratorExtensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<_> = self.read().keys().copied().collect();
        f.debug_struct("TileGeneratorExtensions")
            .field("extensions", &ids)
            .finish()
    }
}

impl TileGeneratorExtensions {
    /// Registers an extension, replacing the one previously registered under `id`.
    pub fn register(&self, id: ExtensionId, extension: impl TileGeneratorExtension + 'static) {
        let previous = self
            .extensions
            .write()
            .unwrap_or_else(|poisoned| {
                tracing::warn!("Extension registry was poisoned, recovering");
                poisoned.into_inner()
            })
            .insert(id, Arc::new(extension));
        if previous.is_some() {
            tracing::debug!("Replaced tile generator extension {:?}", id);
        }
    }

    /// Removes an extension. Returns `true` if it was registered.
    pub fn unregister(&self, id: ExtensionId) -> bool {
        self.extensions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    /// The number of registered extensions.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if no extension is registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Runs every extension on `mesh` until one returns `false`.
    ///
    /// The registry stays read-locked while the extensions run, so registering from inside an extension deadlocks.
    pub fn run(&self, params: &ExtensionParams, mesh: &mut GeneratedMesh) {
        let extensions = self.read();
        for (id, extension) in extensions.iter() {
            if !extension.generate(params, mesh) {
                tracing::debug!("Tile generator extension {:?} stopped the extension chain", id);
                break;
            }
        }
    }

    fn read(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, BTreeMap<ExtensionId, Arc<dyn TileGeneratorExtension>>>
    {
        self.extensions.read().unwrap_or_else(|poisoned| {
            tracing::warn!("Extension registry was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}
