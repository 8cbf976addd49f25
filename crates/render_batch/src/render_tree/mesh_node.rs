//! Mesh nodes and single mesh records

use std::sync::Arc;

use crate::config::SortMode;
use crate::scene::RenderMesh;

/// Orders mesh nodes inside a context: render priority first, then sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MeshNodeKey {
    /// Render priority
    pub priority: usize,
    /// User sort key
    pub sort_key: u32,
}

impl MeshNodeKey {
    /// Key of the bucket `mesh` belongs to
    pub fn of(mesh: &RenderMesh) -> Self {
        Self {
            priority: mesh.render_priority,
            sort_key: mesh.sort_key,
        }
    }
}

/// One renderable submission inside a mesh node
#[derive(Debug, Clone)]
pub struct MeshRecord {
    /// Geometry description
    pub mesh: Arc<RenderMesh>,
    pub(crate) index: usize,
}

impl MeshRecord {
    /// Wrap a mesh; the index is assigned by the numbering pass
    pub fn new(mesh: Arc<RenderMesh>) -> Self {
        Self { mesh, index: 0 }
    }

    /// Dense context-local index, valid once the context has been numbered
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Bucket of meshes sharing a render priority and sort key
#[derive(Debug, Clone)]
pub struct MeshNode {
    key: MeshNodeKey,
    sort_mode: SortMode,
    pub(crate) meshes: Vec<MeshRecord>,
}

impl MeshNode {
    /// Create an empty bucket
    pub fn new(key: MeshNodeKey, sort_mode: SortMode) -> Self {
        Self {
            key,
            sort_mode,
            meshes: Vec::new(),
        }
    }

    /// Bucket key
    pub fn key(&self) -> MeshNodeKey {
        self.key
    }

    /// How the bucket's meshes are sorted
    pub fn sort_mode(&self) -> SortMode {
        self.sort_mode
    }

    /// Meshes in visitation order
    pub fn meshes(&self) -> &[MeshRecord] {
        &self.meshes
    }

    /// Meshes for reordering; records cannot be added or removed through this
    pub fn meshes_mut(&mut self) -> &mut [MeshRecord] {
        &mut self.meshes
    }

    /// Append a mesh
    pub fn push(&mut self, mesh: Arc<RenderMesh>) {
        self.meshes.push(MeshRecord::new(mesh));
    }

    /// Number of meshes
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    /// Whether the bucket is empty
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}
