//! Per-bucket mesh ordering

use std::cmp::Ordering;

use super::context::ContextState;
use super::mesh_node::{MeshNode, MeshRecord};
use super::traverse::ParallelMeshNodeOperation;
use crate::config::SortMode;
use crate::scene::RenderView;

/// Orders the meshes of one bucket
pub trait MeshSorter: Sync {
    /// Reorder `node`'s meshes for `view`
    fn sort(&self, node: &mut MeshNode, view: &RenderView);
}

/// Sorts by camera distance where requested, otherwise by material to limit state changes.
///
/// Ties always fall back to material then geometry, so equal inputs give
/// the same order every frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardMeshSorter;

fn state_order(a: &MeshRecord, b: &MeshRecord) -> Ordering {
    a.mesh
        .material
        .id
        .cmp(&b.mesh.material.id)
        .then_with(|| a.mesh.geometry.cmp(&b.mesh.geometry))
}

impl MeshSorter for StandardMeshSorter {
    fn sort(&self, node: &mut MeshNode, view: &RenderView) {
        let eye = view.camera.position;
        let distance = |record: &MeshRecord| (record.mesh.bounds.center - eye).norm_squared();
        let mode = node.sort_mode();
        let meshes = node.meshes_mut();
        match mode {
            SortMode::None => meshes.sort_by(state_order),
            SortMode::FrontToBack => meshes.sort_by(|a, b| {
                distance(a)
                    .partial_cmp(&distance(b))
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| state_order(a, b))
            }),
            SortMode::BackToFront => meshes.sort_by(|a, b| {
                distance(b)
                    .partial_cmp(&distance(a))
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| state_order(a, b))
            }),
        }
    }
}

/// Sorts every bucket of a context; each bucket only touches its own meshes
pub struct SortMeshNodes<'a, S: MeshSorter> {
    sorter: &'a S,
}

impl<'a, S: MeshSorter> SortMeshNodes<'a, S> {
    /// Wrap a sorter
    pub fn new(sorter: &'a S) -> Self {
        Self { sorter }
    }
}

impl<S: MeshSorter> ParallelMeshNodeOperation for SortMeshNodes<'_, S> {
    fn apply(&self, node: &mut MeshNode, context: &ContextState, _sequence: usize) {
        self.sorter.sort(node, context.view());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render_tree::MeshNodeKey;
    use crate::scene::{
        BoundingSphere, Camera, GeometryId, Material, MaterialId, RenderMesh, SectorId,
    };
    use std::sync::Arc;

    fn node(mode: SortMode, meshes: &[(u32, u32, f32)]) -> MeshNode {
        let mut node = MeshNode::new(MeshNodeKey { priority: 0, sort_key: 0 }, mode);
        for &(geometry, material, z) in meshes {
            node.push(Arc::new(RenderMesh::new(
                GeometryId(geometry),
                Arc::new(Material::new(MaterialId(material), "m")),
                BoundingSphere::new(Vec3::new(0.0, 0.0, z), 1.0),
            )));
        }
        node
    }

    fn geometries(node: &MeshNode) -> Vec<u32> {
        node.meshes().iter().map(|r| r.mesh.geometry.0).collect()
    }

    fn view() -> RenderView {
        RenderView::new(Camera::new(Vec3::zeros(), -Vec3::z()), SectorId(0), 0)
    }

    #[test]
    fn test_front_to_back() {
        let mut n = node(SortMode::FrontToBack, &[(1, 0, -30.0), (2, 0, -5.0), (3, 0, -10.0)]);
        StandardMeshSorter.sort(&mut n, &view());
        assert_eq!(geometries(&n), vec![2, 3, 1]);
    }

    #[test]
    fn test_back_to_front() {
        let mut n = node(SortMode::BackToFront, &[(1, 0, -30.0), (2, 0, -5.0), (3, 0, -10.0)]);
        StandardMeshSorter.sort(&mut n, &view());
        assert_eq!(geometries(&n), vec![1, 3, 2]);
    }

    #[test]
    fn test_unsorted_groups_by_material_then_geometry() {
        let mut n = node(SortMode::None, &[(4, 2, -1.0), (3, 1, -1.0), (1, 2, -1.0), (2, 1, -1.0)]);
        StandardMeshSorter.sort(&mut n, &view());
        assert_eq!(geometries(&n), vec![2, 3, 1, 4]);
    }

    #[test]
    fn test_distance_ties_are_deterministic() {
        let mut a = node(SortMode::FrontToBack, &[(5, 1, -10.0), (6, 0, -10.0), (7, 0, -10.0)]);
        let mut b = node(SortMode::FrontToBack, &[(7, 0, -10.0), (5, 1, -10.0), (6, 0, -10.0)]);
        StandardMeshSorter.sort(&mut a, &view());
        StandardMeshSorter.sort(&mut b, &view());
        assert_eq!(geometries(&a), vec![6, 7, 5]);
        assert_eq!(geometries(&a), geometries(&b));
    }
}
