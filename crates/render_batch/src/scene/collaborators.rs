//! Contracts for the systems the batcher consumes
//!
//! Visibility culling and light queries are owned by the engine; the batcher
//! only relies on the traits here. The list-based implementations are enough
//! for small scenes and for tests, and can be swapped for spatial structures
//! without touching the batcher.

use std::cmp::Ordering;
use std::sync::Arc;

use super::bounds::BoundingSphere;
use super::light::{LightInfluence, LightRegistry};
use super::mesh::RenderMesh;
use super::portal::Portal;
use super::view::{RenderView, SectorId};

/// Result of culling one view
#[derive(Debug, Clone, Default)]
pub struct VisibleSet {
    /// Visible meshes
    pub meshes: Vec<Arc<RenderMesh>>,
    /// Visible portals leading out of the view's sector
    pub portals: Vec<Portal>,
}

impl VisibleSet {
    /// Empty the set, keeping allocations
    pub fn clear(&mut self) {
        self.meshes.clear();
        self.portals.clear();
    }
}

/// Finds what a view can see.
///
/// Must be deterministic for a fixed view. Called at most once per context per frame.
pub trait VisibilityCuller {
    /// Fill `out` with everything visible from `view`; `out` is cleared first
    fn cull(&self, view: &RenderView, out: &mut VisibleSet);
}

/// Linear list culler (no spatial optimization)
#[derive(Debug, Default)]
pub struct SimpleListCuller {
    meshes: Vec<(SectorId, Arc<RenderMesh>)>,
    portals: Vec<(SectorId, Portal)>,
}

impl SimpleListCuller {
    /// Create an empty culler
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a mesh in a sector
    pub fn add_mesh(&mut self, sector: SectorId, mesh: Arc<RenderMesh>) {
        self.meshes.push((sector, mesh));
    }

    /// Place a portal in the sector it leads out of
    pub fn add_portal(&mut self, sector: SectorId, portal: Portal) {
        self.portals.push((sector, portal));
    }

    /// Total number of meshes across sectors
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }
}

impl VisibilityCuller for SimpleListCuller {
    fn cull(&self, view: &RenderView, out: &mut VisibleSet) {
        out.clear();
        out.meshes.extend(
            self.meshes
                .iter()
                .filter(|(sector, mesh)| *sector == view.sector && view.is_visible(&mesh.bounds))
                .map(|(_, mesh)| Arc::clone(mesh)),
        );
        out.portals.extend(
            self.portals
                .iter()
                .filter(|(sector, portal)| {
                    *sector == view.sector && view.is_visible(&portal.bounds)
                })
                .map(|(_, portal)| portal.clone()),
        );
    }
}

/// Finds the lights reaching a mesh.
///
/// `out` is a caller-owned scratch buffer; implementations clear it and
/// then fill it, so one buffer can be reused for every mesh of a frame.
pub trait LightQuery {
    /// Write at most `max` influences, most relevant first
    fn query(
        &self,
        sector: SectorId,
        bounds: &BoundingSphere,
        max: usize,
        out: &mut Vec<LightInfluence>,
    );
}

/// Brute-force query over every light in a registry
#[derive(Debug, Clone, Copy)]
pub struct RegistryLightQuery<'a> {
    registry: &'a LightRegistry,
}

impl<'a> RegistryLightQuery<'a> {
    /// Query lights of `registry`
    pub fn new(registry: &'a LightRegistry) -> Self {
        Self { registry }
    }
}

impl LightQuery for RegistryLightQuery<'_> {
    fn query(
        &self,
        sector: SectorId,
        bounds: &BoundingSphere,
        max: usize,
        out: &mut Vec<LightInfluence>,
    ) {
        out.clear();
        for (id, light) in self.registry.iter() {
            if light.sector.is_some_and(|s| s != sector) || !light.reaches(bounds) {
                continue;
            }
            let distance = bounds.distance_to(light.position);
            let relevance = match light.light_type {
                super::light::LightType::Directional => light.intensity,
                _ => light.intensity / (1.0 + distance * distance),
            };
            out.push(LightInfluence::new(id, light, relevance));
        }
        // Stable, so equally relevant lights keep registry order
        out.sort_by(|a, b| b.relevance.partial_cmp(&a.relevance).unwrap_or(Ordering::Equal));
        out.truncate(max);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::scene::light::Light;
    use crate::scene::mesh::{GeometryId, Material, MaterialId};
    use crate::scene::view::Camera;

    fn mesh_at(z: f32) -> Arc<RenderMesh> {
        Arc::new(RenderMesh::new(
            GeometryId(1),
            Arc::new(Material::new(MaterialId(1), "m")),
            BoundingSphere::new(Vec3::new(0.0, 0.0, z), 1.0),
        ))
    }

    #[test]
    fn test_simple_list_culler_filters_sector_and_frustum() {
        let mut culler = SimpleListCuller::new();
        culler.add_mesh(SectorId(0), mesh_at(-10.0));
        culler.add_mesh(SectorId(0), mesh_at(10.0));
        culler.add_mesh(SectorId(1), mesh_at(-10.0));

        let view = RenderView::new(Camera::new(Vec3::zeros(), -Vec3::z()), SectorId(0), 0);
        let mut visible = VisibleSet::default();
        culler.cull(&view, &mut visible);
        assert_eq!(visible.meshes.len(), 1);
        assert_eq!(culler.mesh_count(), 3);
    }

    #[test]
    fn test_registry_query_orders_and_caps() {
        let mut registry = LightRegistry::new();
        let white = Vec3::new(1.0, 1.0, 1.0);
        let far = registry.insert(Light::point(Vec3::new(0.0, 0.0, 8.0), white, 1.0, 20.0));
        let near = registry.insert(Light::point(Vec3::new(0.0, 0.0, 2.0), white, 1.0, 20.0));
        let _out_of_range =
            registry.insert(Light::point(Vec3::new(0.0, 0.0, 100.0), white, 1.0, 5.0));
        let _other_sector =
            registry.insert(Light::point(Vec3::zeros(), white, 1.0, 20.0).in_sector(SectorId(7)));

        let query = RegistryLightQuery::new(&registry);
        let mut out = vec![];
        let bounds = BoundingSphere::new(Vec3::zeros(), 1.0);
        query.query(SectorId(0), &bounds, 8, &mut out);
        let ids: Vec<_> = out.iter().map(|i| i.light).collect();
        assert_eq!(ids, vec![near, far]);

        query.query(SectorId(0), &bounds, 1, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].light, near);
    }
}
