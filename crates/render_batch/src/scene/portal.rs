//! Portals between sectors

use serde::{Deserialize, Serialize};

use super::bounds::{BoundingSphere, Plane};
use super::view::{RenderView, SectorId};
use crate::foundation::math::{Mat4, Mat4Ext, Vec3};

/// A one-way opening from one sector into another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portal {
    /// Bounds of the portal polygon
    pub bounds: BoundingSphere,
    /// Direction a viewer looks through the portal
    pub normal: Vec3,
    /// Sector seen through the portal
    pub target_sector: SectorId,
    /// Maps the viewer into the target sector's space (identity for plain openings)
    pub warp: Mat4,
}

impl Portal {
    /// Create a portal without a space warp
    pub fn new(bounds: BoundingSphere, normal: Vec3, target_sector: SectorId) -> Self {
        Self {
            bounds,
            normal: normal.normalize(),
            target_sector,
            warp: Mat4::identity(),
        }
    }

    /// Set the space warp (mirrors, teleport-style portals)
    pub fn with_warp(mut self, warp: Mat4) -> Self {
        self.warp = warp;
        self
    }

    /// View of the target sector as seen through this portal.
    ///
    /// The result is clipped by the portal plane so geometry between the
    /// viewer and the portal is not drawn twice.
    pub fn view_through(&self, view: &RenderView) -> RenderView {
        let camera = view.camera.transformed(&self.warp);
        let center = self.warp.project_point(self.bounds.center);
        let normal = self.warp.transform_vector(&self.normal);
        RenderView::new(camera, self.target_sector, view.frame)
            .with_clip_plane(Plane::from_point_normal(center, normal))
    }
}
