//! Cameras and render views

use serde::{Deserialize, Serialize};

use super::bounds::{BoundingSphere, Frustum, Plane};
use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3};

/// Identifies a sector (a cell of the portal graph)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct SectorId(pub u32);

/// Perspective camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Eye position
    pub position: Vec3,
    /// Point the camera looks at
    pub target: Vec3,
    /// Up vector
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Width over height
    pub aspect: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
}

impl Camera {
    /// Camera at `position` looking at `target` with a 60 degree field of view
    pub fn new(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            up: Vec3::y(),
            fov_y: utils::deg_to_rad(60.0),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 500.0,
        }
    }

    /// Set the projection parameters
    pub fn with_projection(mut self, fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        self.fov_y = fov_y;
        self.aspect = aspect;
        self.near = near;
        self.far = far;
        self
    }

    /// Normalized view direction
    pub fn forward(&self) -> Vec3 {
        let dir = self.target - self.position;
        if dir.norm_squared() <= f32::EPSILON {
            return -Vec3::z();
        }
        dir.normalize()
    }

    /// World to view transform
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at(self.position, self.target, self.up)
    }

    /// View to clip transform
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective(self.fov_y, self.aspect, self.near, self.far)
    }

    /// Combined world to clip transform
    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Distance of `point` along the view direction
    pub fn view_depth(&self, point: Vec3) -> f32 {
        (point - self.position).dot(&self.forward())
    }

    /// Same camera moved by a rigid transform
    pub fn transformed(&self, transform: &Mat4) -> Self {
        Self {
            position: transform.project_point(self.position),
            target: transform.project_point(self.target),
            up: transform.transform_vector(&self.up),
            ..self.clone()
        }
    }
}

/// Everything a context renders from: camera, culling volume and sector
#[derive(Debug, Clone, PartialEq)]
pub struct RenderView {
    /// Camera
    pub camera: Camera,
    /// Frustum derived from the camera
    pub frustum: Frustum,
    /// Extra clip planes, e.g. the plane of the portal this view looks through
    pub clip_planes: Vec<Plane>,
    /// Sector the camera is in
    pub sector: SectorId,
    /// Frame this view was created for
    pub frame: u64,
}

impl RenderView {
    /// Create a view
    pub fn new(camera: Camera, sector: SectorId, frame: u64) -> Self {
        let frustum = Frustum::from_matrix(&camera.view_projection());
        Self {
            camera,
            frustum,
            clip_planes: Vec::new(),
            sector,
            frame,
        }
    }

    /// Add a clip plane
    pub fn with_clip_plane(mut self, plane: Plane) -> Self {
        self.clip_planes.push(plane);
        self
    }

    /// Frustum and clip plane test
    pub fn is_visible(&self, bounds: &BoundingSphere) -> bool {
        self.frustum.intersects_sphere(bounds)
            && self.clip_planes.iter().all(|plane| plane.intersects_sphere(bounds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_view_depth() {
        let camera = Camera::new(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0));
        assert_relative_eq!(camera.view_depth(Vec3::new(3.0, 1.0, -7.0)), 7.0);
    }

    #[test]
    fn test_clip_plane_rejects() {
        let camera = Camera::new(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0));
        let view = RenderView::new(camera, SectorId(0), 0)
            .with_clip_plane(Plane::from_point_normal(Vec3::new(0.0, 0.0, -20.0), -Vec3::z()));
        assert!(view.is_visible(&BoundingSphere::new(Vec3::new(0.0, 0.0, -30.0), 1.0)));
        assert!(!view.is_visible(&BoundingSphere::new(Vec3::new(0.0, 0.0, -10.0), 1.0)));
    }

    #[test]
    fn test_transformed_camera() {
        let camera = Camera::new(Vec3::zeros(), Vec3::new(0.0, 0.0, -1.0));
        let moved = camera.transformed(&Mat4::new_translation(&Vec3::new(5.0, 0.0, 0.0)));
        assert_relative_eq!(moved.position, Vec3::new(5.0, 0.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(moved.forward(), camera.forward(), epsilon = 1e-6);
    }
}
