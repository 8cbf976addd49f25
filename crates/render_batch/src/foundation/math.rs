//! Math utilities and types
//!
//! `f32` aliases over nalgebra plus the handful of projection helpers the
//! culling and shadow code needs. All matrices follow the right-handed,
//! OpenGL-style clip convention nalgebra uses (`-w <= z <= w`).

pub use nalgebra::{Matrix4, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Pi / 2
    pub const HALF_PI: f32 = PI * 0.5;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }
}

/// Extension trait for Mat4 with additional convenience methods
pub trait Mat4Ext {
    /// Create a perspective projection matrix
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4;

    /// Create an orthographic projection matrix
    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4;

    /// Create a look-at view matrix
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4;

    /// Transform a point, applying the perspective divide
    fn project_point(&self, point: Vec3) -> Vec3;
}

impl Mat4Ext for Mat4 {
    fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_perspective(aspect.max(1e-4), fov_y, near, far)
    }

    fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        Mat4::new_orthographic(left, right, bottom, top, near, far)
    }

    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
        // A degenerate up vector would produce NaNs, pick another axis.
        let forward = target - eye;
        let up = if forward.cross(&up).norm_squared() < 1e-8 {
            Vec3::x()
        } else {
            up
        };
        Mat4::look_at_rh(&Point3::from(eye), &Point3::from(target), &up)
    }

    fn project_point(&self, point: Vec3) -> Vec3 {
        let clip = self * Vec4::new(point.x, point.y, point.z, 1.0);
        if clip.w.abs() <= f32::EPSILON {
            return clip.xyz();
        }
        clip.xyz() / clip.w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_look_at_maps_target_to_negative_z() {
        let view = Mat4::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::zeros(), Vec3::y());
        let p = view.project_point(Vec3::zeros());
        assert_relative_eq!(p, Vec3::new(0.0, 0.0, -5.0), epsilon = 1e-5);
    }

    #[test]
    fn test_look_at_degenerate_up() {
        let view = Mat4::look_at(Vec3::new(0.0, 10.0, 0.0), Vec3::zeros(), Vec3::y());
        assert!(view.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_orthographic_maps_box_to_clip_cube() {
        let proj = Mat4::orthographic(-2.0, 2.0, -1.0, 1.0, 1.0, 11.0);
        let corner = proj.project_point(Vec3::new(2.0, 1.0, -11.0));
        assert_relative_eq!(corner, Vec3::new(1.0, 1.0, 1.0), epsilon = 1e-5);
    }

    #[test]
    fn test_lerp() {
        assert_relative_eq!(utils::lerp(2.0, 4.0, 0.25), 2.5);
        assert_relative_eq!(utils::deg_to_rad(180.0), constants::PI);
    }
}
