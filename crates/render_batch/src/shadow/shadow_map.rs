//! Classic shadow maps
//!
//! Spot and directional lights render one depth map each; shadow-casting point
//! lights expand to six sub-lights, one per cube face. Each sub-light that
//! actually covers a mesh takes a render target from a frame-scoped pool.

use super::pool::{ShadowTargetId, ShadowTargetPool};
use super::{LightRequest, ShadowCapability, ShadowViewRequest, SpreadMask};
use crate::config::ShadowConfig;
use crate::foundation::math::constants::{HALF_PI, PI};
use crate::foundation::math::{Mat4, Mat4Ext, Vec3};
use crate::scene::{Frustum, Light, LightId, LightType, RenderView};
use crate::shader::{names, ShaderValue, ShaderVarStack};

/// Near plane of light-space projections
const SHADOW_NEAR: f32 = 0.05;

/// Cube face looked at by point-light sub-light `face`, with its up vector
fn cube_face(face: usize) -> (Vec3, Vec3) {
    match face % 6 {
        0 => (Vec3::x(), -Vec3::y()),
        1 => (-Vec3::x(), -Vec3::y()),
        2 => (Vec3::y(), Vec3::z()),
        3 => (-Vec3::y(), -Vec3::z()),
        4 => (Vec3::z(), -Vec3::y()),
        _ => (-Vec3::z(), -Vec3::y()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ShadowFace {
    sub_light: usize,
    target: ShadowTargetId,
    view_projection: Mat4,
}

/// Targets a light acquired in the current frame
#[derive(Debug, Clone, Default)]
pub struct ShadowMapLightData {
    frame: u64,
    faces: Vec<ShadowFace>,
}

impl ShadowMapLightData {
    /// Sub-lights holding a target in `frame`
    pub fn face_count(&self, frame: u64) -> usize {
        if self.frame == frame {
            self.faces.len()
        } else {
            0
        }
    }
}

/// One depth map per shadow-casting sub-light
#[derive(Debug, Clone)]
pub struct ShadowMapShadows {
    pool: ShadowTargetPool,
    shadow_distance: f32,
    frame: u64,
    exhausted_warned: bool,
    requests: Vec<ShadowViewRequest>,
}

impl ShadowMapShadows {
    /// Create from configuration
    pub fn new(config: &ShadowConfig) -> Self {
        Self {
            pool: ShadowTargetPool::new(config.pool_size, config.map_resolution),
            shadow_distance: config.shadow_distance.max(SHADOW_NEAR * 4.0),
            frame: 0,
            exhausted_warned: false,
            requests: Vec::new(),
        }
    }

    /// Render target pool
    pub fn pool(&self) -> &ShadowTargetPool {
        &self.pool
    }

    /// Light-space view-projection of one sub-light
    pub fn light_view_projection(
        &self,
        light: &Light,
        sub_light: usize,
        view: &RenderView,
    ) -> Mat4 {
        let far = light.range.max(SHADOW_NEAR * 2.0);
        match light.light_type {
            LightType::Point => {
                let (dir, up) = cube_face(sub_light);
                Mat4::perspective(HALF_PI, 1.0, SHADOW_NEAR, far)
                    * Mat4::look_at(light.position, light.position + dir, up)
            }
            LightType::Spot => {
                let fov = (light.outer_cone_angle * 2.0).clamp(0.01, PI - 0.01);
                Mat4::perspective(fov, 1.0, SHADOW_NEAR, far)
                    * Mat4::look_at(light.position, light.position + light.direction, Vec3::y())
            }
            LightType::Directional => {
                let half = self.shadow_distance * 0.5;
                let center = view.camera.position + view.camera.forward() * half;
                let eye = center - light.direction.normalize() * self.shadow_distance;
                let depth = self.shadow_distance * 2.0;
                Mat4::orthographic(-half, half, -half, half, SHADOW_NEAR, depth)
                    * Mat4::look_at(eye, center, Vec3::y())
            }
        }
    }
}

impl ShadowCapability for ShadowMapShadows {
    type LightData = ShadowMapLightData;

    fn sublight_count(&self, light: &Light) -> usize {
        if light.light_type == LightType::Point && light.casts_shadows() {
            6
        } else {
            1
        }
    }

    fn begin_frame(&mut self, frame: u64) {
        self.frame = frame;
        self.exhausted_warned = false;
        self.requests.clear();
        self.pool.begin_frame(frame);
    }

    fn handle_light(
        &mut self,
        request: &LightRequest<'_>,
        data: &mut ShadowMapLightData,
        frames: &mut [ShaderVarStack],
    ) -> SpreadMask {
        let light = request.light;
        if !light.casts_shadows() {
            return 1;
        }
        if data.frame != self.frame {
            data.frame = self.frame;
            data.faces.clear();
        }
        // A map rendered earlier this frame keeps its matrix for every later view
        let existing = data.faces.iter().find(|f| f.sub_light == request.sub_light).copied();
        let view_projection = existing.map_or_else(
            || self.light_view_projection(light, request.sub_light, request.view),
            |face| face.view_projection,
        );
        if light.light_type != LightType::Directional
            && !Frustum::from_matrix(&view_projection).intersects_sphere(&request.mesh.bounds)
        {
            return 0;
        }

        let target = match existing {
            Some(face) => face.target,
            None => match self.pool.acquire(request.light_id, request.sub_light) {
                Ok(target) => {
                    data.faces.push(ShadowFace {
                        sub_light: request.sub_light,
                        target,
                        view_projection,
                    });
                    target
                }
                Err(err) => {
                    if !self.exhausted_warned {
                        log::warn!(
                            "{err}: light {:?} omitted where it needs a new map",
                            request.light_id
                        );
                        self.exhausted_warned = true;
                    }
                    return 0;
                }
            },
        };

        let (Some(stack), Some(&index)) = (frames.first_mut(), request.light_indices.first()) else {
            return 0;
        };
        let map = ShaderValue::Texture(u64::from(target.0));
        stack.push_array_item(names::LIGHT_SHADOW_MAP, index, map);
        stack.push_array_item(names::LIGHT_SHADOW_PROJECTION, index, view_projection);
        1
    }

    fn needs_final_pass(&self) -> bool {
        true
    }

    fn finalize_light(&mut self, light_id: LightId, _light: &Light, data: &mut ShadowMapLightData) {
        if data.frame != self.frame {
            return;
        }
        let resolution = self.pool.resolution();
        self.requests.extend(data.faces.iter().map(|face| ShadowViewRequest {
            light: light_id,
            sub_light: face.sub_light,
            target: face.target,
            view_projection: face.view_projection,
            resolution,
        }));
    }

    fn shadow_views(&self) -> &[ShadowViewRequest] {
        &self.requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ShadowTechnique;
    use crate::foundation::math::Vec3;
    use crate::scene::{
        BoundingSphere, Camera, GeometryId, LightFlags, LightRegistry, Material, MaterialId,
        RenderMesh, SectorId,
    };
    use std::sync::Arc;

    fn config(pool_size: usize) -> ShadowConfig {
        ShadowConfig {
            technique: ShadowTechnique::ShadowMap,
            pool_size,
            ..ShadowConfig::default()
        }
    }

    fn mesh_at(center: Vec3) -> RenderMesh {
        RenderMesh::new(
            GeometryId(0),
            Arc::new(Material::new(MaterialId(0), "m")),
            BoundingSphere::new(center, 0.5),
        )
    }

    fn view() -> RenderView {
        RenderView::new(Camera::new(Vec3::new(0.0, 0.0, 10.0), Vec3::zeros()), SectorId(0), 1)
    }

    #[test]
    fn test_point_light_faces() {
        let shadows = ShadowMapShadows::new(&config(16));
        let white = Vec3::new(1.0, 1.0, 1.0);
        let point = Light::point(Vec3::zeros(), white, 1.0, 20.0);
        assert_eq!(shadows.sublight_count(&point), 6);
        let unshadowed = point.clone().with_flags(LightFlags::NO_SHADOWS);
        assert_eq!(shadows.sublight_count(&unshadowed), 1);
        let spot = Light::spot(Vec3::zeros(), -Vec3::y(), white, 1.0, 10.0, 0.2, 0.4);
        assert_eq!(shadows.sublight_count(&spot), 1);
    }

    #[test]
    fn test_handle_light_writes_map_and_skips_other_faces() {
        let mut registry = LightRegistry::new();
        let light = Light::point(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0), 1.0, 20.0);
        let id = registry.insert(light.clone());
        let mesh = mesh_at(Vec3::new(5.0, 0.0, 0.0));
        let view = view();

        let mut shadows = ShadowMapShadows::new(&config(16));
        shadows.begin_frame(1);
        let mut data = ShadowMapLightData::default();
        let mut frames = vec![ShaderVarStack::new()];
        let indices = [2_usize];

        let mut request = LightRequest {
            mesh: &mesh,
            view: &view,
            light_id: id,
            light: &light,
            light_indices: &indices,
            pass: 0,
            sub_light: 0,
        };
        assert_eq!(shadows.handle_light(&request, &mut data, &mut frames), 1);
        assert!(matches!(
            frames[0].get_array_item(names::LIGHT_SHADOW_MAP, 2),
            Some(ShaderValue::Texture(_))
        ));
        assert!(frames[0].get_array_item(names::LIGHT_SHADOW_PROJECTION, 2).is_some());

        // The -x face does not see a mesh on +x
        request.sub_light = 1;
        assert_eq!(shadows.handle_light(&request, &mut data, &mut frames), 0);
        assert_eq!(data.face_count(1), 1);

        shadows.finalize_light(id, &light, &mut data);
        assert_eq!(shadows.shadow_views().len(), 1);
        assert_eq!(shadows.shadow_views()[0].sub_light, 0);

        shadows.begin_frame(2);
        assert!(shadows.shadow_views().is_empty());
        assert_eq!(data.face_count(2), 0);
    }

    #[test]
    fn test_later_view_reuses_rendered_projection() {
        let mut registry = LightRegistry::new();
        let light = Light::directional(Vec3::new(0.2, -1.0, -0.3), Vec3::new(1.0, 1.0, 1.0), 1.0);
        let id = registry.insert(light.clone());
        let mesh = mesh_at(Vec3::zeros());
        let first_view = view();
        let second_camera = Camera::new(Vec3::new(30.0, 5.0, 0.0), Vec3::zeros());
        let second_view = RenderView::new(second_camera, SectorId(1), 1);

        let mut shadows = ShadowMapShadows::new(&config(16));
        shadows.begin_frame(1);
        let mut data = ShadowMapLightData::default();
        let indices = [0_usize];
        let mut projections = Vec::new();
        for view in [&first_view, &second_view] {
            let mut frames = vec![ShaderVarStack::new()];
            let request = LightRequest {
                mesh: &mesh,
                view,
                light_id: id,
                light: &light,
                light_indices: &indices,
                pass: 0,
                sub_light: 0,
            };
            assert_eq!(shadows.handle_light(&request, &mut data, &mut frames), 1);
            projections.push(frames[0].get_array_item(names::LIGHT_SHADOW_PROJECTION, 0).copied());
        }
        assert_ne!(
            shadows.light_view_projection(&light, 0, &first_view),
            shadows.light_view_projection(&light, 0, &second_view)
        );
        assert_eq!(projections[0], projections[1]);

        shadows.finalize_light(id, &light, &mut data);
        assert_eq!(shadows.shadow_views().len(), 1);
        assert_eq!(
            projections[0],
            Some(ShaderValue::Mat4(shadows.shadow_views()[0].view_projection))
        );
    }

    #[test]
    fn test_exhausted_pool_omits_light() {
        let mut registry = LightRegistry::new();
        let white = Vec3::new(1.0, 1.0, 1.0);
        let light = Light::spot(Vec3::new(0.0, 5.0, 0.0), -Vec3::y(), white, 1.0, 20.0, 0.3, 0.6);
        let first = registry.insert(light.clone());
        let second = registry.insert(light.clone());
        let mesh = mesh_at(Vec3::zeros());
        let view = view();

        let mut shadows = ShadowMapShadows::new(&config(1));
        shadows.begin_frame(1);
        let mut frames = vec![ShaderVarStack::new()];
        let indices = [0_usize];
        let request = |light_id| LightRequest {
            mesh: &mesh,
            view: &view,
            light_id,
            light: &light,
            light_indices: &indices,
            pass: 0,
            sub_light: 0,
        };
        let mut data = ShadowMapLightData::default();
        assert_eq!(shadows.handle_light(&request(first), &mut data, &mut frames), 1);
        let mut data = ShadowMapLightData::default();
        assert_eq!(shadows.handle_light(&request(second), &mut data, &mut frames), 0);
        assert_eq!(shadows.pool().in_use(), 1);
    }

    #[test]
    fn test_unshadowed_light_passes_through() {
        let mut registry = LightRegistry::new();
        let light = Light::directional(-Vec3::y(), Vec3::new(1.0, 1.0, 1.0), 1.0)
            .with_flags(LightFlags::NO_SHADOWS);
        let id = registry.insert(light.clone());
        let mesh = mesh_at(Vec3::zeros());
        let view = view();
        let mut shadows = ShadowMapShadows::new(&config(0));
        shadows.begin_frame(1);
        let mut frames = vec![ShaderVarStack::new()];
        let request = LightRequest {
            mesh: &mesh,
            view: &view,
            light_id: id,
            light: &light,
            light_indices: &[0_usize],
            pass: 0,
            sub_light: 0,
        };
        let mut data = ShadowMapLightData::default();
        assert_eq!(shadows.handle_light(&request, &mut data, &mut frames), 1);
        assert!(frames[0].is_empty());
    }
}
