//! Cascaded shadow maps for directional lights
//!
//! The view depth range `[near, near + shadow_distance]` is split into
//! cascades; every pass of a lit layer occupies one physical sub-layer per
//! cascade. A mesh lands in the cascades its depth range overlaps, so a light
//! pass spreads over up to `cascade_count` consecutive sub-layers.

use super::pool::{ShadowTargetId, ShadowTargetPool};
use super::{LightRequest, ShadowCapability, ShadowViewRequest, SpreadMask};
use crate::config::{ShadowConfig, MAX_CASCADES};
use crate::foundation::math::{Mat4, Mat4Ext, Vec3, Vec4};
use crate::scene::{Camera, Light, LightId, LightType};
use crate::shader::{names, ShaderValue, ShaderVarStack};

const SPLIT_EPSILON: f32 = 0.01;
const ORTHO_PADDING: f32 = 10.0;

/// Far distance of each cascade, blending uniform and logarithmic splits by `lambda`.
///
/// The result is strictly increasing and ends at `far`.
#[allow(clippy::cast_precision_loss)]
pub fn compute_cascade_splits(near: f32, far: f32, count: usize, lambda: f32) -> Vec<f32> {
    let near = near.max(1e-3);
    let far = far.max(near + SPLIT_EPSILON);
    let lambda = lambda.clamp(0.0, 1.0);
    let range = far - near;

    let mut splits = Vec::with_capacity(count);
    for cascade in 0..count {
        let p = (cascade + 1) as f32 / count as f32;
        let uniform = near + range * p;
        let log = near * (far / near).powf(p);
        let mut split = (uniform + (log - uniform) * lambda).min(far);
        if let Some(&previous) = splits.last() {
            if split <= previous {
                split = previous + SPLIT_EPSILON;
            }
        }
        splits.push(split);
    }
    if let Some(last) = splits.last_mut() {
        *last = last.max(far);
    }
    splits
}

/// Cascades whose `(near, far)` range overlaps `[depth - radius, depth + radius]`.
///
/// Anything past the last cascade lands in the last one and anything in
/// front of the first in the first.
pub fn overlap_mask(ranges: &[(f32, f32)], depth: f32, radius: f32) -> SpreadMask {
    let (lo, hi) = (depth - radius, depth + radius);
    let mut mask: SpreadMask = 0;
    for (cascade, (near, far)) in ranges.iter().enumerate().take(SpreadMask::BITS as usize) {
        if lo <= *far && hi >= *near {
            mask |= 1 << cascade;
        }
    }
    if mask != 0 || ranges.is_empty() {
        return mask;
    }
    match ranges.last() {
        Some(&(_, far)) if lo > far => 1 << (ranges.len().min(SpreadMask::BITS as usize) - 1),
        _ => 1,
    }
}

/// Orthographic light projection enclosing one cascade of `camera`'s frustum
pub fn cascade_view_projection(
    camera: &Camera,
    near: f32,
    far: f32,
    direction: Vec3,
    shadow_distance: f32,
) -> Mat4 {
    let slice = Mat4::perspective(camera.fov_y, camera.aspect, near, far.max(near + SPLIT_EPSILON))
        * camera.view_matrix();
    let inverse = slice.try_inverse().unwrap_or_else(Mat4::identity);

    let mut corners = [Vec3::zeros(); 8];
    for (idx, corner) in corners.iter_mut().enumerate() {
        let sign = |bit: usize| if idx & bit == 0 { -1.0 } else { 1.0 };
        *corner = inverse.project_point(Vec3::new(sign(1), sign(2), sign(4)));
    }
    let center = corners.iter().fold(Vec3::zeros(), |acc, c| acc + c) / 8.0;
    let radius = corners.iter().map(|c| (c - center).norm()).fold(0.0, f32::max);

    let direction = if direction.norm_squared() > f32::EPSILON {
        direction.normalize()
    } else {
        -Vec3::y()
    };
    let up = if direction.y.abs() > 0.95 { Vec3::x() } else { Vec3::y() };
    let eye = center - direction * (radius + shadow_distance * 0.5);
    let light_view = Mat4::look_at(eye, center, up);

    let mut min = Vec3::repeat(f32::MAX);
    let mut max = Vec3::repeat(f32::MIN);
    for corner in &corners {
        let p = light_view.project_point(*corner);
        min = min.inf(&p);
        max = max.sup(&p);
    }
    Mat4::orthographic(
        min.x - ORTHO_PADDING,
        max.x + ORTHO_PADDING,
        min.y - ORTHO_PADDING,
        max.y + ORTHO_PADDING,
        -max.z - ORTHO_PADDING,
        -min.z + ORTHO_PADDING,
    ) * light_view
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct CascadeShadow {
    cascade: usize,
    target: ShadowTargetId,
    view_projection: Mat4,
}

/// Cascade maps a light acquired in the current frame
#[derive(Debug, Clone, Default)]
pub struct CascadedLightData {
    frame: u64,
    cascades: Vec<CascadeShadow>,
}

impl CascadedLightData {
    /// Cascades holding a target in `frame`
    pub fn cascade_count(&self, frame: u64) -> usize {
        if self.frame == frame {
            self.cascades.len()
        } else {
            0
        }
    }
}

/// One sub-layer per cascade; directional lights cast a map per cascade
#[derive(Debug, Clone)]
pub struct CascadedShadows {
    pool: ShadowTargetPool,
    cascade_count: usize,
    split_lambda: f32,
    shadow_distance: f32,
    frame: u64,
    exhausted_warned: bool,
    requests: Vec<ShadowViewRequest>,
}

impl CascadedShadows {
    /// Create from configuration; the cascade count is clamped to `1..=MAX_CASCADES`
    pub fn new(config: &ShadowConfig) -> Self {
        Self {
            pool: ShadowTargetPool::new(config.pool_size, config.map_resolution),
            cascade_count: config.cascade_count.clamp(1, MAX_CASCADES),
            split_lambda: config.split_lambda,
            shadow_distance: config.shadow_distance.max(SPLIT_EPSILON),
            frame: 0,
            exhausted_warned: false,
            requests: Vec::new(),
        }
    }

    /// Number of cascades
    pub fn cascade_count(&self) -> usize {
        self.cascade_count
    }

    /// Render target pool
    pub fn pool(&self) -> &ShadowTargetPool {
        &self.pool
    }

    /// `(near, far)` view depth of every cascade for `camera`
    pub fn cascade_ranges(&self, camera: &Camera) -> Vec<(f32, f32)> {
        let far = (camera.near + self.shadow_distance).min(camera.far);
        let splits =
            compute_cascade_splits(camera.near, far, self.cascade_count, self.split_lambda);
        let mut near = camera.near;
        splits
            .into_iter()
            .map(|split| {
                let range = (near, split);
                near = split;
                range
            })
            .collect()
    }
}

impl ShadowCapability for CascadedShadows {
    type LightData = CascadedLightData;

    fn layer_spread(&self) -> usize {
        self.cascade_count
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
        data: &mut CascadedLightData,
        frames: &mut [ShaderVarStack],
    ) -> SpreadMask {
        let camera = &request.view.camera;
        let ranges = self.cascade_ranges(camera);
        let bounds = &request.mesh.bounds;
        let mut mask = overlap_mask(&ranges, camera.view_depth(bounds.center), bounds.radius);

        for (stack, (near, far)) in frames.iter_mut().zip(&ranges) {
            stack.push(names::CASCADE_RANGE, Vec4::new(*near, *far, 0.0, 0.0));
        }

        let light = request.light;
        if light.light_type != LightType::Directional || !light.casts_shadows() {
            return mask;
        }
        if data.frame != self.frame {
            data.frame = self.frame;
            data.cascades.clear();
        }

        for (cascade, (near, far)) in ranges.iter().enumerate() {
            if mask & (1 << cascade) == 0 {
                continue;
            }
            let target = match self.pool.acquire(request.light_id, cascade) {
                Ok(target) => target,
                Err(err) => {
                    if !self.exhausted_warned {
                        log::warn!(
                            "{err}: cascade {cascade} of light {:?} omitted",
                            request.light_id
                        );
                        self.exhausted_warned = true;
                    }
                    mask &= !(1 << cascade);
                    continue;
                }
            };
            let view_projection = match data.cascades.iter().find(|c| c.cascade == cascade) {
                Some(existing) => existing.view_projection,
                None => {
                    let view_projection = cascade_view_projection(
                        camera,
                        *near,
                        *far,
                        light.direction,
                        self.shadow_distance,
                    );
                    data.cascades.push(CascadeShadow {
                        cascade,
                        target,
                        view_projection,
                    });
                    view_projection
                }
            };
            let slot = (frames.get_mut(cascade), request.light_indices.get(cascade));
            let (Some(stack), Some(&index)) = slot else {
                mask &= !(1 << cascade);
                continue;
            };
            let map = ShaderValue::Texture(u64::from(target.0));
            stack.push_array_item(names::LIGHT_SHADOW_MAP, index, map);
            stack.push_array_item(names::LIGHT_SHADOW_PROJECTION, index, view_projection);
        }
        mask
    }

    fn needs_final_pass(&self) -> bool {
        true
    }

    fn finalize_light(&mut self, light_id: LightId, _light: &Light, data: &mut CascadedLightData) {
        if data.frame != self.frame {
            return;
        }
        let resolution = self.pool.resolution();
        self.requests.extend(data.cascades.iter().map(|c| ShadowViewRequest {
            light: light_id,
            sub_light: c.cascade,
            target: c.target,
            view_projection: c.view_projection,
            resolution,
        }));
    }

    fn shadow_views(&self) -> &[ShadowViewRequest] {
        &self.requests
    }
}
