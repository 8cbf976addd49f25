//! Shadow techniques
//!
//! The light-pass assigner is written against [`ShadowCapability`] only. A
//! technique decides how many virtual sub-lights a light expands to, how many
//! consecutive physical sub-layers one pass occupies (its spread), and which of
//! those a given light lands in for a given mesh.
//!
//! | Technique            | Sub-lights             | Spread         | Final pass |
//! |----------------------|------------------------|----------------|------------|
//! | [`NoShadows`]        | 1                      | 1              | no         |
//! | [`ShadowMapShadows`] | 6 for shadowing points | 1              | yes        |
//! | [`CascadedShadows`]  | 1                      | cascade count  | yes        |

mod cascaded;
mod none;
mod pool;
mod shadow_map;

pub use cascaded::{
    cascade_view_projection, compute_cascade_splits, overlap_mask, CascadedLightData,
    CascadedShadows,
};
pub use none::NoShadows;
pub use pool::{ShadowTargetId, ShadowTargetPool};
pub use shadow_map::{ShadowMapLightData, ShadowMapShadows};

use crate::foundation::math::Mat4;
use crate::scene::{Light, LightFlags, LightId, RenderMesh, RenderView};
use crate::shader::ShaderVarStack;

/// Bit `i` set means the light occupies spread slot `i` of the pass
pub type SpreadMask = u32;

/// Everything a technique gets to see about one sub-light on one mesh
#[derive(Debug, Clone, Copy)]
pub struct LightRequest<'a> {
    /// Mesh being lit
    pub mesh: &'a RenderMesh,
    /// View of the context the mesh is drawn in
    pub view: &'a RenderView,
    /// Light handle
    pub light_id: LightId,
    /// The light
    pub light: &'a Light,
    /// Array index the light takes in each spread slot if it lands there
    pub light_indices: &'a [usize],
    /// Pass within the logical layer
    pub pass: usize,
    /// Sub-light of `light`
    pub sub_light: usize,
}

/// Depth-only view the driver must render before the frame's lit passes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowViewRequest {
    /// Shadow-casting light
    pub light: LightId,
    /// Sub-light or cascade index
    pub sub_light: usize,
    /// Target to render into
    pub target: ShadowTargetId,
    /// Light-space view-projection
    pub view_projection: Mat4,
    /// Target size in texels
    pub resolution: u32,
}

/// A shadow technique as seen by the light-pass assigner
pub trait ShadowCapability {
    /// Per-light state kept in the persistent light cache
    type LightData: Default;

    /// Flags ignored when grouping lights into passes
    fn light_flag_mask(&self) -> LightFlags {
        LightFlags::empty()
    }

    /// Virtual lights `light` expands to
    fn sublight_count(&self, _light: &Light) -> usize {
        1
    }

    /// Physical sub-layers one pass occupies
    fn layer_spread(&self) -> usize {
        1
    }

    /// Called once per frame before any mesh is processed
    fn begin_frame(&mut self, _frame: u64) {}

    /// Write shadow parameters for one sub-light into `frames` (one stack per
    /// spread slot) and report the slots it occupies. `0` omits the light.
    fn handle_light(
        &mut self,
        request: &LightRequest<'_>,
        data: &mut Self::LightData,
        frames: &mut [ShaderVarStack],
    ) -> SpreadMask;

    /// Whether [`Self::finalize_light`] must run after all meshes
    fn needs_final_pass(&self) -> bool {
        false
    }

    /// Called once per light touched this frame
    fn finalize_light(&mut self, _light_id: LightId, _light: &Light, _data: &mut Self::LightData) {}

    /// Shadow views requested for this frame
    fn shadow_views(&self) -> &[ShadowViewRequest] {
        &[]
    }
}

/// Mask with the low `spread` bits set
pub fn full_mask(spread: usize) -> SpreadMask {
    if spread >= SpreadMask::BITS as usize {
        SpreadMask::MAX
    } else {
        (1 << spread) - 1
    }
}
