//! Scenario tests driving whole frames through the batcher
//!
//! Shared fixtures live here; each submodule covers one area end to end.

mod pass_assignment;

use std::sync::Arc;

use crate::config::{BatchingConfig, LayerConfig};
use crate::foundation::math::Vec3;
use crate::lighting::FrameInputs;
use crate::render_tree::{ContextId, RenderTree};
use crate::scene::{
    BoundingSphere, Camera, GeometryId, Light, LightId, LightInfluence, LightQuery, LightRegistry,
    Material, MaterialId, RenderMesh, RenderView, SectorId,
};
use crate::shader::{names, ShaderId, ShaderMetadata, ShaderTable};
use crate::shadow::ShadowCapability;
use crate::{FrameStats, RenderBatcher};

/// Light query answering from a closure over the mesh bounds
pub(crate) struct FnLightQuery<F>(pub F);

impl<F> LightQuery for FnLightQuery<F>
where
    F: Fn(&BoundingSphere) -> Vec<LightInfluence>,
{
    fn query(
        &self,
        _sector: SectorId,
        bounds: &BoundingSphere,
        max: usize,
        out: &mut Vec<LightInfluence>,
    ) {
        out.clear();
        out.extend((self.0)(bounds).into_iter().take(max));
    }
}

/// Shader table with an unlit `ambient` shader and a `lit` shader taking `lit_max` lights
pub(crate) fn shader_table(lit_max: usize) -> (ShaderTable, ShaderId, ShaderId) {
    let mut table = ShaderTable::new();
    let ambient = table.register("ambient", ShaderMetadata { max_lights: 0 });
    let lit = table.register("lit", ShaderMetadata { max_lights: lit_max });
    table.bind_type("ambient", ambient);
    table.bind_type("light", lit);
    (table, ambient, lit)
}

/// Ambient layer followed by one lit layer capped at `max_lights` per pass and `max_passes` passes
pub(crate) fn config(max_lights: usize, max_passes: usize) -> BatchingConfig {
    BatchingConfig::default().with_layers(vec![
        LayerConfig::new("ambient").ambient(),
        LayerConfig::new("light")
            .with_max_lights(max_lights)
            .with_max_passes(max_passes),
    ])
}

/// `count` point lights along +x at x = 0, 1, 2, ...
#[allow(clippy::cast_precision_loss)]
pub(crate) fn point_lights(registry: &mut LightRegistry, count: usize) -> Vec<LightInfluence> {
    (0..count)
        .map(|i| {
            let position = Vec3::new(i as f32, 0.0, 0.0);
            let light = Light::point(position, Vec3::new(1.0, 1.0, 1.0), 1.0, 100.0);
            add_light(registry, light)
        })
        .collect()
}

/// Insert `light` and return its influence
pub(crate) fn add_light(registry: &mut LightRegistry, light: Light) -> LightInfluence {
    let id = registry.insert(light.clone());
    LightInfluence::new(id, &light, 1.0)
}

/// View from z = 10 towards the origin
pub(crate) fn view() -> RenderView {
    RenderView::new(Camera::new(Vec3::new(0.0, 0.0, 10.0), Vec3::zeros()), SectorId(0), 0)
}

/// Mesh in the `object` priority at `center`
pub(crate) fn mesh_at(geometry: u32, center: Vec3) -> Arc<RenderMesh> {
    Arc::new(
        RenderMesh::new(
            GeometryId(geometry),
            Arc::new(Material::new(MaterialId(geometry), "material")),
            BoundingSphere::new(center, 1.0),
        )
        .with_priority(1),
    )
}

/// Prepare one frame with every light in `influences` reaching every mesh
pub(crate) fn prepare<S: ShadowCapability>(
    batcher: &mut RenderBatcher<S>,
    tree: &mut RenderTree,
    registry: &LightRegistry,
    shaders: &ShaderTable,
    influences: &[LightInfluence],
) -> FrameStats {
    let query = FnLightQuery(|_: &BoundingSphere| influences.to_vec());
    let inputs = FrameInputs {
        lights: registry,
        light_query: &query,
        shaders,
    };
    batcher.prepare_frame(tree, &inputs)
}

/// One (sub-layer, mesh) slot as seen by the driver
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Slot {
    pub shader: Option<ShaderId>,
    pub light_count: Option<i32>,
    pub pass: Option<i32>,
    pub light_type: Option<i32>,
}

/// Slots of logical `layer` for mesh index `mesh`, in sub-pass order
pub(crate) fn layer_slots(
    tree: &RenderTree,
    context: ContextId,
    layer: usize,
    mesh: usize,
) -> Vec<Slot> {
    let Some(node) = tree.context(context) else {
        return Vec::new();
    };
    let state = node.state();
    (0..state.sub_layer_count(layer))
        .map(|sub| {
            let row = state.index_of(layer, sub);
            let vars = state.layers().variables(row, mesh);
            Slot {
                shader: state.layers().shader(row, mesh),
                light_count: vars.and_then(|v| v.get_int(names::LIGHT_COUNT)),
                pass: vars.and_then(|v| v.get_int(names::PASS_NUMBER)),
                light_type: vars.and_then(|v| v.get_int(names::LIGHT_TYPE)),
            }
        })
        .collect()
}

/// Light ids of a slot's light array, resolved through the light positions
pub(crate) fn slot_light_ids(
    tree: &RenderTree,
    context: ContextId,
    row: usize,
    mesh: usize,
    registry: &LightRegistry,
) -> Vec<LightId> {
    let vars = tree.context(context).and_then(|n| n.state().layers().variables(row, mesh));
    let Some(vars) = vars else {
        return Vec::new();
    };
    let count = vars
        .get_int(names::LIGHT_COUNT)
        .and_then(|c| usize::try_from(c).ok())
        .unwrap_or(0);
    (0..count)
        .filter_map(|i| match vars.get_array_item(names::LIGHT_POSITION, i) {
            Some(crate::shader::ShaderValue::Vec3(position)) => registry
                .iter()
                .find(|(_, light)| light.position == *position)
                .map(|(id, _)| id),
            _ => None,
        })
        .collect()
}
