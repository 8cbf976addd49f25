//! Light-pass assignment
//!
//! For every mesh, the lights reaching it are distributed over the logical
//! layers in configured order. Each lit layer packs compatible lights into
//! passes of at most `min(layer.max_lights, shader.max_lights)` sub-lights,
//! never more than `layer.max_passes` passes. A pass occupies `layer_spread`
//! consecutive physical sub-layers.
//!
//! Work per mesh is split in three steps so every layer is sized before any
//! parameter is written:
//!
//! 1. plan: decide the state of every layer and pack its passes
//! 2. ensure: grow each layer's physical sub-layer block
//! 3. write: fill shaders and parameter stacks of the mesh's slots
//!
//! A single pending light list is shared by all layers of a mesh: a light
//! taken by one layer is not offered to the next.

use super::cache::PersistentLightCache;
use super::sorter::{LightCompatibilitySorter, LightInfo};
use crate::config::{BatchingConfig, LayerConfig};
use crate::render_tree::traverse::OnceBlocker;
use crate::render_tree::{ContextState, MeshRecord};
use crate::scene::{LightId, LightInfluence, LightQuery, LightRegistry, LightSettings, RenderMesh};
use crate::shader::{names, ShaderId, ShaderMetadata, ShaderResolver, ShaderVarStack};
use crate::shadow::{full_mask, LightRequest, ShadowCapability, SpreadMask};

/// Collaborators the assigner consults while processing a frame
#[derive(Clone, Copy)]
pub struct FrameInputs<'a> {
    /// Owner of all lights
    pub lights: &'a LightRegistry,
    /// Finds the lights reaching a mesh
    pub light_query: &'a dyn LightQuery,
    /// Shader lookup and dispatch
    pub shaders: &'a dyn ShaderResolver,
}

/// Outcome for one (mesh, logical layer) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerState {
    /// No pass emitted
    Inactive,
    /// One pass with no lights
    AmbientOnly,
    /// `passes` light passes
    Lit {
        /// Number of light passes
        passes: usize,
    },
}

/// Counters accumulated over one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignmentStats {
    /// Meshes processed
    pub meshes: usize,
    /// Physical slots left with a shader
    pub active_passes: usize,
    /// Sub-lights written into a pass
    pub lights_assigned: usize,
    /// Lights left over once every layer was served
    pub lights_rejected: usize,
    /// Sub-lights the shadow technique dropped
    pub lights_omitted: usize,
    /// Distinct lights used this frame
    pub lights_touched: usize,
}

#[derive(Debug, Clone, Copy)]
struct LayerPlan {
    state: LayerState,
    shader: Option<ShaderId>,
    first_pass: usize,
}

#[derive(Debug, Clone, Copy)]
struct PassPlan {
    settings: LightSettings,
    first_light: usize,
    light_count: usize,
}

#[derive(Debug, Clone, Copy)]
struct PlannedLight {
    light: LightId,
    sub_light: usize,
}

/// Pack pending lights into at most `max_passes` passes of `cap` sub-lights.
///
/// The first light of a pass fixes its settings; the pass is then filled with
/// matching lights only. A light whose sub-lights would need more passes than
/// are left is set aside whole while packing goes on with the lights behind
/// it; set-aside lights return to the sorter at the end, in order.
fn pack_passes(
    sorter: &mut LightCompatibilitySorter,
    cap: usize,
    max_passes: usize,
    passes: &mut Vec<PassPlan>,
    lights: &mut Vec<PlannedLight>,
) -> usize {
    let mut created = 0;
    let mut used = 0;
    let mut settings: Option<LightSettings> = None;
    let mut rejected: Vec<LightInfo> = Vec::new();

    loop {
        let matching = match settings {
            Some(current) if used < cap => sorter.next_matching(&current),
            _ => None,
        };
        let (info, opens_pass): (LightInfo, bool) = match matching {
            Some(info) => (info, false),
            None => {
                if created >= max_passes {
                    break;
                }
                match sorter.next() {
                    Some(info) => (info, true),
                    None => break,
                }
            }
        };

        let (free, passes_after) = if opens_pass {
            (cap, created + 1)
        } else {
            (cap - used, created)
        };
        let extra = info.sub_lights.saturating_sub(free).div_ceil(cap);
        if passes_after + extra > max_passes {
            // Set aside without spending the yield limit
            sorter.set_limit(sorter.remaining_budget().saturating_add(1));
            rejected.push(info);
            continue;
        }

        if opens_pass {
            settings = Some(info.settings);
            used = cap;
        }
        for sub_light in 0..info.sub_lights {
            if used == cap {
                passes.push(PassPlan {
                    settings: info.settings,
                    first_light: lights.len(),
                    light_count: 0,
                });
                created += 1;
                used = 0;
            }
            lights.push(PlannedLight {
                light: info.influence.light,
                sub_light,
            });
            if let Some(pass) = passes.last_mut() {
                pass.light_count += 1;
            }
            used += 1;
        }
    }
    if !rejected.is_empty() {
        let budget = sorter.remaining_budget();
        sorter.put_back(&rejected);
        sorter.set_limit(budget);
    }
    created
}

fn shader_int(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Shader metadata, queried again only when the layer's shader changes
fn layer_metadata(
    cache: &mut [Option<(ShaderId, ShaderMetadata)>],
    layer: usize,
    shader: ShaderId,
    resolver: &dyn ShaderResolver,
) -> ShaderMetadata {
    match cache.get(layer).copied().flatten() {
        Some((cached, metadata)) if cached == shader => metadata,
        _ => {
            let metadata = resolver.metadata(shader);
            if let Some(slot) = cache.get_mut(layer) {
                *slot = Some((shader, metadata));
            }
            metadata
        }
    }
}

/// Distributes lights over the physical sub-layers of every mesh
pub struct LightPassAssigner<S: ShadowCapability> {
    layers: Vec<LayerConfig>,
    max_lights_per_mesh: usize,
    shadow: S,
    sorter: LightCompatibilitySorter,
    cache: PersistentLightCache<S::LightData>,
    frame: u64,
    influences: Vec<LightInfluence>,
    plans: Vec<LayerPlan>,
    passes: Vec<PassPlan>,
    lights: Vec<PlannedLight>,
    frames: Vec<ShaderVarStack>,
    slot_counts: Vec<usize>,
    metadata: Vec<Option<(ShaderId, ShaderMetadata)>>,
    touched: OnceBlocker<LightId>,
    touched_order: Vec<LightId>,
    stats: AssignmentStats,
}

impl<S: ShadowCapability> LightPassAssigner<S> {
    /// Create an assigner for `config`'s layers using `shadow`
    pub fn new(config: &BatchingConfig, shadow: S) -> Self {
        Self {
            layers: config.render_layers.clone(),
            max_lights_per_mesh: config.max_lights_per_mesh,
            shadow,
            sorter: LightCompatibilitySorter::with_capacity(config.max_lights_per_mesh),
            cache: PersistentLightCache::new(),
            frame: 0,
            influences: Vec::with_capacity(config.max_lights_per_mesh),
            plans: Vec::with_capacity(config.render_layers.len()),
            passes: Vec::new(),
            lights: Vec::new(),
            frames: Vec::new(),
            slot_counts: Vec::new(),
            metadata: vec![None; config.render_layers.len()],
            touched: OnceBlocker::new(),
            touched_order: Vec::new(),
            stats: AssignmentStats::default(),
        }
    }

    /// Shadow technique
    pub fn shadow(&self) -> &S {
        &self.shadow
    }

    /// Mutable shadow technique
    pub fn shadow_mut(&mut self) -> &mut S {
        &mut self.shadow
    }

    /// Per-light cache
    pub fn cache(&self) -> &PersistentLightCache<S::LightData> {
        &self.cache
    }

    /// Counters of the current frame
    pub fn stats(&self) -> AssignmentStats {
        self.stats
    }

    /// Current frame number
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// States planned for the most recently assigned mesh, one per logical layer
    pub fn planned_states(&self) -> impl Iterator<Item = LayerState> + '_ {
        self.plans.iter().map(|plan| plan.state)
    }

    /// Start a frame: reset counters, drop destroyed lights, notify the shadow technique
    pub fn begin_frame(&mut self, frame: u64) {
        self.frame = frame;
        self.stats = AssignmentStats::default();
        self.touched.clear();
        self.touched_order.clear();
        self.cache.purge_destroyed();
        self.shadow.begin_frame(frame);
    }

    /// Assign lights to every layer of one numbered mesh
    pub fn assign_mesh(
        &mut self,
        inputs: &FrameInputs<'_>,
        state: &mut ContextState,
        record: &MeshRecord,
    ) {
        let mesh = record.index();
        if !state.is_numbered() || mesh >= state.layers().mesh_count() {
            log::warn!(
                "Mesh {mesh} of context {:?} assigned before numbering, skipped",
                state.id()
            );
            return;
        }
        self.stats.meshes += 1;

        self.gather(inputs, state, &record.mesh);
        self.plan(inputs, state, mesh);

        let spread = self.shadow.layer_spread().clamp(1, SpreadMask::BITS as usize);
        for (layer, plan) in self.plans.iter().enumerate() {
            let needed = match plan.state {
                LayerState::Inactive => 0,
                LayerState::AmbientOnly => 1,
                LayerState::Lit { passes } => passes * spread,
            };
            state.ensure_sub_layers(layer, needed);
        }

        self.write(inputs, state, record, spread);
        self.stats.lights_rejected += self.sorter.pending_count();
    }

    fn gather(&mut self, inputs: &FrameInputs<'_>, state: &ContextState, mesh: &RenderMesh) {
        self.sorter.clear();
        inputs.light_query.query(
            state.view().sector,
            &mesh.bounds,
            self.max_lights_per_mesh,
            &mut self.influences,
        );
        let mask = self.shadow.light_flag_mask();
        for influence in &self.influences {
            if let Some(light) = inputs.lights.get(influence.light) {
                self.sorter
                    .add(*influence, self.shadow.sublight_count(light), mask);
            }
        }
        log::trace!("Mesh {:?}: {} light(s) pending", mesh.geometry, self.sorter.pending_count());
    }

    fn plan(&mut self, inputs: &FrameInputs<'_>, state: &ContextState, mesh: usize) {
        let Self {
            layers,
            sorter,
            plans,
            passes,
            lights,
            metadata,
            ..
        } = self;
        plans.clear();
        passes.clear();
        lights.clear();

        for (layer, config) in layers.iter().enumerate() {
            let shader = state.layers().shader(state.index_of(layer, 0), mesh);
            let first_pass = passes.len();
            let layer_state = match shader {
                None => LayerState::Inactive,
                Some(shader) => {
                    let meta = layer_metadata(metadata, layer, shader, inputs.shaders);
                    let fallback = if config.ambient {
                        LayerState::AmbientOnly
                    } else {
                        LayerState::Inactive
                    };
                    if config.max_passes == 0 {
                        LayerState::Inactive
                    } else if meta.max_lights == 0 || sorter.is_empty() {
                        fallback
                    } else {
                        let cap = meta.max_lights.min(config.lights_per_pass());
                        let budget = config.lights_per_pass().saturating_mul(config.max_passes);
                        sorter.set_limit(budget);
                        let created = pack_passes(sorter, cap, config.max_passes, passes, lights);
                        sorter.set_limit(usize::MAX);
                        if created == 0 {
                            fallback
                        } else {
                            LayerState::Lit { passes: created }
                        }
                    }
                }
            };
            plans.push(LayerPlan {
                state: layer_state,
                shader,
                first_pass,
            });
        }
    }

    fn write(
        &mut self,
        inputs: &FrameInputs<'_>,
        state: &mut ContextState,
        record: &MeshRecord,
        spread: usize,
    ) {
        let Self {
            layers,
            shadow,
            cache,
            frame,
            plans,
            passes,
            lights,
            frames,
            slot_counts,
            touched,
            touched_order,
            stats,
            ..
        } = self;
        let mesh = record.index();
        let base = record.mesh.base_variables();
        let slot_mask = full_mask(spread);

        for (layer, plan) in plans.iter().enumerate() {
            let ambient = layers.get(layer).is_some_and(|config| config.ambient);
            let rows = state.sub_layer_count(layer);
            let used_rows = match plan.state {
                LayerState::Inactive => 0,
                LayerState::AmbientOnly => {
                    let row = state.index_of(layer, 0);
                    let storage = state.layers_mut();
                    storage.set_shader(row, mesh, plan.shader);
                    if let Some(vars) = storage.variables_mut(row, mesh) {
                        vars.clone_from(&base);
                        vars.push(names::LIGHT_COUNT, 0);
                        vars.push(names::PASS_NUMBER, 0);
                    }
                    stats.active_passes += 1;
                    1
                }
                LayerState::Lit { passes: pass_count } => {
                    for (pass_index, pass) in passes[plan.first_pass..plan.first_pass + pass_count]
                        .iter()
                        .enumerate()
                    {
                        frames.resize_with(spread, ShaderVarStack::new);
                        frames.iter_mut().for_each(ShaderVarStack::clear);
                        slot_counts.clear();
                        slot_counts.resize(spread, 0);

                        let planned_range = pass.first_light..pass.first_light + pass.light_count;
                        for planned in &lights[planned_range] {
                            let Some(light) = inputs.lights.get(planned.light) else {
                                stats.lights_omitted += 1;
                                continue;
                            };
                            let entry = cache.fetch(planned.light, light, *frame, inputs.lights);
                            let Some(entry) = entry else {
                                stats.lights_omitted += 1;
                                continue;
                            };
                            let request = LightRequest {
                                mesh: &record.mesh,
                                view: state.view(),
                                light_id: planned.light,
                                light,
                                light_indices: slot_counts.as_slice(),
                                pass: pass_index,
                                sub_light: planned.sub_light,
                            };
                            let mask = shadow.handle_light(
                                &request,
                                &mut entry.data,
                                frames.as_mut_slice(),
                            ) & slot_mask;
                            if mask == 0 {
                                log::trace!("Light {:?} omitted for mesh {mesh}", planned.light);
                                stats.lights_omitted += 1;
                                continue;
                            }
                            for slot in (0..spread).filter(|&slot| mask & (1 << slot) != 0) {
                                let index = slot_counts[slot];
                                for (name, value) in &entry.parameters {
                                    frames[slot].push_array_item(*name, index, *value);
                                }
                                slot_counts[slot] += 1;
                            }
                            stats.lights_assigned += 1;
                            if touched.block(planned.light) {
                                touched_order.push(planned.light);
                            }
                        }

                        let light_type = pass.settings.light_type.shader_value();
                        for slot in 0..spread {
                            let row = state.index_of(layer, pass_index * spread + slot);
                            let count = slot_counts[slot];
                            let storage = state.layers_mut();
                            if count == 0 && !ambient {
                                storage.set_shader(row, mesh, None);
                                continue;
                            }
                            storage.set_shader(row, mesh, plan.shader);
                            if let Some(vars) = storage.variables_mut(row, mesh) {
                                vars.clone_from(&base);
                                vars.push(names::LIGHT_COUNT, shader_int(count));
                                vars.push(names::PASS_NUMBER, shader_int(pass_index));
                                vars.push(names::LIGHT_TYPE, light_type);
                                vars.merge(&frames[slot]);
                            }
                            stats.active_passes += 1;
                        }
                    }
                    pass_count * spread
                }
            };

            for sub_pass in used_rows..rows {
                let row = state.index_of(layer, sub_pass);
                state.layers_mut().set_shader(row, mesh, None);
            }
        }
    }

    /// Run the shadow technique's final pass over every light touched this frame.
    ///
    /// Returns the number of lights finalized.
    pub fn finalize_lights(&mut self, inputs: &FrameInputs<'_>) -> usize {
        self.stats.lights_touched = self.touched_order.len();
        let mut finalized = 0;
        if self.shadow.needs_final_pass() {
            for id in &self.touched_order {
                let Some(light) = inputs.lights.get(*id) else {
                    continue;
                };
                let Some(entry) = self.cache.get_mut(*id) else {
                    continue;
                };
                self.shadow.finalize_light(*id, light, &mut entry.data);
                finalized += 1;
            }
        }
        self.touched.clear();
        self.touched_order.clear();
        finalized
    }
}
