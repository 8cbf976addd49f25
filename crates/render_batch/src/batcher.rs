//! Frame driver
//!
//! [`RenderBatcher::prepare_frame`] runs the batching passes over a populated
//! render tree in a fixed order:
//!
//! 1. shadow technique and light cache `begin_frame`
//! 2. per-bucket mesh sort (parallel)
//! 3. numbering (sequential)
//! 4. shader, light and ticket setup per mesh node
//! 5. final light pass when the shadow technique needs one

use crate::config::BatchingConfig;
use crate::lighting::{FrameInputs, LightPassAssigner};
use crate::render_tree::traverse::{self, Composite, OnceBlocker};
use crate::render_tree::{
    LightSetup, RenderTree, ShaderSetup, SortMeshNodes, StandardMeshSorter, TicketSetup,
};
use crate::shadow::ShadowCapability;

/// Summary of one prepared frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frame number
    pub frame: u64,
    /// Contexts in the tree
    pub contexts: usize,
    /// Meshes numbered across all contexts
    pub meshes: usize,
    /// Distinct (priority, sort key) buckets across all contexts
    pub mesh_buckets: usize,
    /// Physical sub-layers across all contexts
    pub physical_layers: usize,
    /// Slots left with a shader
    pub active_passes: usize,
    /// Sub-lights written into passes
    pub lights_assigned: usize,
    /// Distinct lights used
    pub lights_touched: usize,
    /// Lights left over by pass caps
    pub lights_rejected: usize,
    /// Sub-lights dropped by the shadow technique
    pub lights_omitted: usize,
    /// Depth-only views requested by the shadow technique
    pub shadow_views: usize,
}

/// Owns the batching state that lives across frames
pub struct RenderBatcher<S: ShadowCapability> {
    config: BatchingConfig,
    assigner: LightPassAssigner<S>,
    sorter: StandardMeshSorter,
    frame: u64,
}

impl<S: ShadowCapability> RenderBatcher<S> {
    /// Create a batcher for `config` using `shadow`
    pub fn new(config: BatchingConfig, shadow: S) -> Self {
        let assigner = LightPassAssigner::new(&config, shadow);
        Self {
            config,
            assigner,
            sorter: StandardMeshSorter,
            frame: 0,
        }
    }

    /// Configuration
    pub fn config(&self) -> &BatchingConfig {
        &self.config
    }

    /// Shadow technique
    pub fn shadow(&self) -> &S {
        self.assigner.shadow()
    }

    /// Light-pass assigner
    pub fn assigner(&self) -> &LightPassAssigner<S> {
        &self.assigner
    }

    /// Last prepared frame
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Empty tree matching this batcher's layers and priorities
    pub fn create_tree(&self) -> RenderTree {
        RenderTree::new(&self.config)
    }

    /// Run every batching pass over `tree`
    pub fn prepare_frame(&mut self, tree: &mut RenderTree, inputs: &FrameInputs<'_>) -> FrameStats {
        self.frame += 1;
        self.assigner.begin_frame(self.frame);

        let sort = SortMeshNodes::new(&self.sorter);
        traverse::for_each_context_par(tree, |context| {
            traverse::for_each_mesh_node_par(context, &sort);
        });

        let meshes = tree.number_all();

        let mut shaders = ShaderSetup::new(inputs.shaders);
        let mut lights = LightSetup::new(&mut self.assigner, inputs);
        let mut tickets = TicketSetup::new(inputs.shaders);
        let mut pipeline = Composite::new()
            .then(&mut shaders)
            .then(&mut lights)
            .then(&mut tickets);
        traverse::for_each_mesh_node_in_tree(tree, &mut pipeline);

        let mut buckets = OnceBlocker::new();
        for node in tree.contexts().flat_map(|context| context.mesh_nodes()) {
            buckets.block(node.key());
        }

        let finalized = self.assigner.finalize_lights(inputs);
        let assigned = self.assigner.stats();
        let stats = FrameStats {
            frame: self.frame,
            contexts: tree.len(),
            meshes,
            mesh_buckets: buckets.len(),
            physical_layers: tree.contexts().map(|c| c.state().layers().len()).sum(),
            active_passes: assigned.active_passes,
            lights_assigned: assigned.lights_assigned,
            lights_touched: assigned.lights_touched,
            lights_rejected: assigned.lights_rejected,
            lights_omitted: assigned.lights_omitted,
            shadow_views: self.assigner.shadow().shadow_views().len(),
        };
        log::debug!(
            "Frame {}: {} context(s), {} mesh(es), {} active pass(es), {} light(s) touched, {} finalized",
            stats.frame,
            stats.contexts,
            stats.meshes,
            stats.active_passes,
            stats.lights_touched,
            finalized
        );
        stats
    }
}
