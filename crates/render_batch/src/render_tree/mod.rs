//! Render tree
//!
//! Per-frame graph of render work. Each [`ContextNode`] is one render target
//! or portal recursion step; it owns priority-ordered [`MeshNode`] buckets and
//! the dense per-(sub-layer, mesh) storage the batching passes fill in.
//!
//! ## Architecture
//!
//! ```text
//! RenderTree
//!   ├─ ContextNode (root view)
//!   │    ├─ MeshNode (priority 0, key 0) ─ MeshRecord, MeshRecord, ...
//!   │    ├─ MeshNode (priority 1, key 0) ─ ...
//!   │    └─ PhysicalLayers: shaders / tickets / parameter stacks
//!   └─ ContextNode (view through a portal, depth 1)
//!        └─ ...
//! ```
//!
//! Child contexts are owned by the same tree; recursion depth is capped by
//! [`BatchingConfig::max_portal_recursion`] so portal loops terminate.

mod context;
mod mesh_node;
mod sorting;
mod stages;
pub mod traverse;

pub use context::{ContextId, ContextNode, ContextState, PhysicalLayer, PhysicalLayers};
pub use mesh_node::{MeshNode, MeshNodeKey, MeshRecord};
pub use sorting::{MeshSorter, SortMeshNodes, StandardMeshSorter};
pub use stages::{LightSetup, ShaderSetup, TicketSetup};

use std::sync::Arc;

use crate::config::{BatchingConfig, LayerConfig, SortMode};
use crate::foundation::collections::SlotMap;
use crate::scene::{RenderMesh, RenderView, VisibilityCuller, VisibleSet};
use traverse::Numbered;

/// Tree of contexts built for one frame
#[derive(Debug)]
pub struct RenderTree {
    pub(crate) contexts: SlotMap<ContextId, ContextNode>,
    pub(crate) order: Vec<ContextId>,
    layers: Vec<LayerConfig>,
    sort_modes: Vec<SortMode>,
    max_recursion: usize,
}

impl RenderTree {
    /// Create an empty tree for `config`'s layers and priorities
    pub fn new(config: &BatchingConfig) -> Self {
        Self {
            contexts: SlotMap::with_key(),
            order: Vec::new(),
            layers: config.render_layers.clone(),
            sort_modes: config.priorities.iter().map(|p| p.sort).collect(),
            max_recursion: config.max_portal_recursion,
        }
    }

    /// Logical layers every context is created with
    pub fn layer_configs(&self) -> &[LayerConfig] {
        &self.layers
    }

    /// Maximum portal recursion depth
    pub fn max_recursion(&self) -> usize {
        self.max_recursion
    }

    /// Create a root context
    pub fn create_context(&mut self, view: RenderView) -> ContextId {
        let layers = &self.layers;
        let id = self
            .contexts
            .insert_with_key(|id| ContextNode::new(id, view, None, 0, layers));
        self.order.push(id);
        log::trace!("Created root context {id:?}");
        id
    }

    /// Create a context for a view seen through a portal of `parent`.
    ///
    /// Returns `None` when `parent` is unknown or the recursion cap is reached.
    pub fn create_child_context(
        &mut self,
        view: RenderView,
        parent: ContextId,
    ) -> Option<ContextId> {
        let depth = self.contexts.get(parent)?.state.depth + 1;
        if depth > self.max_recursion {
            log::warn!(
                "Portal recursion cap {} reached below context {parent:?}, view not rendered",
                self.max_recursion
            );
            return None;
        }
        let layers = &self.layers;
        let id = self
            .contexts
            .insert_with_key(|id| ContextNode::new(id, view, Some(parent), depth, layers));
        if let Some(parent_node) = self.contexts.get_mut(parent) {
            parent_node.state.children.push(id);
        }
        self.order.push(id);
        log::trace!("Created context {id:?} at depth {depth}");
        Some(id)
    }

    /// Get a context
    pub fn context(&self, id: ContextId) -> Option<&ContextNode> {
        self.contexts.get(id)
    }

    /// Get a mutable context
    pub fn context_mut(&mut self, id: ContextId) -> Option<&mut ContextNode> {
        self.contexts.get_mut(id)
    }

    /// Context handles in creation order
    pub fn context_ids(&self) -> &[ContextId] {
        &self.order
    }

    /// Contexts in creation order
    pub fn contexts(&self) -> impl Iterator<Item = &ContextNode> {
        self.order.iter().filter_map(|id| self.contexts.get(*id))
    }

    /// Number of contexts
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Whether the tree has no contexts
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Add a mesh to a context, bucketed by its priority and sort key
    pub fn add_mesh(&mut self, context: ContextId, mesh: Arc<RenderMesh>) -> bool {
        let sort_mode = self
            .sort_modes
            .get(mesh.render_priority)
            .copied()
            .unwrap_or_default();
        match self.contexts.get_mut(context) {
            Some(node) => {
                node.add_mesh(mesh, sort_mode);
                true
            }
            None => false,
        }
    }

    /// Fill a context with what `culler` sees from its view.
    ///
    /// The visible portals are left in `scratch` for the caller.
    pub fn populate(
        &mut self,
        context: ContextId,
        culler: &dyn VisibilityCuller,
        scratch: &mut VisibleSet,
    ) -> usize {
        let Some(node) = self.contexts.get(context) else {
            scratch.clear();
            return 0;
        };
        culler.cull(&node.state.view, scratch);
        let added = scratch.meshes.len();
        for mesh in scratch.meshes.drain(..) {
            self.add_mesh(context, mesh);
        }
        added
    }

    /// Build a root context for `view` and follow visible portals depth-first
    pub fn populate_recursive(
        &mut self,
        view: RenderView,
        culler: &dyn VisibilityCuller,
    ) -> ContextId {
        let root = self.create_context(view);
        let mut scratch = VisibleSet::default();
        let mut pending = vec![root];
        while let Some(context) = pending.pop() {
            self.populate(context, culler, &mut scratch);
            let Some(parent_view) = self.contexts.get(context).map(|n| n.state.view.clone()) else {
                continue;
            };
            for portal in &scratch.portals {
                let child_view = portal.view_through(&parent_view);
                if let Some(child) = self.create_child_context(child_view, context) {
                    pending.push(child);
                }
            }
        }
        log::debug!("Populated {} context(s) from root {root:?}", self.order.len());
        root
    }

    /// Assign dense mesh indices in visitation order and size the context's storage.
    ///
    /// Runs sequentially; every pass that reads mesh indices must come after it.
    pub fn number_meshes(&mut self, context: ContextId) -> usize {
        let Some(node) = self.contexts.get_mut(context) else {
            return 0;
        };
        let mut next = 0;
        traverse::for_each_mesh_node(
            node,
            &mut Numbered(|mesh_node: &mut MeshNode, _: &mut ContextState, _: usize| {
                for record in &mut mesh_node.meshes {
                    record.index = next;
                    next += 1;
                }
            }),
        );
        node.state.reset_storage(&self.layers, next);
        next
    }

    /// Number every context
    pub fn number_all(&mut self) -> usize {
        let ids = self.order.clone();
        ids.into_iter().map(|id| self.number_meshes(id)).sum()
    }

    /// Discard every context
    pub fn clear(&mut self) {
        self.contexts.clear();
        self.order.clear();
    }
}
