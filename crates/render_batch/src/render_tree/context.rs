//! Context nodes and their per-context storage
//!
//! A context owns its mesh nodes plus dense arrays addressed by
//! `(physical sub-layer, mesh index)`: the resolved shader, the dispatch
//! ticket and the shader parameter stack. The arrays are sized by the
//! numbering pass and only grow through layer duplication.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::mesh_node::{MeshNode, MeshNodeKey, MeshRecord};
use crate::config::{LayerConfig, SortMode};
use crate::foundation::collections::{new_key_type, DenseGrid};
use crate::lighting::{LayerDuplicator, LayerSequence};
use crate::scene::{RenderMesh, RenderView};
use crate::shader::{ShaderId, ShaderVarStack, Ticket};

new_key_type! {
    /// Handle of a context node inside its render tree
    pub struct ContextId;
}

/// Static configuration of one physical sub-layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicalLayer {
    /// Logical layer this sub-layer belongs to
    pub logical: usize,
    /// Position within the logical layer's block
    pub sub_pass: usize,
    /// Shader types copied from the logical layer
    pub shader_types: Vec<String>,
    /// Default shader copied from the logical layer
    pub default_shader: Option<String>,
}

/// Physical sub-layers of one context and their per-mesh data
#[derive(Debug, Clone, Default)]
pub struct PhysicalLayers {
    layers: Vec<PhysicalLayer>,
    shaders: DenseGrid<Option<ShaderId>>,
    tickets: DenseGrid<Option<Ticket>>,
    variables: DenseGrid<ShaderVarStack>,
}

impl PhysicalLayers {
    /// One sub-layer per logical layer, `meshes` columns
    pub fn new(configs: &[LayerConfig], meshes: usize) -> Self {
        let layers: Vec<PhysicalLayer> = configs
            .iter()
            .enumerate()
            .map(|(logical, config)| PhysicalLayer {
                logical,
                sub_pass: 0,
                shader_types: config.shader_types.clone(),
                default_shader: config.default_shader.clone(),
            })
            .collect();
        let rows = layers.len();
        Self {
            layers,
            shaders: DenseGrid::filled(rows, meshes, None),
            tickets: DenseGrid::filled(rows, meshes, None),
            variables: DenseGrid::filled(rows, meshes, ShaderVarStack::new()),
        }
    }

    /// Number of physical sub-layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether there are no layers
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Number of mesh columns
    pub fn mesh_count(&self) -> usize {
        self.shaders.columns()
    }

    /// Configuration of a physical sub-layer
    pub fn layer(&self, row: usize) -> Option<&PhysicalLayer> {
        self.layers.get(row)
    }

    /// Shader of `mesh` in `row`; `None` means the slot is inactive
    pub fn shader(&self, row: usize, mesh: usize) -> Option<ShaderId> {
        self.shaders.get(row, mesh).copied().flatten()
    }

    /// Set or clear the shader of a slot
    pub fn set_shader(&mut self, row: usize, mesh: usize, shader: Option<ShaderId>) {
        self.shaders.set(row, mesh, shader);
    }

    /// Dispatch ticket of a slot
    pub fn ticket(&self, row: usize, mesh: usize) -> Option<Ticket> {
        self.tickets.get(row, mesh).copied().flatten()
    }

    /// Set or clear the ticket of a slot
    pub fn set_ticket(&mut self, row: usize, mesh: usize, ticket: Option<Ticket>) {
        self.tickets.set(row, mesh, ticket);
    }

    /// Parameter stack of a slot
    pub fn variables(&self, row: usize, mesh: usize) -> Option<&ShaderVarStack> {
        self.variables.get(row, mesh)
    }

    /// Mutable parameter stack of a slot
    pub fn variables_mut(&mut self, row: usize, mesh: usize) -> Option<&mut ShaderVarStack> {
        self.variables.get_mut(row, mesh)
    }

    /// Rows where `mesh` has a shader
    pub fn active_rows(&self, mesh: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).filter(move |&row| self.shader(row, mesh).is_some())
    }
}

impl LayerSequence for PhysicalLayers {
    fn duplicate_layer(&mut self, source: usize, at: usize, count: usize) {
        let Some(template) = self.layers.get(source).cloned() else {
            return;
        };
        let at = at.min(self.layers.len());
        let first_sub = self.layers[..at]
            .iter()
            .filter(|l| l.logical == template.logical)
            .count();
        for offset in 0..count {
            self.layers.insert(
                at + offset,
                PhysicalLayer {
                    sub_pass: first_sub + offset,
                    ..template.clone()
                },
            );
        }
        // New sub-layers start inactive, with the source sub-layer's parameters
        self.shaders.insert_rows_with(at, count, |_, _| None);
        self.tickets.insert_rows_with(at, count, |_, _| None);
        self.variables.duplicate_rows(source, at, count);
    }
}

/// Everything in a context except its mesh nodes
#[derive(Debug)]
pub struct ContextState {
    pub(crate) id: ContextId,
    pub(crate) view: RenderView,
    pub(crate) parent: Option<ContextId>,
    pub(crate) children: Vec<ContextId>,
    pub(crate) depth: usize,
    pub(crate) mesh_count: usize,
    pub(crate) numbered: bool,
    pub(crate) duplicator: LayerDuplicator,
    pub(crate) layers: PhysicalLayers,
}

impl ContextState {
    /// Handle of the owning context
    pub fn id(&self) -> ContextId {
        self.id
    }

    /// View rendered by this context
    pub fn view(&self) -> &RenderView {
        &self.view
    }

    /// Context this one was reached from through a portal
    pub fn parent(&self) -> Option<ContextId> {
        self.parent
    }

    /// Contexts reached through portals from this one
    pub fn children(&self) -> &[ContextId] {
        &self.children
    }

    /// Portal recursion depth, 0 for root contexts
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Meshes numbered in this context
    pub fn mesh_count(&self) -> usize {
        self.mesh_count
    }

    /// Whether indices and storage are valid
    pub fn is_numbered(&self) -> bool {
        self.numbered
    }

    /// Logical to physical layer mapping
    pub fn duplicator(&self) -> &LayerDuplicator {
        &self.duplicator
    }

    /// Physical sub-layers and per-mesh data
    pub fn layers(&self) -> &PhysicalLayers {
        &self.layers
    }

    /// Mutable physical sub-layers and per-mesh data
    pub fn layers_mut(&mut self) -> &mut PhysicalLayers {
        &mut self.layers
    }

    /// Physical index of a logical layer's sub-pass
    pub fn index_of(&self, layer: usize, sub_pass: usize) -> usize {
        self.duplicator.index_of(layer, sub_pass)
    }

    /// Sub-layers owned by a logical layer
    pub fn sub_layer_count(&self, layer: usize) -> usize {
        self.duplicator.sub_layer_count(layer)
    }

    /// Grow a logical layer to at least `needed` sub-layers
    pub fn ensure_sub_layers(&mut self, layer: usize, needed: usize) -> usize {
        self.duplicator.ensure(layer, needed, &mut self.layers)
    }

    pub(crate) fn reset_storage(&mut self, configs: &[LayerConfig], meshes: usize) {
        self.duplicator = LayerDuplicator::new(configs.len());
        self.layers = PhysicalLayers::new(configs, meshes);
        self.mesh_count = meshes;
        self.numbered = true;
    }
}

/// One render target or portal recursion step
#[derive(Debug)]
pub struct ContextNode {
    pub(crate) state: ContextState,
    pub(crate) mesh_nodes: BTreeMap<MeshNodeKey, MeshNode>,
}

impl ContextNode {
    pub(crate) fn new(
        id: ContextId,
        view: RenderView,
        parent: Option<ContextId>,
        depth: usize,
        configs: &[LayerConfig],
    ) -> Self {
        Self {
            state: ContextState {
                id,
                view,
                parent,
                children: Vec::new(),
                depth,
                mesh_count: 0,
                numbered: false,
                duplicator: LayerDuplicator::new(configs.len()),
                layers: PhysicalLayers::new(configs, 0),
            },
            mesh_nodes: BTreeMap::new(),
        }
    }

    /// Handle of this context
    pub fn id(&self) -> ContextId {
        self.state.id
    }

    /// Context state
    pub fn state(&self) -> &ContextState {
        &self.state
    }

    /// Mutable context state
    pub fn state_mut(&mut self) -> &mut ContextState {
        &mut self.state
    }

    /// Add a mesh to its bucket; invalidates numbering
    pub fn add_mesh(&mut self, mesh: Arc<RenderMesh>, sort_mode: SortMode) {
        let key = MeshNodeKey::of(&mesh);
        self.mesh_nodes
            .entry(key)
            .or_insert_with(|| MeshNode::new(key, sort_mode))
            .push(mesh);
        self.state.numbered = false;
    }

    /// Mesh nodes in ascending bucket order
    pub fn mesh_nodes(&self) -> impl DoubleEndedIterator<Item = &MeshNode> {
        self.mesh_nodes.values()
    }

    /// Look up a mesh node
    pub fn mesh_node(&self, key: MeshNodeKey) -> Option<&MeshNode> {
        self.mesh_nodes.get(&key)
    }

    /// Number of mesh nodes
    pub fn mesh_node_count(&self) -> usize {
        self.mesh_nodes.len()
    }

    /// All mesh records in visitation order
    pub fn records(&self) -> impl Iterator<Item = &MeshRecord> {
        self.mesh_nodes.values().flat_map(|node| node.meshes.iter())
    }
}
