//! Per-mesh-node setup stages chained by the frame driver
//!
//! The three stages run back to back on every mesh node through a
//! [`Composite`](super::traverse::Composite): shaders first, then lights, then
//! dispatch tickets once parameters are final.

use super::context::ContextState;
use super::mesh_node::MeshNode;
use super::traverse::{MeshNodeOperation, OperationOrdering};
use crate::lighting::{FrameInputs, LightPassAssigner};
use crate::shader::ShaderResolver;
use crate::shadow::ShadowCapability;

/// Resolves each mesh's shader per logical layer and seeds its parameter stacks
pub struct ShaderSetup<'a> {
    resolver: &'a dyn ShaderResolver,
}

impl<'a> ShaderSetup<'a> {
    /// Stage using `resolver`
    pub fn new(resolver: &'a dyn ShaderResolver) -> Self {
        Self { resolver }
    }
}

impl MeshNodeOperation for ShaderSetup<'_> {
    fn ordering(&self) -> OperationOrdering {
        OperationOrdering::UnorderedParallel
    }

    fn apply(&mut self, node: &mut MeshNode, context: &mut ContextState, _sequence: usize) {
        let logical = context.duplicator().logical_count();
        for record in node.meshes() {
            let mesh = record.index();
            let base = record.mesh.base_variables();
            for layer in 0..logical {
                let first = context.index_of(layer, 0);
                let sub_layers = context.sub_layer_count(layer);
                let shader = context.layers().layer(first).and_then(|config| {
                    self.resolver.resolve(
                        &record.mesh.material,
                        &config.shader_types,
                        config.default_shader.as_deref(),
                    )
                });
                let layers = context.layers_mut();
                for row in first..first + sub_layers {
                    layers.set_shader(row, mesh, if row == first { shader } else { None });
                    layers.set_ticket(row, mesh, None);
                    if let Some(vars) = layers.variables_mut(row, mesh) {
                        vars.clone_from(&base);
                    }
                }
            }
        }
    }
}

/// Runs the light-pass assigner on every mesh
pub struct LightSetup<'a, S: ShadowCapability> {
    assigner: &'a mut LightPassAssigner<S>,
    inputs: &'a FrameInputs<'a>,
}

impl<'a, S: ShadowCapability> LightSetup<'a, S> {
    /// Stage driving `assigner` with `inputs`
    pub fn new(assigner: &'a mut LightPassAssigner<S>, inputs: &'a FrameInputs<'a>) -> Self {
        Self { assigner, inputs }
    }
}

impl<S: ShadowCapability> MeshNodeOperation for LightSetup<'_, S> {
    fn apply(&mut self, node: &mut MeshNode, context: &mut ContextState, _sequence: usize) {
        for record in node.meshes() {
            self.assigner.assign_mesh(self.inputs, context, record);
        }
    }
}

/// Requests a dispatch ticket for every active slot
pub struct TicketSetup<'a> {
    resolver: &'a dyn ShaderResolver,
}

impl<'a> TicketSetup<'a> {
    /// Stage using `resolver`
    pub fn new(resolver: &'a dyn ShaderResolver) -> Self {
        Self { resolver }
    }
}

impl MeshNodeOperation for TicketSetup<'_> {
    fn ordering(&self) -> OperationOrdering {
        OperationOrdering::UnorderedParallel
    }

    fn apply(&mut self, node: &mut MeshNode, context: &mut ContextState, _sequence: usize) {
        let layers = context.layers_mut();
        for record in node.meshes() {
            let mesh = record.index();
            for row in 0..layers.len() {
                let ticket = match (layers.shader(row, mesh), layers.variables(row, mesh)) {
                    (Some(shader), Some(vars)) => {
                        Some(self.resolver.ticket(shader, &record.mesh, vars))
                    }
                    _ => None,
                };
                layers.set_ticket(row, mesh, ticket);
            }
        }
    }
}
