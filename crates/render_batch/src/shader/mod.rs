//! Shader-facing types
//!
//! The batcher never compiles or binds shaders. It asks a [`ShaderResolver`]
//! which shader a material uses in a layer, how many lights that shader takes
//! per pass, and for a dispatch [`Ticket`] once parameters are final.

mod resolver;
mod variables;

pub use resolver::ShaderTable;
pub use variables::{names, ShaderValue, ShaderVarName, ShaderVarStack};

use crate::scene::{Material, RenderMesh};

/// Identifies a compiled shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub u32);

/// Opaque per-(shader, mesh, parameters) dispatch handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(pub u64);

/// What the batcher needs to know about a shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShaderMetadata {
    /// Lights one pass of this shader can take; `0` for unlit shaders
    pub max_lights: usize,
}

/// Shader lookup and dispatch.
pub trait ShaderResolver {
    /// Best shader for `material` among `shader_types` (tried in order), else `default_shader`
    fn resolve(
        &self,
        material: &Material,
        shader_types: &[String],
        default_shader: Option<&str>,
    ) -> Option<ShaderId>;

    /// Metadata of a resolved shader
    fn metadata(&self, shader: ShaderId) -> ShaderMetadata;

    /// Dispatch handle for drawing `mesh` with `shader` and `variables`
    fn ticket(&self, shader: ShaderId, mesh: &RenderMesh, variables: &ShaderVarStack) -> Ticket;
}
