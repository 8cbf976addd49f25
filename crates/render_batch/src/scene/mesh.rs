//! Renderable geometry descriptions

use std::sync::Arc;

use super::bounds::BoundingSphere;
use crate::shader::{ShaderValue, ShaderVarName, ShaderVarStack};

/// Identifies an immutable geometry buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeometryId(pub u32);

/// Identifies a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

/// Material: identity plus its shader parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    /// Material identity, used for sorting and shader lookup
    pub id: MaterialId,
    /// Display name
    pub name: String,
    /// Material-level shader parameters
    pub variables: ShaderVarStack,
}

impl Material {
    /// Create a material without parameters
    pub fn new(id: MaterialId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            variables: ShaderVarStack::new(),
        }
    }

    /// Add a material parameter
    pub fn with_variable(
        mut self,
        name: impl Into<ShaderVarName>,
        value: impl Into<ShaderValue>,
    ) -> Self {
        self.variables.push(name, value);
        self
    }
}

/// One renderable submission as handed over by scene conversion
#[derive(Debug, Clone, PartialEq)]
pub struct RenderMesh {
    /// Geometry to draw
    pub geometry: GeometryId,
    /// Material to draw with
    pub material: Arc<Material>,
    /// World-space bounds
    pub bounds: BoundingSphere,
    /// Render priority, an index into the configured priorities
    pub render_priority: usize,
    /// User sort key ordering mesh nodes within one priority
    pub sort_key: u32,
    /// Mesh-level shader parameters, pushed over the material's
    pub variables: ShaderVarStack,
}

impl RenderMesh {
    /// Create a mesh at priority 0
    pub fn new(geometry: GeometryId, material: Arc<Material>, bounds: BoundingSphere) -> Self {
        Self {
            geometry,
            material,
            bounds,
            render_priority: 0,
            sort_key: 0,
            variables: ShaderVarStack::new(),
        }
    }

    /// Set the render priority
    pub fn with_priority(mut self, priority: usize) -> Self {
        self.render_priority = priority;
        self
    }

    /// Set the mesh node sort key
    pub fn with_sort_key(mut self, key: u32) -> Self {
        self.sort_key = key;
        self
    }

    /// Add a mesh parameter
    pub fn with_variable(
        mut self,
        name: impl Into<ShaderVarName>,
        value: impl Into<ShaderValue>,
    ) -> Self {
        self.variables.push(name, value);
        self
    }

    /// Material parameters with the mesh parameters pushed on top
    pub fn base_variables(&self) -> ShaderVarStack {
        let mut stack = self.material.variables.clone();
        stack.merge(&self.variables);
        stack
    }
}
