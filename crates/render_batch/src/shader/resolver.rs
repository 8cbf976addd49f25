//! Table-driven shader resolver

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use super::{ShaderId, ShaderMetadata, ShaderResolver, ShaderVarStack, Ticket};
use crate::scene::{Material, MaterialId, RenderMesh};

#[derive(Debug, Clone)]
struct ShaderEntry {
    name: String,
    metadata: ShaderMetadata,
}

/// Shader registry with per-type defaults and per-material overrides
#[derive(Debug, Default)]
pub struct ShaderTable {
    shaders: Vec<ShaderEntry>,
    by_name: HashMap<String, ShaderId>,
    type_defaults: HashMap<String, ShaderId>,
    material_bindings: HashMap<MaterialId, HashMap<String, ShaderId>>,
}

impl ShaderTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shader under a unique name
    pub fn register(&mut self, name: impl Into<String>, metadata: ShaderMetadata) -> ShaderId {
        let name = name.into();
        if let Some(existing) = self.by_name.get(&name) {
            log::warn!("Shader '{name}' registered twice, keeping the first");
            return *existing;
        }
        let id = ShaderId(u32::try_from(self.shaders.len()).unwrap_or(u32::MAX));
        self.by_name.insert(name.clone(), id);
        self.shaders.push(ShaderEntry { name, metadata });
        id
    }

    /// Shader used for `shader_type` when the material has no override
    pub fn bind_type(&mut self, shader_type: impl Into<String>, shader: ShaderId) {
        self.type_defaults.insert(shader_type.into(), shader);
    }

    /// Shader used for `shader_type` by one material
    pub fn bind_material(
        &mut self,
        material: MaterialId,
        shader_type: impl Into<String>,
        shader: ShaderId,
    ) {
        self.material_bindings
            .entry(material)
            .or_default()
            .insert(shader_type.into(), shader);
    }

    /// Look up a shader by name
    pub fn by_name(&self, name: &str) -> Option<ShaderId> {
        self.by_name.get(name).copied()
    }

    /// Name of a registered shader
    pub fn name(&self, shader: ShaderId) -> Option<&str> {
        self.shaders.get(shader.0 as usize).map(|e| e.name.as_str())
    }
}

impl ShaderResolver for ShaderTable {
    fn resolve(
        &self,
        material: &Material,
        shader_types: &[String],
        default_shader: Option<&str>,
    ) -> Option<ShaderId> {
        let overrides = self.material_bindings.get(&material.id);
        shader_types
            .iter()
            .find_map(|ty| {
                overrides
                    .and_then(|o| o.get(ty.as_str()))
                    .or_else(|| self.type_defaults.get(ty.as_str()))
                    .copied()
            })
            .or_else(|| default_shader.and_then(|name| self.by_name(name)))
    }

    fn metadata(&self, shader: ShaderId) -> ShaderMetadata {
        self.shaders
            .get(shader.0 as usize)
            .map(|e| e.metadata)
            .unwrap_or_default()
    }

    fn ticket(&self, shader: ShaderId, mesh: &RenderMesh, variables: &ShaderVarStack) -> Ticket {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        shader.hash(&mut hasher);
        mesh.geometry.hash(&mut hasher);
        variables.fingerprint().hash(&mut hasher);
        Ticket(hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::scene::{BoundingSphere, GeometryId};
    use std::sync::Arc;

    fn table() -> (ShaderTable, ShaderId, ShaderId, ShaderId) {
        let mut table = ShaderTable::new();
        let ambient = table.register("ambient", ShaderMetadata { max_lights: 0 });
        let lit = table.register("lit", ShaderMetadata { max_lights: 4 });
        let fallback = table.register("fallback", ShaderMetadata { max_lights: 1 });
        table.bind_type("ambient", ambient);
        table.bind_type("light", lit);
        (table, ambient, lit, fallback)
    }

    #[test]
    fn test_resolve_tries_types_in_order() {
        let (table, _, lit, _) = table();
        let material = Material::new(MaterialId(1), "stone");
        let types = vec!["unknown".to_string(), "light".to_string()];
        assert_eq!(table.resolve(&material, &types, None), Some(lit));
    }

    #[test]
    fn test_material_override_wins() {
        let (mut table, ambient, _, _) = table();
        table.bind_material(MaterialId(9), "light", ambient);
        let material = Material::new(MaterialId(9), "glow");
        assert_eq!(table.resolve(&material, &["light".to_string()], None), Some(ambient));
    }

    #[test]
    fn test_default_shader_fallback() {
        let (table, _, _, fallback) = table();
        let material = Material::new(MaterialId(1), "stone");
        let unknown = ["nope".to_string()];
        assert_eq!(table.resolve(&material, &unknown, Some("fallback")), Some(fallback));
        assert_eq!(table.resolve(&material, &unknown, Some("missing")), None);
    }

    #[test]
    fn test_ticket_depends_on_parameters() {
        let (table, _, lit, _) = table();
        let mesh = RenderMesh::new(
            GeometryId(3),
            Arc::new(Material::new(MaterialId(1), "stone")),
            BoundingSphere::new(Vec3::zeros(), 1.0),
        );
        let a = ShaderVarStack::new().with("light count", 1);
        let b = ShaderVarStack::new().with("light count", 2);
        assert_eq!(table.ticket(lit, &mesh, &a), table.ticket(lit, &mesh, &a.clone()));
        assert_ne!(table.ticket(lit, &mesh, &a), table.ticket(lit, &mesh, &b));
        assert_eq!(table.metadata(lit).max_lights, 4);
        assert_eq!(table.metadata(ShaderId(99)).max_lights, 0);
    }
}
