//! # Batching Configuration
//!
//! Everything the batcher reads from configuration: the ordered logical
//! render layers, the render priorities and their sort policies, the portal
//! recursion cap, and the shadow technique.
//!
//! ## Example (TOML)
//!
//! ```toml
//! max_portal_recursion = 3
//! max_lights_per_mesh = 64
//!
//! [[render_layers]]
//! name = "ambient"
//! shader_types = ["ambient"]
//! max_lights = 0
//! max_passes = 1
//! ambient = true
//!
//! [[render_layers]]
//! name = "light"
//! shader_types = ["light", "standard"]
//! default_shader = "std_lighting"
//! max_lights = 8
//! max_passes = 4
//!
//! [shadows]
//! technique = "Cascaded"
//! cascade_count = 3
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{Config, ConfigError};

/// Upper bound on cascades; spread masks are 32 bits wide
pub const MAX_CASCADES: usize = 32;

/// One logical render layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Layer name, unique within the configuration
    pub name: String,
    /// Shader type names tried in order when resolving a material's shader
    pub shader_types: Vec<String>,
    /// Shader used when none of the shader types resolve
    pub default_shader: Option<String>,
    /// Lights per pass; `0` means only the shader's own limit applies
    pub max_lights: usize,
    /// Maximum number of light passes this layer may expand to
    pub max_passes: usize,
    /// Ambient layers render once even when no light reaches the mesh
    pub ambient: bool,
}

impl LayerConfig {
    /// Create a lit layer with a single shader type of the same name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            shader_types: vec![name.clone()],
            name,
            ..Self::default()
        }
    }

    /// Set the shader types
    pub fn with_shader_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shader_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Set the fallback shader
    pub fn with_default_shader(mut self, shader: impl Into<String>) -> Self {
        self.default_shader = Some(shader.into());
        self
    }

    /// Set the per-pass light cap
    pub fn with_max_lights(mut self, max_lights: usize) -> Self {
        self.max_lights = max_lights;
        self
    }

    /// Set the pass cap
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Mark the layer as ambient
    pub fn ambient(mut self) -> Self {
        self.ambient = true;
        self
    }

    /// Per-pass light cap with `0` mapped to "unlimited"
    pub fn lights_per_pass(&self) -> usize {
        if self.max_lights == 0 {
            usize::MAX
        } else {
            self.max_lights
        }
    }
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            shader_types: Vec::new(),
            default_shader: None,
            max_lights: 0,
            max_passes: 1,
            ambient: false,
        }
    }
}

/// Mesh ordering inside one render priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortMode {
    /// Group by material then geometry
    #[default]
    None,
    /// Farthest first, for blending
    BackToFront,
    /// Nearest first, for early depth rejection
    FrontToBack,
}

/// A render priority; its position in [`BatchingConfig::priorities`] is the priority value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityConfig {
    /// Priority name
    pub name: String,
    /// How meshes of this priority are sorted
    pub sort: SortMode,
}

impl PriorityConfig {
    /// Create a priority
    pub fn new(name: impl Into<String>, sort: SortMode) -> Self {
        Self {
            name: name.into(),
            sort,
        }
    }
}

/// Which shadow technique the batcher plugs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShadowTechnique {
    /// No shadows
    #[default]
    None,
    /// One depth map per light (six for point lights)
    ShadowMap,
    /// Cascaded shadow maps split along view depth
    Cascaded,
}

/// Shadow settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Selected technique
    pub technique: ShadowTechnique,
    /// Shadow map edge length in texels
    pub map_resolution: u32,
    /// Render targets available per frame
    pub pool_size: usize,
    /// Cascades for [`ShadowTechnique::Cascaded`]
    pub cascade_count: usize,
    /// Blend between uniform (0) and logarithmic (1) cascade splits
    pub split_lambda: f32,
    /// View distance covered by cascades
    pub shadow_distance: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            technique: ShadowTechnique::None,
            map_resolution: 1024,
            pool_size: 16,
            cascade_count: 3,
            split_lambda: 0.6,
            shadow_distance: 100.0,
        }
    }
}

/// Root batching configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchingConfig {
    /// Logical render layers in render order
    pub render_layers: Vec<LayerConfig>,
    /// Render priorities in ascending order
    pub priorities: Vec<PriorityConfig>,
    /// Maximum depth of portal child contexts below a root context
    pub max_portal_recursion: usize,
    /// Upper bound on light influences gathered per mesh
    pub max_lights_per_mesh: usize,
    /// Shadow settings
    pub shadows: ShadowConfig,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            render_layers: vec![
                LayerConfig::new("ambient").with_max_passes(1).ambient(),
                LayerConfig::new("light")
                    .with_shader_types(["light", "standard"])
                    .with_max_lights(8)
                    .with_max_passes(4),
            ],
            priorities: vec![
                PriorityConfig::new("sky", SortMode::None),
                PriorityConfig::new("object", SortMode::FrontToBack),
                PriorityConfig::new("alpha", SortMode::BackToFront),
            ],
            max_portal_recursion: 3,
            max_lights_per_mesh: 64,
            shadows: ShadowConfig::default(),
        }
    }
}

impl BatchingConfig {
    /// Replace the render layers
    pub fn with_layers(mut self, layers: Vec<LayerConfig>) -> Self {
        self.render_layers = layers;
        self
    }

    /// Replace the shadow settings
    pub fn with_shadows(mut self, shadows: ShadowConfig) -> Self {
        self.shadows = shadows;
        self
    }

    /// Look up a layer index by name
    pub fn layer_index(&self, name: &str) -> Option<usize> {
        self.render_layers.iter().position(|l| l.name == name)
    }

    /// Look up a priority value by name
    pub fn priority_index(&self, name: &str) -> Option<usize> {
        self.priorities.iter().position(|p| p.name == name)
    }

    /// Sort mode for a priority value; unknown priorities are unsorted
    pub fn sort_mode(&self, priority: usize) -> SortMode {
        self.priorities.get(priority).map_or(SortMode::None, |p| p.sort)
    }

    /// Check the configuration for setups the batcher cannot use
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render_layers.is_empty() {
            return Err(ConfigError::Invalid("no render layers configured".into()));
        }

        let mut names = HashSet::new();
        for layer in &self.render_layers {
            if !names.insert(layer.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate render layer '{}'",
                    layer.name
                )));
            }
            if layer.max_passes == 0 {
                log::warn!(
                    "Render layer '{}' allows zero passes and will never render",
                    layer.name
                );
            }
        }

        if self.priorities.is_empty() {
            return Err(ConfigError::Invalid("no render priorities configured".into()));
        }

        match self.shadows.technique {
            ShadowTechnique::None => {}
            ShadowTechnique::ShadowMap => {
                if self.shadows.pool_size == 0 {
                    return Err(ConfigError::Invalid(
                        "shadow maps need a pool size of at least 1".into(),
                    ));
                }
            }
            ShadowTechnique::Cascaded => {
                if !(1..=MAX_CASCADES).contains(&self.shadows.cascade_count) {
                    return Err(ConfigError::Invalid(format!(
                        "cascade count must be within 1..={MAX_CASCADES}, got {}",
                        self.shadows.cascade_count
                    )));
                }
                if self.shadows.shadow_distance <= 0.0 {
                    return Err(ConfigError::Invalid("shadow distance must be positive".into()));
                }
            }
        }

        Ok(())
    }
}

impl Config for BatchingConfig {}
