//! # Render Batch
//!
//! Render batching and multi-pass light assignment for a portal-based engine.
//!
//! Each frame the visible meshes of every view are collected into a
//! [`RenderTree`](render_tree::RenderTree), bucketed by render priority,
//! sorted, numbered, and then expanded into physical passes: every logical
//! render layer grows as many sub-layers as its most demanding mesh needs,
//! and every (sub-layer, mesh) slot receives a shader, a parameter stack and
//! a dispatch ticket.
//!
//! ## Features
//!
//! - **Render tree**: contexts per view and portal recursion step, priority buckets per context
//! - **Traversal library**: ordering-tagged operations, parallel variants on rayon
//! - **Light passes**: compatibility grouping, per-pass caps, pass caps per layer
//! - **Shadows**: pluggable techniques (none, shadow maps, cascades)
//! - **Configuration**: TOML or RON via serde
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use render_batch::prelude::*;
//! use std::sync::Arc;
//!
//! let config = BatchingConfig::default();
//! let mut shaders = ShaderTable::new();
//! let ambient = shaders.register("ambient", ShaderMetadata { max_lights: 0 });
//! let lit = shaders.register("lit", ShaderMetadata { max_lights: 4 });
//! shaders.bind_type("ambient", ambient);
//! shaders.bind_type("light", lit);
//!
//! let mut lights = LightRegistry::new();
//! lights.insert(Light::point(Vec3::new(0.0, 3.0, -5.0), Vec3::new(1.0, 1.0, 1.0), 2.0, 20.0));
//!
//! let mut batcher = RenderBatcher::new(config, NoShadows);
//! let mut tree = batcher.create_tree();
//! let view = RenderView::new(Camera::new(Vec3::zeros(), -Vec3::z()), SectorId(0), 0);
//! let context = tree.create_context(view);
//! let material = Arc::new(Material::new(MaterialId(0), "stone"));
//! let bounds = BoundingSphere::new(Vec3::new(0.0, 0.0, -5.0), 1.0);
//! let mesh = RenderMesh::new(GeometryId(0), material, bounds).with_priority(1);
//! tree.add_mesh(context, Arc::new(mesh));
//!
//! let query = RegistryLightQuery::new(&lights);
//! let inputs = FrameInputs { lights: &lights, light_query: &query, shaders: &shaders };
//! let stats = batcher.prepare_frame(&mut tree, &inputs);
//! println!("{} active passes", stats.active_passes);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod lighting;
pub mod render_tree;
pub mod scene;
pub mod shader;
pub mod shadow;

mod batcher;
mod error;

pub use batcher::{FrameStats, RenderBatcher};
pub use error::{ConfigError, ShadowError};

#[cfg(test)]
mod tests;

/// Common imports for batching users
pub mod prelude {
    pub use crate::{
        config::{
            BatchingConfig, Config, LayerConfig, PriorityConfig, ShadowConfig, ShadowTechnique,
            SortMode,
        },
        foundation::math::{Mat4, Vec3, Vec4},
        lighting::{FrameInputs, LightPassAssigner},
        render_tree::{ContextId, RenderTree},
        scene::{
            BoundingSphere, Camera, GeometryId, Light, LightFlags, LightId, LightRegistry,
            LightType, Material, MaterialId, Portal, RegistryLightQuery, RenderMesh, RenderView,
            SectorId, SimpleListCuller,
        },
        shader::{ShaderMetadata, ShaderResolver, ShaderTable},
        shadow::{CascadedShadows, NoShadows, ShadowCapability, ShadowMapShadows},
        ConfigError, FrameStats, RenderBatcher, ShadowError,
    };
}
