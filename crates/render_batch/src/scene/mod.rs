//! Scene vocabulary consumed by the batcher
//!
//! Lights, meshes, views and portals, plus the collaborator traits the
//! batcher uses to ask the engine what is visible and which lights reach a
//! mesh.
//!
//! ## Architecture
//!
//! ```text
//! LightRegistry ──(LightId)──► LightQuery ──► LightInfluence per mesh
//! RenderView ──► VisibilityCuller ──► VisibleSet { meshes, portals }
//!                                          │
//!                                          └─► Portal::view_through ──► child RenderView
//! ```

mod bounds;
mod collaborators;
mod light;
mod mesh;
mod portal;
mod view;

pub use bounds::{Aabb, BoundingSphere, Frustum, Plane};
pub use collaborators::{
    LightQuery, RegistryLightQuery, SimpleListCuller, VisibilityCuller, VisibleSet,
};
pub use light::{
    Light, LightDestroyListener, LightFlags, LightId, LightInfluence, LightRegistry,
    LightSettings, LightType,
};
pub use mesh::{GeometryId, Material, MaterialId, RenderMesh};
pub use portal::Portal;
pub use view::{Camera, RenderView, SectorId};
