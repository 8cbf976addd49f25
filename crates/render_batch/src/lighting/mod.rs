//! Light distribution over render passes
//!
//! - [`LightCompatibilitySorter`]: stable filtered queue of the lights reaching a mesh
//! - [`LayerDuplicator`]: logical to physical sub-layer mapping
//! - [`PersistentLightCache`]: per-light data that outlives a frame but never a light
//! - [`LightPassAssigner`]: packs lights into passes and fills the per-mesh slots

mod assign;
mod cache;
mod layers;
mod sorter;

pub use assign::{AssignmentStats, FrameInputs, LayerState, LightPassAssigner};
pub use cache::{CachedLight, PersistentLightCache};
pub use layers::{LayerDuplicator, LayerSequence};
pub use sorter::{LightCompatibilitySorter, LightInfo};
