//! Lights, light identity and the engine-side light registry
//!
//! The registry owns every [`Light`]. Other systems refer to lights only
//! through [`LightId`] keys and learn about destruction through
//! [`LightDestroyListener`] callbacks; nothing outside the registry keeps a
//! light alive.

use std::sync::{Mutex, PoisonError, Weak};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::bounds::BoundingSphere;
use super::view::SectorId;
use crate::foundation::collections::{new_key_type, SlotMap};
use crate::foundation::math::{Vec3, Vec4};
use crate::shader::{names, ShaderValue};

new_key_type! {
    /// Generational light handle; a removed light's id is never reused
    pub struct LightId;
}

/// Light types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LightType {
    /// Directional light (like sunlight)
    Directional,
    /// Point light (like a lightbulb)
    Point,
    /// Spot light (like a flashlight)
    Spot,
}

impl LightType {
    /// Value written to the `light type` shader parameter
    pub fn shader_value(self) -> i32 {
        match self {
            Self::Point => 0,
            Self::Directional => 1,
            Self::Spot => 2,
        }
    }
}

bitflags! {
    /// Per-light rendering flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LightFlags: u32 {
        /// Light never casts shadows
        const NO_SHADOWS = 1;
        /// Light contributes no specular term
        const NO_SPECULAR = 1 << 1;
        /// Light never moves
        const STATIC = 1 << 2;
        /// Light moves every frame
        const DYNAMIC = 1 << 3;
    }
}

/// The part of a light that decides which lights may share a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightSettings {
    /// Light type
    pub light_type: LightType,
    /// Flags after the shadow technique's ignore mask is applied
    pub flags: LightFlags,
}

/// Light source
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    /// Light type
    pub light_type: LightType,
    /// Rendering flags
    pub flags: LightFlags,
    /// Sector the light lives in; `None` lights every sector
    pub sector: Option<SectorId>,
    /// Light position (for point/spot lights)
    pub position: Vec3,
    /// Light direction (for directional/spot lights)
    pub direction: Vec3,
    /// Light color
    pub color: Vec3,
    /// Light intensity
    pub intensity: f32,
    /// Light range (for point/spot lights)
    pub range: f32,
    /// Inner cone angle for spot lights (in radians)
    pub inner_cone_angle: f32,
    /// Outer cone angle for spot lights (in radians)
    pub outer_cone_angle: f32,
}

impl Light {
    /// Create a directional light
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            light_type: LightType::Directional,
            flags: LightFlags::empty(),
            sector: None,
            position: Vec3::zeros(),
            direction: direction.normalize(),
            color,
            intensity,
            range: 0.0,
            inner_cone_angle: 0.0,
            outer_cone_angle: 0.0,
        }
    }

    /// Create a point light
    pub fn point(position: Vec3, color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            light_type: LightType::Point,
            flags: LightFlags::empty(),
            sector: None,
            position,
            direction: Vec3::zeros(),
            color,
            intensity,
            range,
            inner_cone_angle: 0.0,
            outer_cone_angle: 0.0,
        }
    }

    /// Create a spot light
    pub fn spot(
        position: Vec3,
        direction: Vec3,
        color: Vec3,
        intensity: f32,
        range: f32,
        inner_cone_angle: f32,
        outer_cone_angle: f32,
    ) -> Self {
        Self {
            light_type: LightType::Spot,
            flags: LightFlags::empty(),
            sector: None,
            position,
            direction: direction.normalize(),
            color,
            intensity,
            range,
            inner_cone_angle,
            outer_cone_angle,
        }
    }

    /// Set flags
    pub fn with_flags(mut self, flags: LightFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Restrict the light to one sector
    pub fn in_sector(mut self, sector: SectorId) -> Self {
        self.sector = Some(sector);
        self
    }

    /// Whether this light may cast shadows
    pub fn casts_shadows(&self) -> bool {
        !self.flags.contains(LightFlags::NO_SHADOWS)
    }

    /// Compatibility settings with `ignored` flags removed
    pub fn settings(&self, ignored: LightFlags) -> LightSettings {
        LightSettings {
            light_type: self.light_type,
            flags: self.flags.difference(ignored),
        }
    }

    /// Whether the light reaches any part of `bounds`
    pub fn reaches(&self, bounds: &BoundingSphere) -> bool {
        match self.light_type {
            LightType::Directional => true,
            LightType::Point | LightType::Spot => bounds.distance_to(self.position) <= self.range,
        }
    }

    /// Per-light shader parameters, written as array items at the light's slot
    pub fn shader_parameters(&self) -> Vec<(&'static str, ShaderValue)> {
        let inv_range = if self.range > 0.0 { 1.0 / self.range } else { 0.0 };
        vec![
            (names::LIGHT_POSITION, ShaderValue::Vec3(self.position)),
            (names::LIGHT_DIRECTION, ShaderValue::Vec3(self.direction)),
            (names::LIGHT_DIFFUSE, ShaderValue::Vec3(self.color * self.intensity)),
            (
                names::LIGHT_ATTENUATION,
                ShaderValue::Vec4(Vec4::new(self.range, 1.0, inv_range, inv_range * inv_range)),
            ),
            (
                names::LIGHT_FALLOFF,
                ShaderValue::Vec4(Vec4::new(
                    self.inner_cone_angle.cos(),
                    self.outer_cone_angle.cos(),
                    0.0,
                    0.0,
                )),
            ),
        ]
    }
}

/// One light reaching one mesh, as reported by a light query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightInfluence {
    /// The light
    pub light: LightId,
    /// Higher is more important
    pub relevance: f32,
    /// Light type at query time
    pub light_type: LightType,
    /// Light flags at query time
    pub flags: LightFlags,
}

impl LightInfluence {
    /// Capture a light's type and flags
    pub fn new(light: LightId, data: &Light, relevance: f32) -> Self {
        Self {
            light,
            relevance,
            light_type: data.light_type,
            flags: data.flags,
        }
    }

    /// Compatibility settings with `ignored` flags removed
    pub fn settings(&self, ignored: LightFlags) -> LightSettings {
        LightSettings {
            light_type: self.light_type,
            flags: self.flags.difference(ignored),
        }
    }
}

/// Notified when a light is removed from its registry
pub trait LightDestroyListener: Send + Sync {
    /// Called once, after the light has left the registry
    fn light_destroyed(&self, light: LightId);
}

struct LightSlot {
    light: Light,
    listeners: Mutex<Vec<Weak<dyn LightDestroyListener>>>,
}

/// Owner of all lights
#[derive(Default)]
pub struct LightRegistry {
    lights: SlotMap<LightId, LightSlot>,
}

impl LightRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a light
    pub fn insert(&mut self, light: Light) -> LightId {
        self.lights.insert(LightSlot {
            light,
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// Get a light
    pub fn get(&self, id: LightId) -> Option<&Light> {
        self.lights.get(id).map(|slot| &slot.light)
    }

    /// Get a light for modification
    pub fn get_mut(&mut self, id: LightId) -> Option<&mut Light> {
        self.lights.get_mut(id).map(|slot| &mut slot.light)
    }

    /// Remove a light and notify its destruction listeners
    pub fn remove(&mut self, id: LightId) -> Option<Light> {
        let slot = self.lights.remove(id)?;
        let listeners = slot
            .listeners
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter().filter_map(Weak::upgrade) {
            listener.light_destroyed(id);
        }
        log::trace!("Removed light {id:?}, notified {} listener(s)", listeners.len());
        Some(slot.light)
    }

    /// Register a listener for the removal of `id`.
    ///
    /// Returns `false` when the light does not exist.
    pub fn add_destroy_listener(
        &self,
        id: LightId,
        listener: Weak<dyn LightDestroyListener>,
    ) -> bool {
        let Some(slot) = self.lights.get(id) else {
            return false;
        };
        let mut listeners = slot.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|l| l.strong_count() > 0);
        listeners.push(listener);
        true
    }

    /// Iterate over all lights
    pub fn iter(&self) -> impl Iterator<Item = (LightId, &Light)> {
        self.lights.iter().map(|(id, slot)| (id, &slot.light))
    }

    /// Number of lights
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }
}

impl std::fmt::Debug for LightRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightRegistry")
            .field("lights", &self.lights.len())
            .finish()
    }
}
