//! Per-light data kept across frames
//!
//! The cache never owns a light. Entries are keyed by [`LightId`] and removed
//! after the registry reports the light destroyed; the registry only holds a
//! weak reference to the cache's listener.

use std::sync::{Arc, Mutex, PoisonError};

use crate::foundation::collections::SecondaryMap;
use crate::scene::{Light, LightDestroyListener, LightId, LightRegistry};
use crate::shader::ShaderValue;

/// Cached parameters and technique data of one light
#[derive(Debug, Clone)]
pub struct CachedLight<D> {
    /// Per-light shader parameters, refreshed once per frame
    pub parameters: Vec<(&'static str, ShaderValue)>,
    /// Shadow technique state
    pub data: D,
    refreshed: u64,
}

impl<D> CachedLight<D> {
    /// Frame the parameters were last rebuilt in
    pub fn refreshed(&self) -> u64 {
        self.refreshed
    }
}

#[derive(Debug, Default)]
struct DestroyedLights {
    queue: Mutex<Vec<LightId>>,
}

impl LightDestroyListener for DestroyedLights {
    fn light_destroyed(&self, light: LightId) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(light);
    }
}

/// Non-owning cache of per-light data
#[derive(Debug)]
pub struct PersistentLightCache<D> {
    entries: SecondaryMap<LightId, CachedLight<D>>,
    destroyed: Arc<DestroyedLights>,
}

impl<D: Default> PersistentLightCache<D> {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            entries: SecondaryMap::new(),
            destroyed: Arc::new(DestroyedLights::default()),
        }
    }

    /// Entry for `id`, created on first sight and refreshed once per `frame`.
    ///
    /// Returns `None` if the registry no longer knows the light.
    pub fn fetch(
        &mut self,
        id: LightId,
        light: &Light,
        frame: u64,
        registry: &LightRegistry,
    ) -> Option<&mut CachedLight<D>> {
        if !self.entries.contains_key(id) {
            let listener: Arc<dyn LightDestroyListener> = self.destroyed.clone();
            if !registry.add_destroy_listener(id, Arc::downgrade(&listener)) {
                return None;
            }
            self.entries.insert(
                id,
                CachedLight {
                    parameters: light.shader_parameters(),
                    data: D::default(),
                    refreshed: frame,
                },
            );
            log::trace!("Cached light {id:?}");
        }
        let entry = self.entries.get_mut(id)?;
        if entry.refreshed != frame {
            entry.parameters = light.shader_parameters();
            entry.refreshed = frame;
        }
        Some(entry)
    }
}

impl<D> PersistentLightCache<D> {
    /// Look up an entry
    pub fn get(&self, id: LightId) -> Option<&CachedLight<D>> {
        self.entries.get(id)
    }

    /// Look up an entry for modification
    pub fn get_mut(&mut self, id: LightId) -> Option<&mut CachedLight<D>> {
        self.entries.get_mut(id)
    }

    /// Whether `id` has an entry
    pub fn contains(&self, id: LightId) -> bool {
        self.entries.contains_key(id)
    }

    /// Drop the entries of lights destroyed since the last call
    pub fn purge_destroyed(&mut self) -> usize {
        let destroyed: Vec<LightId> = std::mem::take(
            &mut *self
                .destroyed
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        let purged = destroyed
            .into_iter()
            .filter(|id| self.entries.remove(*id).is_some())
            .count();
        if purged > 0 {
            log::debug!("Purged {purged} destroyed light(s) from cache");
        }
        purged
    }

    /// Number of cached lights
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<D: Default> Default for PersistentLightCache<D> {
    fn default() -> Self {
        Self::new()
    }
}
