//! Grouping of lights into compatible runs
//!
//! Lights reaching a mesh arrive ordered by relevance. A pass can only hold
//! lights with equal [`LightSettings`], so the assigner asks for the first
//! pending light and then for further lights matching its settings. Matching
//! is a stable filtered dequeue: skipped lights stay where they are and
//! matching lights come out in their original order.

use std::collections::VecDeque;

use crate::scene::{LightFlags, LightInfluence, LightSettings};

/// A pending light together with its grouping data
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightInfo {
    /// The influence reported by the light query
    pub influence: LightInfluence,
    /// Virtual lights this light expands to (at least 1)
    pub sub_lights: usize,
    /// Settings used for compatibility grouping
    pub settings: LightSettings,
}

/// Stable filtered queue of the lights reaching one mesh
#[derive(Debug, Clone)]
pub struct LightCompatibilitySorter {
    pending: VecDeque<LightInfo>,
    remaining_budget: usize,
}

impl LightCompatibilitySorter {
    /// Create a sorter expecting about `expected` lights
    pub fn with_capacity(expected: usize) -> Self {
        Self {
            pending: VecDeque::with_capacity(expected),
            remaining_budget: usize::MAX,
        }
    }

    /// Drop all pending lights and lift the limit
    pub fn clear(&mut self) {
        self.pending.clear();
        self.remaining_budget = usize::MAX;
    }

    /// Queue a light behind the ones already added.
    ///
    /// `ignored_flags` are removed from the light's flags before grouping.
    pub fn add(&mut self, influence: LightInfluence, sub_lights: usize, ignored_flags: LightFlags) {
        self.pending.push_back(LightInfo {
            influence,
            sub_lights: sub_lights.max(1),
            settings: influence.settings(ignored_flags),
        });
    }

    /// From now on yield at most `limit` lights
    pub fn set_limit(&mut self, limit: usize) {
        self.remaining_budget = limit;
    }

    /// Lights still allowed by the limit
    pub fn remaining_budget(&self) -> usize {
        self.remaining_budget
    }

    /// Lights not yet yielded
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether no light is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take the first pending light, whatever its settings
    pub fn next(&mut self) -> Option<LightInfo> {
        if self.remaining_budget == 0 {
            return None;
        }
        let info = self.pending.pop_front()?;
        self.remaining_budget -= 1;
        Some(info)
    }

    /// Take the first pending light whose settings equal `settings`.
    ///
    /// Nothing is consumed when no pending light matches.
    pub fn next_matching(&mut self, settings: &LightSettings) -> Option<LightInfo> {
        if self.remaining_budget == 0 {
            return None;
        }
        let position = self.pending.iter().position(|l| l.settings == *settings)?;
        let info = self.pending.remove(position)?;
        self.remaining_budget -= 1;
        Some(info)
    }

    /// Return consumed lights to the front of the queue, keeping their order
    pub fn put_back(&mut self, lights: &[LightInfo]) {
        for info in lights.iter().rev() {
            self.pending.push_front(*info);
        }
        self.remaining_budget = self.remaining_budget.saturating_add(lights.len());
    }
}

impl Default for LightCompatibilitySorter {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}
