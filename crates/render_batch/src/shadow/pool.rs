//! Shadow render target pool

use std::collections::HashMap;

use crate::error::ShadowError;
use crate::scene::LightId;

/// Index of a shadow render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShadowTargetId(pub u32);

/// Fixed-size set of shadow targets, handed out per (light, sub-light) for one frame
#[derive(Debug, Clone)]
pub struct ShadowTargetPool {
    capacity: usize,
    resolution: u32,
    frame: u64,
    assigned: HashMap<(LightId, usize), ShadowTargetId>,
}

impl ShadowTargetPool {
    /// Create a pool of `capacity` targets of `resolution`² texels
    pub fn new(capacity: usize, resolution: u32) -> Self {
        Self {
            capacity,
            resolution,
            frame: 0,
            assigned: HashMap::with_capacity(capacity),
        }
    }

    /// Release every target
    pub fn begin_frame(&mut self, frame: u64) {
        self.frame = frame;
        self.assigned.clear();
    }

    /// Target for `(light, sub_light)`, reusing the one acquired earlier this frame
    pub fn acquire(
        &mut self,
        light: LightId,
        sub_light: usize,
    ) -> Result<ShadowTargetId, ShadowError> {
        if let Some(target) = self.assigned.get(&(light, sub_light)) {
            return Ok(*target);
        }
        let next = self.assigned.len();
        if next >= self.capacity {
            return Err(ShadowError::PoolExhausted {
                capacity: self.capacity,
            });
        }
        let target = ShadowTargetId(u32::try_from(next).map_err(|_| ShadowError::PoolExhausted {
            capacity: self.capacity,
        })?);
        self.assigned.insert((light, sub_light), target);
        log::trace!(
            "Shadow target {target:?} -> light {light:?} sub-light {sub_light} (frame {})",
            self.frame
        );
        Ok(target)
    }

    /// Target acquired for `(light, sub_light)` this frame
    pub fn lookup(&self, light: LightId, sub_light: usize) -> Option<ShadowTargetId> {
        self.assigned.get(&(light, sub_light)).copied()
    }

    /// Targets handed out this frame
    pub fn in_use(&self) -> usize {
        self.assigned.len()
    }

    /// Pool size
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Target size in texels
    pub fn resolution(&self) -> u32 {
        self.resolution
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::SlotMap;

    #[test]
    fn test_pool_reuses_and_exhausts() {
        let mut keys: SlotMap<LightId, ()> = SlotMap::with_key();
        let a = keys.insert(());
        let b = keys.insert(());

        let mut pool = ShadowTargetPool::new(2, 512);
        let first = pool.acquire(a, 0).expect("free target");
        assert_eq!(pool.acquire(a, 0), Ok(first));
        let second = pool.acquire(a, 1).expect("free target");
        assert_ne!(first, second);
        assert_eq!(pool.acquire(b, 0), Err(ShadowError::PoolExhausted { capacity: 2 }));
        assert_eq!(pool.in_use(), 2);

        pool.begin_frame(1);
        assert_eq!(pool.in_use(), 0);
        assert!(pool.lookup(a, 0).is_none());
        assert!(pool.acquire(b, 0).is_ok());
    }
}
