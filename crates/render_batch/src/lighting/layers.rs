//! Logical to physical layer mapping
//!
//! Every logical layer starts the frame with one physical sub-layer. When a
//! mesh needs more passes than a layer currently has, [`LayerDuplicator::ensure`]
//! inserts sub-layers right after the layer's block and shifts the blocks of
//! all later layers. Sub-layers are never removed within a frame, so the
//! blocks stay contiguous and ordered: for `l1 < l2`,
//! `index_of(l2, 0) >= index_of(l1, 0) + sub_layer_count(l1)`.

/// Receives the physical layer insertions performed by a [`LayerDuplicator`]
pub trait LayerSequence {
    /// Insert `count` copies of physical layer `source`'s static configuration before `at`
    fn duplicate_layer(&mut self, source: usize, at: usize, count: usize);
}

/// Tracks the physical sub-layer block of every logical layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerDuplicator {
    bases: Vec<usize>,
    counts: Vec<usize>,
}

impl LayerDuplicator {
    /// One sub-layer per logical layer
    pub fn new(logical_layers: usize) -> Self {
        Self {
            bases: (0..logical_layers).collect(),
            counts: vec![1; logical_layers],
        }
    }

    /// Number of logical layers
    pub fn logical_count(&self) -> usize {
        self.counts.len()
    }

    /// Total physical sub-layers
    pub fn physical_count(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Physical index of sub-pass `sub_pass` of logical layer `layer`
    pub fn index_of(&self, layer: usize, sub_pass: usize) -> usize {
        self.bases[layer] + sub_pass
    }

    /// Sub-layers currently owned by `layer`
    pub fn sub_layer_count(&self, layer: usize) -> usize {
        self.counts[layer]
    }

    /// Grow `layer` to at least `needed` sub-layers.
    ///
    /// Returns the number of sub-layers inserted; zero when `needed` does not
    /// exceed the current count.
    pub fn ensure(
        &mut self,
        layer: usize,
        needed: usize,
        output: &mut impl LayerSequence,
    ) -> usize {
        let current = self.counts[layer];
        if needed <= current {
            return 0;
        }
        let added = needed - current;
        let base = self.bases[layer];
        output.duplicate_layer(base, base + current, added);

        self.counts[layer] = needed;
        for later in &mut self.bases[layer + 1..] {
            *later += added;
        }
        log::trace!("Layer {layer} grown to {needed} sub-layers");
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records insertions as a flat list of logical layer labels
    struct Labels(Vec<usize>);

    impl LayerSequence for Labels {
        fn duplicate_layer(&mut self, source: usize, at: usize, count: usize) {
            let label = self.0[source];
            for _ in 0..count {
                self.0.insert(at, label);
            }
        }
    }

    fn assert_monotonic(dup: &LayerDuplicator) {
        for l1 in 0..dup.logical_count() {
            for l2 in l1 + 1..dup.logical_count() {
                assert!(dup.index_of(l2, 0) >= dup.index_of(l1, 0) + dup.sub_layer_count(l1));
            }
        }
    }

    #[test]
    fn test_initial_mapping_is_identity() {
        let dup = LayerDuplicator::new(3);
        assert_eq!(dup.index_of(2, 0), 2);
        assert_eq!(dup.physical_count(), 3);
    }

    #[test]
    fn test_ensure_inserts_after_block_and_shifts() {
        let mut dup = LayerDuplicator::new(3);
        let mut labels = Labels(vec![0, 1, 2]);

        assert_eq!(dup.ensure(1, 3, &mut labels), 2);
        assert_eq!(labels.0, vec![0, 1, 1, 1, 2]);
        assert_eq!(dup.index_of(1, 2), 3);
        assert_eq!(dup.index_of(2, 0), 4);

        assert_eq!(dup.ensure(0, 2, &mut labels), 1);
        assert_eq!(labels.0, vec![0, 0, 1, 1, 1, 2]);
        assert_eq!(dup.index_of(1, 0), 2);
        assert_eq!(dup.index_of(2, 0), 5);
        assert_monotonic(&dup);
    }

    #[test]
    fn test_ensure_never_shrinks() {
        let mut dup = LayerDuplicator::new(2);
        let mut labels = Labels(vec![0, 1]);
        dup.ensure(0, 4, &mut labels);
        assert_eq!(dup.ensure(0, 2, &mut labels), 0);
        assert_eq!(dup.ensure(0, 4, &mut labels), 0);
        assert_eq!(dup.sub_layer_count(0), 4);
        assert_eq!(labels.0.len(), 5);
    }

    #[test]
    fn test_monotonic_under_mixed_growth() {
        let mut dup = LayerDuplicator::new(4);
        let mut labels = Labels(vec![0, 1, 2, 3]);
        for (layer, needed) in [(3, 2), (0, 3), (2, 5), (1, 2), (0, 1), (3, 4)] {
            dup.ensure(layer, needed, &mut labels);
            assert_monotonic(&dup);
        }
        assert_eq!(dup.physical_count(), labels.0.len());
        for layer in 0..4 {
            for sub in 0..dup.sub_layer_count(layer) {
                assert_eq!(labels.0[dup.index_of(layer, sub)], layer);
            }
        }
    }
}
