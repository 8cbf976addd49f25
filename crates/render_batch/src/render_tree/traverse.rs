//! Generic traversal of contexts and mesh nodes
//!
//! Every pass over the render tree goes through these helpers instead of a
//! hand-written loop. Operations declare an [`OperationOrdering`]:
//!
//! - *numbered* operations receive a strictly increasing sequence index that
//!   matches visitation order
//! - *parallel-safe* operations touch nothing outside the mesh node they are
//!   given and the slots addressed by its meshes' own indices, and do not
//!   depend on the order other nodes are visited in
//!
//! Mesh nodes are visited in ascending bucket order unless a reverse variant
//! is used. Contexts are visited in creation order.

use std::collections::HashSet;
use std::hash::Hash;

use rayon::prelude::*;

use super::context::{ContextNode, ContextState};
use super::mesh_node::MeshNode;
use super::RenderTree;

/// Ordering and parallelism contract of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationOrdering {
    /// Any order, sequential only
    Unordered,
    /// Needs sequence numbers, sequential only
    Numbered,
    /// Any order, may run in parallel
    UnorderedParallel,
    /// Needs sequence numbers, may run in parallel
    NumberedParallel,
}

impl OperationOrdering {
    fn from_parts(numbered: bool, parallel: bool) -> Self {
        match (numbered, parallel) {
            (false, false) => Self::Unordered,
            (true, false) => Self::Numbered,
            (false, true) => Self::UnorderedParallel,
            (true, true) => Self::NumberedParallel,
        }
    }

    /// Whether the operation relies on sequence numbers
    pub fn is_numbered(self) -> bool {
        matches!(self, Self::Numbered | Self::NumberedParallel)
    }

    /// Whether the operation may run on several mesh nodes at once
    pub fn is_parallel_safe(self) -> bool {
        matches!(self, Self::UnorderedParallel | Self::NumberedParallel)
    }

    /// Contract satisfied by running both operations back to back
    pub fn combine(self, other: Self) -> Self {
        Self::from_parts(
            self.is_numbered() || other.is_numbered(),
            self.is_parallel_safe() && other.is_parallel_safe(),
        )
    }

    /// Same contract without the parallel guarantee
    pub fn sequential(self) -> Self {
        Self::from_parts(self.is_numbered(), false)
    }
}

/// Operation applied to every mesh node of a context
pub trait MeshNodeOperation {
    /// Ordering contract
    fn ordering(&self) -> OperationOrdering {
        OperationOrdering::Unordered
    }

    /// Process one mesh node
    fn apply(&mut self, node: &mut MeshNode, context: &mut ContextState, sequence: usize);
}

/// Closure adapter tagged [`OperationOrdering::Unordered`]
pub struct Unordered<F>(pub F);

impl<F> MeshNodeOperation for Unordered<F>
where
    F: FnMut(&mut MeshNode, &mut ContextState, usize),
{
    fn apply(&mut self, node: &mut MeshNode, context: &mut ContextState, sequence: usize) {
        (self.0)(node, context, sequence);
    }
}

/// Closure adapter tagged [`OperationOrdering::Numbered`]
pub struct Numbered<F>(pub F);

impl<F> MeshNodeOperation for Numbered<F>
where
    F: FnMut(&mut MeshNode, &mut ContextState, usize),
{
    fn ordering(&self) -> OperationOrdering {
        OperationOrdering::Numbered
    }

    fn apply(&mut self, node: &mut MeshNode, context: &mut ContextState, sequence: usize) {
        (self.0)(node, context, sequence);
    }
}

/// Operation that only mutates the mesh node it is given
pub trait ParallelMeshNodeOperation: Sync {
    /// Ordering contract; must be parallel-safe
    fn ordering(&self) -> OperationOrdering {
        OperationOrdering::UnorderedParallel
    }

    /// Process one mesh node
    fn apply(&self, node: &mut MeshNode, context: &ContextState, sequence: usize);
}

/// Operation applied to whole contexts
pub trait ContextOperation {
    /// Process one context
    fn apply(&mut self, context: &mut ContextNode, sequence: usize);
}

impl<F> ContextOperation for F
where
    F: FnMut(&mut ContextNode, usize),
{
    fn apply(&mut self, context: &mut ContextNode, sequence: usize) {
        self(context, sequence);
    }
}

fn visit_mesh_nodes<O>(context: &mut ContextNode, op: &mut O, reverse: bool, sequence: &mut usize)
where
    O: MeshNodeOperation + ?Sized,
{
    let ContextNode { state, mesh_nodes } = context;
    if reverse {
        for node in mesh_nodes.values_mut().rev() {
            op.apply(node, state, *sequence);
            *sequence += 1;
        }
    } else {
        for node in mesh_nodes.values_mut() {
            op.apply(node, state, *sequence);
            *sequence += 1;
        }
    }
}

/// Visit the mesh nodes of one context in ascending bucket order.
///
/// Returns the number of nodes visited.
pub fn for_each_mesh_node<O>(context: &mut ContextNode, op: &mut O) -> usize
where
    O: MeshNodeOperation + ?Sized,
{
    let mut sequence = 0;
    visit_mesh_nodes(context, op, false, &mut sequence);
    sequence
}

/// Visit the mesh nodes of one context in descending bucket order
pub fn for_each_mesh_node_reverse<O>(context: &mut ContextNode, op: &mut O) -> usize
where
    O: MeshNodeOperation + ?Sized,
{
    let mut sequence = 0;
    visit_mesh_nodes(context, op, true, &mut sequence);
    sequence
}

/// Visit the mesh nodes of one context on the rayon pool.
///
/// Operations that are not tagged parallel-safe run sequentially instead.
pub fn for_each_mesh_node_par<O>(context: &mut ContextNode, op: &O)
where
    O: ParallelMeshNodeOperation + ?Sized,
{
    let ContextNode { state, mesh_nodes } = context;
    let state: &ContextState = state;
    if !op.ordering().is_parallel_safe() {
        log::warn!(
            "Operation tagged {:?} scheduled in parallel, running sequentially",
            op.ordering()
        );
        for (sequence, node) in mesh_nodes.values_mut().enumerate() {
            op.apply(node, state, sequence);
        }
        return;
    }
    mesh_nodes
        .values_mut()
        .collect::<Vec<_>>()
        .into_par_iter()
        .enumerate()
        .for_each(|(sequence, node)| op.apply(node, state, sequence));
}

/// Visit every mesh node of every context; sequence numbers continue across contexts
pub fn for_each_mesh_node_in_tree<O>(tree: &mut RenderTree, op: &mut O) -> usize
where
    O: MeshNodeOperation + ?Sized,
{
    let mut sequence = 0;
    for id in &tree.order {
        if let Some(context) = tree.contexts.get_mut(*id) {
            visit_mesh_nodes(context, op, false, &mut sequence);
        }
    }
    sequence
}

/// Visit contexts in creation order
pub fn for_each_context<O>(tree: &mut RenderTree, op: &mut O)
where
    O: ContextOperation + ?Sized,
{
    for (sequence, id) in tree.order.iter().enumerate() {
        if let Some(context) = tree.contexts.get_mut(*id) {
            op.apply(context, sequence);
        }
    }
}

/// Visit contexts in reverse creation order, deepest portal views first
pub fn for_each_context_reverse<O>(tree: &mut RenderTree, op: &mut O)
where
    O: ContextOperation + ?Sized,
{
    for (sequence, id) in tree.order.iter().rev().enumerate() {
        if let Some(context) = tree.contexts.get_mut(*id) {
            op.apply(context, sequence);
        }
    }
}

/// Visit contexts on the rayon pool
pub fn for_each_context_par<F>(tree: &mut RenderTree, op: F)
where
    F: Fn(&mut ContextNode) + Sync + Send,
{
    tree.contexts
        .values_mut()
        .collect::<Vec<_>>()
        .into_par_iter()
        .for_each(|context| op(context));
}

/// Remembers which keys have been visited
#[derive(Debug, Clone)]
pub struct OnceBlocker<K> {
    seen: HashSet<K>,
}

impl<K: Eq + Hash> OnceBlocker<K> {
    /// Create an empty blocker
    pub fn new() -> Self {
        Self {
            seen: HashSet::new(),
        }
    }

    /// Mark `key` as visited; `true` on the first visit only
    pub fn block(&mut self, key: K) -> bool {
        self.seen.insert(key)
    }

    /// Whether `key` has been visited
    pub fn contains(&self, key: &K) -> bool {
        self.seen.contains(key)
    }

    /// Number of distinct keys visited
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether nothing has been visited
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Forget all visits
    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

impl<K: Eq + Hash> Default for OnceBlocker<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `inner` only for mesh nodes whose key the blocker has not seen yet
pub struct Once<'b, O, K, F> {
    inner: O,
    blocker: &'b mut OnceBlocker<K>,
    key: F,
}

impl<'b, O, K, F> Once<'b, O, K, F>
where
    O: MeshNodeOperation,
    K: Eq + Hash,
    F: Fn(&MeshNode, &ContextState) -> K,
{
    /// Wrap `inner`, keying visits with `key`
    pub fn new(inner: O, blocker: &'b mut OnceBlocker<K>, key: F) -> Self {
        Self { inner, blocker, key }
    }
}

impl<O, K, F> MeshNodeOperation for Once<'_, O, K, F>
where
    O: MeshNodeOperation,
    K: Eq + Hash,
    F: Fn(&MeshNode, &ContextState) -> K,
{
    fn ordering(&self) -> OperationOrdering {
        // The blocker is shared state
        self.inner.ordering().sequential()
    }

    fn apply(&mut self, node: &mut MeshNode, context: &mut ContextState, sequence: usize) {
        if self.blocker.block((self.key)(node, context)) {
            self.inner.apply(node, context, sequence);
        }
    }
}

/// Ordered list of stages applied to each mesh node in one traversal
#[derive(Default)]
pub struct Composite<'a> {
    stages: Vec<&'a mut dyn MeshNodeOperation>,
}

impl<'a> Composite<'a> {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Append a stage
    pub fn then(mut self, stage: &'a mut dyn MeshNodeOperation) -> Self {
        self.stages.push(stage);
        self
    }

    /// Number of stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether there are no stages
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl MeshNodeOperation for Composite<'_> {
    fn ordering(&self) -> OperationOrdering {
        self.stages
            .iter()
            .map(|stage| stage.ordering())
            .fold(OperationOrdering::UnorderedParallel, OperationOrdering::combine)
    }

    fn apply(&mut self, node: &mut MeshNode, context: &mut ContextState, sequence: usize) {
        for stage in &mut self.stages {
            stage.apply(node, context, sequence);
        }
    }
}
