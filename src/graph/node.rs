//! Typed graph nodes behind a type-erased interface
//!
//! Every node owns a [`Slot`] with its current values and a version number.
//! The version only advances when a recomputation produced values that
//! differ from the previous ones, so an unchanged upstream version is all a
//! node needs to know to skip its own work.

use std::any::Any;
use std::sync::Arc;

use log::error;
use rayon::prelude::*;

use super::cancel::{CancellationToken, Cancelled};

pub type NodeId = usize;

/// Bound shared by every value flowing through a graph
pub trait Data: Clone + PartialEq + Send + Sync + 'static {}

impl<T: Clone + PartialEq + Send + Sync + 'static> Data for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Source,
    Map,
    FlatMap,
    Filter,
    Combine,
    CollectAll,
    Output,
}

/// Work counters for one node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeStats {
    /// Times the node recomputed because an input changed
    pub evaluations: u64,
    /// Stage-function invocations (cache misses)
    pub computations: u64,
    /// Times the node's output changed
    pub changes: u64,
}

pub(crate) struct Slot<T> {
    pub values: Arc<Vec<T>>,
    pub version: u64,
}

impl<T: Data> Slot<T> {
    fn new() -> Self {
        Self {
            values: Arc::new(Vec::new()),
            version: 0,
        }
    }

    /// Replace the values unless they are equal; reports whether they changed
    fn update(&mut self, values: Vec<T>) -> bool {
        if *self.values == values {
            return false;
        }
        self.values = Arc::new(values);
        self.version += 1;
        true
    }
}

pub(crate) struct EvalContext<'a> {
    pub cancel: &'a CancellationToken,
    pub parallel: bool,
}

pub(crate) trait ErasedNode: Send {
    fn kind(&self) -> StageKind;
    fn inputs(&self) -> Vec<NodeId>;
    fn stats(&self) -> NodeStats;
    /// The node's [`Slot`], or `()` for terminals
    fn output(&self) -> &dyn Any;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// Bring the node up to date; `Ok(true)` when its output changed
    fn evaluate(&mut self, upstream: &[Box<dyn ErasedNode>], ctx: &EvalContext<'_>) -> Result<bool, Cancelled>;
}

pub(crate) fn slot<T: Data>(nodes: &[Box<dyn ErasedNode>], id: NodeId) -> Option<&Slot<T>> {
    let found = nodes.get(id).and_then(|node| node.output().downcast_ref::<Slot<T>>());
    if found.is_none() {
        error!("node {} does not hold values of the requested type", id);
    }
    found
}

pub(crate) struct SourceNode<T> {
    slot: Slot<T>,
    stats: NodeStats,
}

impl<T: Data> SourceNode<T> {
    pub fn new() -> Self {
        Self {
            slot: Slot::new(),
            stats: NodeStats::default(),
        }
    }

    pub fn set(&mut self, values: Vec<T>) -> bool {
        let changed = self.slot.update(values);
        if changed {
            self.stats.changes += 1;
        }
        changed
    }
}

impl<T: Data> ErasedNode for SourceNode<T> {
    fn kind(&self) -> StageKind {
        StageKind::Source
    }

    fn inputs(&self) -> Vec<NodeId> {
        Vec::new()
    }

    fn stats(&self) -> NodeStats {
        self.stats
    }

    fn output(&self) -> &dyn Any {
        &self.slot
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn evaluate(&mut self, _: &[Box<dyn ErasedNode>], _: &EvalContext<'_>) -> Result<bool, Cancelled> {
        Ok(false)
    }
}

pub(crate) type StageFn<I, O> =
    Arc<dyn Fn(&I, &CancellationToken) -> Result<Vec<O>, Cancelled> + Send + Sync>;

/// Map, FlatMap and Filter: each input element yields zero or more outputs
///
/// Outputs are memoized per input element, so an element equal to one seen
/// in the previous evaluation is not recomputed.
pub(crate) struct MapNode<I, O> {
    kind: StageKind,
    input: NodeId,
    func: StageFn<I, O>,
    seen: Option<u64>,
    memo: Vec<(I, Vec<O>)>,
    slot: Slot<O>,
    stats: NodeStats,
}

impl<I: Data, O: Data> MapNode<I, O> {
    pub fn new(kind: StageKind, input: NodeId, func: StageFn<I, O>) -> Self {
        Self {
            kind,
            input,
            func,
            seen: None,
            memo: Vec::new(),
            slot: Slot::new(),
            stats: NodeStats::default(),
        }
    }
}

fn cached<'m, I: PartialEq, O>(memo: &'m [(I, Vec<O>)], idx: usize, item: &I) -> Option<&'m Vec<O>> {
    match memo.get(idx) {
        Some((previous, out)) if previous == item => Some(out),
        _ => memo
            .iter()
            .find(|(previous, _)| previous == item)
            .map(|(_, out)| out),
    }
}

impl<I: Data, O: Data> ErasedNode for MapNode<I, O> {
    fn kind(&self) -> StageKind {
        self.kind
    }

    fn inputs(&self) -> Vec<NodeId> {
        vec![self.input]
    }

    fn stats(&self) -> NodeStats {
        self.stats
    }

    fn output(&self) -> &dyn Any {
        &self.slot
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn evaluate(&mut self, upstream: &[Box<dyn ErasedNode>], ctx: &EvalContext<'_>) -> Result<bool, Cancelled> {
        let Some(input) = slot::<I>(upstream, self.input) else {
            return Ok(false);
        };
        if self.seen == Some(input.version) {
            return Ok(false);
        }
        let items = Arc::clone(&input.values);
        let version = input.version;

        let memo = &self.memo;
        let func = &self.func;
        let cancel = ctx.cancel;
        let compute = |(idx, item): (usize, &I)| -> Result<(Vec<O>, bool), Cancelled> {
            cancel.check()?;
            match cached(memo, idx, item) {
                Some(out) => Ok((out.clone(), false)),
                None => Ok((func(item, cancel)?, true)),
            }
        };
        let results: Vec<(Vec<O>, bool)> = if ctx.parallel && items.len() > 1 {
            items.par_iter().enumerate().map(compute).collect::<Result<_, _>>()?
        } else {
            items.iter().enumerate().map(compute).collect::<Result<_, _>>()?
        };

        self.stats.evaluations += 1;
        let mut outputs = Vec::with_capacity(results.len());
        let mut memo = Vec::with_capacity(results.len());
        for (item, (out, fresh)) in items.iter().zip(results) {
            if fresh {
                self.stats.computations += 1;
            }
            outputs.extend(out.iter().cloned());
            memo.push((item.clone(), out));
        }
        self.memo = memo;
        self.seen = Some(version);

        let changed = self.slot.update(outputs);
        if changed {
            self.stats.changes += 1;
        }
        Ok(changed)
    }
}

/// Pairs every value of the left input with the single value of the right
pub(crate) struct CombineNode<A, B> {
    left: NodeId,
    right: NodeId,
    seen: Option<(u64, u64)>,
    slot: Slot<(A, B)>,
    stats: NodeStats,
}

impl<A: Data, B: Data> CombineNode<A, B> {
    pub fn new(left: NodeId, right: NodeId) -> Self {
        Self {
            left,
            right,
            seen: None,
            slot: Slot::new(),
            stats: NodeStats::default(),
        }
    }
}

impl<A: Data, B: Data> ErasedNode for CombineNode<A, B> {
    fn kind(&self) -> StageKind {
        StageKind::Combine
    }

    fn inputs(&self) -> Vec<NodeId> {
        vec![self.left, self.right]
    }

    fn stats(&self) -> NodeStats {
        self.stats
    }

    fn output(&self) -> &dyn Any {
        &self.slot
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn evaluate(&mut self, upstream: &[Box<dyn ErasedNode>], ctx: &EvalContext<'_>) -> Result<bool, Cancelled> {
        let (Some(left), Some(right)) = (slot::<A>(upstream, self.left), slot::<B>(upstream, self.right)) else {
            return Ok(false);
        };
        let versions = (left.version, right.version);
        if self.seen == Some(versions) {
            return Ok(false);
        }
        ctx.cancel.check()?;

        let outputs: Vec<(A, B)> = match right.values.first() {
            Some(b) => left.values.iter().map(|a| (a.clone(), b.clone())).collect(),
            None => Vec::new(),
        };
        self.stats.evaluations += 1;
        self.stats.computations += outputs.len() as u64;
        self.seen = Some(versions);

        let changed = self.slot.update(outputs);
        if changed {
            self.stats.changes += 1;
        }
        Ok(changed)
    }
}

/// Gathers all values of its input into one ordered vector
pub(crate) struct CollectNode<T> {
    input: NodeId,
    seen: Option<u64>,
    slot: Slot<Vec<T>>,
    stats: NodeStats,
}

impl<T: Data> CollectNode<T> {
    pub fn new(input: NodeId) -> Self {
        Self {
            input,
            seen: None,
            slot: Slot::new(),
            stats: NodeStats::default(),
        }
    }
}

impl<T: Data> ErasedNode for CollectNode<T> {
    fn kind(&self) -> StageKind {
        StageKind::CollectAll
    }

    fn inputs(&self) -> Vec<NodeId> {
        vec![self.input]
    }

    fn stats(&self) -> NodeStats {
        self.stats
    }

    fn output(&self) -> &dyn Any {
        &self.slot
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn evaluate(&mut self, upstream: &[Box<dyn ErasedNode>], _: &EvalContext<'_>) -> Result<bool, Cancelled> {
        let Some(input) = slot::<T>(upstream, self.input) else {
            return Ok(false);
        };
        if self.seen == Some(input.version) {
            return Ok(false);
        }
        let collected = input.values.as_ref().clone();
        self.seen = Some(input.version);
        self.stats.evaluations += 1;
        self.stats.computations += 1;

        let changed = self.slot.update(vec![collected]);
        if changed {
            self.stats.changes += 1;
        }
        Ok(changed)
    }
}

/// Terminal node; remembers which input version was last handed out
pub(crate) struct OutputNode<T> {
    pub input: NodeId,
    pub taken: Option<u64>,
    stats: NodeStats,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Data> OutputNode<T> {
    pub fn new(input: NodeId) -> Self {
        Self {
            input,
            taken: None,
            stats: NodeStats::default(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn record_take(&mut self, version: u64) {
        self.taken = Some(version);
        self.stats.computations += 1;
    }
}

impl<T: Data> ErasedNode for OutputNode<T> {
    fn kind(&self) -> StageKind {
        StageKind::Output
    }

    fn inputs(&self) -> Vec<NodeId> {
        vec![self.input]
    }

    fn stats(&self) -> NodeStats {
        self.stats
    }

    fn output(&self) -> &dyn Any {
        &()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn evaluate(&mut self, _: &[Box<dyn ErasedNode>], _: &EvalContext<'_>) -> Result<bool, Cancelled> {
        Ok(false)
    }
}
