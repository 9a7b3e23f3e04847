//! Incremental computation graph
//!
//! Stages are added through typed handles and form a DAG in creation order.
//! [`IncrementalGraph::run`] pulls every stage an [`Output`] depends on,
//! recomputing only those whose inputs changed. Changes are detected by
//! structural equality, not identity: a stage that recomputes to an equal
//! value leaves its version untouched and nothing downstream runs again.
//!
//! ```
//! use stencil_forge::graph::{CancellationToken, IncrementalGraph};
//!
//! let mut graph = IncrementalGraph::new();
//! let words = graph.source::<String>();
//! let lengths = graph.map(words.values(), |w: &String| w.len());
//! let all = graph.collect(lengths);
//! let out = graph.output(all);
//!
//! graph.set_source(&words, vec!["a".to_string(), "abc".to_string()]);
//! graph.run(&CancellationToken::none()).unwrap();
//! assert_eq!(graph.take_output(&out), Some(vec![1, 3]));
//!
//! graph.run(&CancellationToken::none()).unwrap();
//! assert_eq!(graph.take_output(&out), None);
//! ```

mod cancel;
mod node;

pub use cancel::{CancellationToken, Cancelled};
pub use node::{Data, NodeId, NodeStats, StageKind};

use std::marker::PhantomData;
use std::sync::Arc;

use log::{debug, trace};

use node::{
    slot, CollectNode, CombineNode, ErasedNode, EvalContext, MapNode, OutputNode, SourceNode,
    StageFn,
};

/// Anything that names a node of a graph
pub trait Handle {
    fn node_id(&self) -> NodeId;
}

macro_rules! handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        pub struct $name<T> {
            id: NodeId,
            _marker: PhantomData<fn() -> T>,
        }

        impl<T> $name<T> {
            fn new(id: NodeId) -> Self {
                Self {
                    id,
                    _marker: PhantomData,
                }
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $name<T> {}

        impl<T> std::fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.id)
            }
        }

        impl<T> Handle for $name<T> {
            fn node_id(&self) -> NodeId {
                self.id
            }
        }
    };
}

handle!(
    /// A stage producing any number of values
    Values
);
handle!(
    /// A stage producing exactly one value
    Single
);
handle!(
    /// Externally supplied values
    Source
);
handle!(
    /// Externally supplied single value
    SingleSource
);
handle!(
    /// Terminal stage handing out changed values
    Output
);

impl<T> Source<T> {
    pub fn values(&self) -> Values<T> {
        Values::new(self.id)
    }
}

impl<T> SingleSource<T> {
    pub fn value(&self) -> Single<T> {
        Single::new(self.id)
    }
}

impl<T> Single<T> {
    /// View the single value as a one-element stream
    pub fn as_values(&self) -> Values<T> {
        Values::new(self.id)
    }
}

/// An output value not yet marked as taken
#[derive(Debug, Clone, PartialEq)]
pub struct Pending<T> {
    version: u64,
    pub value: T,
}

/// Work done by one [`IncrementalGraph::run`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Stages that recomputed
    pub evaluated: usize,
    /// Stages whose output changed
    pub changed: usize,
}

/// An explicit, cached, cancellable stage graph
#[derive(Default)]
pub struct IncrementalGraph {
    nodes: Vec<Box<dyn ErasedNode>>,
    parallel: bool,
    complete: bool,
}

impl IncrementalGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute independent elements of a stage on the rayon pool
    pub fn set_parallel(&mut self, parallel: bool) {
        self.parallel = parallel;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn push(&mut self, node: Box<dyn ErasedNode>) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn source<T: Data>(&mut self) -> Source<T> {
        Source::new(self.push(Box::new(SourceNode::<T>::new())))
    }

    pub fn single_source<T: Data>(&mut self, initial: T) -> SingleSource<T> {
        let mut node = SourceNode::<T>::new();
        node.set(vec![initial]);
        SingleSource::new(self.push(Box::new(node)))
    }

    /// Replace a source's values; returns whether they differ from the current ones
    pub fn set_source<T: Data>(&mut self, source: &Source<T>, values: Vec<T>) -> bool {
        self.set_node(source.id, values)
    }

    pub fn set_single<T: Data>(&mut self, source: &SingleSource<T>, value: T) -> bool {
        self.set_node(source.id, vec![value])
    }

    fn set_node<T: Data>(&mut self, id: NodeId, values: Vec<T>) -> bool {
        match self
            .nodes
            .get_mut(id)
            .and_then(|node| node.as_any_mut().downcast_mut::<SourceNode<T>>())
        {
            Some(node) => node.set(values),
            None => false,
        }
    }

    fn add_map<I: Data, O: Data>(&mut self, kind: StageKind, input: NodeId, func: StageFn<I, O>) -> NodeId {
        self.push(Box::new(MapNode::new(kind, input, func)))
    }

    /// Apply a pure function to every value
    pub fn map<I: Data, O: Data>(
        &mut self,
        input: Values<I>,
        f: impl Fn(&I) -> O + Send + Sync + 'static,
    ) -> Values<O> {
        let func: StageFn<I, O> = Arc::new(move |item, _| Ok(vec![f(item)]));
        Values::new(self.add_map(StageKind::Map, input.id, func))
    }

    /// Like [`map`](Self::map) for functions that poll cancellation themselves
    pub fn try_map<I: Data, O: Data>(
        &mut self,
        input: Values<I>,
        f: impl Fn(&I, &CancellationToken) -> Result<O, Cancelled> + Send + Sync + 'static,
    ) -> Values<O> {
        let func: StageFn<I, O> = Arc::new(move |item, cancel| Ok(vec![f(item, cancel)?]));
        Values::new(self.add_map(StageKind::Map, input.id, func))
    }

    /// Map every value to any number of values
    pub fn flat_map<I: Data, O: Data>(
        &mut self,
        input: Values<I>,
        f: impl Fn(&I) -> Vec<O> + Send + Sync + 'static,
    ) -> Values<O> {
        let func: StageFn<I, O> = Arc::new(move |item, _| Ok(f(item)));
        Values::new(self.add_map(StageKind::FlatMap, input.id, func))
    }

    /// Keep only the values matching a predicate
    pub fn filter<T: Data>(
        &mut self,
        input: Values<T>,
        predicate: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> Values<T> {
        let func: StageFn<T, T> = Arc::new(move |item, _| {
            Ok(if predicate(item) {
                vec![item.clone()]
            } else {
                Vec::new()
            })
        });
        Values::new(self.add_map(StageKind::Filter, input.id, func))
    }

    pub fn map_single<I: Data, O: Data>(
        &mut self,
        input: Single<I>,
        f: impl Fn(&I) -> O + Send + Sync + 'static,
    ) -> Single<O> {
        let func: StageFn<I, O> = Arc::new(move |item, _| Ok(vec![f(item)]));
        Single::new(self.add_map(StageKind::Map, input.id, func))
    }

    /// Pair every value with the latest single value of another stage
    pub fn combine<A: Data, B: Data>(&mut self, left: Values<A>, right: Single<B>) -> Values<(A, B)> {
        Values::new(self.push(Box::new(CombineNode::<A, B>::new(left.id, right.id))))
    }

    pub fn combine_single<A: Data, B: Data>(&mut self, left: Single<A>, right: Single<B>) -> Single<(A, B)> {
        Single::new(self.push(Box::new(CombineNode::<A, B>::new(left.id, right.id))))
    }

    /// Gather every value into one ordered vector
    pub fn collect<T: Data>(&mut self, input: Values<T>) -> Single<Vec<T>> {
        Single::new(self.push(Box::new(CollectNode::<T>::new(input.id))))
    }

    /// Union two collected vectors, left first
    pub fn concat<T: Data>(&mut self, left: Single<Vec<T>>, right: Single<Vec<T>>) -> Single<Vec<T>> {
        let pair = self.combine_single(left, right);
        self.map_single(pair, |(left, right): &(Vec<T>, Vec<T>)| {
            left.iter().chain(right.iter()).cloned().collect()
        })
    }

    /// Terminal stage; only stages reachable from an output are evaluated
    pub fn output<T: Data>(&mut self, input: Single<T>) -> Output<T> {
        Output::new(self.push(Box::new(OutputNode::<T>::new(input.id))))
    }

    /// Bring every stage an output depends on up to date
    ///
    /// On cancellation no stage commits a partial result and outputs cannot
    /// be taken until a later run completes.
    pub fn run(&mut self, cancel: &CancellationToken) -> Result<RunSummary, Cancelled> {
        self.complete = false;
        let demanded = self.demanded();
        let ctx = EvalContext {
            cancel,
            parallel: self.parallel,
        };

        let mut summary = RunSummary::default();
        for id in 0..self.nodes.len() {
            if !demanded[id] {
                continue;
            }
            cancel.check()?;
            let (upstream, rest) = self.nodes.split_at_mut(id);
            let node = &mut rest[0];
            let before = node.stats().evaluations;
            let changed = node.evaluate(upstream, &ctx)?;
            if node.stats().evaluations != before {
                summary.evaluated += 1;
                trace!("{:?} stage {} recomputed (changed: {})", node.kind(), id, changed);
            }
            if changed {
                summary.changed += 1;
            }
        }

        self.complete = true;
        debug!(
            "graph run: {} of {} stages recomputed, {} changed",
            summary.evaluated,
            self.nodes.len(),
            summary.changed
        );
        Ok(summary)
    }

    fn demanded(&self) -> Vec<bool> {
        let mut demanded = vec![false; self.nodes.len()];
        let mut stack: Vec<NodeId> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.kind() == StageKind::Output)
            .map(|(id, _)| id)
            .collect();
        while let Some(id) = stack.pop() {
            if demanded[id] {
                continue;
            }
            demanded[id] = true;
            stack.extend(self.nodes[id].inputs());
        }
        demanded
    }

    /// The output's value if it changed since it was last taken
    ///
    /// Returns `None` before the first complete run and after a cancelled one.
    pub fn take_output<T: Data>(&mut self, output: &Output<T>) -> Option<T> {
        let pending = self.pending_output(output)?;
        self.commit_output(output, &pending);
        Some(pending.value)
    }

    /// Like [`take_output`](Self::take_output) without marking the value as taken
    ///
    /// The value keeps being reported as pending until
    /// [`commit_output`](Self::commit_output) is called with it.
    pub fn pending_output<T: Data>(&self, output: &Output<T>) -> Option<Pending<T>> {
        if !self.complete {
            return None;
        }
        let node = self.nodes.get(output.id)?.as_any().downcast_ref::<OutputNode<T>>()?;
        let slot = slot::<T>(&self.nodes, node.input)?;
        if node.taken == Some(slot.version) {
            return None;
        }
        Some(Pending {
            version: slot.version,
            value: slot.values.first()?.clone(),
        })
    }

    /// Mark a pending value as taken
    pub fn commit_output<T: Data>(&mut self, output: &Output<T>, pending: &Pending<T>) {
        if let Some(node) = self
            .nodes
            .get_mut(output.id)
            .and_then(|node| node.as_any_mut().downcast_mut::<OutputNode<T>>())
        {
            node.record_take(pending.version);
        }
    }

    /// Current values of a stage, as of the last run
    pub fn peek<T: Data>(&self, values: &Values<T>) -> Option<Arc<Vec<T>>> {
        slot::<T>(&self.nodes, values.id).map(|slot| Arc::clone(&slot.values))
    }

    /// Current value of a single-valued stage, as of the last run
    pub fn get<T: Data>(&self, single: &Single<T>) -> Option<&T> {
        slot::<T>(&self.nodes, single.id).and_then(|slot| slot.values.first())
    }

    pub fn stats(&self, handle: &impl Handle) -> NodeStats {
        self.nodes
            .get(handle.node_id())
            .map(|node| node.stats())
            .unwrap_or_default()
    }
}
