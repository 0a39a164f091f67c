//! ============================================================
//!                      Analysis Cache
//! ============================================================
//! Each flow graph carries a registry of analyses keyed by the type of the
//! result they produce. Results are computed lazily, memoized on the graph
//! version that asked for them, and shared by every clone of that version.
//!
//! When a graph is edited, every slot of the new graph links back to the
//! slot it was derived from together with the update that separates them.
//! The first request on the new graph walks that chain back to the newest
//! ancestor that already has a result and hands the analysis the collected
//! updates, oldest first, so it can patch instead of starting over.
//!
//! Locks are only ever taken from newer slots toward older ones.

use crate::analysis_log;
use crate::ir::flow_graph::FlowGraph;
use crate::ir::flow_graph_update::FlowGraphUpdate;
use crate::settings::MAX_ANALYSIS_UPDATE_CHAIN;
use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};
use std::sync::{Arc, Mutex, MutexGuard};

/// Computes a result of type `T` for a flow graph.
pub trait FlowGraphAnalysis<T>: Send + Sync + 'static {
    fn analyze(&self, graph: &FlowGraph) -> T;

    /// Produces the result for `graph` from the result for an older version of
    /// it and the updates that separate the two. Return `previous` unchanged
    /// when the updates cannot affect the result.
    fn analyze_with_updates(
        &self,
        graph: &FlowGraph,
        previous: Arc<T>,
        updates: &[FlowGraphUpdate],
    ) -> Arc<T> {
        let _ = (previous, updates);
        Arc::new(self.analyze(graph))
    }
}

/// An analysis that always produces the same value.
pub struct ConstantAnalysis<T>(pub T);

impl<T: Clone + Send + Sync + 'static> FlowGraphAnalysis<T> for ConstantAnalysis<T> {
    fn analyze(&self, _graph: &FlowGraph) -> T {
        self.0.clone()
    }

    fn analyze_with_updates(
        &self,
        _graph: &FlowGraph,
        previous: Arc<T>,
        _updates: &[FlowGraphUpdate],
    ) -> Arc<T> {
        previous
    }
}

struct SlotState<T> {
    result: Option<Arc<T>>,
    parent: Option<(Arc<AnalysisSlot<T>>, FlowGraphUpdate)>,
    chain_length: usize,
}

struct AnalysisSlot<T> {
    analysis: Arc<dyn FlowGraphAnalysis<T>>,
    state: Mutex<SlotState<T>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl<T: Send + Sync + 'static> AnalysisSlot<T> {
    fn fresh(analysis: Arc<dyn FlowGraphAnalysis<T>>) -> Self {
        AnalysisSlot {
            analysis,
            state: Mutex::new(SlotState {
                result: None,
                parent: None,
                chain_length: 0,
            }),
        }
    }

    fn result(&self, graph: &FlowGraph) -> Arc<T> {
        let mut state = lock(&self.state);
        if let Some(result) = &state.result {
            return Arc::clone(result);
        }

        let mut updates = Vec::new();
        let mut previous = None;
        let mut cursor = state.parent.clone();
        while let Some((slot, update)) = cursor {
            updates.push(update);
            let ancestor = lock(&slot.state);
            if let Some(result) = &ancestor.result {
                previous = Some(Arc::clone(result));
                break;
            }
            cursor = ancestor.parent.clone();
        }

        let result = match previous {
            Some(previous) => {
                updates.reverse();
                analysis_log!("Patching ", std::any::type_name::<T>());
                self.analysis.analyze_with_updates(graph, previous, &updates)
            }
            None => {
                analysis_log!("Computing ", std::any::type_name::<T>());
                Arc::new(self.analysis.analyze(graph))
            }
        };

        state.result = Some(Arc::clone(&result));
        state.parent = None;
        state.chain_length = 0;
        result
    }
}

trait ErasedSlot: Send + Sync {
    fn derive(self: Arc<Self>, update: &FlowGraphUpdate) -> Arc<dyn ErasedSlot>;
    fn as_any(&self) -> &dyn Any;
}

impl<T: Send + Sync + 'static> ErasedSlot for AnalysisSlot<T> {
    fn derive(self: Arc<Self>, update: &FlowGraphUpdate) -> Arc<dyn ErasedSlot> {
        let chain_length = {
            let state = lock(&self.state);
            if state.result.is_some() { 1 } else { state.chain_length + 1 }
        };

        // Past a certain length, recomputing is cheaper than replaying
        let parent = (chain_length <= MAX_ANALYSIS_UPDATE_CHAIN)
            .then(|| (Arc::clone(&self), update.clone()));

        Arc::new(AnalysisSlot {
            analysis: Arc::clone(&self.analysis),
            state: Mutex::new(SlotState {
                result: None,
                chain_length: if parent.is_some() { chain_length } else { 0 },
                parent,
            }),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The set of analyses registered on one graph version.
#[derive(Clone, Default)]
pub struct AnalysisCache {
    slots: Arc<FxHashMap<TypeId, Arc<dyn ErasedSlot>>>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `analysis`, replacing any analysis for the same result type.
    pub fn with_analysis<T: Send + Sync + 'static>(
        &self,
        analysis: Arc<dyn FlowGraphAnalysis<T>>,
    ) -> AnalysisCache {
        let mut slots = (*self.slots).clone();
        slots.insert(
            TypeId::of::<T>(),
            Arc::new(AnalysisSlot::fresh(analysis)) as Arc<dyn ErasedSlot>,
        );
        AnalysisCache {
            slots: Arc::new(slots),
        }
    }

    /// The cache for the graph version produced by `update`.
    pub fn update(&self, update: &FlowGraphUpdate) -> AnalysisCache {
        if self.slots.is_empty() {
            return self.clone();
        }
        let slots = self
            .slots
            .iter()
            .map(|(key, slot)| (*key, Arc::clone(slot).derive(update)))
            .collect();
        AnalysisCache {
            slots: Arc::new(slots),
        }
    }

    fn slot<T: Send + Sync + 'static>(&self) -> Option<&AnalysisSlot<T>> {
        self.slots
            .get(&TypeId::of::<T>())
            .and_then(|slot| slot.as_any().downcast_ref::<AnalysisSlot<T>>())
    }

    pub fn has_analysis_for<T: Send + Sync + 'static>(&self) -> bool {
        self.slots.contains_key(&TypeId::of::<T>())
    }

    pub fn get_analysis_for<T: Send + Sync + 'static>(&self) -> Option<Arc<dyn FlowGraphAnalysis<T>>> {
        self.slot::<T>().map(|slot| Arc::clone(&slot.analysis))
    }

    pub fn get_result<T: Send + Sync + 'static>(&self, graph: &FlowGraph) -> Option<Arc<T>> {
        self.slot::<T>().map(|slot| slot.result(graph))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
