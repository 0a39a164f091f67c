use crate::ir::analysis::analysis_cache::FlowGraphAnalysis;
use crate::ir::flow_graph::FlowGraph;
use crate::ir::flow_graph_update::FlowGraphUpdate;
use crate::ir::tags::BasicBlockTag;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// For every block, the set of blocks whose flow branches to it.
#[derive(Debug, Clone, Default)]
pub struct BasicBlockPredecessors {
    predecessors: FxHashMap<BasicBlockTag, FxHashSet<BasicBlockTag>>,
}

impl BasicBlockPredecessors {
    pub fn predecessors_of(&self, block: &BasicBlockTag) -> impl Iterator<Item = &BasicBlockTag> {
        self.predecessors.get(block).into_iter().flatten()
    }

    pub fn is_predecessor_of(&self, predecessor: &BasicBlockTag, block: &BasicBlockTag) -> bool {
        self.predecessors
            .get(block)
            .is_some_and(|preds| preds.contains(predecessor))
    }

    pub fn predecessor_count(&self, block: &BasicBlockTag) -> usize {
        self.predecessors.get(block).map_or(0, FxHashSet::len)
    }
}

pub struct PredecessorAnalysis;

impl FlowGraphAnalysis<BasicBlockPredecessors> for PredecessorAnalysis {
    fn analyze(&self, graph: &FlowGraph) -> BasicBlockPredecessors {
        let mut predecessors: FxHashMap<BasicBlockTag, FxHashSet<BasicBlockTag>> =
            FxHashMap::default();
        for block in graph.basic_blocks() {
            for target in block.flow().branch_targets() {
                predecessors
                    .entry(target)
                    .or_default()
                    .insert(block.tag().clone());
            }
        }
        BasicBlockPredecessors { predecessors }
    }

    fn analyze_with_updates(
        &self,
        graph: &FlowGraph,
        previous: Arc<BasicBlockPredecessors>,
        updates: &[FlowGraphUpdate],
    ) -> Arc<BasicBlockPredecessors> {
        if updates.iter().any(FlowGraphUpdate::changes_control_flow) {
            Arc::new(self.analyze(graph))
        } else {
            previous
        }
    }
}
