use crate::ir::analysis::analysis_cache::FlowGraphAnalysis;
use crate::ir::flow_graph::FlowGraph;
use crate::ir::flow_graph_update::FlowGraphUpdate;
use crate::ir::tags::BasicBlockTag;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::{Arc, OnceLock};

/// Which blocks can reach which, through at least one branch.
///
/// Only the successor lists are built up front. The set of blocks reachable
/// from a given source is computed the first time that source is queried.
#[derive(Debug, Clone, Default)]
pub struct BlockReachability {
    successors: FxHashMap<BasicBlockTag, Vec<BasicBlockTag>>,
    strictly_reachable: FxHashMap<BasicBlockTag, OnceLock<FxHashSet<BasicBlockTag>>>,
}

impl BlockReachability {
    fn from_successors(successors: FxHashMap<BasicBlockTag, Vec<BasicBlockTag>>) -> Self {
        let strictly_reachable = successors
            .keys()
            .map(|tag| (tag.clone(), OnceLock::new()))
            .collect();
        BlockReachability {
            successors,
            strictly_reachable,
        }
    }

    fn closure(&self, source: &BasicBlockTag) -> Option<&FxHashSet<BasicBlockTag>> {
        let cell = self.strictly_reachable.get(source)?;
        Some(cell.get_or_init(|| {
            let mut reachable = FxHashSet::default();
            let mut worklist: Vec<&BasicBlockTag> =
                self.successors.get(source).into_iter().flatten().collect();
            while let Some(block) = worklist.pop() {
                if reachable.insert(block.clone()) {
                    if let Some(next) = self.successors.get(block) {
                        worklist.extend(next);
                    }
                }
            }
            reachable
        }))
    }

    /// True if `target` can be reached from `source` by taking one or more branches.
    pub fn is_strictly_reachable_from(&self, source: &BasicBlockTag, target: &BasicBlockTag) -> bool {
        self.closure(source)
            .is_some_and(|reachable| reachable.contains(target))
    }

    pub fn is_reachable_from(&self, source: &BasicBlockTag, target: &BasicBlockTag) -> bool {
        source == target || self.is_strictly_reachable_from(source, target)
    }

    pub fn strictly_reachable_blocks(&self, source: &BasicBlockTag) -> impl Iterator<Item = &BasicBlockTag> {
        self.closure(source).into_iter().flatten()
    }
}

pub struct BlockReachabilityAnalysis;

impl FlowGraphAnalysis<BlockReachability> for BlockReachabilityAnalysis {
    fn analyze(&self, graph: &FlowGraph) -> BlockReachability {
        let successors = graph
            .basic_blocks()
            .map(|block| (block.tag().clone(), block.flow().branch_targets()))
            .collect();
        BlockReachability::from_successors(successors)
    }

    /// Re-reads the successors of blocks whose flow changed, were added or
    /// were removed. Every cached closure is dropped.
    fn analyze_with_updates(
        &self,
        graph: &FlowGraph,
        previous: Arc<BlockReachability>,
        updates: &[FlowGraphUpdate],
    ) -> Arc<BlockReachability> {
        if !updates.iter().any(FlowGraphUpdate::changes_control_flow) {
            return previous;
        }

        let mut successors = previous.successors.clone();
        for update in updates {
            let tag = match update {
                FlowGraphUpdate::AddBasicBlock(tag)
                | FlowGraphUpdate::RemoveBasicBlock(tag)
                | FlowGraphUpdate::BasicBlockFlow(tag) => tag,
                _ => continue,
            };
            match graph.try_get_basic_block(tag) {
                Some(block) => {
                    successors.insert(tag.clone(), block.flow().branch_targets());
                }
                None => {
                    successors.remove(tag);
                }
            }
        }
        Arc::new(BlockReachability::from_successors(successors))
    }
}
