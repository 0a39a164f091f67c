use crate::ir::analysis::block_reachability::BlockReachability;
use crate::ir::flow_graph::FlowGraph;
use crate::ir::optimizers::optimization::IntraproceduralOptimization;
use crate::ir::tags::BasicBlockTag;
use crate::pass_log;

/// Removes blocks that cannot be reached from the entry point.
pub struct DeadBlockElimination;

impl IntraproceduralOptimization for DeadBlockElimination {
    fn name(&self) -> &'static str {
        "dead-block-elimination"
    }

    fn apply(&self, graph: FlowGraph) -> FlowGraph {
        let reachability = graph.get_analysis_result::<BlockReachability>();
        let entry = graph.entry_point_tag().clone();

        let dead: Vec<BasicBlockTag> = graph
            .basic_block_tags()
            .filter(|tag| !reachability.is_reachable_from(&entry, tag))
            .cloned()
            .collect();
        if dead.is_empty() {
            return graph;
        }

        pass_log!("Removing ", dead.len(), " unreachable block(s)");
        dead.iter()
            .fold(graph, |graph, tag| graph.remove_basic_block(tag))
    }
}
