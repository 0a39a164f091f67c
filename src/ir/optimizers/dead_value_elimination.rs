use crate::ir::analysis::effectful_instructions::EffectfulInstructions;
use crate::ir::branch::BranchArgument;
use crate::ir::flow_graph::FlowGraph;
use crate::ir::optimizers::optimization::IntraproceduralOptimization;
use crate::ir::tags::ValueTag;
use crate::pass_log;
use rustc_hash::{FxHashMap, FxHashSet};

/// Removes instructions and block parameters whose values can never be observed.
///
/// Roots are effectful instructions, entry block parameters and every value
/// read by a flow instruction. A live instruction keeps its arguments alive. A
/// live block parameter keeps alive every value passed to it.
/// Dead parameters are removed together with their branch arguments.
pub struct DeadValueElimination;

impl IntraproceduralOptimization for DeadValueElimination {
    fn name(&self) -> &'static str {
        "dead-value-elimination"
    }

    fn apply(&self, graph: FlowGraph) -> FlowGraph {
        let effectful = graph.get_analysis_result::<EffectfulInstructions>();

        let mut incoming: FxHashMap<ValueTag, Vec<ValueTag>> = FxHashMap::default();
        let mut worklist: Vec<ValueTag> = effectful.instructions.iter().cloned().collect();
        worklist.extend(graph.entry_point().parameter_tags());

        for block in graph.basic_blocks() {
            let flow = block.flow();
            for instruction in flow.instructions() {
                worklist.extend(instruction.arguments().iter().cloned());
            }
            for branch in flow.branches() {
                let parameters = graph.get_basic_block(&branch.target).parameter_tags();
                for (parameter, argument) in parameters.into_iter().zip(&branch.arguments) {
                    if let BranchArgument::Value(value) = argument {
                        incoming.entry(parameter).or_default().push(value.clone());
                    }
                }
            }
        }

        let mut live = FxHashSet::default();
        while let Some(value) = worklist.pop() {
            if !live.insert(value.clone()) {
                continue;
            }
            if let Some(selected) = graph.try_get_instruction(&value) {
                worklist.extend(selected.arguments().iter().cloned());
            } else if let Some(values) = incoming.get(&value) {
                worklist.extend(values.iter().cloned());
            }
        }

        let dead: Vec<ValueTag> = graph
            .value_tags()
            .filter(|tag| !live.contains(*tag))
            .cloned()
            .collect();
        if dead.is_empty() {
            return graph;
        }

        pass_log!("Removing ", dead.len(), " dead value(s)");
        graph.remove_definitions(&dead)
    }
}
