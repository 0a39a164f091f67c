use crate::ir::block_flow::BlockFlow;
use crate::ir::constants::Constant;
use crate::ir::flow_graph::FlowGraph;
use crate::ir::instruction::Instruction;
use crate::ir::intrinsics::try_evaluate_arithmetic;
use crate::ir::optimizers::optimization::IntraproceduralOptimization;
use crate::ir::tags::ValueTag;
use crate::pass_log;

/// Evaluates arithmetic intrinsics whose arguments are all constants, and
/// turns switches on a constant into jumps.
pub struct ConstantFolding;

impl IntraproceduralOptimization for ConstantFolding {
    fn name(&self) -> &'static str {
        "constant-folding"
    }

    fn apply(&self, graph: FlowGraph) -> FlowGraph {
        let mut graph = graph;

        // Folding one instruction can make its users foldable, and users may
        // come before their arguments in block order
        loop {
            let mut folded = 0;
            let tags: Vec<ValueTag> = graph.instruction_tags().cloned().collect();
            for tag in tags {
                let instruction = graph.get_instruction(&tag).instruction().clone();
                if let Some(value) = fold(&graph, &instruction) {
                    let constant = Instruction::create_constant(value, instruction.result_type());
                    graph = graph.replace_instruction(&tag, constant).into_graph();
                    folded += 1;
                }
            }
            if folded == 0 {
                break;
            }
            pass_log!("Folded ", folded, " instruction(s)");
        }

        let switches: Vec<_> = graph
            .basic_blocks()
            .filter_map(|block| match block.flow() {
                BlockFlow::Switch(switch) => evaluate(&graph, &switch.switch_value)
                    .map(|value| (block.tag().clone(), switch.branch_for(&value).clone())),
                _ => None,
            })
            .collect();
        for (block, branch) in switches {
            graph = graph
                .update_basic_block_flow(&block, BlockFlow::jump(branch))
                .into_graph();
        }

        graph
    }
}

/// The constant `instruction` computes, if it is an arithmetic intrinsic over constants.
fn fold(graph: &FlowGraph, instruction: &Instruction) -> Option<Constant> {
    let intrinsic = instruction.as_intrinsic()?;
    let arguments = instruction
        .arguments()
        .iter()
        .map(|argument| constant_value(graph, argument))
        .collect::<Option<Vec<_>>>()?;
    try_evaluate_arithmetic(intrinsic, &arguments)
}

/// The constant an anonymous flow instruction computes.
fn evaluate(graph: &FlowGraph, instruction: &Instruction) -> Option<Constant> {
    if let Some(value) = instruction.as_constant() {
        return value.resolve_for(&instruction.result_type());
    }
    if let Some(source) = instruction.as_copy_source() {
        return constant_value(graph, source);
    }
    fold(graph, instruction)
}

/// The constant held by `tag`, looking through copies. `default` constants
/// resolve to the zero value of their type, or to `None` when the type has no
/// literal zero.
fn constant_value(graph: &FlowGraph, tag: &ValueTag) -> Option<Constant> {
    let mut current = tag.clone();
    for _ in 0..=graph.instruction_count() {
        let selected = graph.try_get_instruction(&current)?;
        let instruction = selected.instruction();
        if let Some(value) = instruction.as_constant() {
            return value.resolve_for(&instruction.result_type());
        }
        current = instruction.as_copy_source()?.clone();
    }
    None
}
