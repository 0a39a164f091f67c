use crate::ir::basic_block::BlockParameter;
use crate::ir::block_flow::BlockFlow;
use crate::ir::branch::Branch;
use crate::ir::builders::basic_block_builder::BasicBlockBuilder;
use crate::ir::builders::flow_graph_builder::FlowGraphBuilder;
use crate::ir::constants::Constant;
use crate::ir::flow_graph::FlowGraph;
use crate::ir::instruction::Instruction;
use crate::ir::intrinsics::{create_binary_arithmetic, operators};
use crate::ir::method_body::MethodBody;
use crate::ir::tags::ValueTag;
use crate::ir::types::{IrType, Parameter};
use rustc_hash::FxHashSet;

pub(crate) fn int32() -> IrType {
    IrType::int32()
}

pub(crate) fn append_int32(block: &BasicBlockBuilder, value: i32, name: &str) -> ValueTag {
    block
        .append_instruction(
            Instruction::create_constant(Constant::int32(value), int32()),
            name,
        )
        .tag()
        .clone()
}

pub(crate) fn return_copy_of(value: &ValueTag) -> BlockFlow {
    BlockFlow::return_value(Instruction::create_copy(int32(), value.clone()))
}

pub(crate) fn body_for(graph: FlowGraph) -> MethodBody {
    MethodBody::new(Parameter::new(int32(), "result"), None, Vec::new(), graph)
}

/// `entry(a, b): sum = a + b; return copy(sum)`
pub(crate) fn add_graph() -> FlowGraph {
    let builder = FlowGraphBuilder::new();
    let entry = builder.entry_point();
    let a = entry.append_parameter(BlockParameter::new(int32(), "a"));
    let b = entry.append_parameter(BlockParameter::new(int32(), "b"));
    let sum = entry.append_instruction(
        create_binary_arithmetic(operators::ADD, int32(), a, b),
        "sum",
    );
    entry.set_flow(return_copy_of(sum.tag()));
    builder.to_immutable()
}

/// ```text
/// entry(x):    is_negative = x < 0; if is_negative then negative else positive
/// negative:    negated = 0 - x; return copy(negated)
/// positive:    return copy(x)
/// ```
pub(crate) fn abs_graph() -> FlowGraph {
    let builder = FlowGraphBuilder::new();
    let entry = builder.entry_point();
    let x = entry.append_parameter(BlockParameter::new(int32(), "x"));
    let zero = append_int32(&entry, 0, "zero");
    let is_negative = entry.append_instruction(
        create_binary_arithmetic(operators::IS_LESS_THAN, int32(), x.clone(), zero.clone()),
        "is_negative",
    );

    let negative = builder.add_basic_block("negative");
    let negated = negative.append_instruction(
        create_binary_arithmetic(operators::SUBTRACT, int32(), zero, x.clone()),
        "negated",
    );
    negative.set_flow(return_copy_of(negated.tag()));

    let positive = builder.add_basic_block("positive");
    positive.set_flow(return_copy_of(&x));

    entry.set_flow(BlockFlow::if_else(
        Instruction::create_copy(IrType::Bool, is_negative.tag().clone()),
        Branch::to(negative.tag().clone()),
        Branch::to(positive.tag().clone()),
    ));
    builder.to_immutable()
}

/// Exactly one of "is an instruction" and "is a block parameter" holds for
/// every value of `graph`, and each value's parent block really defines it.
pub(crate) fn assert_values_unique(graph: &FlowGraph) {
    let mut seen = FxHashSet::default();
    for block in graph.basic_blocks() {
        for tag in block
            .parameter_tags()
            .iter()
            .chain(block.instruction_tags())
        {
            assert!(seen.insert(tag.clone()), "{tag} is defined twice");
            assert_eq!(graph.get_value_parent(tag).tag(), block.tag());
        }
    }

    let value_count = graph.value_tags().count();
    assert_eq!(seen.len(), value_count);
    for tag in graph.value_tags() {
        assert!(
            graph.contains_instruction(tag) != graph.contains_block_parameter(tag),
            "{tag} must be exactly one of instruction or parameter"
        );
    }
}
