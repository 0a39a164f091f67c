use super::test_support::{add_graph, append_int32, assert_values_unique, int32, return_copy_of};
use crate::ir::basic_block::BlockParameter;
use crate::ir::block_flow::BlockFlow;
use crate::ir::branch::{Branch, BranchArgument};
use crate::ir::builders::flow_graph_builder::FlowGraphBuilder;
use crate::ir::constants::Constant;
use crate::ir::flow_graph::FlowGraph;
use crate::ir::instruction::Instruction;
use crate::ir::ir_display::GraphSummary;
use crate::ir::tags::ValueTag;
use crate::ir::types::{IrType, MemberMapping};
use rustc_hash::FxHashMap;

#[test]
fn new_graph_has_a_single_empty_entry_block() {
    let graph = FlowGraph::new();

    assert_eq!(graph.block_count(), 1);
    let entry = graph.entry_point();
    assert!(entry.is_entry_point());
    assert!(entry.parameters().is_empty());
    assert!(entry.instruction_tags().is_empty());
    assert_eq!(*entry.flow(), BlockFlow::Unreachable);
    assert_eq!(entry.tag().name(), crate::settings::ENTRY_POINT_BLOCK_NAME);
}

#[test]
fn adding_a_block_leaves_the_original_graph_unchanged() {
    let graph = FlowGraph::new();
    let block = graph.add_basic_block("b1");
    let graph2 = block.graph();

    assert_eq!(graph2.block_count(), 2);
    assert_eq!(graph.block_count(), 1);
    assert!(graph2.contains_basic_block(block.tag()));
    assert!(!graph.contains_basic_block(block.tag()));
}

#[test]
fn constant_returned_from_entry_block() {
    let graph = FlowGraph::new();
    let constant = graph.entry_point().append_instruction(
        Instruction::create_constant(Constant::int32(42), int32()),
        "answer",
    );
    let tag = constant.tag().clone();
    let graph = constant
        .block()
        .with_flow(return_copy_of(&tag))
        .into_graph();

    assert_eq!(graph.instruction_count(), 1);
    let selected = graph.get_instruction(&tag);
    assert_eq!(selected.block().tag(), graph.entry_point_tag());
    assert_eq!(selected.instruction().as_constant(), Some(&Constant::int32(42)));
    assert_eq!(graph.get_value_type(&tag), int32());
}

#[test]
fn branches_zip_arguments_with_successor_parameters() {
    let builder = FlowGraphBuilder::new();
    let left = builder.add_basic_block("left");
    let right = builder.add_basic_block("right");
    let join = builder.add_basic_block("join");
    let p = join.append_parameter(BlockParameter::new(int32(), "p"));

    let ten = append_int32(&left, 10, "ten");
    let twenty = append_int32(&right, 20, "twenty");
    left.set_flow(BlockFlow::jump(Branch::with_values(join.tag().clone(), [ten.clone()])));
    right.set_flow(BlockFlow::jump(Branch::with_values(join.tag().clone(), [twenty.clone()])));

    let graph = builder.to_immutable();
    let left_flow = graph.get_basic_block(left.tag()).flow().clone();
    let right_flow = graph.get_basic_block(right.tag()).flow().clone();

    let left_args = left_flow.branches()[0].zip_arguments_with_parameters(&graph);
    let right_args = right_flow.branches()[0].zip_arguments_with_parameters(&graph);

    assert_eq!(left_args.len(), 1);
    assert_eq!(left_args[&p], BranchArgument::Value(ten));
    assert_eq!(right_args.len(), 1);
    assert_eq!(right_args[&p], BranchArgument::Value(twenty));
}

#[test]
fn values_are_defined_exactly_once() {
    let graph = add_graph();
    assert_values_unique(&graph);
    assert_eq!(graph.value_tags().count(), 3);
    assert_eq!(graph.instruction_count(), 1);
}

#[test]
fn edits_never_change_older_versions() {
    let graph = add_graph();
    let before = graph.to_string();
    let tags_before: Vec<_> = graph.basic_block_tags().cloned().collect();

    let entry = graph.entry_point();
    let sum = entry.instruction_tags()[0].clone();
    let _ = graph.remove_instruction(&sum);
    let _ = graph.add_basic_block("extra");
    let _ = entry.with_flow(BlockFlow::Unreachable);
    let _ = entry.append_parameter(BlockParameter::new(int32(), "late"));

    assert_eq!(graph.to_string(), before);
    assert_eq!(graph.basic_block_tags().cloned().collect::<Vec<_>>(), tags_before);
    assert!(graph.contains_instruction(&sum));
}

#[test]
fn builder_round_trip_is_structurally_equal() {
    let graph = add_graph();
    let round_tripped = graph.to_builder().to_immutable();
    assert!(graph.structurally_equals(&round_tripped));
}

#[test]
fn remove_basic_block_drops_its_values() {
    let builder = FlowGraphBuilder::new();
    let doomed = builder.add_basic_block("doomed");
    let parameter = doomed.append_parameter(BlockParameter::new(int32(), "p"));
    let value = append_int32(&doomed, 5, "five");

    let graph = builder.to_immutable();
    let removed = graph.remove_basic_block(doomed.tag());

    assert!(!removed.contains_basic_block(doomed.tag()));
    assert!(!removed.contains_value(&parameter));
    assert!(!removed.contains_value(&value));
    assert!(graph.contains_value(&value));
    assert_values_unique(&removed);
}

#[test]
#[should_panic(expected = "IR contract violation")]
fn removing_the_entry_block_is_a_contract_violation() {
    let graph = FlowGraph::new();
    let _ = graph.remove_basic_block(&graph.entry_point_tag().clone());
}

#[test]
#[should_panic(expected = "already defined")]
fn inserting_a_duplicate_tag_is_a_contract_violation() {
    let graph = FlowGraph::new();
    let first = graph.entry_point().append_instruction(
        Instruction::create_constant(Constant::int32(1), int32()),
        "one",
    );
    let tag = first.tag().clone();
    let _ = first.block().append_instruction(
        Instruction::create_constant(Constant::int32(2), int32()),
        tag,
    );
}

#[test]
#[should_panic(expected = "no instruction")]
fn missing_instruction_lookup_is_a_contract_violation() {
    let graph = FlowGraph::new();
    let _ = graph.get_instruction(&ValueTag::new("ghost"));
}

#[test]
fn try_get_instruction_returns_none_for_unknown_tags() {
    let graph = add_graph();
    assert!(graph.try_get_instruction(&ValueTag::new("ghost")).is_none());
    let sum = graph.entry_point().instruction_tags()[0].clone();
    assert!(graph.try_get_instruction(&sum).is_some());
}

#[test]
fn with_entry_point_switches_the_entry() {
    let graph = FlowGraph::new();
    let block = graph.add_basic_block("start");
    let graph = block.graph().with_entry_point(block.tag());

    assert_eq!(graph.entry_point_tag(), block.tag());
    assert!(graph.get_basic_block(block.tag()).is_entry_point());
}

#[test]
fn replace_uses_rewrites_instructions_and_flows() {
    let builder = FlowGraphBuilder::new();
    let entry = builder.entry_point();
    let one = append_int32(&entry, 1, "one");
    let two = append_int32(&entry, 2, "two");
    let copy = entry.append_instruction(Instruction::create_copy(int32(), one.clone()), "copy");
    entry.set_flow(return_copy_of(&one));

    let graph = builder.to_immutable();
    let replacements: FxHashMap<ValueTag, ValueTag> = [(one.clone(), two.clone())].into_iter().collect();
    let replaced = graph.replace_uses(&replacements);

    assert_eq!(replaced.get_instruction(copy.tag()).arguments(), &[two.clone()]);
    assert_eq!(replaced.entry_point().flow().values(), vec![two.clone()]);
    assert_eq!(graph.get_instruction(copy.tag()).arguments(), &[one.clone()]);
    // Definitions are untouched, only uses move
    assert!(replaced.contains_instruction(&one));
}

#[test]
fn remove_definitions_drops_the_zipped_branch_argument() {
    let builder = FlowGraphBuilder::new();
    let entry = builder.entry_point();
    let join = builder.add_basic_block("join");
    let first = join.append_parameter(BlockParameter::new(int32(), "first"));
    let second = join.append_parameter(BlockParameter::new(int32(), "second"));
    let a = append_int32(&entry, 1, "a");
    let b = append_int32(&entry, 2, "b");
    entry.set_flow(BlockFlow::jump(Branch::with_values(
        join.tag().clone(),
        [a.clone(), b.clone()],
    )));
    join.set_flow(return_copy_of(&second));

    let graph = builder.to_immutable().remove_definitions([&first]);

    let entry_flow = graph.entry_point().flow().clone();
    let branch = entry_flow.branches()[0].clone();
    assert_eq!(branch.arguments, vec![BranchArgument::Value(b)]);
    assert_eq!(graph.get_basic_block(join.tag()).parameter_tags(), vec![second]);
    assert!(!graph.contains_value(&first));
    assert_values_unique(&graph);
}

#[test]
fn remove_definitions_handles_parameters_and_instructions_together() {
    let builder = FlowGraphBuilder::new();
    let entry = builder.entry_point();
    let next = builder.add_basic_block("next");
    let parameter = next.append_parameter(BlockParameter::new(int32(), "p"));
    let a = append_int32(&entry, 1, "a");
    let unused = append_int32(&entry, 2, "unused");
    entry.set_flow(BlockFlow::jump(Branch::with_values(next.tag().clone(), [a.clone()])));

    let graph = builder.to_immutable().remove_definitions([&parameter, &unused]);

    assert!(!graph.contains_value(&parameter));
    assert!(!graph.contains_value(&unused));
    assert!(graph.contains_value(&a));
    assert!(graph.entry_point().flow().branches()[0].arguments.is_empty());
}

#[test]
fn remove_definitions_truncates_branches_with_too_many_arguments() {
    let builder = FlowGraphBuilder::new();
    let entry = builder.entry_point();
    let join = builder.add_basic_block("join");
    let first = join.append_parameter(BlockParameter::new(int32(), "first"));
    let second = join.append_parameter(BlockParameter::new(int32(), "second"));
    join.set_flow(return_copy_of(&second));
    let a = append_int32(&entry, 1, "a");
    let b = append_int32(&entry, 2, "b");
    let extra = append_int32(&entry, 3, "extra");
    entry.set_flow(BlockFlow::jump(Branch::with_values(
        join.tag().clone(),
        [a, b.clone(), extra],
    )));

    let graph = builder.to_immutable().remove_definitions([&first]);

    let branch = graph.entry_point().flow().branches()[0].clone();
    assert_eq!(branch.arguments, vec![BranchArgument::Value(b)]);
    assert_eq!(graph.get_basic_block(join.tag()).parameter_tags(), vec![second]);
}

#[test]
fn remove_definitions_keeps_what_a_short_branch_can_pass() {
    let builder = FlowGraphBuilder::new();
    let entry = builder.entry_point();
    let join = builder.add_basic_block("join");
    let first = join.append_parameter(BlockParameter::new(int32(), "first"));
    let second = join.append_parameter(BlockParameter::new(int32(), "second"));
    let third = join.append_parameter(BlockParameter::new(int32(), "third"));
    join.set_flow(return_copy_of(&third));
    let a = append_int32(&entry, 1, "a");
    let b = append_int32(&entry, 2, "b");
    entry.set_flow(BlockFlow::jump(Branch::with_values(
        join.tag().clone(),
        [a.clone(), b],
    )));

    let graph = builder.to_immutable().remove_definitions([&second]);

    let branch = graph.entry_point().flow().branches()[0].clone();
    assert_eq!(branch.arguments, vec![BranchArgument::Value(a)]);
    assert_eq!(
        graph.get_basic_block(join.tag()).parameter_tags(),
        vec![first, third]
    );
}

#[test]
#[should_panic(expected = "use remove_definitions")]
fn remove_instruction_definitions_rejects_parameters() {
    let graph = add_graph();
    let parameter = graph.entry_point().parameter_tags()[0].clone();
    let _ = graph.remove_instruction_definitions([&parameter]);
}

#[test]
fn map_substitutes_types_everywhere() {
    let generic = IrType::GenericParameter("T".into());
    let builder = FlowGraphBuilder::new();
    let entry = builder.entry_point();
    let parameter = entry.append_parameter(BlockParameter::new(generic.clone(), "value"));
    let copy = entry.append_instruction(Instruction::create_copy(generic.clone(), parameter.clone()), "copy");
    entry.set_flow(BlockFlow::return_value(Instruction::create_copy(
        generic.clone(),
        copy.tag().clone(),
    )));

    let substitution: FxHashMap<IrType, IrType> = [(generic, int32())].into_iter().collect();
    let mapped = builder
        .to_immutable()
        .map(&MemberMapping::from_type_substitution(substitution));

    assert_eq!(mapped.get_value_type(&parameter), int32());
    assert_eq!(mapped.get_value_type(copy.tag()), int32());
    assert_eq!(mapped.entry_point().flow().instructions()[0].result_type(), int32());
}

#[test]
fn display_and_summary_list_every_block() {
    let graph = add_graph();
    let text = graph.to_string();
    assert!(text.contains("arith.add"));
    assert!(text.contains("return copy"));

    let json = GraphSummary::of(&graph).to_json().expect("summary should serialize");
    let value: serde_json::Value = serde_json::from_str(&json).expect("summary should be valid JSON");
    assert_eq!(value["block_count"], 1);
    assert_eq!(value["instruction_count"], 1);
    assert_eq!(value["blocks"][0]["parameters"].as_array().map(Vec::len), Some(2));
}
