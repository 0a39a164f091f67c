use super::test_support::{add_graph, append_int32, assert_values_unique, int32, return_copy_of};
use crate::ir::basic_block::BlockParameter;
use crate::ir::block_flow::BlockFlow;
use crate::ir::builders::flow_graph_builder::FlowGraphBuilder;
use crate::ir::constants::Constant;
use crate::ir::flow_graph::FlowGraph;
use crate::ir::instruction::Instruction;
use crate::ir::selected_instruction::SelectedInstruction;
use rustc_hash::FxHashSet;

#[test]
fn append_and_insert_keep_execution_order() {
    let graph = FlowGraph::new();
    let first = graph.entry_point().append_instruction(
        Instruction::create_constant(Constant::int32(1), int32()),
        "first",
    );
    let last = first.block().append_instruction(
        Instruction::create_constant(Constant::int32(3), int32()),
        "last",
    );
    let middle = last.block().insert_instruction(
        1,
        Instruction::create_constant(Constant::int32(2), int32()),
        "middle",
    );

    let block = middle.block();
    assert_eq!(
        block.instruction_tags(),
        &[first.tag().clone(), middle.tag().clone(), last.tag().clone()]
    );
    assert_eq!(middle.instruction_index(), 1);

    let names: Vec<_> = block
        .named_instructions()
        .iter()
        .map(|selected| selected.tag().name().to_string())
        .collect();
    assert_eq!(names, vec!["first", "middle", "last"]);
}

#[test]
fn selected_instruction_navigates_its_block() {
    let builder = FlowGraphBuilder::new();
    let entry = builder.entry_point();
    let a = append_int32(&entry, 1, "a");
    let b = append_int32(&entry, 2, "b");

    let graph = builder.to_immutable();
    let first = graph.get_instruction(&a);
    assert!(first.previous_instruction().is_none());
    let second = first.next_instruction().expect("a is followed by b");
    assert_eq!(second.tag(), &b);
    assert!(second.next_instruction().is_none());
    assert_eq!(second.previous_instruction().map(|s| s.tag().clone()), Some(a));
}

#[test]
fn insert_before_and_after_a_selected_instruction() {
    let graph = FlowGraph::new();
    let anchor = graph.entry_point().append_instruction(
        Instruction::create_constant(Constant::int32(0), int32()),
        "anchor",
    );
    let before = anchor.insert_before(
        Instruction::create_constant(Constant::int32(-1), int32()),
        "before",
    );
    let anchor = before.graph().get_instruction(anchor.tag());
    let after = anchor.insert_after(
        Instruction::create_constant(Constant::int32(1), int32()),
        "after",
    );

    assert_eq!(
        after.block().instruction_tags(),
        &[before.tag().clone(), anchor.tag().clone(), after.tag().clone()]
    );
}

#[test]
fn remove_instruction_returns_the_block_in_a_new_graph() {
    let graph = add_graph();
    let entry = graph.entry_point();
    let sum = entry.instruction_tags()[0].clone();
    let without = entry.remove_instruction(&sum);

    assert!(without.instruction_tags().is_empty());
    assert!(!without.graph().contains_instruction(&sum));
    assert_eq!(entry.instruction_tags().len(), 1);
}

#[test]
#[should_panic(expected = "does not define instruction")]
fn remove_instruction_from_the_wrong_block_is_a_contract_violation() {
    let builder = FlowGraphBuilder::new();
    let other = builder.add_basic_block("other");
    let value = append_int32(&other, 1, "value");

    let graph = builder.to_immutable();
    let _ = graph.entry_point().remove_instruction(&value);
}

#[test]
fn parameters_can_be_appended_and_replaced() {
    let graph = FlowGraph::new();
    let block = graph
        .entry_point()
        .append_parameter(BlockParameter::new(int32(), "x"));
    let x = block.parameter_tags()[0].clone();
    assert!(block.graph().contains_block_parameter(&x));

    let y = BlockParameter::new(int32(), "y");
    let replaced = block.with_parameters(vec![y.clone()]);
    assert_eq!(replaced.parameter_tags(), vec![y.tag.clone()]);
    assert!(!replaced.graph().contains_value(&x));
    assert!(replaced.graph().contains_block_parameter(&y.tag));
    assert_values_unique(replaced.graph());
}

#[test]
fn copy_instructions_from_renames_and_substitutes_parameters() {
    let source_graph = add_graph();
    let source = source_graph.entry_point();
    let source_sum = source.instruction_tags()[0].clone();

    let builder = FlowGraphBuilder::new();
    let entry = builder.entry_point();
    let left = append_int32(&entry, 3, "left");
    let right = append_int32(&entry, 4, "right");
    entry.set_flow(return_copy_of(&left));

    let target = builder.to_immutable().entry_point();
    let (target, flow) = target.copy_instructions_from(2, &source, &[left.clone(), right.clone()]);

    let tags = target.instruction_tags();
    assert_eq!(tags.len(), 3);
    let spliced = &tags[2];
    assert_ne!(spliced, &source_sum);
    assert_eq!(spliced.name(), "sum");

    let graph = target.graph();
    assert_eq!(graph.get_instruction(spliced).arguments(), &[left, right]);
    // The returned flow reads the renamed value, the target's flow is unchanged
    assert_eq!(flow.values(), vec![spliced.clone()]);
    assert!(matches!(target.flow(), BlockFlow::Return(_)));
}

#[test]
fn spliced_tags_never_collide_with_existing_values() {
    let source_graph = add_graph();
    let source = source_graph.entry_point();

    let builder = FlowGraphBuilder::new();
    let entry = builder.entry_point();
    let a = append_int32(&entry, 1, "a");
    let b = append_int32(&entry, 2, "b");
    let mut block = builder.to_immutable().entry_point();

    let existing: FxHashSet<_> = block.graph().value_tags().cloned().collect();
    for _ in 0..3 {
        let index = block.instruction_tags().len();
        let (next, _) = block.copy_instructions_from(index, &source, &[a.clone(), b.clone()]);
        block = next;
    }

    assert_eq!(block.instruction_tags().len(), 5);
    let fresh: Vec<_> = block
        .instruction_tags()
        .iter()
        .filter(|tag| !existing.contains(*tag))
        .collect();
    assert_eq!(fresh.len(), 3);
    assert_values_unique(block.graph());
}

#[test]
#[should_panic(expected = "argument(s) were supplied")]
fn copy_instructions_from_checks_argument_count() {
    let source_graph = add_graph();
    let graph = FlowGraph::new();
    let _ = graph
        .entry_point()
        .copy_instructions_from(0, &source_graph.entry_point(), &[]);
}

#[test]
fn selected_instruction_knows_its_position() {
    let graph = add_graph();
    let entry = graph.entry_point();
    let sum = entry.instruction_tags()[0].clone();
    assert_eq!(graph.get_instruction(&sum).instruction_index(), 0);
}

#[test]
#[should_panic(expected = "is not listed in block")]
fn selected_instruction_outside_its_block_has_no_position() {
    let graph = add_graph();
    let sum = graph.entry_point().instruction_tags()[0].clone();
    let stranger = graph.add_basic_block("stranger");
    let stray = SelectedInstruction::new(
        stranger,
        sum,
        Instruction::create_constant(Constant::int32(1), int32()),
    );
    let _ = stray.instruction_index();
}
