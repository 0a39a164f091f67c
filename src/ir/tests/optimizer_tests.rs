use super::test_support::{abs_graph, append_int32, body_for, int32, return_copy_of};
use crate::ir::basic_block::BlockParameter;
use crate::ir::block_flow::{BlockFlow, SwitchCase};
use crate::ir::branch::Branch;
use crate::ir::builders::flow_graph_builder::FlowGraphBuilder;
use crate::ir::constants::Constant;
use crate::ir::flow_graph::FlowGraph;
use crate::ir::instruction::Instruction;
use crate::ir::intrinsics::{create_binary_arithmetic, operators};
use crate::ir::ir_messages::ir_errors::{ErrorMetaDataKey, ErrorType};
use crate::ir::method_body::{BodyMethod, MethodBody};
use crate::ir::optimizers::{
    ConstantFolding, CopyPropagation, DeadBlockElimination, DeadValueElimination,
    IntraproceduralOptimization, PassPipeline, known_passes, pass_by_name,
};
use crate::ir::tags::BasicBlockTag;
use crate::ir::types::IrType;
use crate::settings::{DEFAULT_PIPELINE, PipelineConfig};
use std::sync::Arc;

/// ```text
/// entry: five = 5; zero = 0; is_negative = five < zero
///        if is_negative then negative else positive
/// negative: return copy(zero)
/// positive: return copy(five)
/// ```
fn foldable_branch() -> FlowGraph {
    let builder = FlowGraphBuilder::new();
    let entry = builder.entry_point();
    let five = append_int32(&entry, 5, "five");
    let zero = append_int32(&entry, 0, "zero");
    let is_negative = entry.append_instruction(
        create_binary_arithmetic(operators::IS_LESS_THAN, int32(), five.clone(), zero.clone()),
        "is_negative",
    );
    let negative = builder.add_basic_block("negative");
    negative.set_flow(return_copy_of(&zero));
    let positive = builder.add_basic_block("positive");
    positive.set_flow(return_copy_of(&five));
    entry.set_flow(BlockFlow::if_else(
        Instruction::create_copy(IrType::Bool, is_negative.tag().clone()),
        Branch::to(negative.tag().clone()),
        Branch::to(positive.tag().clone()),
    ));
    builder.to_immutable()
}

/// Removes the first instruction it finds, even if something still uses it.
struct CarelessRemoval;

impl IntraproceduralOptimization for CarelessRemoval {
    fn name(&self) -> &'static str {
        "careless-removal"
    }

    fn apply(&self, graph: FlowGraph) -> FlowGraph {
        let first = graph.instruction_tags().next().cloned();
        match first {
            Some(tag) => graph.remove_instruction(&tag),
            None => graph,
        }
    }
}

struct Method {
    name: &'static str,
    body: Option<MethodBody>,
}

impl BodyMethod for Method {
    fn name(&self) -> &str {
        self.name
    }

    fn body(&self) -> Option<&MethodBody> {
        self.body.as_ref()
    }
}

#[test]
fn copy_propagation_resolves_copy_chains() {
    let builder = FlowGraphBuilder::new();
    let entry = builder.entry_point();
    let source = append_int32(&entry, 1, "source");
    let first = entry.append_instruction(Instruction::create_copy(int32(), source.clone()), "first");
    let second = entry.append_instruction(
        Instruction::create_copy(int32(), first.tag().clone()),
        "second",
    );
    let sum = entry.append_instruction(
        create_binary_arithmetic(operators::ADD, int32(), second.tag().clone(), first.tag().clone()),
        "sum",
    );
    entry.set_flow(return_copy_of(second.tag()));

    let graph = builder.to_immutable().transform(&CopyPropagation);

    assert_eq!(graph.get_instruction(sum.tag()).arguments(), &[source.clone(), source.clone()]);
    assert_eq!(graph.entry_point().flow().values(), vec![source]);
    // The copies are left for dead value elimination
    assert!(graph.contains_instruction(first.tag()));
    assert!(graph.contains_instruction(second.tag()));
}

#[test]
fn copy_propagation_replaces_parameters_with_one_incoming_value() {
    let builder = FlowGraphBuilder::new();
    let entry = builder.entry_point();
    let x = entry.append_parameter(BlockParameter::new(int32(), "x"));
    let flag = entry.append_instruction(
        Instruction::create_constant(Constant::Bool(true), IrType::Bool),
        "flag",
    );
    let join = builder.add_basic_block("join");
    let merged = join.append_parameter(BlockParameter::new(int32(), "merged"));
    join.set_flow(return_copy_of(&merged));
    entry.set_flow(BlockFlow::if_else(
        Instruction::create_copy(IrType::Bool, flag.tag().clone()),
        Branch::with_values(join.tag().clone(), [x.clone()]),
        Branch::with_values(join.tag().clone(), [x.clone()]),
    ));

    let graph = builder.to_immutable().transform(&CopyPropagation);
    assert_eq!(graph.get_basic_block(join.tag()).flow().values(), vec![x]);
}

#[test]
fn copy_propagation_keeps_parameters_with_different_incoming_values() {
    let builder = FlowGraphBuilder::new();
    let entry = builder.entry_point();
    let one = append_int32(&entry, 1, "one");
    let two = append_int32(&entry, 2, "two");
    let join = builder.add_basic_block("join");
    let merged = join.append_parameter(BlockParameter::new(int32(), "merged"));
    join.set_flow(return_copy_of(&merged));
    let flag = entry.append_instruction(
        Instruction::create_constant(Constant::Bool(false), IrType::Bool),
        "flag",
    );
    entry.set_flow(BlockFlow::if_else(
        Instruction::create_copy(IrType::Bool, flag.tag().clone()),
        Branch::with_values(join.tag().clone(), [one]),
        Branch::with_values(join.tag().clone(), [two]),
    ));

    let graph = builder.to_immutable().transform(&CopyPropagation);
    assert_eq!(graph.get_basic_block(join.tag()).flow().values(), vec![merged]);
}

#[test]
fn constant_folding_evaluates_chains_of_arithmetic() {
    let builder = FlowGraphBuilder::new();
    let entry = builder.entry_point();
    let two = append_int32(&entry, 2, "two");
    let three = append_int32(&entry, 3, "three");
    let sum = entry.append_instruction(
        create_binary_arithmetic(operators::ADD, int32(), two.clone(), three),
        "sum",
    );
    let copied = entry.append_instruction(Instruction::create_copy(int32(), sum.tag().clone()), "copied");
    let product = entry.append_instruction(
        create_binary_arithmetic(operators::MULTIPLY, int32(), copied.tag().clone(), two),
        "product",
    );
    entry.set_flow(return_copy_of(product.tag()));

    let graph = builder.to_immutable().transform(&ConstantFolding);
    assert_eq!(
        graph.get_instruction(sum.tag()).instruction().as_constant(),
        Some(&Constant::int32(5))
    );
    assert_eq!(
        graph.get_instruction(product.tag()).instruction().as_constant(),
        Some(&Constant::int32(10))
    );
}

#[test]
fn constant_folding_leaves_division_by_zero_alone() {
    let builder = FlowGraphBuilder::new();
    let entry = builder.entry_point();
    let one = append_int32(&entry, 1, "one");
    let zero = append_int32(&entry, 0, "zero");
    let quotient = entry.append_instruction(
        create_binary_arithmetic(operators::DIVIDE, int32(), one, zero),
        "quotient",
    );

    let graph = builder.to_immutable().transform(&ConstantFolding);
    assert!(graph.get_instruction(quotient.tag()).instruction().as_intrinsic().is_some());
}

#[test]
fn constant_folding_turns_constant_switches_into_jumps() {
    let graph = foldable_branch();
    let positive = graph
        .basic_blocks()
        .find(|block| block.tag().name() == "positive")
        .expect("positive block exists");

    let folded = graph.transform(&ConstantFolding);
    let BlockFlow::Jump(jump) = folded.entry_point().flow().clone() else {
        panic!("switch on a constant should become a jump");
    };
    assert_eq!(jump.target, *positive.tag());
}

/// `entry: flag = <constant of type flag_type>; if copy(flag) then if_true else if_false`
fn branch_on_constant(value: Constant, flag_type: IrType) -> (FlowGraph, BlockFlow) {
    let builder = FlowGraphBuilder::new();
    let entry = builder.entry_point();
    let flag = entry.append_instruction(Instruction::create_constant(value, flag_type.clone()), "flag");
    let if_true = builder.add_basic_block("if_true");
    if_true.set_flow(BlockFlow::Unreachable);
    let if_false = builder.add_basic_block("if_false");
    if_false.set_flow(BlockFlow::Unreachable);
    entry.set_flow(BlockFlow::if_else(
        Instruction::create_copy(flag_type, flag.tag().clone()),
        Branch::to(if_true.tag().clone()),
        Branch::to(if_false.tag().clone()),
    ));
    let graph = builder.to_immutable();
    let folded = graph.transform(&ConstantFolding).entry_point().flow().clone();
    (graph, folded)
}

fn block_named(graph: &FlowGraph, name: &str) -> BasicBlockTag {
    graph
        .basic_block_tags()
        .find(|tag| tag.name() == name)
        .cloned()
        .expect("block exists")
}

#[test]
fn constant_folding_treats_a_default_bool_as_false() {
    let (graph, folded) = branch_on_constant(Constant::Default, IrType::Bool);
    let BlockFlow::Jump(jump) = folded else {
        panic!("switch on a default constant should become a jump");
    };
    assert_eq!(jump.target, block_named(&graph, "if_false"));
}

#[test]
fn constant_folding_matches_default_integers_against_zero_cases() {
    let builder = FlowGraphBuilder::new();
    let entry = builder.entry_point();
    let selector = entry.append_instruction(Instruction::create_constant(Constant::Default, int32()), "selector");
    let zero_case = builder.add_basic_block("zero_case");
    let other = builder.add_basic_block("other");
    entry.set_flow(BlockFlow::switch(
        Instruction::create_copy(int32(), selector.tag().clone()),
        vec![SwitchCase {
            values: vec![Constant::int32(0)],
            branch: Branch::to(zero_case.tag().clone()),
        }],
        Branch::to(other.tag().clone()),
    ));

    let graph = builder.to_immutable().transform(&ConstantFolding);
    let BlockFlow::Jump(jump) = graph.entry_point().flow().clone() else {
        panic!("switch on a default constant should become a jump");
    };
    assert_eq!(jump.target, *zero_case.tag());
}

#[test]
fn constant_folding_leaves_defaults_without_a_literal_zero() {
    let (_, folded) = branch_on_constant(Constant::Default, IrType::named("Point"));
    assert!(matches!(folded, BlockFlow::Switch(_)));
}

#[test]
fn constant_folding_evaluates_arithmetic_over_defaults() {
    let builder = FlowGraphBuilder::new();
    let entry = builder.entry_point();
    let zero = entry.append_instruction(Instruction::create_constant(Constant::Default, int32()), "zero");
    let seven = append_int32(&entry, 7, "seven");
    let sum = entry.append_instruction(
        create_binary_arithmetic(operators::ADD, int32(), zero.tag().clone(), seven),
        "sum",
    );

    let graph = builder.to_immutable().transform(&ConstantFolding);
    assert_eq!(
        graph.get_instruction(sum.tag()).instruction().as_constant(),
        Some(&Constant::int32(7))
    );
}

#[test]
fn dead_value_elimination_keeps_effects_and_flow_inputs() {
    let builder = FlowGraphBuilder::new();
    let entry = builder.entry_point();
    let x = entry.append_parameter(BlockParameter::new(int32(), "x"));
    let unused = append_int32(&entry, 4, "unused");
    let divisor = append_int32(&entry, 2, "divisor");
    let quotient = entry.append_instruction(
        create_binary_arithmetic(operators::DIVIDE, int32(), x.clone(), divisor.clone()),
        "quotient",
    );
    let result = append_int32(&entry, 9, "result");
    let next = builder.add_basic_block("next");
    let ignored = next.append_parameter(BlockParameter::new(int32(), "ignored"));
    let kept = next.append_parameter(BlockParameter::new(int32(), "kept"));
    next.set_flow(return_copy_of(&kept));
    entry.set_flow(BlockFlow::jump(Branch::with_values(
        next.tag().clone(),
        [unused.clone(), result.clone()],
    )));

    let graph = builder.to_immutable().transform(&DeadValueElimination);

    assert!(graph.contains_value(&x));
    assert!(graph.contains_instruction(quotient.tag()));
    assert!(graph.contains_instruction(&divisor));
    assert!(graph.contains_instruction(&result));
    assert!(graph.contains_block_parameter(&kept));
    assert!(!graph.contains_value(&ignored));
    assert!(!graph.contains_value(&unused));
    assert_eq!(graph.entry_point().flow().values(), vec![result]);
    assert!(body_for(graph).validate().is_empty());
}

#[test]
fn dead_block_elimination_removes_unreachable_blocks() {
    let builder = FlowGraphBuilder::from_graph(abs_graph());
    let orphan = builder.add_basic_block("orphan");
    let orphan_value = append_int32(&orphan, 1, "orphan_value");
    orphan.set_flow(return_copy_of(&orphan_value));

    let graph = builder.to_immutable().transform(&DeadBlockElimination);
    assert_eq!(graph.block_count(), 3);
    assert!(!graph.contains_basic_block(orphan.tag()));
    assert!(!graph.contains_value(&orphan_value));
}

#[test]
fn passes_are_found_by_name() {
    let names: Vec<_> = known_passes().iter().map(|pass| pass.name()).collect();
    assert_eq!(names, DEFAULT_PIPELINE.to_vec());
    assert!(pass_by_name("constant-folding").is_some());
    assert!(pass_by_name("loop-unrolling").is_none());
}

#[test]
fn default_pipeline_folds_a_constant_branch_away() {
    let pipeline = PassPipeline::from_config(&PipelineConfig::default())
        .expect("default config is valid")
        .with_verification(true);
    assert_eq!(pipeline.pass_names(), DEFAULT_PIPELINE.to_vec());

    let body = pipeline
        .optimize(&body_for(foldable_branch()))
        .expect("every pass keeps the body valid");
    let graph = &body.implementation;

    assert_eq!(graph.block_count(), 2);
    assert!(graph.basic_blocks().all(|block| block.tag().name() != "negative"));
    assert_eq!(graph.instruction_count(), 1);
    assert!(body.validate().is_empty());
}

#[test]
fn graph_transform_all_matches_a_single_iteration() {
    let graph = foldable_branch();
    let passes: [&dyn IntraproceduralOptimization; 4] = [
        &CopyPropagation,
        &ConstantFolding,
        &DeadValueElimination,
        &DeadBlockElimination,
    ];
    let transformed = graph.transform_all(&passes);

    let pipeline = PassPipeline::new(known_passes());
    let optimized = pipeline
        .optimize(&body_for(graph.clone()))
        .expect("no verification requested");
    assert!(transformed.structurally_equals(&optimized.implementation));
}

#[test]
fn unknown_passes_are_config_errors() {
    let config = PipelineConfig {
        passes: vec!["constant-folding".to_string(), "loop-unrolling".to_string()],
        ..PipelineConfig::default()
    };
    let Some(error) = PassPipeline::from_config(&config).err() else {
        panic!("an unknown pass should be rejected");
    };
    assert_eq!(error.error_type, ErrorType::Config);
    assert_eq!(error.msg, "Unknown optimization pass 'loop-unrolling'");
    assert_eq!(error.metadata[&ErrorMetaDataKey::ConfigKey], "pipeline.passes");

    let config = PipelineConfig {
        max_iterations: 0,
        ..PipelineConfig::default()
    };
    assert!(PassPipeline::from_config(&config).is_err());
}

#[test]
fn verification_blames_the_pass_that_broke_the_body() {
    let pipeline = PassPipeline::new(vec![Arc::new(CarelessRemoval)]).with_verification(true);
    let graph = FlowGraphBuilder::new();
    let entry = graph.entry_point();
    let value = append_int32(&entry, 1, "value");
    entry.set_flow(return_copy_of(&value));

    let Err(messages) = pipeline.optimize(&body_for(graph.to_immutable())) else {
        panic!("removing a used value should fail verification");
    };
    assert!(messages.has_errors());
    let error = &messages.errors[0];
    assert_eq!(error.error_type, ErrorType::Conformance);
    assert_eq!(error.metadata[&ErrorMetaDataKey::PassName], "careless-removal");
    assert!(error.to_string().contains("careless-removal"));

    // Without verification the broken body is returned as is
    let unchecked = PassPipeline::new(vec![Arc::new(CarelessRemoval)]);
    assert!(unchecked.optimize(&body_for(FlowGraph::new())).is_ok());
}

#[test]
fn optimize_all_keeps_input_order() {
    let pipeline = PassPipeline::from_config(&PipelineConfig::default()).expect("default config is valid");
    let bodies = vec![body_for(foldable_branch()), body_for(abs_graph()), body_for(FlowGraph::new())];

    let results = pipeline.optimize_all(&bodies);
    let block_counts: Vec<_> = results
        .iter()
        .map(|result| match result {
            Ok(body) => body.implementation.block_count(),
            Err(messages) => panic!("unexpected errors: {messages:?}"),
        })
        .collect();
    assert_eq!(block_counts, vec![2, 3, 1]);
}

#[test]
fn optimize_methods_skips_methods_without_bodies() {
    let pipeline = PassPipeline::new(known_passes()).with_max_iterations(2);
    let methods = vec![
        Method {
            name: "branchy",
            body: Some(body_for(foldable_branch())),
        },
        Method {
            name: "abstract",
            body: None,
        },
    ];

    let results = pipeline.optimize_methods(&methods);
    assert_eq!(results.len(), 2);
    match &results[0] {
        Ok(Some(body)) => assert_eq!(body.implementation.block_count(), 2),
        _ => panic!("the first method has a body"),
    }
    assert!(matches!(results[1], Ok(None)));
}

#[test]
fn builder_transform_updates_the_builder() {
    let builder = FlowGraphBuilder::from_graph(foldable_branch());
    builder.transform(&ConstantFolding);
    builder.transform(&DeadBlockElimination);
    assert_eq!(builder.basic_block_tags().len(), 2);
}
