//! ============================================================
//!                    Flow Graph Builder
//! ============================================================
//! A mutable-looking façade over immutable flow graphs.
//!
//! The builder owns a replaceable cell holding the latest snapshot. Every
//! edit reads the snapshot, derives a new graph from it and stores that graph
//! back. Block and instruction builders only remember a tag and re-read the
//! cell on each access, so they always see the latest version.
//!
//! The cell is never borrowed while user code runs: snapshots are cloned out
//! (an O(1) operation) before any callback is invoked.

use crate::ir::analysis::analysis_cache::FlowGraphAnalysis;
use crate::ir::basic_block::BlockParameter;
use crate::ir::block_flow::{BlockFlow, ReturnFlow};
use crate::ir::branch::{Branch, BranchArgument};
use crate::ir::builders::basic_block_builder::BasicBlockBuilder;
use crate::ir::builders::instruction_builder::InstructionBuilder;
use crate::ir::flow_graph::FlowGraph;
use crate::ir::instruction::Instruction;
use crate::ir::optimizers::optimization::IntraproceduralOptimization;
use crate::ir::tags::{BasicBlockTag, ValueTag};
use crate::ir::types::IrType;
use crate::{graph_log, ir_contract};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

#[derive(Clone)]
pub struct FlowGraphBuilder {
    graph: Rc<RefCell<FlowGraph>>,
}

impl Default for FlowGraphBuilder {
    fn default() -> Self {
        FlowGraphBuilder::new()
    }
}

impl FlowGraphBuilder {
    /// A builder over a fresh graph with a single empty entry block.
    pub fn new() -> Self {
        FlowGraphBuilder::from_graph(FlowGraph::new())
    }

    pub fn from_graph(graph: FlowGraph) -> Self {
        FlowGraphBuilder {
            graph: Rc::new(RefCell::new(graph)),
        }
    }

    /// The current snapshot. Later edits through this builder do not affect it.
    pub fn to_immutable(&self) -> FlowGraph {
        self.graph.borrow().clone()
    }

    pub(crate) fn set_graph(&self, graph: FlowGraph) {
        *self.graph.borrow_mut() = graph;
    }

    pub fn entry_point_tag(&self) -> BasicBlockTag {
        self.graph.borrow().entry_point_tag().clone()
    }

    pub fn entry_point(&self) -> BasicBlockBuilder {
        BasicBlockBuilder::new(self.clone(), self.entry_point_tag())
    }

    pub fn set_entry_point_tag(&self, tag: &BasicBlockTag) {
        let graph = self.to_immutable().with_entry_point(tag);
        self.set_graph(graph);
    }

    pub fn contains_basic_block(&self, tag: &BasicBlockTag) -> bool {
        self.graph.borrow().contains_basic_block(tag)
    }

    pub fn contains_instruction(&self, tag: &ValueTag) -> bool {
        self.graph.borrow().contains_instruction(tag)
    }

    pub fn contains_value(&self, tag: &ValueTag) -> bool {
        self.graph.borrow().contains_value(tag)
    }

    pub fn get_value_type(&self, tag: &ValueTag) -> IrType {
        self.graph.borrow().get_value_type(tag)
    }

    pub fn basic_block_tags(&self) -> Vec<BasicBlockTag> {
        self.graph.borrow().basic_block_tags().cloned().collect()
    }

    pub fn basic_blocks(&self) -> Vec<BasicBlockBuilder> {
        self.basic_block_tags()
            .into_iter()
            .map(|tag| BasicBlockBuilder::new(self.clone(), tag))
            .collect()
    }

    pub fn instruction_tags(&self) -> Vec<ValueTag> {
        self.graph.borrow().instruction_tags().cloned().collect()
    }

    /// Builders for every named instruction, block by block in execution order.
    pub fn named_instructions(&self) -> Vec<InstructionBuilder> {
        let graph = self.to_immutable();
        graph
            .basic_blocks()
            .flat_map(|block| block.instruction_tags().to_vec())
            .map(|tag| InstructionBuilder::new(self.clone(), tag))
            .collect()
    }

    pub fn add_basic_block(&self, name: &str) -> BasicBlockBuilder {
        let block = self.to_immutable().add_basic_block(name);
        let tag = block.tag().clone();
        self.set_graph(block.into_graph());
        BasicBlockBuilder::new(self.clone(), tag)
    }

    pub fn get_basic_block(&self, tag: &BasicBlockTag) -> BasicBlockBuilder {
        ir_contract!(
            self.contains_basic_block(tag),
            "no basic block {tag} in this graph"
        );
        BasicBlockBuilder::new(self.clone(), tag.clone())
    }

    pub fn get_instruction(&self, tag: &ValueTag) -> InstructionBuilder {
        ir_contract!(
            self.contains_instruction(tag),
            "no instruction {tag} in this graph"
        );
        InstructionBuilder::new(self.clone(), tag.clone())
    }

    pub fn try_get_instruction(&self, tag: &ValueTag) -> Option<InstructionBuilder> {
        self.contains_instruction(tag)
            .then(|| InstructionBuilder::new(self.clone(), tag.clone()))
    }

    pub fn remove_basic_block(&self, tag: &BasicBlockTag) {
        let graph = self.to_immutable().remove_basic_block(tag);
        self.set_graph(graph);
    }

    pub fn replace_uses(&self, replacements: &FxHashMap<ValueTag, ValueTag>) {
        let graph = self.to_immutable().replace_uses(replacements);
        self.set_graph(graph);
    }

    pub fn remove_definitions<'a>(&self, values: impl IntoIterator<Item = &'a ValueTag>) {
        let graph = self.to_immutable().remove_definitions(values);
        self.set_graph(graph);
    }

    /// Only accepts named instructions; see `FlowGraph::remove_instruction_definitions`.
    pub fn remove_instruction_definitions<'a>(
        &self,
        values: impl IntoIterator<Item = &'a ValueTag>,
    ) {
        let graph = self.to_immutable().remove_instruction_definitions(values);
        self.set_graph(graph);
    }

    pub fn transform(&self, optimization: &dyn IntraproceduralOptimization) {
        let graph = self.to_immutable().transform(optimization);
        self.set_graph(graph);
    }

    pub fn with_analysis<T: Send + Sync + 'static>(&self, analysis: impl FlowGraphAnalysis<T>) {
        let graph = self.to_immutable().with_analysis(analysis);
        self.set_graph(graph);
    }

    pub fn get_analysis_result<T: Send + Sync + 'static>(&self) -> Arc<T> {
        self.to_immutable().get_analysis_result::<T>()
    }

    pub fn try_get_analysis_result<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.to_immutable().try_get_analysis_result::<T>()
    }

    /// Runs `edit` against a fork of this builder. The fork's graph replaces
    /// this builder's graph only if `edit` returns true.
    pub fn try_fork_and_merge(&self, edit: impl FnOnce(&FlowGraphBuilder) -> bool) -> bool {
        let fork = FlowGraphBuilder::from_graph(self.to_immutable());
        if edit(&fork) {
            self.set_graph(fork.to_immutable());
            true
        } else {
            false
        }
    }

    /// Copies every block and value of `graph` into this graph under fresh
    /// tags and returns the tag of the copied entry block.
    ///
    /// `rewrite_return` turns each copied return flow into the flow that
    /// replaces it; the block builder it receives is the block being
    /// terminated. When `exception_branch` is given, every instruction that
    /// may throw, including those inside block flows, is moved into a try
    /// flow whose exception branch is a copy of `exception_branch`.
    pub fn include(
        &self,
        graph: &FlowGraph,
        mut rewrite_return: impl FnMut(ReturnFlow, &BasicBlockBuilder) -> BlockFlow,
        exception_branch: Option<&Branch>,
    ) -> BasicBlockTag {
        graph_log!(
            "Including a graph of ",
            graph.block_count(),
            " block(s)"
        );

        let mut block_renaming = FxHashMap::default();
        for tag in graph.basic_block_tags() {
            let block = self.add_basic_block(tag.name());
            block_renaming.insert(tag.clone(), block.tag().clone());
        }
        let value_renaming: FxHashMap<ValueTag, ValueTag> = graph
            .value_tags()
            .map(|tag| (tag.clone(), tag.renamed()))
            .collect();

        for source in graph.basic_blocks() {
            let mut target = self.get_basic_block(&block_renaming[source.tag()]);
            target.set_parameters(
                source
                    .parameters()
                    .iter()
                    .map(|p| BlockParameter::with_tag(p.ty.clone(), value_renaming[&p.tag].clone()))
                    .collect(),
            );

            for selected in source.named_instructions() {
                let instruction = selected.instruction().map_arguments_from(&value_renaming);
                let tag = value_renaming[selected.tag()].clone();
                match exception_branch {
                    Some(exception_branch) if instruction.may_throw() => {
                        target = self.wrap_in_try(&target, instruction, tag, exception_branch);
                    }
                    _ => {
                        target.append_instruction(instruction, tag);
                    }
                }
            }

            let mut flow = source
                .flow()
                .map_values_from(&value_renaming)
                .map_blocks_from(&block_renaming);
            if let Some(exception_branch) = exception_branch {
                (target, flow) = self.isolate_throwing_flow_instructions(target, flow, exception_branch);
            }
            let flow = match flow {
                BlockFlow::Return(return_flow) => rewrite_return(return_flow, &target),
                other => other,
            };
            target.set_flow(flow);
        }

        block_renaming[graph.entry_point_tag()].clone()
    }

    /// Terminates `block` with a try flow around `instruction` and returns the
    /// success block, whose only parameter is `tag`.
    fn wrap_in_try(
        &self,
        block: &BasicBlockBuilder,
        instruction: Instruction,
        tag: ValueTag,
        exception_branch: &Branch,
    ) -> BasicBlockBuilder {
        let success = self.add_basic_block(block.tag().name());
        success.append_parameter(BlockParameter::with_tag(instruction.result_type(), tag));
        block.set_flow(BlockFlow::try_flow(
            instruction,
            Branch::new(success.tag().clone(), vec![BranchArgument::TryResult]),
            exception_branch.clone(),
        ));
        success
    }

    fn isolate_throwing_flow_instructions(
        &self,
        mut block: BasicBlockBuilder,
        flow: BlockFlow,
        exception_branch: &Branch,
    ) -> (BasicBlockBuilder, BlockFlow) {
        // A try flow already routes its own exceptions
        if matches!(flow, BlockFlow::Try(_)) {
            return (block, flow);
        }

        let mut instructions = Vec::with_capacity(flow.instructions().len());
        for instruction in flow.instructions() {
            if instruction.may_throw() {
                let tag = ValueTag::anonymous();
                let result_type = instruction.result_type();
                block = self.wrap_in_try(&block, instruction.clone(), tag.clone(), exception_branch);
                instructions.push(Instruction::create_copy(result_type, tag));
            } else {
                instructions.push(instruction.clone());
            }
        }
        (block, flow.with_instructions(instructions))
    }
}
