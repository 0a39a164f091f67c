use crate::ir::basic_block::{BasicBlock, BlockParameter};
use crate::ir::block_flow::BlockFlow;
use crate::ir::builders::flow_graph_builder::FlowGraphBuilder;
use crate::ir::builders::flow_instruction_builder::FlowInstructionBuilder;
use crate::ir::builders::instruction_builder::InstructionBuilder;
use crate::ir::instruction::Instruction;
use crate::ir::tags::{BasicBlockTag, ValueTag};

/// A handle on one block of a `FlowGraphBuilder`. Every access re-reads the
/// builder's latest snapshot.
#[derive(Clone)]
pub struct BasicBlockBuilder {
    graph: FlowGraphBuilder,
    tag: BasicBlockTag,
}

impl BasicBlockBuilder {
    pub(crate) fn new(graph: FlowGraphBuilder, tag: BasicBlockTag) -> Self {
        BasicBlockBuilder { graph, tag }
    }

    pub fn tag(&self) -> &BasicBlockTag {
        &self.tag
    }

    pub fn graph(&self) -> &FlowGraphBuilder {
        &self.graph
    }

    /// False once the block has been removed from the graph.
    pub fn is_valid(&self) -> bool {
        self.graph.contains_basic_block(&self.tag)
    }

    pub fn to_immutable(&self) -> BasicBlock {
        self.graph.to_immutable().get_basic_block(&self.tag)
    }

    pub fn is_entry_point(&self) -> bool {
        self.graph.entry_point_tag() == self.tag
    }

    pub fn parameters(&self) -> Vec<BlockParameter> {
        self.to_immutable().parameters().to_vec()
    }

    pub fn parameter_tags(&self) -> Vec<ValueTag> {
        self.to_immutable().parameter_tags()
    }

    pub fn instruction_tags(&self) -> Vec<ValueTag> {
        self.to_immutable().instruction_tags().to_vec()
    }

    pub fn named_instructions(&self) -> Vec<InstructionBuilder> {
        self.instruction_tags()
            .into_iter()
            .map(|tag| InstructionBuilder::new(self.graph.clone(), tag))
            .collect()
    }

    pub fn flow(&self) -> BlockFlow {
        self.to_immutable().flow().clone()
    }

    pub fn set_flow(&self, flow: BlockFlow) {
        let block = self.to_immutable().with_flow(flow);
        self.graph.set_graph(block.into_graph());
    }

    /// Builders for the anonymous instructions inside this block's flow.
    pub fn flow_instructions(&self) -> Vec<FlowInstructionBuilder> {
        (0..self.to_immutable().flow().instructions().len())
            .map(|index| FlowInstructionBuilder::new(self.clone(), index))
            .collect()
    }

    pub fn set_parameters(&self, parameters: Vec<BlockParameter>) {
        let block = self.to_immutable().with_parameters(parameters);
        self.graph.set_graph(block.into_graph());
    }

    /// Appends a parameter and returns its tag.
    pub fn append_parameter(&self, parameter: BlockParameter) -> ValueTag {
        let tag = parameter.tag.clone();
        let block = self.to_immutable().append_parameter(parameter);
        self.graph.set_graph(block.into_graph());
        tag
    }

    pub fn append_instruction(
        &self,
        instruction: Instruction,
        tag: impl Into<ValueTag>,
    ) -> InstructionBuilder {
        let selected = self.to_immutable().append_instruction(instruction, tag);
        let tag = selected.tag().clone();
        self.graph.set_graph(selected.into_graph());
        InstructionBuilder::new(self.graph.clone(), tag)
    }

    pub fn insert_instruction(
        &self,
        index: usize,
        instruction: Instruction,
        tag: impl Into<ValueTag>,
    ) -> InstructionBuilder {
        let selected = self.to_immutable().insert_instruction(index, instruction, tag);
        let tag = selected.tag().clone();
        self.graph.set_graph(selected.into_graph());
        InstructionBuilder::new(self.graph.clone(), tag)
    }

    pub fn remove_instruction(&self, tag: &ValueTag) {
        let block = self.to_immutable().remove_instruction(tag);
        self.graph.set_graph(block.into_graph());
    }
}

impl PartialEq for BasicBlockBuilder {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag
    }
}

impl std::fmt::Debug for BasicBlockBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BasicBlockBuilder({})", self.tag)
    }
}
