use crate::ir::basic_block::BlockParameter;
use crate::ir::block_flow::BlockFlow;
use crate::ir::branch::Branch;
use crate::ir::builders::basic_block_builder::BasicBlockBuilder;
use crate::ir::builders::flow_graph_builder::FlowGraphBuilder;
use crate::ir::flow_graph::FlowGraph;
use crate::ir::instruction::Instruction;
use crate::ir::selected_instruction::SelectedInstruction;
use crate::ir::tags::ValueTag;
use crate::ir::types::IrType;
use crate::{graph_log, ir_contract};

/// A handle on one named instruction of a `FlowGraphBuilder`.
#[derive(Clone)]
pub struct InstructionBuilder {
    graph: FlowGraphBuilder,
    tag: ValueTag,
}

impl InstructionBuilder {
    pub(crate) fn new(graph: FlowGraphBuilder, tag: ValueTag) -> Self {
        InstructionBuilder { graph, tag }
    }

    pub fn tag(&self) -> &ValueTag {
        &self.tag
    }

    pub fn graph(&self) -> &FlowGraphBuilder {
        &self.graph
    }

    /// False once the instruction has been removed from the graph.
    pub fn is_valid(&self) -> bool {
        self.graph.contains_instruction(&self.tag)
    }

    pub fn to_immutable(&self) -> SelectedInstruction {
        self.graph.to_immutable().get_instruction(&self.tag)
    }

    pub fn instruction(&self) -> Instruction {
        self.to_immutable().instruction().clone()
    }

    pub fn result_type(&self) -> IrType {
        self.to_immutable().result_type()
    }

    pub fn block(&self) -> BasicBlockBuilder {
        let selected = self.to_immutable();
        BasicBlockBuilder::new(self.graph.clone(), selected.block().tag().clone())
    }

    pub fn instruction_index(&self) -> usize {
        self.to_immutable().instruction_index()
    }

    pub fn previous_instruction(&self) -> Option<InstructionBuilder> {
        let previous = self.to_immutable().previous_instruction()?;
        Some(InstructionBuilder::new(self.graph.clone(), previous.tag().clone()))
    }

    pub fn next_instruction(&self) -> Option<InstructionBuilder> {
        let next = self.to_immutable().next_instruction()?;
        Some(InstructionBuilder::new(self.graph.clone(), next.tag().clone()))
    }

    pub fn set_instruction(&self, instruction: Instruction) {
        let selected = self.to_immutable().replace_instruction(instruction);
        self.graph.set_graph(selected.into_graph());
    }

    pub fn insert_before(&self, instruction: Instruction, tag: impl Into<ValueTag>) -> InstructionBuilder {
        let selected = self.to_immutable().insert_before(instruction, tag);
        let tag = selected.tag().clone();
        self.graph.set_graph(selected.into_graph());
        InstructionBuilder::new(self.graph.clone(), tag)
    }

    pub fn insert_after(&self, instruction: Instruction, tag: impl Into<ValueTag>) -> InstructionBuilder {
        let selected = self.to_immutable().insert_after(instruction, tag);
        let tag = selected.tag().clone();
        self.graph.set_graph(selected.into_graph());
        InstructionBuilder::new(self.graph.clone(), tag)
    }

    /// Moves this instruction to the end of `block`. The tag is unchanged.
    pub fn move_to(&self, block: &BasicBlockBuilder) {
        let instruction = self.instruction();
        let graph = self.graph.to_immutable().remove_instruction(&self.tag);
        let moved = graph
            .get_basic_block(block.tag())
            .append_instruction(instruction, self.tag.clone());
        self.graph.set_graph(moved.into_graph());
    }

    pub fn remove(&self) {
        let graph = self.graph.to_immutable().remove_instruction(&self.tag);
        self.graph.set_graph(graph);
    }

    /// Replaces this instruction by the body of `implementation`, whose entry
    /// block parameters receive this instruction's arguments.
    pub fn replace_with_graph(&self, implementation: &FlowGraph) {
        let arguments = self.instruction().arguments().to_vec();
        self.replace_with_graph_and_arguments(implementation, &arguments);
    }

    /// Replaces this instruction by the body of `implementation`, passing
    /// `arguments` to its entry block. The value this instruction defined
    /// becomes the value `implementation` returns.
    ///
    /// An implementation whose entry block returns directly is spliced into
    /// the current block. Anything else splits the block: this instruction and
    /// everything after it move to a continuation block that every copied
    /// return jumps to.
    pub fn replace_with_graph_and_arguments(&self, implementation: &FlowGraph, arguments: &[ValueTag]) {
        let entry = implementation.entry_point();
        ir_contract!(
            entry.parameters().len() == arguments.len(),
            "replacement graph takes {} argument(s) but {} were supplied",
            entry.parameters().len(),
            arguments.len()
        );

        if let BlockFlow::Return(_) = entry.flow() {
            let selected = self.to_immutable();
            let (block, flow) =
                selected
                    .block()
                    .copy_instructions_from(selected.instruction_index(), &entry, arguments);
            if let BlockFlow::Return(return_flow) = flow {
                let graph = block
                    .into_graph()
                    .replace_instruction(&self.tag, return_flow.return_value)
                    .into_graph();
                self.graph.set_graph(graph);
                return;
            }
        }

        graph_log!("Splitting block to replace ", self.tag.to_string());

        let parent = self.block();
        let result_type = self.result_type();
        let continuation = self.graph.add_basic_block(parent.tag().name());
        let result = continuation.append_parameter(BlockParameter::new(result_type.clone(), self.tag.name()));

        let index = self.instruction_index();
        for tag in parent.instruction_tags().into_iter().skip(index) {
            InstructionBuilder::new(self.graph.clone(), tag).move_to(&continuation);
        }
        continuation.set_flow(parent.flow());

        let continuation_tag = continuation.tag().clone();
        let included_entry = self.graph.include(
            implementation,
            |return_flow, block| {
                let value = block.append_instruction(return_flow.return_value, ValueTag::anonymous());
                BlockFlow::jump(Branch::with_values(
                    continuation_tag.clone(),
                    [value.tag().clone()],
                ))
            },
            None,
        );

        parent.set_flow(BlockFlow::jump(Branch::with_values(
            included_entry,
            arguments.iter().cloned(),
        )));
        self.set_instruction(Instruction::create_copy(result_type, result));
    }
}

impl std::fmt::Debug for InstructionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InstructionBuilder({})", self.tag)
    }
}
