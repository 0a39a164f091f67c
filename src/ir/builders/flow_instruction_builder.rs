use crate::ir::basic_block::BlockParameter;
use crate::ir::block_flow::BlockFlow;
use crate::ir::branch::{Branch, BranchArgument};
use crate::ir::builders::basic_block_builder::BasicBlockBuilder;
use crate::ir::flow_graph::FlowGraph;
use crate::ir::instruction::Instruction;
use crate::ir::tags::ValueTag;
use crate::ir_contract;

/// A handle on one anonymous instruction inside a block's flow, addressed by
/// its block and its position in `BlockFlow::instructions`.
#[derive(Clone)]
pub struct FlowInstructionBuilder {
    block: BasicBlockBuilder,
    index: usize,
}

impl FlowInstructionBuilder {
    pub(crate) fn new(block: BasicBlockBuilder, index: usize) -> Self {
        FlowInstructionBuilder { block, index }
    }

    pub fn block(&self) -> &BasicBlockBuilder {
        &self.block
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_valid(&self) -> bool {
        self.block.is_valid() && self.index < self.block.flow().instructions().len()
    }

    pub fn instruction(&self) -> Instruction {
        let flow = self.block.flow();
        match flow.instructions().get(self.index) {
            Some(instruction) => instruction.clone(),
            None => crate::ir_contract_violation!(
                "flow of block {} has no instruction at index {}",
                self.block.tag(),
                self.index
            ),
        }
    }

    pub fn set_instruction(&self, instruction: Instruction) {
        let flow = self.block.flow();
        let mut instructions = flow.instructions().to_vec();
        ir_contract!(
            self.index < instructions.len(),
            "flow of block {} has no instruction at index {}",
            self.block.tag(),
            self.index
        );
        instructions[self.index] = instruction;
        self.block.set_flow(flow.with_instructions(instructions));
    }

    /// Replaces this flow instruction by the body of `implementation`, whose
    /// entry block receives the instruction's arguments.
    ///
    /// Inside a try flow the copied body is exception aware: its returns jump
    /// to the success branch and everything that may throw inside it is routed
    /// to the try's exception branch.
    ///
    /// When the body has to be split into a new continuation block, this
    /// builder moves along with the instruction's slot: afterwards it refers
    /// to the continuation's flow, where the slot now copies the result.
    pub fn replace_with_graph(&mut self, implementation: &FlowGraph) {
        let arguments = self.instruction().arguments().to_vec();
        self.replace_with_graph_and_arguments(implementation, &arguments);
    }

    pub fn replace_with_graph_and_arguments(&mut self, implementation: &FlowGraph, arguments: &[ValueTag]) {
        let entry = implementation.entry_point();
        ir_contract!(
            entry.parameters().len() == arguments.len(),
            "replacement graph takes {} argument(s) but {} were supplied",
            entry.parameters().len(),
            arguments.len()
        );

        if let BlockFlow::Try(try_flow) = self.block.flow() {
            self.replace_try_instruction(implementation, arguments, try_flow.success_branch, try_flow.exception_branch);
            return;
        }

        if let BlockFlow::Return(_) = entry.flow() {
            let block = self.block.to_immutable();
            let (block, flow) =
                block.copy_instructions_from(block.instruction_tags().len(), &entry, arguments);
            self.block.graph().set_graph(block.into_graph());
            if let BlockFlow::Return(return_flow) = flow {
                self.set_instruction(return_flow.return_value);
                return;
            }
        }

        let graph = self.block.graph();
        let instruction = self.instruction();
        let result_type = instruction.result_type();

        let continuation = graph.add_basic_block(self.block.tag().name());
        let result = continuation.append_parameter(BlockParameter::new(result_type.clone(), ""));
        let flow = self.block.flow();
        let mut instructions = flow.instructions().to_vec();
        instructions[self.index] = Instruction::create_copy(result_type, result);
        continuation.set_flow(flow.with_instructions(instructions));

        let continuation_tag = continuation.tag().clone();
        let included_entry = graph.include(
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
        self.block.set_flow(BlockFlow::jump(Branch::with_values(
            included_entry,
            arguments.iter().cloned(),
        )));
        self.block = continuation;
    }

    fn replace_try_instruction(
        &self,
        implementation: &FlowGraph,
        arguments: &[ValueTag],
        success_branch: Branch,
        exception_branch: Branch,
    ) {
        let included_entry = self.block.graph().include(
            implementation,
            |return_flow, block| {
                let value = block.append_instruction(return_flow.return_value, ValueTag::anonymous());
                let value = value.tag().clone();
                BlockFlow::jump(success_branch.map_arguments(|argument| match argument {
                    BranchArgument::TryResult => BranchArgument::Value(value.clone()),
                    other => other.clone(),
                }))
            },
            Some(&exception_branch),
        );
        self.block.set_flow(BlockFlow::jump(Branch::with_values(
            included_entry,
            arguments.iter().cloned(),
        )));
    }
}
