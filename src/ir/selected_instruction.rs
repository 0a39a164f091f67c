use crate::ir::basic_block::BasicBlock;
use crate::ir::flow_graph::FlowGraph;
use crate::ir::instruction::Instruction;
use crate::ir::tags::ValueTag;
use crate::ir::types::IrType;
use crate::ir_contract_violation;
use std::cell::OnceCell;

/// A named instruction as seen from one graph version: its tag, its defining
/// block and the instruction itself.
#[derive(Clone)]
pub struct SelectedInstruction {
    block: BasicBlock,
    tag: ValueTag,
    instruction: Instruction,
    index: OnceCell<usize>,
}

impl SelectedInstruction {
    pub(crate) fn new(block: BasicBlock, tag: ValueTag, instruction: Instruction) -> Self {
        SelectedInstruction {
            block,
            tag,
            instruction,
            index: OnceCell::new(),
        }
    }

    pub(crate) fn with_index(
        block: BasicBlock,
        tag: ValueTag,
        instruction: Instruction,
        index: usize,
    ) -> Self {
        SelectedInstruction {
            block,
            tag,
            instruction,
            index: OnceCell::from(index),
        }
    }

    pub fn tag(&self) -> &ValueTag {
        &self.tag
    }

    pub fn block(&self) -> &BasicBlock {
        &self.block
    }

    pub fn graph(&self) -> &FlowGraph {
        self.block.graph()
    }

    pub fn into_graph(self) -> FlowGraph {
        self.block.into_graph()
    }

    pub fn instruction(&self) -> &Instruction {
        &self.instruction
    }

    pub fn arguments(&self) -> &[ValueTag] {
        self.instruction.arguments()
    }

    pub fn result_type(&self) -> IrType {
        self.instruction.result_type()
    }

    /// Position of this instruction in its block.
    pub fn instruction_index(&self) -> usize {
        *self.index.get_or_init(|| {
            let position = self
                .block
                .instruction_tags()
                .iter()
                .position(|tag| *tag == self.tag);
            match position {
                Some(index) => index,
                None => ir_contract_violation!(
                    "instruction {} is not listed in block {}",
                    self.tag,
                    self.block.tag()
                ),
            }
        })
    }

    pub fn previous_instruction(&self) -> Option<SelectedInstruction> {
        let index = self.instruction_index().checked_sub(1)?;
        self.instruction_at(index)
    }

    pub fn next_instruction(&self) -> Option<SelectedInstruction> {
        self.instruction_at(self.instruction_index() + 1)
    }

    fn instruction_at(&self, index: usize) -> Option<SelectedInstruction> {
        let tag = self.block.instruction_tags().get(index)?;
        Some(SelectedInstruction::with_index(
            self.block.clone(),
            tag.clone(),
            self.graph().instruction_data(tag).clone(),
            index,
        ))
    }

    /// Replaces the instruction in a new graph. The tag stays the same.
    pub fn replace_instruction(&self, instruction: Instruction) -> SelectedInstruction {
        self.graph().replace_instruction(&self.tag, instruction)
    }

    /// Replaces this instruction by the body of `implementation`, passing this
    /// instruction's arguments to it. See `InstructionBuilder::replace_with_graph`.
    pub fn replace_with_graph(&self, implementation: &FlowGraph) -> SelectedInstruction {
        let builder = self.graph().to_builder();
        builder
            .get_instruction(&self.tag)
            .replace_with_graph(implementation);
        builder.to_immutable().get_instruction(&self.tag)
    }

    pub fn insert_before(&self, instruction: Instruction, tag: impl Into<ValueTag>) -> SelectedInstruction {
        self.block
            .insert_instruction(self.instruction_index(), instruction, tag)
    }

    pub fn insert_after(&self, instruction: Instruction, tag: impl Into<ValueTag>) -> SelectedInstruction {
        self.block
            .insert_instruction(self.instruction_index() + 1, instruction, tag)
    }
}

impl std::fmt::Debug for SelectedInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.tag, self.instruction)
    }
}
