use crate::ir::instruction::Instruction;
use crate::ir::tags::{BasicBlockTag, ValueTag};
use std::fmt;

/// Describes one structural edit that turned a graph into its successor.
///
/// Every mutating graph operation threads one or more of these into the
/// analysis cache, so analyses can patch their previous result instead of
/// starting over. Instruction updates carry enough of the old state to undo
/// their effect on an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowGraphUpdate {
    AddInstruction {
        tag: ValueTag,
        instruction: Instruction,
    },
    ReplaceInstruction {
        tag: ValueTag,
        old_instruction: Instruction,
        instruction: Instruction,
    },
    RemoveInstruction {
        tag: ValueTag,
        old_instruction: Instruction,
    },
    AddBasicBlock(BasicBlockTag),
    /// Removes the block together with its parameters and instructions.
    RemoveBasicBlock(BasicBlockTag),
    SetEntryPoint(BasicBlockTag),
    BasicBlockParameters(BasicBlockTag),
    BasicBlockFlow(BasicBlockTag),
    /// Every type and member in the graph was rewritten.
    MapMembers,
}

impl FlowGraphUpdate {
    /// True for updates that can change which blocks branch to which.
    pub fn changes_control_flow(&self) -> bool {
        matches!(
            self,
            FlowGraphUpdate::AddBasicBlock(_)
                | FlowGraphUpdate::RemoveBasicBlock(_)
                | FlowGraphUpdate::BasicBlockFlow(_)
        )
    }
}

impl fmt::Display for FlowGraphUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowGraphUpdate::AddInstruction { tag, .. } => write!(f, "add instruction {tag}"),
            FlowGraphUpdate::ReplaceInstruction { tag, .. } => {
                write!(f, "replace instruction {tag}")
            }
            FlowGraphUpdate::RemoveInstruction { tag, .. } => write!(f, "remove instruction {tag}"),
            FlowGraphUpdate::AddBasicBlock(tag) => write!(f, "add block {tag}"),
            FlowGraphUpdate::RemoveBasicBlock(tag) => write!(f, "remove block {tag}"),
            FlowGraphUpdate::SetEntryPoint(tag) => write!(f, "set entry point {tag}"),
            FlowGraphUpdate::BasicBlockParameters(tag) => write!(f, "parameters of {tag}"),
            FlowGraphUpdate::BasicBlockFlow(tag) => write!(f, "flow of {tag}"),
            FlowGraphUpdate::MapMembers => write!(f, "map members"),
        }
    }
}
