//! Text and JSON renderings of flow graphs for debugging.
//!
//! The text form lists blocks in creation order:
//!
//! ```text
//! @entry.1(%x.2 : int32):
//!   %y.3 = arith.add(%x.2, %x.2) : int32
//!   return copy(%y.3) : int32
//! ```

use crate::ir::basic_block::BasicBlock;
use crate::ir::flow_graph::FlowGraph;
use crate::ir::ir_messages::ir_errors::IrError;
use serde::Serialize;
use std::fmt;

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())?;
        if !self.parameters().is_empty() {
            let parameters: Vec<String> = self
                .parameters()
                .iter()
                .map(|p| format!("{} : {}", p.tag, p.ty))
                .collect();
            write!(f, "({})", parameters.join(", "))?;
        }
        writeln!(f, ":")?;
        for selected in self.named_instructions() {
            writeln!(f, "  {} = {}", selected.tag(), selected.instruction())?;
        }
        writeln!(f, "  {}", self.flow())
    }
}

impl fmt::Display for FlowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, block) in self.basic_blocks().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{block}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for FlowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FlowGraph(entry: {})\n{self}", self.entry_point_tag())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphSummary {
    pub entry_point: String,
    pub block_count: usize,
    pub instruction_count: usize,
    pub blocks: Vec<BlockSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockSummary {
    pub tag: String,
    pub parameters: Vec<String>,
    pub instructions: Vec<String>,
    pub flow: String,
    pub successors: Vec<String>,
}

impl GraphSummary {
    pub fn of(graph: &FlowGraph) -> GraphSummary {
        GraphSummary {
            entry_point: graph.entry_point_tag().to_string(),
            block_count: graph.block_count(),
            instruction_count: graph.instruction_count(),
            blocks: graph.basic_blocks().map(|block| BlockSummary::of(&block)).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, IrError> {
        serde_json::to_string_pretty(self).map_err(|e| {
            IrError::compiler_error(format!("Could not serialize graph summary: {e}"))
        })
    }
}

impl BlockSummary {
    fn of(block: &BasicBlock) -> BlockSummary {
        BlockSummary {
            tag: block.tag().to_string(),
            parameters: block
                .parameters()
                .iter()
                .map(|p| format!("{} : {}", p.tag, p.ty))
                .collect(),
            instructions: block
                .named_instructions()
                .iter()
                .map(|selected| format!("{} = {}", selected.tag(), selected.instruction()))
                .collect(),
            flow: block.flow().to_string(),
            successors: block
                .flow()
                .branch_targets()
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}
