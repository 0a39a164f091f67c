use crate::ir::analysis::analysis_cache::FlowGraphAnalysis;
use crate::ir::flow_graph::FlowGraph;
use crate::ir::flow_graph_update::FlowGraphUpdate;
use crate::ir::tags::ValueTag;
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Named instructions that must run even if their result is never used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectfulInstructions {
    pub instructions: FxHashSet<ValueTag>,
}

impl EffectfulInstructions {
    pub fn contains(&self, tag: &ValueTag) -> bool {
        self.instructions.contains(tag)
    }
}

pub struct EffectfulInstructionAnalysis;

impl FlowGraphAnalysis<EffectfulInstructions> for EffectfulInstructionAnalysis {
    fn analyze(&self, graph: &FlowGraph) -> EffectfulInstructions {
        let instructions = graph
            .named_instructions()
            .filter(|selected| selected.instruction().prototype().has_side_effects())
            .map(|selected| selected.tag().clone())
            .collect();
        EffectfulInstructions { instructions }
    }

    fn analyze_with_updates(
        &self,
        graph: &FlowGraph,
        previous: Arc<EffectfulInstructions>,
        updates: &[FlowGraphUpdate],
    ) -> Arc<EffectfulInstructions> {
        let mut result = Arc::unwrap_or_clone(previous);
        for update in updates {
            match update {
                FlowGraphUpdate::AddInstruction { tag, instruction }
                | FlowGraphUpdate::ReplaceInstruction {
                    tag, instruction, ..
                } => {
                    if instruction.prototype().has_side_effects() {
                        result.instructions.insert(tag.clone());
                    } else {
                        result.instructions.remove(tag);
                    }
                }
                FlowGraphUpdate::RemoveInstruction { tag, .. } => {
                    result.instructions.remove(tag);
                }
                FlowGraphUpdate::BasicBlockFlow(_)
                | FlowGraphUpdate::BasicBlockParameters(_)
                | FlowGraphUpdate::SetEntryPoint(_)
                | FlowGraphUpdate::AddBasicBlock(_) => {}
                FlowGraphUpdate::RemoveBasicBlock(_) | FlowGraphUpdate::MapMembers => {
                    return Arc::new(self.analyze(graph));
                }
            }
        }
        Arc::new(result)
    }
}
