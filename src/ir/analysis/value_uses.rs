use crate::ir::analysis::analysis_cache::FlowGraphAnalysis;
use crate::ir::flow_graph::FlowGraph;
use crate::ir::flow_graph_update::FlowGraphUpdate;
use crate::ir::instruction::Instruction;
use crate::ir::tags::{BasicBlockTag, ValueTag};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// For every value, the named instructions and the block flows that read it.
#[derive(Debug, Clone, Default)]
pub struct ValueUses {
    instruction_users: FxHashMap<ValueTag, FxHashSet<ValueTag>>,
    flow_users: FxHashMap<ValueTag, FxHashSet<BasicBlockTag>>,

    // The values each block's flow reads, so a flow update can be undone
    flow_values: FxHashMap<BasicBlockTag, Vec<ValueTag>>,
}

impl ValueUses {
    pub fn instruction_users(&self, value: &ValueTag) -> impl Iterator<Item = &ValueTag> {
        self.instruction_users.get(value).into_iter().flatten()
    }

    pub fn flow_users(&self, value: &ValueTag) -> impl Iterator<Item = &BasicBlockTag> {
        self.flow_users.get(value).into_iter().flatten()
    }

    pub fn is_used(&self, value: &ValueTag) -> bool {
        self.use_count(value) > 0
    }

    /// Number of distinct instructions and flows that read `value`.
    pub fn use_count(&self, value: &ValueTag) -> usize {
        self.instruction_users.get(value).map_or(0, FxHashSet::len)
            + self.flow_users.get(value).map_or(0, FxHashSet::len)
    }

    fn add_instruction(&mut self, tag: &ValueTag, instruction: &Instruction) {
        for argument in instruction.arguments() {
            self.instruction_users
                .entry(argument.clone())
                .or_default()
                .insert(tag.clone());
        }
    }

    fn remove_instruction(&mut self, tag: &ValueTag, instruction: &Instruction) {
        for argument in instruction.arguments() {
            if let Some(users) = self.instruction_users.get_mut(argument) {
                users.remove(tag);
                if users.is_empty() {
                    self.instruction_users.remove(argument);
                }
            }
        }
    }

    fn set_flow(&mut self, block: &BasicBlockTag, values: Vec<ValueTag>) {
        if let Some(old_values) = self.flow_values.remove(block) {
            for value in old_values {
                if let Some(users) = self.flow_users.get_mut(&value) {
                    users.remove(block);
                    if users.is_empty() {
                        self.flow_users.remove(&value);
                    }
                }
            }
        }
        for value in &values {
            self.flow_users
                .entry(value.clone())
                .or_default()
                .insert(block.clone());
        }
        if !values.is_empty() {
            self.flow_values.insert(block.clone(), values);
        }
    }
}

impl PartialEq for ValueUses {
    fn eq(&self, other: &Self) -> bool {
        self.instruction_users == other.instruction_users && self.flow_users == other.flow_users
    }
}

pub struct ValueUseAnalysis;

impl FlowGraphAnalysis<ValueUses> for ValueUseAnalysis {
    fn analyze(&self, graph: &FlowGraph) -> ValueUses {
        let mut uses = ValueUses::default();
        for block in graph.basic_blocks() {
            for selected in block.named_instructions() {
                uses.add_instruction(selected.tag(), selected.instruction());
            }
            uses.set_flow(block.tag(), block.flow().values());
        }
        uses
    }

    fn analyze_with_updates(
        &self,
        graph: &FlowGraph,
        previous: Arc<ValueUses>,
        updates: &[FlowGraphUpdate],
    ) -> Arc<ValueUses> {
        // Block removal drops instructions without individual updates
        if updates
            .iter()
            .any(|update| matches!(update, FlowGraphUpdate::RemoveBasicBlock(_)))
        {
            return Arc::new(self.analyze(graph));
        }

        let mut uses = Arc::unwrap_or_clone(previous);
        let mut changed_flows = FxHashSet::default();
        for update in updates {
            match update {
                FlowGraphUpdate::AddInstruction { tag, instruction } => {
                    uses.add_instruction(tag, instruction);
                }
                FlowGraphUpdate::ReplaceInstruction {
                    tag,
                    old_instruction,
                    instruction,
                } => {
                    uses.remove_instruction(tag, old_instruction);
                    uses.add_instruction(tag, instruction);
                }
                FlowGraphUpdate::RemoveInstruction {
                    tag,
                    old_instruction,
                } => uses.remove_instruction(tag, old_instruction),
                FlowGraphUpdate::BasicBlockFlow(block) => {
                    changed_flows.insert(block.clone());
                }
                FlowGraphUpdate::AddBasicBlock(_)
                | FlowGraphUpdate::RemoveBasicBlock(_)
                | FlowGraphUpdate::SetEntryPoint(_)
                | FlowGraphUpdate::BasicBlockParameters(_)
                | FlowGraphUpdate::MapMembers => {}
            }
        }

        // Only the final flow of each block matters
        for block in changed_flows {
            let values = graph.get_basic_block(&block).flow().values();
            uses.set_flow(&block, values);
        }

        Arc::new(uses)
    }
}
