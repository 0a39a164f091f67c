//! ============================================================
//!                        Flow Graph
//! ============================================================
//! An immutable control-flow graph for one method body.
//!
//! Every operation that "changes" a graph returns a new graph and leaves the
//! receiver untouched. All indices live in persistent maps, so a new version
//! shares everything it did not touch with the old one and cloning a graph
//! is O(1).
//!
//! Invariants held by every graph version:
//!  - the entry point names an existing block
//!  - every value tag is defined exactly once, either as a block parameter
//!    or as a named instruction
//!  - `value_parents` maps every defined value to the block defining it
//!
//! Preconditions such as "this block exists" are contract checks that panic.
//! Recoverable checks live in `MethodBody::validate`.

use crate::ir::analysis::analysis_cache::{AnalysisCache, FlowGraphAnalysis};
use crate::ir::analysis::value_uses::{ValueUseAnalysis, ValueUses};
use crate::ir::analysis::default_analyses;
use crate::ir::basic_block::{BasicBlock, BasicBlockData, BlockParameter};
use crate::ir::block_flow::BlockFlow;
use crate::ir::builders::flow_graph_builder::FlowGraphBuilder;
use crate::ir::collections::PersistentMap;
use crate::ir::flow_graph_update::FlowGraphUpdate;
use crate::ir::instruction::Instruction;
use crate::ir::optimizers::optimization::IntraproceduralOptimization;
use crate::ir::selected_instruction::SelectedInstruction;
use crate::ir::tags::{BasicBlockTag, ValueTag};
use crate::ir::types::{IrType, MemberMapping};
use crate::settings::ENTRY_POINT_BLOCK_NAME;
use crate::{ir_contract, ir_contract_violation};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

#[derive(Clone)]
pub struct FlowGraph {
    blocks: PersistentMap<BasicBlockTag, Arc<BasicBlockData>>,
    instructions: PersistentMap<ValueTag, Instruction>,
    value_parents: PersistentMap<ValueTag, BasicBlockTag>,
    block_parameters: PersistentMap<ValueTag, IrType>,
    entry_point_tag: BasicBlockTag,
    analysis_cache: AnalysisCache,
}

impl Default for FlowGraph {
    fn default() -> Self {
        FlowGraph::new()
    }
}

impl FlowGraph {
    /// A graph with a single empty entry block whose flow is unreachable.
    /// The default analyses are registered.
    pub fn new() -> FlowGraph {
        let entry_point_tag = BasicBlockTag::new(ENTRY_POINT_BLOCK_NAME);
        FlowGraph {
            blocks: PersistentMap::new()
                .insert(entry_point_tag.clone(), Arc::new(BasicBlockData::default())),
            instructions: PersistentMap::new(),
            value_parents: PersistentMap::new(),
            block_parameters: PersistentMap::new(),
            entry_point_tag,
            analysis_cache: default_analyses(),
        }
    }

    fn with_update(mut self, update: FlowGraphUpdate) -> FlowGraph {
        self.analysis_cache = self.analysis_cache.update(&update);
        self
    }

    // ------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------

    pub fn entry_point_tag(&self) -> &BasicBlockTag {
        &self.entry_point_tag
    }

    pub fn entry_point(&self) -> BasicBlock {
        self.get_basic_block(&self.entry_point_tag)
    }

    /// Block tags in creation order.
    pub fn basic_block_tags(&self) -> impl Iterator<Item = &BasicBlockTag> {
        self.blocks.keys()
    }

    pub fn basic_blocks(&self) -> impl Iterator<Item = BasicBlock> + '_ {
        self.blocks
            .iter()
            .map(|(tag, data)| BasicBlock::new(self.clone(), tag.clone(), Arc::clone(data)))
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn instruction_tags(&self) -> impl Iterator<Item = &ValueTag> {
        self.instructions.keys()
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// Every named instruction, block by block, in execution order within each block.
    pub fn named_instructions(&self) -> impl Iterator<Item = SelectedInstruction> + '_ {
        self.basic_blocks()
            .flat_map(|block| block.named_instructions())
    }

    /// Every defined value: block parameters and named instructions.
    pub fn value_tags(&self) -> impl Iterator<Item = &ValueTag> {
        self.value_parents.keys()
    }

    pub fn contains_basic_block(&self, tag: &BasicBlockTag) -> bool {
        self.blocks.contains_key(tag)
    }

    pub fn contains_instruction(&self, tag: &ValueTag) -> bool {
        self.instructions.contains_key(tag)
    }

    pub fn contains_block_parameter(&self, tag: &ValueTag) -> bool {
        self.block_parameters.contains_key(tag)
    }

    pub fn contains_value(&self, tag: &ValueTag) -> bool {
        self.value_parents.contains_key(tag)
    }

    fn block_data(&self, tag: &BasicBlockTag) -> &Arc<BasicBlockData> {
        match self.blocks.get(tag) {
            Some(data) => data,
            None => ir_contract_violation!("no basic block {tag} in this graph"),
        }
    }

    pub(crate) fn instruction_data(&self, tag: &ValueTag) -> &Instruction {
        match self.instructions.get(tag) {
            Some(instruction) => instruction,
            None => ir_contract_violation!("no instruction {tag} in this graph"),
        }
    }

    fn value_parent_tag(&self, tag: &ValueTag) -> &BasicBlockTag {
        match self.value_parents.get(tag) {
            Some(parent) => parent,
            None => ir_contract_violation!("value {tag} is not defined in this graph"),
        }
    }

    pub fn get_basic_block(&self, tag: &BasicBlockTag) -> BasicBlock {
        BasicBlock::new(self.clone(), tag.clone(), Arc::clone(self.block_data(tag)))
    }

    pub fn try_get_basic_block(&self, tag: &BasicBlockTag) -> Option<BasicBlock> {
        self.blocks
            .get(tag)
            .map(|data| BasicBlock::new(self.clone(), tag.clone(), Arc::clone(data)))
    }

    pub fn get_instruction(&self, tag: &ValueTag) -> SelectedInstruction {
        let instruction = self.instruction_data(tag).clone();
        let parent = self.get_basic_block(self.value_parent_tag(tag));
        SelectedInstruction::new(parent, tag.clone(), instruction)
    }

    pub fn try_get_instruction(&self, tag: &ValueTag) -> Option<SelectedInstruction> {
        if self.contains_instruction(tag) {
            Some(self.get_instruction(tag))
        } else {
            None
        }
    }

    /// The block that defines `tag`, as a parameter or as an instruction.
    pub fn get_value_parent(&self, tag: &ValueTag) -> BasicBlock {
        self.get_basic_block(self.value_parent_tag(tag))
    }

    pub fn get_value_type(&self, tag: &ValueTag) -> IrType {
        match self.try_get_value_type(tag) {
            Some(ty) => ty,
            None => ir_contract_violation!("value {tag} is not defined in this graph"),
        }
    }

    pub fn try_get_value_type(&self, tag: &ValueTag) -> Option<IrType> {
        if let Some(instruction) = self.instructions.get(tag) {
            return Some(instruction.result_type());
        }
        self.block_parameters.get(tag).cloned()
    }

    /// Same entry point, same blocks, same instructions. Analyses are ignored.
    pub fn structurally_equals(&self, other: &FlowGraph) -> bool {
        self.entry_point_tag == other.entry_point_tag
            && self.blocks == other.blocks
            && self.instructions == other.instructions
    }

    pub fn to_builder(&self) -> FlowGraphBuilder {
        FlowGraphBuilder::from_graph(self.clone())
    }

    // ------------------------------------------------------------
    // Blocks
    // ------------------------------------------------------------

    /// Adds an empty block with unreachable flow. The returned view carries the new graph.
    pub fn add_basic_block(&self, name: &str) -> BasicBlock {
        let tag = BasicBlockTag::new(name);
        let data = Arc::new(BasicBlockData::default());

        let mut graph = self.clone();
        graph.blocks = graph.blocks.insert(tag.clone(), Arc::clone(&data));
        let graph = graph.with_update(FlowGraphUpdate::AddBasicBlock(tag.clone()));
        BasicBlock::new(graph, tag, data)
    }

    /// Removes a block together with its parameters and instructions.
    /// Branches that still target it are left for the caller to fix.
    pub fn remove_basic_block(&self, tag: &BasicBlockTag) -> FlowGraph {
        let data = self.block_data(tag);
        ir_contract!(
            *tag != self.entry_point_tag,
            "cannot remove the entry point block {tag}"
        );

        let mut graph = self.clone();
        for parameter in &data.parameters {
            graph.value_parents = graph.value_parents.remove(&parameter.tag);
            graph.block_parameters = graph.block_parameters.remove(&parameter.tag);
        }
        for instruction in &data.instruction_tags {
            graph.value_parents = graph.value_parents.remove(instruction);
            graph.instructions = graph.instructions.remove(instruction);
        }
        graph.blocks = graph.blocks.remove(tag);
        graph.with_update(FlowGraphUpdate::RemoveBasicBlock(tag.clone()))
    }

    pub fn with_entry_point(&self, tag: &BasicBlockTag) -> FlowGraph {
        ir_contract!(
            self.contains_basic_block(tag),
            "cannot make {tag} the entry point: no such block in this graph"
        );
        let mut graph = self.clone();
        graph.entry_point_tag = tag.clone();
        graph.with_update(FlowGraphUpdate::SetEntryPoint(tag.clone()))
    }

    pub fn update_basic_block_flow(&self, tag: &BasicBlockTag, flow: BlockFlow) -> BasicBlock {
        let data = self.block_data(tag);
        let new_data = Arc::new(BasicBlockData {
            parameters: data.parameters.clone(),
            instruction_tags: data.instruction_tags.clone(),
            flow,
        });

        let mut graph = self.clone();
        graph.blocks = graph.blocks.insert(tag.clone(), Arc::clone(&new_data));
        let graph = graph.with_update(FlowGraphUpdate::BasicBlockFlow(tag.clone()));
        BasicBlock::new(graph, tag.clone(), new_data)
    }

    /// Replaces a block's parameter list. Only parameters that were added or
    /// removed touch the value indices.
    pub fn update_basic_block_parameters(
        &self,
        tag: &BasicBlockTag,
        parameters: Vec<BlockParameter>,
    ) -> BasicBlock {
        let data = self.block_data(tag);
        let old_tags: FxHashSet<&ValueTag> = data.parameters.iter().map(|p| &p.tag).collect();

        let mut graph = self.clone();
        let mut new_tags = FxHashSet::default();
        for parameter in &parameters {
            ir_contract!(
                new_tags.insert(parameter.tag.clone()),
                "parameter {} appears twice in block {tag}",
                parameter.tag
            );
            if !old_tags.contains(&parameter.tag) {
                ir_contract!(
                    !self.contains_value(&parameter.tag),
                    "value {} is already defined in this graph",
                    parameter.tag
                );
                graph.value_parents = graph.value_parents.insert(parameter.tag.clone(), tag.clone());
            }
            if self.block_parameters.get(&parameter.tag) != Some(&parameter.ty) {
                graph.block_parameters = graph
                    .block_parameters
                    .insert(parameter.tag.clone(), parameter.ty.clone());
            }
        }
        for old in &data.parameters {
            if !new_tags.contains(&old.tag) {
                graph.value_parents = graph.value_parents.remove(&old.tag);
                graph.block_parameters = graph.block_parameters.remove(&old.tag);
            }
        }

        let new_data = Arc::new(BasicBlockData {
            parameters,
            instruction_tags: data.instruction_tags.clone(),
            flow: data.flow.clone(),
        });
        graph.blocks = graph.blocks.insert(tag.clone(), Arc::clone(&new_data));
        let graph = graph.with_update(FlowGraphUpdate::BasicBlockParameters(tag.clone()));
        BasicBlock::new(graph, tag.clone(), new_data)
    }

    // ------------------------------------------------------------
    // Instructions
    // ------------------------------------------------------------

    /// Inserts `instruction` under `tag` at position `index` of `block_tag`.
    /// `tag` must not be defined anywhere in this graph yet.
    pub fn insert_instruction_in_basic_block(
        &self,
        block_tag: &BasicBlockTag,
        instruction: Instruction,
        tag: ValueTag,
        index: usize,
    ) -> SelectedInstruction {
        ir_contract!(
            !self.contains_value(&tag),
            "value {tag} is already defined in this graph"
        );
        let data = self.block_data(block_tag);
        ir_contract!(
            index <= data.instruction_tags.len(),
            "cannot insert at index {index} of block {block_tag}, which has {} instruction(s)",
            data.instruction_tags.len()
        );

        let mut instruction_tags = data.instruction_tags.clone();
        instruction_tags.insert(index, tag.clone());
        let new_data = Arc::new(BasicBlockData {
            parameters: data.parameters.clone(),
            instruction_tags,
            flow: data.flow.clone(),
        });

        let mut graph = self.clone();
        graph.blocks = graph.blocks.insert(block_tag.clone(), Arc::clone(&new_data));
        graph.instructions = graph.instructions.insert(tag.clone(), instruction.clone());
        graph.value_parents = graph.value_parents.insert(tag.clone(), block_tag.clone());
        let graph = graph.with_update(FlowGraphUpdate::AddInstruction {
            tag: tag.clone(),
            instruction: instruction.clone(),
        });

        let block = BasicBlock::new(graph, block_tag.clone(), new_data);
        SelectedInstruction::with_index(block, tag, instruction, index)
    }

    pub fn remove_instruction(&self, tag: &ValueTag) -> FlowGraph {
        let old_instruction = self.instruction_data(tag).clone();
        let parent = self.value_parent_tag(tag).clone();
        let data = self.block_data(&parent);

        let new_data = Arc::new(BasicBlockData {
            parameters: data.parameters.clone(),
            instruction_tags: data
                .instruction_tags
                .iter()
                .filter(|t| *t != tag)
                .cloned()
                .collect(),
            flow: data.flow.clone(),
        });

        let mut graph = self.clone();
        graph.blocks = graph.blocks.insert(parent, new_data);
        graph.instructions = graph.instructions.remove(tag);
        graph.value_parents = graph.value_parents.remove(tag);
        graph.with_update(FlowGraphUpdate::RemoveInstruction {
            tag: tag.clone(),
            old_instruction,
        })
    }

    /// Replaces the instruction defined by `tag`. The tag keeps its block and position.
    pub fn replace_instruction(&self, tag: &ValueTag, instruction: Instruction) -> SelectedInstruction {
        let old_instruction = self.instruction_data(tag).clone();
        if old_instruction == instruction {
            return self.get_instruction(tag);
        }

        let mut graph = self.clone();
        graph.instructions = graph.instructions.insert(tag.clone(), instruction.clone());
        let graph = graph.with_update(FlowGraphUpdate::ReplaceInstruction {
            tag: tag.clone(),
            old_instruction,
            instruction,
        });
        graph.get_instruction(tag)
    }

    // ------------------------------------------------------------
    // Bulk rewrites
    // ------------------------------------------------------------

    fn value_uses(&self) -> Arc<ValueUses> {
        self.try_get_analysis_result::<ValueUses>()
            .unwrap_or_else(|| Arc::new(ValueUseAnalysis.analyze(self)))
    }

    /// Substitutes values in instruction arguments and branch arguments.
    /// Only sites that actually read a replaced value are rebuilt. The mapping
    /// is applied once, not transitively.
    pub fn replace_uses(&self, replacements: &FxHashMap<ValueTag, ValueTag>) -> FlowGraph {
        if replacements.is_empty() {
            return self.clone();
        }

        let uses = self.value_uses();
        let mut instruction_users = FxHashSet::default();
        let mut flow_users = FxHashSet::default();
        for value in replacements.keys() {
            instruction_users.extend(uses.instruction_users(value).cloned());
            flow_users.extend(uses.flow_users(value).cloned());
        }

        let mut instruction_users: Vec<ValueTag> = instruction_users.into_iter().collect();
        instruction_users.sort();
        let mut flow_users: Vec<BasicBlockTag> = flow_users.into_iter().collect();
        flow_users.sort();

        let mut graph = self.clone();
        for tag in &instruction_users {
            let instruction = graph.instruction_data(tag).map_arguments_from(replacements);
            graph = graph.replace_instruction(tag, instruction).into_graph();
        }
        for block in &flow_users {
            let flow = graph.block_data(block).flow.map_values_from(replacements);
            graph = graph.update_basic_block_flow(block, flow).into_graph();
        }
        graph
    }

    /// Removes block parameters and named instructions.
    ///
    /// Removing a parameter also drops the argument zipped with it from every
    /// branch that targets its block. A branch whose argument count does not
    /// match the target's parameters keeps only the zipped prefix, so surplus
    /// arguments are dropped too. Nothing checks that removed values are
    /// unused.
    ///
    /// # Panics
    ///
    /// If a value is defined nowhere in this graph.
    pub fn remove_definitions<'a>(&self, values: impl IntoIterator<Item = &'a ValueTag>) -> FlowGraph {
        let mut instructions = Vec::new();
        let mut parameters_by_block: FxHashMap<BasicBlockTag, FxHashSet<ValueTag>> =
            FxHashMap::default();
        for value in values {
            if self.contains_instruction(value) {
                instructions.push(value.clone());
            } else if self.contains_block_parameter(value) {
                parameters_by_block
                    .entry(self.value_parent_tag(value).clone())
                    .or_default()
                    .insert(value.clone());
            } else {
                ir_contract_violation!("value {value} is not defined in this graph");
            }
        }

        let mut graph = self.clone();
        if !parameters_by_block.is_empty() {
            // Drop the argument slots first, while the old parameter lists are still known
            for block in self.basic_blocks() {
                let flow = block.flow();
                if !flow
                    .branches()
                    .iter()
                    .any(|branch| parameters_by_block.contains_key(&branch.target))
                {
                    continue;
                }
                let new_flow = flow.map_branches(|branch| {
                    let Some(removed) = parameters_by_block.get(&branch.target) else {
                        return branch.clone();
                    };
                    let target = self.block_data(&branch.target);
                    let arguments = target
                        .parameters
                        .iter()
                        .zip(&branch.arguments)
                        .filter(|(parameter, _)| !removed.contains(&parameter.tag))
                        .map(|(_, argument)| argument.clone())
                        .collect();
                    branch.with_arguments(arguments)
                });
                graph = graph.update_basic_block_flow(block.tag(), new_flow).into_graph();
            }

            let mut blocks: Vec<&BasicBlockTag> = parameters_by_block.keys().collect();
            blocks.sort();
            for block in blocks {
                let removed = &parameters_by_block[block];
                let parameters = graph
                    .block_data(block)
                    .parameters
                    .iter()
                    .filter(|parameter| !removed.contains(&parameter.tag))
                    .cloned()
                    .collect();
                graph = graph.update_basic_block_parameters(block, parameters).into_graph();
            }
        }

        graph.remove_instruction_definitions(&instructions)
    }

    /// Removes named instructions only.
    ///
    /// # Panics
    ///
    /// If any value is a block parameter or is not defined in this graph.
    /// Callers holding a mix of both use `remove_definitions`.
    pub fn remove_instruction_definitions<'a>(
        &self,
        values: impl IntoIterator<Item = &'a ValueTag>,
    ) -> FlowGraph {
        let mut by_block: FxHashMap<BasicBlockTag, FxHashSet<ValueTag>> = FxHashMap::default();
        let mut removed = Vec::new();
        for value in values {
            if self.contains_block_parameter(value) {
                ir_contract_violation!(
                    "value {value} is a block parameter, not an instruction; use remove_definitions to remove parameters"
                );
            }
            let parent = self.value_parent_tag(value).clone();
            if by_block.entry(parent).or_default().insert(value.clone()) {
                removed.push(value.clone());
            }
        }
        if removed.is_empty() {
            return self.clone();
        }

        let mut graph = self.clone();
        for (block, tags) in &by_block {
            let data = self.block_data(block);
            let new_data = Arc::new(BasicBlockData {
                parameters: data.parameters.clone(),
                instruction_tags: data
                    .instruction_tags
                    .iter()
                    .filter(|t| !tags.contains(*t))
                    .cloned()
                    .collect(),
                flow: data.flow.clone(),
            });
            graph.blocks = graph.blocks.insert(block.clone(), new_data);
        }
        for tag in removed {
            let old_instruction = self.instruction_data(&tag).clone();
            graph.instructions = graph.instructions.remove(&tag);
            graph.value_parents = graph.value_parents.remove(&tag);
            graph = graph.with_update(FlowGraphUpdate::RemoveInstruction {
                tag,
                old_instruction,
            });
        }
        graph
    }

    /// Applies a type and member substitution to every instruction, flow
    /// instruction and block parameter.
    pub fn map(&self, mapping: &MemberMapping) -> FlowGraph {
        let mut graph = self.clone();
        graph.instructions = self
            .instructions
            .iter()
            .map(|(tag, instruction)| (tag.clone(), instruction.map(mapping)))
            .collect();
        graph.block_parameters = self
            .block_parameters
            .iter()
            .map(|(tag, ty)| (tag.clone(), mapping.map_type(ty)))
            .collect();
        graph.blocks = self
            .blocks
            .iter()
            .map(|(tag, data)| {
                let data = BasicBlockData {
                    parameters: data
                        .parameters
                        .iter()
                        .map(|p| BlockParameter::with_tag(mapping.map_type(&p.ty), p.tag.clone()))
                        .collect(),
                    instruction_tags: data.instruction_tags.clone(),
                    flow: data.flow.map_instructions(|insn| insn.map(mapping)),
                };
                (tag.clone(), Arc::new(data))
            })
            .collect();
        graph.with_update(FlowGraphUpdate::MapMembers)
    }

    pub fn transform(&self, optimization: &dyn IntraproceduralOptimization) -> FlowGraph {
        optimization.apply(self.clone())
    }

    /// Applies each optimization in order.
    pub fn transform_all(&self, optimizations: &[&dyn IntraproceduralOptimization]) -> FlowGraph {
        optimizations
            .iter()
            .fold(self.clone(), |graph, optimization| optimization.apply(graph))
    }

    // ------------------------------------------------------------
    // Analyses
    // ------------------------------------------------------------

    /// Registers `analysis` on the new graph, replacing any analysis that
    /// produces the same result type. The receiver keeps its own analyses.
    pub fn with_analysis<T: Send + Sync + 'static>(
        &self,
        analysis: impl FlowGraphAnalysis<T>,
    ) -> FlowGraph {
        let mut graph = self.clone();
        graph.analysis_cache = self.analysis_cache.with_analysis::<T>(Arc::new(analysis));
        graph
    }

    pub fn has_analysis_for<T: Send + Sync + 'static>(&self) -> bool {
        self.analysis_cache.has_analysis_for::<T>()
    }

    pub fn get_analysis_for<T: Send + Sync + 'static>(&self) -> Arc<dyn FlowGraphAnalysis<T>> {
        match self.analysis_cache.get_analysis_for::<T>() {
            Some(analysis) => analysis,
            None => ir_contract_violation!(
                "no analysis registered for {}",
                std::any::type_name::<T>()
            ),
        }
    }

    pub fn try_get_analysis_result<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.analysis_cache.get_result::<T>(self)
    }

    pub fn get_analysis_result<T: Send + Sync + 'static>(&self) -> Arc<T> {
        match self.try_get_analysis_result::<T>() {
            Some(result) => result,
            None => ir_contract_violation!(
                "no analysis registered for {}",
                std::any::type_name::<T>()
            ),
        }
    }
}
