use crate::ir::block_flow::BlockFlow;
use crate::ir::flow_graph::FlowGraph;
use crate::ir::instruction::Instruction;
use crate::ir::selected_instruction::SelectedInstruction;
use crate::ir::tags::{BasicBlockTag, ValueTag};
use crate::ir::types::IrType;
use crate::ir_contract;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// A block parameter: the block's equivalent of a phi input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlockParameter {
    pub tag: ValueTag,
    pub ty: IrType,
}

impl BlockParameter {
    /// A parameter with a fresh tag.
    pub fn new(ty: IrType, name: &str) -> BlockParameter {
        BlockParameter {
            tag: ValueTag::new(name),
            ty,
        }
    }

    pub fn with_tag(ty: IrType, tag: ValueTag) -> BlockParameter {
        BlockParameter { tag, ty }
    }
}

/// The immutable contents of a block, shared between graph versions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BasicBlockData {
    pub(crate) parameters: Vec<BlockParameter>,
    pub(crate) instruction_tags: Vec<ValueTag>,
    pub(crate) flow: BlockFlow,
}

/// A read-only view of one block inside one graph version.
///
/// Every "mutator" here leaves this view and its graph untouched and returns
/// a view of the same block in a new graph.
#[derive(Clone)]
pub struct BasicBlock {
    graph: FlowGraph,
    tag: BasicBlockTag,
    data: Arc<BasicBlockData>,
}

impl BasicBlock {
    pub(crate) fn new(graph: FlowGraph, tag: BasicBlockTag, data: Arc<BasicBlockData>) -> Self {
        BasicBlock { graph, tag, data }
    }

    pub fn tag(&self) -> &BasicBlockTag {
        &self.tag
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn into_graph(self) -> FlowGraph {
        self.graph
    }

    pub fn parameters(&self) -> &[BlockParameter] {
        &self.data.parameters
    }

    pub fn parameter_tags(&self) -> Vec<ValueTag> {
        self.data.parameters.iter().map(|p| p.tag.clone()).collect()
    }

    pub fn instruction_tags(&self) -> &[ValueTag] {
        &self.data.instruction_tags
    }

    pub fn flow(&self) -> &BlockFlow {
        &self.data.flow
    }

    pub fn is_entry_point(&self) -> bool {
        self.graph.entry_point_tag() == &self.tag
    }

    /// The block's instructions in execution order.
    pub fn named_instructions(&self) -> Vec<SelectedInstruction> {
        self.data
            .instruction_tags
            .iter()
            .enumerate()
            .map(|(index, tag)| {
                SelectedInstruction::with_index(
                    self.clone(),
                    tag.clone(),
                    self.graph.instruction_data(tag).clone(),
                    index,
                )
            })
            .collect()
    }

    pub fn with_flow(&self, flow: BlockFlow) -> BasicBlock {
        self.graph.update_basic_block_flow(&self.tag, flow)
    }

    pub fn with_parameters(&self, parameters: Vec<BlockParameter>) -> BasicBlock {
        self.graph.update_basic_block_parameters(&self.tag, parameters)
    }

    pub fn append_parameter(&self, parameter: BlockParameter) -> BasicBlock {
        let mut parameters = self.data.parameters.clone();
        parameters.push(parameter);
        self.with_parameters(parameters)
    }

    /// Appends `instruction` under `tag`. Pass a `&str` to create a fresh, named tag.
    pub fn append_instruction(
        &self,
        instruction: Instruction,
        tag: impl Into<ValueTag>,
    ) -> SelectedInstruction {
        self.insert_instruction(self.data.instruction_tags.len(), instruction, tag)
    }

    pub fn insert_instruction(
        &self,
        index: usize,
        instruction: Instruction,
        tag: impl Into<ValueTag>,
    ) -> SelectedInstruction {
        self.graph
            .insert_instruction_in_basic_block(&self.tag, instruction, tag.into(), index)
    }

    pub fn remove_instruction(&self, tag: &ValueTag) -> BasicBlock {
        ir_contract!(
            self.data.instruction_tags.contains(tag),
            "block {} does not define instruction {}",
            self.tag,
            tag
        );
        self.graph.remove_instruction(tag).get_basic_block(&self.tag)
    }

    /// Splices `source`'s instructions into this block at `insertion_index`.
    ///
    /// Every spliced instruction gets a fresh tag with the same name, and
    /// `source`'s parameters are replaced positionally by `arguments`.
    /// Returns the updated block and `source`'s flow with the renaming applied.
    pub fn copy_instructions_from(
        &self,
        insertion_index: usize,
        source: &BasicBlock,
        arguments: &[ValueTag],
    ) -> (BasicBlock, BlockFlow) {
        ir_contract!(
            source.parameters().len() == arguments.len(),
            "block {} takes {} parameter(s) but {} argument(s) were supplied",
            source.tag(),
            source.parameters().len(),
            arguments.len()
        );

        let mut renaming: FxHashMap<ValueTag, ValueTag> = source
            .parameter_tags()
            .into_iter()
            .zip(arguments.iter().cloned())
            .collect();
        for tag in source.instruction_tags() {
            renaming.insert(tag.clone(), tag.renamed());
        }

        let mut graph = self.graph.clone();
        for (offset, selected) in source.named_instructions().iter().enumerate() {
            let instruction = selected.instruction().map_arguments_from(&renaming);
            graph = graph
                .insert_instruction_in_basic_block(
                    &self.tag,
                    instruction,
                    renaming[selected.tag()].clone(),
                    insertion_index + offset,
                )
                .into_graph();
        }

        (
            graph.get_basic_block(&self.tag),
            source.flow().map_values_from(&renaming),
        )
    }
}

impl PartialEq for BasicBlock {
    fn eq(&self, other: &Self) -> bool {
        self.tag == other.tag && *self.data == *other.data
    }
}

impl std::fmt::Debug for BasicBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicBlock")
            .field("tag", &self.tag)
            .field("parameters", &self.data.parameters)
            .field("instruction_tags", &self.data.instruction_tags)
            .field("flow", &self.data.flow)
            .finish()
    }
}
