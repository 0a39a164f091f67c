//! Replaces uses of copies by the copied value.
//!
//! Two kinds of value are treated as copies:
//!  - named `copy` instructions
//!  - block parameters outside the entry block whose incoming arguments are all
//!    the same value (ignoring the parameter feeding itself around a loop)
//!
//! The copies themselves stay in the graph. Dead value elimination removes
//! them once nothing reads them.

use crate::ir::analysis::block_predecessors::BasicBlockPredecessors;
use crate::ir::basic_block::BasicBlock;
use crate::ir::branch::BranchArgument;
use crate::ir::flow_graph::FlowGraph;
use crate::ir::optimizers::optimization::IntraproceduralOptimization;
use crate::ir::tags::ValueTag;
use crate::pass_log;
use rustc_hash::FxHashMap;

pub struct CopyPropagation;

impl IntraproceduralOptimization for CopyPropagation {
    fn name(&self) -> &'static str {
        "copy-propagation"
    }

    fn apply(&self, graph: FlowGraph) -> FlowGraph {
        let mut copies: FxHashMap<ValueTag, ValueTag> = FxHashMap::default();

        for selected in graph.named_instructions() {
            if let Some(source) = selected.instruction().as_copy_source() {
                if source != selected.tag() {
                    copies.insert(selected.tag().clone(), source.clone());
                }
            }
        }

        let predecessors = graph.get_analysis_result::<BasicBlockPredecessors>();
        for block in graph.basic_blocks() {
            if block.is_entry_point() || block.parameters().is_empty() {
                continue;
            }
            for (index, parameter) in block.parameters().iter().enumerate() {
                if let Some(value) = single_incoming_value(&graph, &predecessors, &block, index, &parameter.tag) {
                    copies.insert(parameter.tag.clone(), value);
                }
            }
        }

        if copies.is_empty() {
            return graph;
        }

        let replacements: FxHashMap<ValueTag, ValueTag> = copies
            .keys()
            .filter_map(|tag| resolve(&copies, tag).map(|source| (tag.clone(), source)))
            .collect();

        pass_log!("Propagating ", replacements.len(), " copies");
        graph.replace_uses(&replacements)
    }
}

/// The one value every branch into `block` passes to the parameter at `index`.
fn single_incoming_value(
    graph: &FlowGraph,
    predecessors: &BasicBlockPredecessors,
    block: &BasicBlock,
    index: usize,
    parameter: &ValueTag,
) -> Option<ValueTag> {
    let mut incoming: Option<ValueTag> = None;
    let mut has_predecessor = false;

    for predecessor in predecessors.predecessors_of(block.tag()) {
        let predecessor = graph.get_basic_block(predecessor);
        for branch in predecessor.flow().branches() {
            if branch.target != *block.tag() {
                continue;
            }
            has_predecessor = true;
            match branch.arguments.get(index)? {
                BranchArgument::Value(value) if value == parameter => {}
                BranchArgument::Value(value) => match &incoming {
                    None => incoming = Some(value.clone()),
                    Some(existing) if existing == value => {}
                    Some(_) => return None,
                },
                BranchArgument::TryResult | BranchArgument::TryException => return None,
            }
        }
    }

    if has_predecessor { incoming } else { None }
}

/// Follows a chain of copies to the first value that is not itself a copy.
/// Returns `None` for copy cycles.
fn resolve(copies: &FxHashMap<ValueTag, ValueTag>, tag: &ValueTag) -> Option<ValueTag> {
    let mut current = tag;
    for _ in 0..=copies.len() {
        match copies.get(current) {
            Some(next) => current = next,
            None => return Some(current.clone()),
        }
    }
    None
}
