use crate::ir::flow_graph::FlowGraph;
use crate::ir::optimizers::constant_folding::ConstantFolding;
use crate::ir::optimizers::copy_propagation::CopyPropagation;
use crate::ir::optimizers::dead_block_elimination::DeadBlockElimination;
use crate::ir::optimizers::dead_value_elimination::DeadValueElimination;
use std::sync::Arc;

/// A transformation of one method body's flow graph.
pub trait IntraproceduralOptimization: Send + Sync {
    /// The name pipelines use to refer to this pass.
    fn name(&self) -> &'static str;

    fn apply(&self, graph: FlowGraph) -> FlowGraph;
}

/// Every pass a pipeline config can name.
pub fn known_passes() -> Vec<Arc<dyn IntraproceduralOptimization>> {
    vec![
        Arc::new(CopyPropagation),
        Arc::new(ConstantFolding),
        Arc::new(DeadValueElimination),
        Arc::new(DeadBlockElimination),
    ]
}

pub fn pass_by_name(name: &str) -> Option<Arc<dyn IntraproceduralOptimization>> {
    known_passes().into_iter().find(|pass| pass.name() == name)
}
