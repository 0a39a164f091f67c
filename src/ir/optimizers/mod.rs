pub mod constant_folding;
pub mod copy_propagation;
pub mod dead_block_elimination;
pub mod dead_value_elimination;
pub mod optimization;
pub mod pass_pipeline;

pub use constant_folding::ConstantFolding;
pub use copy_propagation::CopyPropagation;
pub use dead_block_elimination::DeadBlockElimination;
pub use dead_value_elimination::DeadValueElimination;
pub use optimization::{IntraproceduralOptimization, known_passes, pass_by_name};
pub use pass_pipeline::PassPipeline;
