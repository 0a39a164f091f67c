pub mod analysis_cache;
pub mod block_predecessors;
pub mod block_reachability;
pub mod effectful_instructions;
pub mod value_uses;

pub use analysis_cache::{AnalysisCache, ConstantAnalysis, FlowGraphAnalysis};
pub use block_predecessors::{BasicBlockPredecessors, PredecessorAnalysis};
pub use block_reachability::{BlockReachability, BlockReachabilityAnalysis};
pub use effectful_instructions::{EffectfulInstructionAnalysis, EffectfulInstructions};
pub use value_uses::{ValueUseAnalysis, ValueUses};

use std::sync::Arc;

/// The analyses every new flow graph starts with.
pub fn default_analyses() -> AnalysisCache {
    AnalysisCache::new()
        .with_analysis::<ValueUses>(Arc::new(ValueUseAnalysis))
        .with_analysis::<BasicBlockPredecessors>(Arc::new(PredecessorAnalysis))
        .with_analysis::<BlockReachability>(Arc::new(BlockReachabilityAnalysis))
        .with_analysis::<EffectfulInstructions>(Arc::new(EffectfulInstructionAnalysis))
}
