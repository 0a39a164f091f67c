//! A persistent control-flow graph IR for compiler middle ends.
//!
//! Graphs are immutable values: every edit returns a new graph that shares
//! untouched structure with the old one. Builders offer a mutable-looking
//! façade over the same snapshots, and analyses are cached per snapshot and
//! patched incrementally as graphs are edited.

pub mod ir;
pub mod settings;

pub use ir::analysis::{AnalysisCache, ConstantAnalysis, FlowGraphAnalysis};
pub use ir::basic_block::{BasicBlock, BlockParameter};
pub use ir::block_flow::{BlockFlow, ReturnFlow, SwitchCase, SwitchFlow, TryFlow};
pub use ir::branch::{Branch, BranchArgument};
pub use ir::builders::{BasicBlockBuilder, FlowGraphBuilder, FlowInstructionBuilder, InstructionBuilder};
pub use ir::constants::Constant;
pub use ir::flow_graph::FlowGraph;
pub use ir::flow_graph_update::FlowGraphUpdate;
pub use ir::instruction::{Instruction, InstructionPrototype, IntrinsicPrototype, MethodLookup};
pub use ir::ir_messages::ir_errors::{ErrorMetaDataKey, ErrorType, IrError, IrMessages};
pub use ir::method_body::{BodyMethod, MethodBody};
pub use ir::optimizers::{IntraproceduralOptimization, PassPipeline};
pub use ir::selected_instruction::SelectedInstruction;
pub use ir::tags::{BasicBlockTag, ValueTag};
pub use ir::types::{FieldRef, IntSpec, IrType, MemberMapping, MethodRef, Parameter, PointerKind};
pub use settings::{IrConfig, PipelineConfig};
