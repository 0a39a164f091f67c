pub mod basic_block_builder;
pub mod flow_graph_builder;
pub mod flow_instruction_builder;
pub mod instruction_builder;

pub use basic_block_builder::BasicBlockBuilder;
pub use flow_graph_builder::FlowGraphBuilder;
pub use flow_instruction_builder::FlowInstructionBuilder;
pub use instruction_builder::InstructionBuilder;
