pub mod analysis;
pub mod basic_block;
pub mod block_flow;
pub mod branch;
pub mod builders;
pub mod collections;
pub mod constants;
pub mod flow_graph;
pub mod flow_graph_update;
pub mod instruction;
pub mod intrinsics;
pub mod ir_display;
pub mod ir_messages;
pub mod method_body;
pub mod optimizers;
pub mod selected_instruction;
pub mod tags;
pub mod types;

#[cfg(test)]
mod tests;
