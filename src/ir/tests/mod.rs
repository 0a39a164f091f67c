mod test_support;

mod basic_block_tests;
mod config_tests;
mod flow_graph_tests;
mod optimizer_tests;
