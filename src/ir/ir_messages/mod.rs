pub mod ir_dev_logging;
pub mod ir_errors;
