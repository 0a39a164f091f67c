use crate::ir::ir_messages::ir_errors::IrError;
use crate::{return_config_error, return_file_error};
use serde::Deserialize;
use std::path::Path;

pub const ENTRY_POINT_BLOCK_NAME: &str = "entry";
pub const CONFIG_FILE_NAME: &str = "flowgraph.toml";

// The passes run when a config does not name any
pub const DEFAULT_PIPELINE: &[&str] = &[
    "copy-propagation",
    "constant-folding",
    "dead-value-elimination",
    "dead-block-elimination",
];
pub const DEFAULT_MAX_ITERATIONS: usize = 4;

// How many edits an analysis slot will remember before giving up on patching
// and recomputing from scratch. A rough guess, not measured yet.
pub const MAX_ANALYSIS_UPDATE_CHAIN: usize = 256;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IrConfig {
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub passes: Vec<String>,
    pub verify_after_each_pass: bool,

    // Each iteration runs every pass once. Iteration stops early once the graph stops changing
    pub max_iterations: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            passes: DEFAULT_PIPELINE.iter().map(|name| name.to_string()).collect(),
            verify_after_each_pass: false,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl IrConfig {
    pub fn from_toml_str(source: &str) -> Result<IrConfig, IrError> {
        let config: IrConfig = match toml::from_str(source) {
            Ok(config) => config,
            Err(e) => return_config_error!(format!("Could not parse IR config: {e}"), {
                CompilationStage => "Config Parsing",
            }),
        };

        if config.pipeline.max_iterations == 0 {
            return_config_error!("pipeline.max_iterations must be at least 1", {
                ConfigKey => "pipeline.max_iterations",
                PrimarySuggestion => "Set max_iterations = 1 to run every pass exactly once",
            });
        }

        Ok(config)
    }

    /// Loads a config from a file, or from `CONFIG_FILE_NAME` inside it when
    /// `path` is a directory.
    pub fn load(path: &Path) -> Result<IrConfig, IrError> {
        let path = if path.is_dir() {
            path.join(CONFIG_FILE_NAME)
        } else {
            path.to_path_buf()
        };

        let source = match std::fs::read_to_string(&path) {
            Ok(source) => source,
            Err(e) => return_file_error!(format!(
                "Could not read IR config '{}': {e}",
                path.display()
            )),
        };

        IrConfig::from_toml_str(&source)
    }
}
