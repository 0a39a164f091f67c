use crate::ir::ir_messages::ir_errors::{ErrorMetaDataKey, ErrorType};
use crate::ir::optimizers::PassPipeline;
use crate::settings::{CONFIG_FILE_NAME, DEFAULT_MAX_ITERATIONS, DEFAULT_PIPELINE, IrConfig};
use std::fs;

#[test]
fn empty_config_uses_defaults() {
    let config = IrConfig::from_toml_str("").expect("an empty config is valid");
    assert_eq!(config, IrConfig::default());
    assert_eq!(config.pipeline.passes, DEFAULT_PIPELINE);
    assert_eq!(config.pipeline.max_iterations, DEFAULT_MAX_ITERATIONS);
    assert!(!config.pipeline.verify_after_each_pass);
}

#[test]
fn pipeline_section_overrides_defaults() {
    let config = IrConfig::from_toml_str(
        r#"
        [pipeline]
        passes = ["constant-folding", "dead-block-elimination"]
        verify_after_each_pass = true
        "#,
    )
    .expect("config should parse");

    assert_eq!(config.pipeline.passes, ["constant-folding", "dead-block-elimination"]);
    assert!(config.pipeline.verify_after_each_pass);
    assert_eq!(config.pipeline.max_iterations, DEFAULT_MAX_ITERATIONS);

    let pipeline = PassPipeline::from_config(&config.pipeline).expect("both passes exist");
    assert_eq!(pipeline.pass_names(), ["constant-folding", "dead-block-elimination"]);
}

#[test]
fn unknown_keys_are_rejected() {
    let error = IrConfig::from_toml_str("[pipeline]\nunroll = true\n").expect_err("unknown key");
    assert_eq!(error.error_type, ErrorType::Config);
    assert!(error.msg.starts_with("Could not parse IR config"));
    assert_eq!(error.metadata[&ErrorMetaDataKey::CompilationStage], "Config Parsing");
}

#[test]
fn zero_iterations_is_rejected() {
    let error = IrConfig::from_toml_str("[pipeline]\nmax_iterations = 0\n").expect_err("zero iterations");
    assert_eq!(error.error_type, ErrorType::Config);
    assert_eq!(error.metadata[&ErrorMetaDataKey::ConfigKey], "pipeline.max_iterations");
    assert!(error.metadata.contains_key(&ErrorMetaDataKey::PrimarySuggestion));
}

#[test]
fn load_reads_a_file_or_a_directory() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join(CONFIG_FILE_NAME);
    fs::write(&path, "[pipeline]\nmax_iterations = 2\n").expect("write config");

    let from_file = IrConfig::load(&path).expect("file config loads");
    let from_dir = IrConfig::load(dir.path()).expect("directory config loads");
    assert_eq!(from_file.pipeline.max_iterations, 2);
    assert_eq!(from_file, from_dir);
}

#[test]
fn missing_config_is_a_file_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let error = IrConfig::load(&dir.path().join("missing.toml")).expect_err("nothing to read");
    assert_eq!(error.error_type, ErrorType::File);
    assert!(error.msg.contains("missing.toml"));
}
