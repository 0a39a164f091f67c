use crate::ir::ir_messages::ir_errors::{IrError, IrMessages};
use crate::ir::method_body::{BodyMethod, MethodBody};
use crate::ir::optimizers::optimization::{IntraproceduralOptimization, pass_by_name};
use crate::settings::PipelineConfig;
use crate::{pass_log, return_config_error, timer_log};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;

/// An ordered list of passes, run to a fixed point or until the iteration
/// limit, optionally validating the body after every pass.
#[derive(Clone)]
pub struct PassPipeline {
    passes: Vec<Arc<dyn IntraproceduralOptimization>>,
    verify_after_each_pass: bool,
    max_iterations: usize,
}

impl PassPipeline {
    /// Runs each pass once, without validation.
    pub fn new(passes: Vec<Arc<dyn IntraproceduralOptimization>>) -> PassPipeline {
        PassPipeline {
            passes,
            verify_after_each_pass: false,
            max_iterations: 1,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<PassPipeline, IrError> {
        if config.max_iterations == 0 {
            return_config_error!("pipeline.max_iterations must be at least 1", {
                ConfigKey => "pipeline.max_iterations",
            });
        }

        let mut passes = Vec::with_capacity(config.passes.len());
        for name in &config.passes {
            match pass_by_name(name) {
                Some(pass) => passes.push(pass),
                None => return_config_error!(format!("Unknown optimization pass '{name}'"), {
                    ConfigKey => "pipeline.passes",
                    PrimarySuggestion => "Known passes are copy-propagation, constant-folding, dead-value-elimination and dead-block-elimination",
                }),
            }
        }

        Ok(PassPipeline {
            passes,
            verify_after_each_pass: config.verify_after_each_pass,
            max_iterations: config.max_iterations,
        })
    }

    pub fn with_verification(mut self, verify_after_each_pass: bool) -> PassPipeline {
        self.verify_after_each_pass = verify_after_each_pass;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> PassPipeline {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    pub fn optimize(&self, body: &MethodBody) -> Result<MethodBody, IrMessages> {
        let mut graph = body.implementation.clone();

        for _ in 0..self.max_iterations {
            let before = graph.clone();

            for pass in &self.passes {
                let time = Instant::now();
                graph = pass.apply(graph);
                timer_log!(time, "Pass finished in: ");

                if self.verify_after_each_pass {
                    let diagnostics = body.with_implementation(graph.clone()).validate();
                    if !diagnostics.is_empty() {
                        let mut messages = IrMessages::new();
                        for diagnostic in diagnostics {
                            messages.push(IrError::conformance_error(diagnostic, pass.name()));
                        }
                        return Err(messages);
                    }
                }
            }

            if graph.structurally_equals(&before) {
                pass_log!("Pipeline reached a fixed point");
                break;
            }
        }

        Ok(body.with_implementation(graph))
    }

    /// Optimizes independent bodies in parallel. Results are in input order.
    pub fn optimize_all(&self, bodies: &[MethodBody]) -> Vec<Result<MethodBody, IrMessages>> {
        let time = Instant::now();
        let results = bodies.par_iter().map(|body| self.optimize(body)).collect();
        timer_log!(time, "All bodies optimized in: ");
        results
    }

    /// Optimizes the body of every method that has one. Methods without a
    /// body map to `Ok(None)`.
    pub fn optimize_methods<M: BodyMethod + Sync>(
        &self,
        methods: &[M],
    ) -> Vec<Result<Option<MethodBody>, IrMessages>> {
        methods
            .par_iter()
            .map(|method| {
                pass_log!("Optimizing ", method.name());
                method.body().map(|body| self.optimize(body)).transpose()
            })
            .collect()
    }
}
