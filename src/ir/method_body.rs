use crate::ir::block_flow::BlockFlow;
use crate::ir::branch::{Branch, BranchArgument};
use crate::ir::flow_graph::FlowGraph;
use crate::ir::instruction::Instruction;
use crate::ir::types::{MemberMapping, Parameter};

/// A method's signature together with the flow graph that implements it.
#[derive(Clone)]
pub struct MethodBody {
    pub return_parameter: Parameter,
    pub this_parameter: Option<Parameter>,
    pub parameters: Vec<Parameter>,
    pub implementation: FlowGraph,
}

impl MethodBody {
    pub fn new(
        return_parameter: Parameter,
        this_parameter: Option<Parameter>,
        parameters: Vec<Parameter>,
        implementation: FlowGraph,
    ) -> MethodBody {
        MethodBody {
            return_parameter,
            this_parameter,
            parameters,
            implementation,
        }
    }

    pub fn with_implementation(&self, implementation: FlowGraph) -> MethodBody {
        MethodBody {
            implementation,
            ..self.clone()
        }
    }

    /// Applies `mapping` to the signature and to the implementation.
    pub fn map(&self, mapping: &MemberMapping) -> MethodBody {
        MethodBody {
            return_parameter: self.return_parameter.map(mapping),
            this_parameter: self.this_parameter.as_ref().map(|p| p.map(mapping)),
            parameters: self.parameters.iter().map(|p| p.map(mapping)).collect(),
            implementation: self.implementation.map(mapping),
        }
    }

    /// Checks every instruction and branch of the implementation.
    /// An empty list means the body is well formed.
    pub fn validate(&self) -> Vec<String> {
        let graph = &self.implementation;
        let mut errors = Vec::new();

        for selected in graph.named_instructions() {
            self.validate_instruction(selected.instruction(), &mut errors);
        }

        for block in graph.basic_blocks() {
            let flow = block.flow();
            for instruction in flow.instructions() {
                self.validate_instruction(instruction, &mut errors);
            }
            for (index, branch) in flow.branches().into_iter().enumerate() {
                self.validate_branch(branch, index, flow, &mut errors);
            }
        }

        errors
    }

    fn validate_instruction(&self, instruction: &Instruction, errors: &mut Vec<String>) {
        let graph = &self.implementation;
        if instruction
            .arguments()
            .iter()
            .all(|argument| graph.contains_value(argument))
        {
            errors.extend(instruction.validate(self));
        } else {
            errors.push("Instruction argument not in graph.".to_string());
        }
    }

    fn validate_branch(
        &self,
        branch: &Branch,
        branch_index: usize,
        flow: &BlockFlow,
        errors: &mut Vec<String>,
    ) {
        let graph = &self.implementation;
        let Some(target) = graph.try_get_basic_block(&branch.target) else {
            errors.push("Branch to block outside of graph.".to_string());
            return;
        };

        let parameters = target.parameters();
        if parameters.len() != branch.arguments.len() {
            errors.push(format!(
                "Branch argument count ('{}') mismatches target block parameter count ('{}').",
                branch.arguments.len(),
                parameters.len()
            ));
            return;
        }

        for (argument, parameter) in branch.arguments.iter().zip(parameters) {
            match argument {
                BranchArgument::Value(value) => match graph.try_get_value_type(value) {
                    None => errors.push("Branch argument not in graph.".to_string()),
                    Some(found) if found != parameter.ty => errors.push(format!(
                        "Branch argument type '{found}' mismatches target block parameter type '{}'.",
                        parameter.ty
                    )),
                    Some(_) => {}
                },
                _ if !flow.allows_argument_on_branch(branch_index, argument) => {
                    errors.push(format!(
                        "Branch argument kind '{}' is not allowed in this branch of '{}' flow.",
                        argument.kind_name(),
                        flow.kind_name()
                    ));
                }
                _ => {}
            }
        }
    }
}

/// A method that may carry a body.
pub trait BodyMethod {
    fn name(&self) -> &str;

    /// `None` for methods without an implementation, such as abstract or
    /// external methods.
    fn body(&self) -> Option<&MethodBody>;
}
