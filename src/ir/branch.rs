use crate::ir::flow_graph::FlowGraph;
use crate::ir::tags::{BasicBlockTag, ValueTag};
use crate::ir_contract;
use rustc_hash::FxHashMap;
use std::fmt;

/// One argument passed along a branch to a parameter of the target block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BranchArgument {
    Value(ValueTag),
    /// The result of the block's own terminating try instruction.
    TryResult,
    /// The exception thrown by the block's own terminating try instruction.
    TryException,
}

impl BranchArgument {
    pub fn is_value(&self) -> bool {
        matches!(self, BranchArgument::Value(_))
    }

    pub fn value(&self) -> Option<&ValueTag> {
        match self {
            BranchArgument::Value(tag) => Some(tag),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            BranchArgument::Value(_) => "value",
            BranchArgument::TryResult => "try-result",
            BranchArgument::TryException => "try-exception",
        }
    }

    pub fn map_value(&self, f: impl FnOnce(&ValueTag) -> ValueTag) -> BranchArgument {
        match self {
            BranchArgument::Value(tag) => BranchArgument::Value(f(tag)),
            other => other.clone(),
        }
    }
}

impl From<ValueTag> for BranchArgument {
    fn from(tag: ValueTag) -> Self {
        BranchArgument::Value(tag)
    }
}

impl fmt::Display for BranchArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchArgument::Value(tag) => write!(f, "{tag}"),
            BranchArgument::TryResult => write!(f, "#result"),
            BranchArgument::TryException => write!(f, "#exception"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Branch {
    pub target: BasicBlockTag,
    pub arguments: Vec<BranchArgument>,
}

impl Branch {
    pub fn new(target: BasicBlockTag, arguments: Vec<BranchArgument>) -> Branch {
        Branch { target, arguments }
    }

    /// A branch that passes no arguments.
    pub fn to(target: BasicBlockTag) -> Branch {
        Branch::new(target, Vec::new())
    }

    pub fn with_values(target: BasicBlockTag, values: impl IntoIterator<Item = ValueTag>) -> Branch {
        Branch::new(target, values.into_iter().map(BranchArgument::Value).collect())
    }

    pub fn with_target(&self, target: BasicBlockTag) -> Branch {
        Branch::new(target, self.arguments.clone())
    }

    pub fn with_arguments(&self, arguments: Vec<BranchArgument>) -> Branch {
        Branch::new(self.target.clone(), arguments)
    }

    pub fn map_arguments(&self, f: impl FnMut(&BranchArgument) -> BranchArgument) -> Branch {
        Branch::new(self.target.clone(), self.arguments.iter().map(f).collect())
    }

    pub fn map_values(&self, mut f: impl FnMut(&ValueTag) -> ValueTag) -> Branch {
        self.map_arguments(|arg| arg.map_value(&mut f))
    }

    pub fn values(&self) -> impl Iterator<Item = &ValueTag> {
        self.arguments.iter().filter_map(BranchArgument::value)
    }

    /// Pairs each argument with the target parameter it feeds, by position.
    pub fn zip_arguments_with_parameters(
        &self,
        graph: &FlowGraph,
    ) -> FxHashMap<ValueTag, BranchArgument> {
        let parameters = graph.get_basic_block(&self.target).parameter_tags();
        ir_contract!(
            parameters.len() == self.arguments.len(),
            "branch to {} passes {} argument(s) but the block takes {} parameter(s)",
            self.target,
            self.arguments.len(),
            parameters.len()
        );
        parameters
            .into_iter()
            .zip(self.arguments.iter().cloned())
            .collect()
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.target)?;
        for (i, arg) in self.arguments.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")")
    }
}
