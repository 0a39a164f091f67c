//! ============================================================
//!                        Block Flow
//! ============================================================
//! The terminator of a basic block. A flow owns zero or one anonymous
//! instruction (the returned value, the switch scrutinee, the guarded try
//! instruction) and any number of outgoing branches.
//!
//! Flow instructions are not named: they have no value tag and cannot be
//! referenced by other instructions. `TryResult` and `TryException` branch
//! arguments are how a try flow hands its outcome to its successors.
//!
//! Every operation here is pure and returns a new flow.

use crate::ir::branch::{Branch, BranchArgument};
use crate::ir::constants::Constant;
use crate::ir::instruction::Instruction;
use crate::ir::tags::{BasicBlockTag, ValueTag};
use crate::ir_contract;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;
use std::slice;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReturnFlow {
    pub return_value: Instruction,
}

impl ReturnFlow {
    pub fn new(return_value: Instruction) -> ReturnFlow {
        ReturnFlow { return_value }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SwitchCase {
    pub values: Vec<Constant>,
    pub branch: Branch,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SwitchFlow {
    pub switch_value: Instruction,
    pub cases: Vec<SwitchCase>,
    pub default_branch: Branch,
}

impl SwitchFlow {
    /// The branch taken when the switch value equals `value`.
    pub fn branch_for(&self, value: &Constant) -> &Branch {
        self.cases
            .iter()
            .find(|case| case.values.contains(value))
            .map_or(&self.default_branch, |case| &case.branch)
    }

    pub fn is_if_else(&self) -> bool {
        self.cases.len() == 1
            && self.cases[0].values.len() == 1
            && self.cases[0].values[0] == Constant::Bool(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TryFlow {
    pub instruction: Instruction,
    pub success_branch: Branch,
    pub exception_branch: Branch,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum BlockFlow {
    #[default]
    Unreachable,
    Return(ReturnFlow),
    Jump(Branch),
    Switch(SwitchFlow),
    Try(TryFlow),
}

impl BlockFlow {
    // --------------------------------------------------------
    // Constructors
    // --------------------------------------------------------

    pub fn return_value(value: Instruction) -> BlockFlow {
        BlockFlow::Return(ReturnFlow::new(value))
    }

    pub fn jump(branch: Branch) -> BlockFlow {
        BlockFlow::Jump(branch)
    }

    pub fn jump_to(target: BasicBlockTag) -> BlockFlow {
        BlockFlow::Jump(Branch::to(target))
    }

    pub fn switch(switch_value: Instruction, cases: Vec<SwitchCase>, default_branch: Branch) -> BlockFlow {
        BlockFlow::Switch(SwitchFlow {
            switch_value,
            cases,
            default_branch,
        })
    }

    /// `if condition { if_branch } else { else_branch }` as a switch on `false`.
    pub fn if_else(condition: Instruction, if_branch: Branch, else_branch: Branch) -> BlockFlow {
        BlockFlow::switch(
            condition,
            vec![SwitchCase {
                values: vec![Constant::Bool(false)],
                branch: else_branch,
            }],
            if_branch,
        )
    }

    pub fn try_flow(instruction: Instruction, success_branch: Branch, exception_branch: Branch) -> BlockFlow {
        BlockFlow::Try(TryFlow {
            instruction,
            success_branch,
            exception_branch,
        })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            BlockFlow::Unreachable => "unreachable",
            BlockFlow::Return(_) => "return",
            BlockFlow::Jump(_) => "jump",
            BlockFlow::Switch(_) => "switch",
            BlockFlow::Try(_) => "try",
        }
    }

    // --------------------------------------------------------
    // Instructions
    // --------------------------------------------------------

    pub fn instructions(&self) -> &[Instruction] {
        match self {
            BlockFlow::Unreachable | BlockFlow::Jump(_) => &[],
            BlockFlow::Return(flow) => slice::from_ref(&flow.return_value),
            BlockFlow::Switch(flow) => slice::from_ref(&flow.switch_value),
            BlockFlow::Try(flow) => slice::from_ref(&flow.instruction),
        }
    }

    fn instructions_mut(&mut self) -> &mut [Instruction] {
        match self {
            BlockFlow::Unreachable | BlockFlow::Jump(_) => &mut [],
            BlockFlow::Return(flow) => slice::from_mut(&mut flow.return_value),
            BlockFlow::Switch(flow) => slice::from_mut(&mut flow.switch_value),
            BlockFlow::Try(flow) => slice::from_mut(&mut flow.instruction),
        }
    }

    /// Replaces the flow's instructions. The count must match `instructions()`.
    pub fn with_instructions(&self, instructions: Vec<Instruction>) -> BlockFlow {
        let mut flow = self.clone();
        let slots = flow.instructions_mut();
        ir_contract!(
            slots.len() == instructions.len(),
            "{} flow holds {} instruction(s), not {}",
            self.kind_name(),
            slots.len(),
            instructions.len()
        );
        for (slot, instruction) in slots.iter_mut().zip(instructions) {
            *slot = instruction;
        }
        flow
    }

    pub fn map_instructions(&self, mut f: impl FnMut(&Instruction) -> Instruction) -> BlockFlow {
        let mut flow = self.clone();
        for slot in flow.instructions_mut() {
            *slot = f(slot);
        }
        flow
    }

    // --------------------------------------------------------
    // Branches
    // --------------------------------------------------------

    pub fn branches(&self) -> Vec<&Branch> {
        match self {
            BlockFlow::Unreachable | BlockFlow::Return(_) => Vec::new(),
            BlockFlow::Jump(branch) => vec![branch],
            BlockFlow::Switch(flow) => flow
                .cases
                .iter()
                .map(|case| &case.branch)
                .chain(std::iter::once(&flow.default_branch))
                .collect(),
            BlockFlow::Try(flow) => vec![&flow.success_branch, &flow.exception_branch],
        }
    }

    fn branches_mut(&mut self) -> Vec<&mut Branch> {
        match self {
            BlockFlow::Unreachable | BlockFlow::Return(_) => Vec::new(),
            BlockFlow::Jump(branch) => vec![branch],
            BlockFlow::Switch(flow) => flow
                .cases
                .iter_mut()
                .map(|case| &mut case.branch)
                .chain(std::iter::once(&mut flow.default_branch))
                .collect(),
            BlockFlow::Try(flow) => vec![&mut flow.success_branch, &mut flow.exception_branch],
        }
    }

    /// Replaces the flow's branches, in `branches()` order. The count must match.
    pub fn with_branches(&self, branches: Vec<Branch>) -> BlockFlow {
        let mut flow = self.clone();
        let mut slots = flow.branches_mut();
        ir_contract!(
            slots.len() == branches.len(),
            "{} flow has {} branch(es), not {}",
            self.kind_name(),
            slots.len(),
            branches.len()
        );
        for (slot, branch) in slots.iter_mut().zip(branches) {
            **slot = branch;
        }
        flow
    }

    pub fn map_branches(&self, mut f: impl FnMut(&Branch) -> Branch) -> BlockFlow {
        let mut flow = self.clone();
        for slot in flow.branches_mut() {
            *slot = f(slot);
        }
        flow
    }

    pub fn map_arguments(&self, mut f: impl FnMut(&BranchArgument) -> BranchArgument) -> BlockFlow {
        self.map_branches(|branch| branch.map_arguments(&mut f))
    }

    /// Distinct branch targets, in branch order.
    pub fn branch_targets(&self) -> Vec<BasicBlockTag> {
        let mut seen = FxHashSet::default();
        self.branches()
            .into_iter()
            .filter(|branch| seen.insert(branch.target.clone()))
            .map(|branch| branch.target.clone())
            .collect()
    }

    /// Whether `argument` may appear on the branch at `branch_index`.
    pub fn allows_argument_on_branch(&self, branch_index: usize, argument: &BranchArgument) -> bool {
        match (self, argument) {
            (_, BranchArgument::Value(_)) => true,
            (BlockFlow::Try(_), BranchArgument::TryResult) => branch_index == 0,
            (BlockFlow::Try(_), BranchArgument::TryException) => branch_index == 1,
            _ => false,
        }
    }

    // --------------------------------------------------------
    // Values
    // --------------------------------------------------------

    /// Every value the flow reads, from its instructions and its branches. Distinct, in order.
    pub fn values(&self) -> Vec<ValueTag> {
        let mut seen = FxHashSet::default();
        self.instructions()
            .iter()
            .flat_map(|insn| insn.arguments().iter())
            .chain(self.branches().into_iter().flat_map(Branch::values))
            .filter(|tag| seen.insert((*tag).clone()))
            .cloned()
            .collect()
    }

    pub fn map_values(&self, mut f: impl FnMut(&ValueTag) -> ValueTag) -> BlockFlow {
        self.map_instructions(|insn| insn.map_arguments(&mut f))
            .map_branches(|branch| branch.map_values(&mut f))
    }

    pub fn map_values_from(&self, mapping: &FxHashMap<ValueTag, ValueTag>) -> BlockFlow {
        self.map_values(|tag| mapping.get(tag).unwrap_or(tag).clone())
    }

    pub fn map_blocks(&self, mut f: impl FnMut(&BasicBlockTag) -> BasicBlockTag) -> BlockFlow {
        self.map_branches(|branch| branch.with_target(f(&branch.target)))
    }

    pub fn map_blocks_from(&self, mapping: &FxHashMap<BasicBlockTag, BasicBlockTag>) -> BlockFlow {
        self.map_blocks(|tag| mapping.get(tag).unwrap_or(tag).clone())
    }
}

impl fmt::Display for BlockFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockFlow::Unreachable => write!(f, "unreachable"),
            BlockFlow::Return(flow) => write!(f, "return {}", flow.return_value),
            BlockFlow::Jump(branch) => write!(f, "jump {branch}"),
            BlockFlow::Switch(flow) => {
                write!(f, "switch {} [", flow.switch_value)?;
                for case in &flow.cases {
                    for value in &case.values {
                        write!(f, "{value}, ")?;
                    }
                    write!(f, "-> {}; ", case.branch)?;
                }
                write!(f, "default -> {}]", flow.default_branch)
            }
            BlockFlow::Try(flow) => write!(
                f,
                "try {} then {} catch {}",
                flow.instruction, flow.success_branch, flow.exception_branch
            ),
        }
    }
}
