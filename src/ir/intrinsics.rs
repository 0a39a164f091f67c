//! Named intrinsics.
//!
//! Intrinsics are the open end of the instruction set. Every intrinsic name
//! has the form `<namespace>.<operator>`, and a prototype is identified by
//! that name together with its result and parameter types. The registry
//! knows which operators exist and which signatures they accept, and interns
//! prototypes so equal signatures share one allocation.

use crate::ir::constants::Constant;
use crate::ir::instruction::{Instruction, InstructionPrototype, IntrinsicPrototype};
use crate::ir::ir_messages::ir_errors::IrError;
use crate::ir::tags::ValueTag;
use crate::ir::types::{IntSpec, IrType};
use crate::return_intrinsic_error;
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntrinsicNamespace {
    namespace: &'static str,
}

pub const ARITHMETIC: IntrinsicNamespace = IntrinsicNamespace::new("arith");
pub const ARRAY: IntrinsicNamespace = IntrinsicNamespace::new("array");
pub const OBJECT: IntrinsicNamespace = IntrinsicNamespace::new("object");
pub const EXCEPTION: IntrinsicNamespace = IntrinsicNamespace::new("exception");

impl IntrinsicNamespace {
    pub const fn new(namespace: &'static str) -> IntrinsicNamespace {
        IntrinsicNamespace { namespace }
    }

    pub fn namespace(&self) -> &'static str {
        self.namespace
    }

    pub fn get_intrinsic_name(&self, operator: &str) -> String {
        format!("{}.{}", self.namespace, operator)
    }

    /// Splits `<namespace>.<op>` and returns `op` when the namespace is this one.
    pub fn try_parse_intrinsic_name<'a>(&self, name: &'a str) -> Option<&'a str> {
        let (namespace, operator) = name.rsplit_once('.')?;
        (namespace == self.namespace).then_some(operator)
    }

    pub fn is_intrinsic_name(&self, name: &str) -> bool {
        self.try_parse_intrinsic_name(name).is_some()
    }

    /// The operator name, if `prototype` is an intrinsic from this namespace.
    pub fn operator_of<'a>(&self, prototype: &'a InstructionPrototype) -> Option<&'a str> {
        match prototype {
            InstructionPrototype::Intrinsic(intrinsic) => {
                self.try_parse_intrinsic_name(&intrinsic.name)
            }
            _ => None,
        }
    }
}

pub mod operators {
    pub const ADD: &str = "add";
    pub const SUBTRACT: &str = "sub";
    pub const MULTIPLY: &str = "mul";
    pub const DIVIDE: &str = "div";
    pub const REMAINDER: &str = "rem";
    pub const IS_GREATER_THAN: &str = "gt";
    pub const IS_LESS_THAN: &str = "lt";
    pub const IS_EQUAL_TO: &str = "eq";
    pub const IS_NOT_EQUAL_TO: &str = "neq";
    pub const IS_GREATER_THAN_OR_EQUAL_TO: &str = "gte";
    pub const IS_LESS_THAN_OR_EQUAL_TO: &str = "lte";
    pub const NOT: &str = "not";
    pub const AND: &str = "and";
    pub const OR: &str = "or";
    pub const XOR: &str = "xor";
    pub const LEFT_SHIFT: &str = "shl";
    pub const RIGHT_SHIFT: &str = "shr";
    pub const CONVERT: &str = "convert";

    pub const GET_ELEMENT_POINTER: &str = "get_element_pointer";
    pub const LOAD_ELEMENT: &str = "load_element";
    pub const STORE_ELEMENT: &str = "store_element";
    pub const GET_LENGTH: &str = "get_length";

    pub const UNBOX_ANY: &str = "unbox_any";

    pub const THROW: &str = "throw";
    pub const RETHROW: &str = "rethrow";
    pub const CAPTURE: &str = "capture";
    pub const GET_CAPTURED: &str = "get_captured";
}

pub fn is_relational_operator(operator: &str) -> bool {
    matches!(
        operator,
        operators::IS_GREATER_THAN
            | operators::IS_LESS_THAN
            | operators::IS_EQUAL_TO
            | operators::IS_NOT_EQUAL_TO
            | operators::IS_GREATER_THAN_OR_EQUAL_TO
            | operators::IS_LESS_THAN_OR_EQUAL_TO
    )
}

// ------------------------------------------------------------
// Registry
// ------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrinsicArity {
    Exact(usize),
    AtLeast(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrinsicResultRule {
    Any,
    SameAsFirstParameter,
    Bool,
    Void,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrowRule {
    Never,
    Always,
    /// Integer division by zero throws, float division does not.
    IntegerDivision,
}

#[derive(Debug, Clone, Copy)]
pub struct IntrinsicDefinition {
    pub arity: IntrinsicArity,
    pub result: IntrinsicResultRule,
    pub throws: ThrowRule,
}

impl IntrinsicDefinition {
    pub const fn new(arity: IntrinsicArity, result: IntrinsicResultRule, throws: ThrowRule) -> Self {
        IntrinsicDefinition {
            arity,
            result,
            throws,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IntrinsicKey {
    name: Arc<str>,
    result_type: IrType,
    parameter_types: Arc<[IrType]>,
}

#[derive(Debug, Default)]
pub struct IntrinsicRegistry {
    definitions: FxHashMap<String, IntrinsicDefinition>,
    interned: Mutex<FxHashMap<IntrinsicKey, Arc<InstructionPrototype>>>,
}

impl IntrinsicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The arithmetic, array, object and exception operators.
    pub fn standard() -> Self {
        use IntrinsicArity::*;
        use IntrinsicResultRule::*;
        use operators::*;

        let mut registry = IntrinsicRegistry::new();
        let mut define = |namespace: IntrinsicNamespace, operator: &str, definition| {
            registry
                .definitions
                .insert(namespace.get_intrinsic_name(operator), definition);
        };

        for op in [ADD, SUBTRACT, MULTIPLY, AND, OR, XOR, LEFT_SHIFT, RIGHT_SHIFT] {
            define(ARITHMETIC, op, IntrinsicDefinition::new(Exact(2), SameAsFirstParameter, ThrowRule::Never));
        }
        for op in [DIVIDE, REMAINDER] {
            define(
                ARITHMETIC,
                op,
                IntrinsicDefinition::new(Exact(2), SameAsFirstParameter, ThrowRule::IntegerDivision),
            );
        }
        for op in [
            IS_GREATER_THAN,
            IS_LESS_THAN,
            IS_EQUAL_TO,
            IS_NOT_EQUAL_TO,
            IS_GREATER_THAN_OR_EQUAL_TO,
            IS_LESS_THAN_OR_EQUAL_TO,
        ] {
            define(ARITHMETIC, op, IntrinsicDefinition::new(Exact(2), Bool, ThrowRule::Never));
        }
        define(ARITHMETIC, NOT, IntrinsicDefinition::new(Exact(1), SameAsFirstParameter, ThrowRule::Never));
        define(ARITHMETIC, CONVERT, IntrinsicDefinition::new(Exact(1), Any, ThrowRule::Never));

        define(ARRAY, GET_ELEMENT_POINTER, IntrinsicDefinition::new(AtLeast(2), Any, ThrowRule::Always));
        define(ARRAY, LOAD_ELEMENT, IntrinsicDefinition::new(AtLeast(2), Any, ThrowRule::Always));
        define(ARRAY, STORE_ELEMENT, IntrinsicDefinition::new(AtLeast(3), Any, ThrowRule::Always));
        define(ARRAY, GET_LENGTH, IntrinsicDefinition::new(Exact(1), Any, ThrowRule::Always));

        define(OBJECT, UNBOX_ANY, IntrinsicDefinition::new(Exact(1), Any, ThrowRule::Always));

        define(EXCEPTION, THROW, IntrinsicDefinition::new(Exact(1), Void, ThrowRule::Always));
        define(EXCEPTION, RETHROW, IntrinsicDefinition::new(Exact(1), Void, ThrowRule::Always));
        define(EXCEPTION, CAPTURE, IntrinsicDefinition::new(Exact(1), Any, ThrowRule::Never));
        define(EXCEPTION, GET_CAPTURED, IntrinsicDefinition::new(Exact(1), Any, ThrowRule::Never));

        registry
    }

    /// Adds an operator. Names must be namespaced and not already registered.
    pub fn register(&mut self, name: &str, definition: IntrinsicDefinition) -> Result<(), IrError> {
        if name.rsplit_once('.').is_none_or(|(ns, op)| ns.is_empty() || op.is_empty()) {
            return_intrinsic_error!(
                format!("Intrinsic name '{name}' must have the form '<namespace>.<operator>'."),
                { CompilationStage => "intrinsic registration" }
            );
        }
        if self.definitions.contains_key(name) {
            return_intrinsic_error!(
                format!("Intrinsic '{name}' is already registered."),
                { CompilationStage => "intrinsic registration" }
            );
        }
        self.definitions.insert(name.to_owned(), definition);
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Resolves and interns the prototype for `name` with the given signature.
    pub fn prototype(
        &self,
        name: &str,
        result_type: IrType,
        parameter_types: Vec<IrType>,
    ) -> Result<Arc<InstructionPrototype>, IrError> {
        let Some(definition) = self.definitions.get(name) else {
            return_intrinsic_error!(
                format!("Unknown intrinsic '{name}'."),
                { PrimarySuggestion => "Register the operator with IntrinsicRegistry::register first" }
            );
        };

        let arity_ok = match definition.arity {
            IntrinsicArity::Exact(n) => parameter_types.len() == n,
            IntrinsicArity::AtLeast(n) => parameter_types.len() >= n,
        };
        if !arity_ok {
            return_intrinsic_error!(format!(
                "Intrinsic '{name}' does not accept {} parameter(s).",
                parameter_types.len()
            ));
        }

        let result_ok = match definition.result {
            IntrinsicResultRule::Any => true,
            IntrinsicResultRule::SameAsFirstParameter => parameter_types.first() == Some(&result_type),
            IntrinsicResultRule::Bool => result_type == IrType::Bool,
            IntrinsicResultRule::Void => result_type == IrType::Void,
        };
        if !result_ok {
            return_intrinsic_error!(
                format!("Intrinsic '{name}' cannot produce a value of type '{result_type}'."),
                { CompilationStage => "intrinsic lookup" }
            );
        }

        let may_throw = match definition.throws {
            ThrowRule::Never => false,
            ThrowRule::Always => true,
            ThrowRule::IntegerDivision => parameter_types.iter().any(|t| t.int_spec().is_some()),
        };

        let key = IntrinsicKey {
            name: Arc::from(name),
            result_type,
            parameter_types: parameter_types.into(),
        };

        let mut interned = match self.interned.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let prototype = interned.entry(key.clone()).or_insert_with(|| {
            Arc::new(InstructionPrototype::Intrinsic(IntrinsicPrototype {
                name: key.name,
                result_type: key.result_type,
                parameter_types: key.parameter_types,
                may_throw,
            }))
        });
        Ok(Arc::clone(prototype))
    }

    pub fn instantiate(
        &self,
        name: &str,
        result_type: IrType,
        parameter_types: Vec<IrType>,
        arguments: Vec<ValueTag>,
    ) -> Result<Instruction, IrError> {
        Ok(self.prototype(name, result_type, parameter_types)?.instantiate(arguments))
    }
}

// ------------------------------------------------------------
// Direct constructors for the common operators
// ------------------------------------------------------------

pub fn create_arithmetic_prototype(
    operator: &str,
    result_type: IrType,
    parameter_types: Vec<IrType>,
) -> Arc<InstructionPrototype> {
    let may_throw = matches!(operator, operators::DIVIDE | operators::REMAINDER)
        && parameter_types.iter().any(|t| t.int_spec().is_some());
    Arc::new(InstructionPrototype::Intrinsic(IntrinsicPrototype {
        name: Arc::from(ARITHMETIC.get_intrinsic_name(operator)),
        result_type,
        parameter_types: parameter_types.into(),
        may_throw,
    }))
}

/// `lhs <op> rhs` where both operands have type `operand_type`. Relational
/// operators produce `bool`, everything else produces `operand_type`.
pub fn create_binary_arithmetic(
    operator: &str,
    operand_type: IrType,
    lhs: ValueTag,
    rhs: ValueTag,
) -> Instruction {
    let result_type = if is_relational_operator(operator) {
        IrType::Bool
    } else {
        operand_type.clone()
    };
    create_arithmetic_prototype(operator, result_type, vec![operand_type.clone(), operand_type])
        .instantiate(vec![lhs, rhs])
}

pub fn create_unary_arithmetic(
    operator: &str,
    result_type: IrType,
    operand_type: IrType,
    operand: ValueTag,
) -> Instruction {
    create_arithmetic_prototype(operator, result_type, vec![operand_type]).instantiate(vec![operand])
}

pub fn create_throw(exception_type: IrType, exception: ValueTag) -> Instruction {
    Arc::new(InstructionPrototype::Intrinsic(IntrinsicPrototype {
        name: Arc::from(EXCEPTION.get_intrinsic_name(operators::THROW)),
        result_type: IrType::Void,
        parameter_types: vec![exception_type].into(),
        may_throw: true,
    }))
    .instantiate(vec![exception])
}

pub fn create_load_element(
    element_type: IrType,
    array_type: IrType,
    index_types: Vec<IrType>,
    array: ValueTag,
    indices: Vec<ValueTag>,
) -> Instruction {
    let mut parameter_types = vec![array_type];
    parameter_types.extend(index_types);
    let mut arguments = vec![array];
    arguments.extend(indices);

    Arc::new(InstructionPrototype::Intrinsic(IntrinsicPrototype {
        name: Arc::from(ARRAY.get_intrinsic_name(operators::LOAD_ELEMENT)),
        result_type: element_type,
        parameter_types: parameter_types.into(),
        may_throw: true,
    }))
    .instantiate(arguments)
}

// ------------------------------------------------------------
// Constant evaluation
// ------------------------------------------------------------

/// Evaluates an arithmetic intrinsic over constant arguments. Returns `None`
/// when the operator is unknown, the operands do not match, or evaluation
/// would trap (division by zero).
pub fn try_evaluate_arithmetic(
    intrinsic: &IntrinsicPrototype,
    arguments: &[Constant],
) -> Option<Constant> {
    let operator = ARITHMETIC.try_parse_intrinsic_name(&intrinsic.name)?;

    match arguments {
        [operand] => evaluate_unary(operator, &intrinsic.result_type, operand),
        [lhs, rhs] => evaluate_binary(operator, lhs, rhs),
        _ => None,
    }
}

fn evaluate_unary(operator: &str, result_type: &IrType, operand: &Constant) -> Option<Constant> {
    match (operator, operand) {
        (operators::NOT, Constant::Bool(value)) => Some(Constant::Bool(!value)),
        (operators::NOT, Constant::Int { value, spec }) => Some(Constant::int(!value, *spec)),
        (operators::CONVERT, _) => convert(operand, result_type),
        _ => None,
    }
}

fn convert(operand: &Constant, target: &IrType) -> Option<Constant> {
    match (operand, target) {
        (Constant::Int { value, .. }, IrType::Int(spec)) => Some(Constant::int(*value, *spec)),
        (Constant::Int { value, .. }, IrType::Float32) => Some(Constant::float32(*value as f32)),
        (Constant::Int { value, .. }, IrType::Float64) => Some(Constant::float64(*value as f64)),
        (Constant::Float32(_) | Constant::Float64(_), IrType::Float32) => {
            Some(Constant::float32(operand.as_f64()? as f32))
        }
        (Constant::Float32(_) | Constant::Float64(_), IrType::Float64) => {
            Some(Constant::float64(operand.as_f64()?))
        }
        (Constant::Float32(_) | Constant::Float64(_), IrType::Int(spec)) => {
            let value = operand.as_f64()?.trunc();
            let in_range = value >= spec.min_value() as f64 && value <= spec.max_value() as f64;
            in_range.then(|| Constant::int(value as i128, *spec))
        }
        (Constant::Bool(value), IrType::Int(spec)) => Some(Constant::int(i128::from(*value), *spec)),
        _ => None,
    }
}

fn evaluate_binary(operator: &str, lhs: &Constant, rhs: &Constant) -> Option<Constant> {
    match (lhs, rhs) {
        (
            Constant::Int { value: a, spec },
            Constant::Int {
                value: b,
                spec: rhs_spec,
            },
        ) if spec == rhs_spec => evaluate_integer(operator, *a, *b, *spec),
        (Constant::Bool(a), Constant::Bool(b)) => evaluate_boolean(operator, *a, *b),
        (Constant::Float32(_), Constant::Float32(_)) => {
            evaluate_float(operator, lhs.as_f64()?, rhs.as_f64()?).map(narrow_float32)
        }
        (Constant::Float64(_), Constant::Float64(_)) => {
            evaluate_float(operator, lhs.as_f64()?, rhs.as_f64()?)
        }
        _ => None,
    }
}

fn narrow_float32(constant: Constant) -> Constant {
    match constant {
        Constant::Float64(bits) => Constant::float32(f64::from_bits(bits) as f32),
        other => other,
    }
}

fn evaluate_integer(operator: &str, a: i128, b: i128, spec: IntSpec) -> Option<Constant> {
    let shift = |amount: i128| u32::try_from(amount.rem_euclid(i128::from(spec.bits))).ok();
    let value = match operator {
        operators::ADD => a + b,
        operators::SUBTRACT => a - b,
        operators::MULTIPLY => a.checked_mul(b)?,
        operators::DIVIDE => a.checked_div(b)?,
        operators::REMAINDER => a.checked_rem(b)?,
        operators::AND => a & b,
        operators::OR => a | b,
        operators::XOR => a ^ b,
        operators::LEFT_SHIFT => a.checked_shl(shift(b)?)?,
        operators::RIGHT_SHIFT => a >> shift(b)?,
        _ => return compare(operator, a.cmp(&b)),
    };
    Some(Constant::int(value, spec))
}

fn evaluate_boolean(operator: &str, a: bool, b: bool) -> Option<Constant> {
    let value = match operator {
        operators::AND => a & b,
        operators::OR => a | b,
        operators::XOR => a ^ b,
        operators::IS_EQUAL_TO => a == b,
        operators::IS_NOT_EQUAL_TO => a != b,
        _ => return None,
    };
    Some(Constant::Bool(value))
}

fn evaluate_float(operator: &str, a: f64, b: f64) -> Option<Constant> {
    let value = match operator {
        operators::ADD => a + b,
        operators::SUBTRACT => a - b,
        operators::MULTIPLY => a * b,
        operators::DIVIDE if b != 0.0 => a / b,
        _ => return compare(operator, a.partial_cmp(&b)?),
    };
    Some(Constant::float64(value))
}

fn compare(operator: &str, ordering: std::cmp::Ordering) -> Option<Constant> {
    use std::cmp::Ordering::*;
    let value = match operator {
        operators::IS_EQUAL_TO => ordering == Equal,
        operators::IS_NOT_EQUAL_TO => ordering != Equal,
        operators::IS_LESS_THAN => ordering == Less,
        operators::IS_GREATER_THAN => ordering == Greater,
        operators::IS_LESS_THAN_OR_EQUAL_TO => ordering != Greater,
        operators::IS_GREATER_THAN_OR_EQUAL_TO => ordering != Less,
        _ => return None,
    };
    Some(Constant::Bool(value))
}
