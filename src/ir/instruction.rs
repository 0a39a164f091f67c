//! ============================================================
//!                  Instructions and Prototypes
//! ============================================================
//! A prototype describes the *shape* of an operation: its result type, how
//! many arguments it takes and which arguments conform. An instruction pairs
//! a shared prototype with a concrete, ordered argument list.
//!
//! The core prototypes are a closed set. Target specific or library specific
//! operations go through `Intrinsic`, which is keyed by a
//! `<namespace>.<operator>` name plus its parameter and result types (see
//! `intrinsics.rs`).
//!
//! Instructions are plain values. Equality is structural, and two
//! instructions that are equal may be defined under two different tags.

use crate::ir::constants::Constant;
use crate::ir::method_body::MethodBody;
use crate::ir::tags::ValueTag;
use crate::ir::types::{FieldRef, IrType, MemberMapping, MethodRef, PointerKind};
use crate::ir_contract;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodLookup {
    /// Calls exactly the referenced method.
    Static,
    /// Dispatches on the runtime type of the `this` argument.
    Virtual,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntrinsicPrototype {
    pub name: Arc<str>,
    pub result_type: IrType,
    pub parameter_types: Arc<[IrType]>,
    pub may_throw: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InstructionPrototype {
    Constant {
        value: Constant,
        result_type: IrType,
    },
    Copy {
        result_type: IrType,
    },
    /// Allocates a single stack slot. Produces a transient pointer.
    Alloca {
        element_type: IrType,
    },
    /// Allocates `count` stack slots, where `count` is the only argument.
    AllocaArray {
        element_type: IrType,
    },
    Load {
        result_type: IrType,
    },
    /// Arguments are `(pointer, value)`. The result is the stored value.
    Store {
        element_type: IrType,
    },
    GetFieldPointer {
        field: FieldRef,
    },
    GetStaticFieldPointer {
        field: FieldRef,
    },
    /// Arguments are the `this` pointer (instance methods only) followed by the parameters.
    Call {
        callee: MethodRef,
        lookup: MethodLookup,
    },
    /// Arguments are the delegate followed by the parameters.
    IndirectCall {
        return_type: IrType,
        parameter_types: Arc<[IrType]>,
    },
    NewObject {
        constructor: MethodRef,
    },
    NewDelegate {
        result_type: IrType,
        callee: MethodRef,
        has_this_argument: bool,
        lookup: MethodLookup,
    },
    Box {
        element_type: IrType,
    },
    Unbox {
        element_type: IrType,
    },
    ReinterpretCast {
        target_type: IrType,
    },
    Intrinsic(IntrinsicPrototype),
}

impl InstructionPrototype {
    pub fn result_type(&self) -> IrType {
        match self {
            InstructionPrototype::Constant { result_type, .. }
            | InstructionPrototype::Copy { result_type }
            | InstructionPrototype::Load { result_type }
            | InstructionPrototype::NewDelegate { result_type, .. } => result_type.clone(),
            InstructionPrototype::Alloca { element_type }
            | InstructionPrototype::AllocaArray { element_type } => {
                element_type.pointer_to(PointerKind::Transient)
            }
            InstructionPrototype::Store { element_type } => element_type.clone(),
            InstructionPrototype::GetFieldPointer { field }
            | InstructionPrototype::GetStaticFieldPointer { field } => {
                field.field_type.pointer_to(PointerKind::Reference)
            }
            InstructionPrototype::Call { callee, .. } => callee.return_type.clone(),
            InstructionPrototype::IndirectCall { return_type, .. } => return_type.clone(),
            InstructionPrototype::NewObject { constructor } => {
                constructor.parent_type.pointer_to(PointerKind::Box)
            }
            InstructionPrototype::Box { element_type } => element_type.pointer_to(PointerKind::Box),
            InstructionPrototype::Unbox { element_type } => {
                element_type.pointer_to(PointerKind::Reference)
            }
            InstructionPrototype::ReinterpretCast { target_type } => target_type.clone(),
            InstructionPrototype::Intrinsic(intrinsic) => intrinsic.result_type.clone(),
        }
    }

    pub fn parameter_count(&self) -> usize {
        match self {
            InstructionPrototype::Constant { .. }
            | InstructionPrototype::Alloca { .. }
            | InstructionPrototype::GetStaticFieldPointer { .. } => 0,
            InstructionPrototype::Copy { .. }
            | InstructionPrototype::AllocaArray { .. }
            | InstructionPrototype::Load { .. }
            | InstructionPrototype::GetFieldPointer { .. }
            | InstructionPrototype::Box { .. }
            | InstructionPrototype::Unbox { .. }
            | InstructionPrototype::ReinterpretCast { .. } => 1,
            InstructionPrototype::Store { .. } => 2,
            InstructionPrototype::Call { callee, .. } => {
                callee.parameter_types.len() + usize::from(!callee.is_static)
            }
            InstructionPrototype::IndirectCall {
                parameter_types, ..
            } => parameter_types.len() + 1,
            InstructionPrototype::NewObject { constructor } => constructor.parameter_types.len(),
            InstructionPrototype::NewDelegate {
                has_this_argument, ..
            } => usize::from(*has_this_argument),
            InstructionPrototype::Intrinsic(intrinsic) => intrinsic.parameter_types.len(),
        }
    }

    /// Whether evaluating an instance of this prototype may raise an exception.
    pub fn may_throw(&self) -> bool {
        match self {
            InstructionPrototype::Call { .. }
            | InstructionPrototype::IndirectCall { .. }
            | InstructionPrototype::NewObject { .. }
            | InstructionPrototype::Unbox { .. } => true,
            InstructionPrototype::NewDelegate { lookup, .. } => *lookup == MethodLookup::Virtual,
            InstructionPrototype::Intrinsic(intrinsic) => intrinsic.may_throw,
            _ => false,
        }
    }

    /// Whether an instance must be kept even when nothing uses its result.
    pub fn has_side_effects(&self) -> bool {
        self.may_throw() || matches!(self, InstructionPrototype::Store { .. })
    }

    /// Creates an instruction. Panics if the argument count does not match.
    pub fn instantiate(self: &Arc<Self>, arguments: Vec<ValueTag>) -> Instruction {
        ir_contract!(
            arguments.len() == self.parameter_count(),
            "prototype {} takes {} argument(s) but was given {}",
            self,
            self.parameter_count(),
            arguments.len()
        );
        Instruction {
            prototype: Arc::clone(self),
            arguments,
        }
    }

    pub fn is_prototype_of(&self, instruction: &Instruction) -> bool {
        *instruction.prototype == *self
    }

    /// Rewrites every type and member reference in this prototype.
    pub fn map(&self, mapping: &MemberMapping) -> InstructionPrototype {
        match self {
            InstructionPrototype::Constant { value, result_type } => InstructionPrototype::Constant {
                value: value.clone(),
                result_type: mapping.map_type(result_type),
            },
            InstructionPrototype::Copy { result_type } => InstructionPrototype::Copy {
                result_type: mapping.map_type(result_type),
            },
            InstructionPrototype::Alloca { element_type } => InstructionPrototype::Alloca {
                element_type: mapping.map_type(element_type),
            },
            InstructionPrototype::AllocaArray { element_type } => {
                InstructionPrototype::AllocaArray {
                    element_type: mapping.map_type(element_type),
                }
            }
            InstructionPrototype::Load { result_type } => InstructionPrototype::Load {
                result_type: mapping.map_type(result_type),
            },
            InstructionPrototype::Store { element_type } => InstructionPrototype::Store {
                element_type: mapping.map_type(element_type),
            },
            InstructionPrototype::GetFieldPointer { field } => {
                InstructionPrototype::GetFieldPointer {
                    field: mapping.map_field(field),
                }
            }
            InstructionPrototype::GetStaticFieldPointer { field } => {
                InstructionPrototype::GetStaticFieldPointer {
                    field: mapping.map_field(field),
                }
            }
            InstructionPrototype::Call { callee, lookup } => InstructionPrototype::Call {
                callee: mapping.map_method(callee),
                lookup: *lookup,
            },
            InstructionPrototype::IndirectCall {
                return_type,
                parameter_types,
            } => InstructionPrototype::IndirectCall {
                return_type: mapping.map_type(return_type),
                parameter_types: parameter_types.iter().map(|t| mapping.map_type(t)).collect(),
            },
            InstructionPrototype::NewObject { constructor } => InstructionPrototype::NewObject {
                constructor: mapping.map_method(constructor),
            },
            InstructionPrototype::NewDelegate {
                result_type,
                callee,
                has_this_argument,
                lookup,
            } => InstructionPrototype::NewDelegate {
                result_type: mapping.map_type(result_type),
                callee: mapping.map_method(callee),
                has_this_argument: *has_this_argument,
                lookup: *lookup,
            },
            InstructionPrototype::Box { element_type } => InstructionPrototype::Box {
                element_type: mapping.map_type(element_type),
            },
            InstructionPrototype::Unbox { element_type } => InstructionPrototype::Unbox {
                element_type: mapping.map_type(element_type),
            },
            InstructionPrototype::ReinterpretCast { target_type } => {
                InstructionPrototype::ReinterpretCast {
                    target_type: mapping.map_type(target_type),
                }
            }
            InstructionPrototype::Intrinsic(intrinsic) => {
                InstructionPrototype::Intrinsic(IntrinsicPrototype {
                    name: intrinsic.name.clone(),
                    result_type: mapping.map_type(&intrinsic.result_type),
                    parameter_types: intrinsic
                        .parameter_types
                        .iter()
                        .map(|t| mapping.map_type(t))
                        .collect(),
                    may_throw: intrinsic.may_throw,
                })
            }
        }
    }

    /// Checks an instance of this prototype against the body it lives in.
    /// Arguments that are missing from the graph are skipped here, the body
    /// validator reports those.
    pub fn check_conformance(&self, instance: &Instruction, body: &MethodBody) -> Vec<String> {
        let mut errors = Vec::new();
        let graph = &body.implementation;
        let type_of = |index: usize| graph.try_get_value_type(&instance.arguments[index]);

        match self {
            InstructionPrototype::Constant { value, result_type } => match value {
                Constant::Null => {
                    if result_type.pointer_kind().is_none() {
                        errors.push(format!(
                            "Null constant must have a pointer type, not '{result_type}'."
                        ));
                    }
                }
                Constant::Default | Constant::String(_) => {}
                _ => {
                    if let Some(natural) = value.natural_type() {
                        let numeric_pair = natural.is_numeric() && result_type.is_numeric();
                        if natural != *result_type && !numeric_pair {
                            errors.push(format!(
                                "Constant '{value}' cannot have type '{result_type}'."
                            ));
                        }
                    }
                }
            },
            InstructionPrototype::Copy { result_type } => {
                if let Some(found) = type_of(0) {
                    check_type(&mut errors, "Copied value", &found, result_type);
                }
            }
            InstructionPrototype::Alloca { .. } => {}
            InstructionPrototype::AllocaArray { .. } => {
                if let Some(found) = type_of(0) {
                    if found.int_spec().is_none() {
                        errors.push(format!(
                            "Element count of alloca_array must be an integer, not '{found}'."
                        ));
                    }
                }
            }
            InstructionPrototype::Load { result_type } => {
                if let Some(found) = type_of(0) {
                    check_pointee(&mut errors, "load", &found, result_type);
                }
            }
            InstructionPrototype::Store { element_type } => {
                if let Some(found) = type_of(0) {
                    check_pointee(&mut errors, "store", &found, element_type);
                }
                if let Some(found) = type_of(1) {
                    check_type(&mut errors, "Stored value", &found, element_type);
                }
            }
            InstructionPrototype::GetFieldPointer { field } => {
                if field.is_static {
                    errors.push(format!(
                        "Field '{field}' is static; use a static field pointer instead."
                    ));
                }
                if let Some(found) = type_of(0) {
                    if found.pointer_kind().is_none() {
                        errors.push(format!(
                            "Base of field access must be a pointer, not '{found}'."
                        ));
                    }
                }
            }
            InstructionPrototype::GetStaticFieldPointer { field } => {
                if !field.is_static {
                    errors.push(format!("Field '{field}' is not static."));
                }
            }
            InstructionPrototype::Call { callee, lookup } => {
                let offset = usize::from(!callee.is_static);
                if callee.is_static && *lookup == MethodLookup::Virtual {
                    errors.push(format!("Static method '{callee}' cannot be called virtually."));
                }
                if !callee.is_static {
                    if let Some(found) = type_of(0) {
                        if found.pointer_kind().is_none() {
                            errors.push(format!(
                                "'this' argument of call to '{callee}' must be a pointer, not '{found}'."
                            ));
                        }
                    }
                }
                check_arguments(&mut errors, instance, graph_types(body), offset, &callee.parameter_types);
            }
            InstructionPrototype::IndirectCall {
                parameter_types, ..
            } => {
                check_arguments(&mut errors, instance, graph_types(body), 1, parameter_types);
            }
            InstructionPrototype::NewObject { constructor } => {
                if constructor.is_static {
                    errors.push(format!("Constructor '{constructor}' cannot be static."));
                }
                check_arguments(
                    &mut errors,
                    instance,
                    graph_types(body),
                    0,
                    &constructor.parameter_types,
                );
            }
            InstructionPrototype::NewDelegate {
                callee,
                has_this_argument,
                ..
            } => {
                if callee.is_static == *has_this_argument {
                    errors.push(format!(
                        "Delegate for '{callee}' must capture a 'this' argument exactly when the method is an instance method."
                    ));
                }
            }
            InstructionPrototype::Box { element_type } => {
                if let Some(found) = type_of(0) {
                    check_type(&mut errors, "Boxed value", &found, element_type);
                }
            }
            InstructionPrototype::Unbox { .. } => {
                if let Some(found) = type_of(0) {
                    if found.pointer_kind() != Some(PointerKind::Box) {
                        errors.push(format!(
                            "Argument of unbox must be a box pointer, not '{found}'."
                        ));
                    }
                }
            }
            InstructionPrototype::ReinterpretCast { target_type } => {
                if target_type.pointer_kind().is_none() {
                    errors.push(format!(
                        "Reinterpret cast target '{target_type}' must be a pointer type."
                    ));
                }
                if let Some(found) = type_of(0) {
                    if found.pointer_kind().is_none() {
                        errors.push(format!(
                            "Reinterpret cast argument must be a pointer, not '{found}'."
                        ));
                    }
                }
            }
            InstructionPrototype::Intrinsic(intrinsic) => {
                check_arguments(
                    &mut errors,
                    instance,
                    graph_types(body),
                    0,
                    &intrinsic.parameter_types,
                );
            }
        }

        errors
    }
}

fn graph_types(body: &MethodBody) -> impl Fn(&ValueTag) -> Option<IrType> + '_ {
    |tag| body.implementation.try_get_value_type(tag)
}

fn check_type(errors: &mut Vec<String>, what: &str, found: &IrType, expected: &IrType) {
    if found != expected {
        errors.push(format!(
            "{what} has type '{found}' but should have been '{expected}'."
        ));
    }
}

fn check_pointee(errors: &mut Vec<String>, operation: &str, found: &IrType, element: &IrType) {
    match found.pointee() {
        None => errors.push(format!(
            "Target of {operation} operation must be a pointer type, not '{found}'."
        )),
        Some(pointee) if pointee != element => errors.push(format!(
            "Pointee type '{pointee}' of {operation} pointer should have been '{element}'."
        )),
        Some(_) => {}
    }
}

fn check_arguments(
    errors: &mut Vec<String>,
    instance: &Instruction,
    type_of: impl Fn(&ValueTag) -> Option<IrType>,
    offset: usize,
    parameter_types: &[IrType],
) {
    for (index, (argument, expected)) in instance.arguments[offset..]
        .iter()
        .zip(parameter_types)
        .enumerate()
    {
        if let Some(found) = type_of(argument) {
            if found != *expected {
                errors.push(format!(
                    "Argument #{index} has type '{found}' but parameter type is '{expected}'."
                ));
            }
        }
    }
}

impl fmt::Display for InstructionPrototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstructionPrototype::Constant { value, .. } => write!(f, "const {value}"),
            InstructionPrototype::Copy { .. } => write!(f, "copy"),
            InstructionPrototype::Alloca { element_type } => write!(f, "alloca {element_type}"),
            InstructionPrototype::AllocaArray { element_type } => {
                write!(f, "alloca_array {element_type}")
            }
            InstructionPrototype::Load { .. } => write!(f, "load"),
            InstructionPrototype::Store { .. } => write!(f, "store"),
            InstructionPrototype::GetFieldPointer { field } => write!(f, "get_field_pointer {field}"),
            InstructionPrototype::GetStaticFieldPointer { field } => {
                write!(f, "get_static_field_pointer {field}")
            }
            InstructionPrototype::Call { callee, lookup } => match lookup {
                MethodLookup::Static => write!(f, "call {callee}"),
                MethodLookup::Virtual => write!(f, "callvirt {callee}"),
            },
            InstructionPrototype::IndirectCall { .. } => write!(f, "indirect_call"),
            InstructionPrototype::NewObject { constructor } => {
                write!(f, "new_object {}", constructor.parent_type)
            }
            InstructionPrototype::NewDelegate { callee, .. } => write!(f, "new_delegate {callee}"),
            InstructionPrototype::Box { element_type } => write!(f, "box {element_type}"),
            InstructionPrototype::Unbox { element_type } => write!(f, "unbox {element_type}"),
            InstructionPrototype::ReinterpretCast { target_type } => {
                write!(f, "reinterpret_cast {target_type}")
            }
            InstructionPrototype::Intrinsic(intrinsic) => write!(f, "{}", intrinsic.name),
        }
    }
}

// ------------------------------------------------------------
// Instruction
// ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instruction {
    prototype: Arc<InstructionPrototype>,
    arguments: Vec<ValueTag>,
}

impl Instruction {
    pub fn prototype(&self) -> &Arc<InstructionPrototype> {
        &self.prototype
    }

    pub fn arguments(&self) -> &[ValueTag] {
        &self.arguments
    }

    pub fn result_type(&self) -> IrType {
        self.prototype.result_type()
    }

    pub fn may_throw(&self) -> bool {
        self.prototype.may_throw()
    }

    pub fn validate(&self, body: &MethodBody) -> Vec<String> {
        self.prototype.check_conformance(self, body)
    }

    /// Same prototype, new arguments.
    pub fn with_arguments(&self, arguments: Vec<ValueTag>) -> Instruction {
        self.prototype.instantiate(arguments)
    }

    pub fn map_arguments(&self, mut f: impl FnMut(&ValueTag) -> ValueTag) -> Instruction {
        Instruction {
            prototype: self.prototype.clone(),
            arguments: self.arguments.iter().map(&mut f).collect(),
        }
    }

    /// Substitutes the arguments that appear in `mapping` and keeps the rest.
    pub fn map_arguments_from(&self, mapping: &FxHashMap<ValueTag, ValueTag>) -> Instruction {
        self.map_arguments(|arg| mapping.get(arg).unwrap_or(arg).clone())
    }

    /// Rewrites the prototype's types and members. Arguments are untouched.
    pub fn map(&self, mapping: &MemberMapping) -> Instruction {
        Instruction {
            prototype: Arc::new(self.prototype.map(mapping)),
            arguments: self.arguments.clone(),
        }
    }

    // --------------------------------------------------------
    // Constructors for the core prototypes
    // --------------------------------------------------------

    pub fn create_constant(value: Constant, result_type: IrType) -> Instruction {
        Arc::new(InstructionPrototype::Constant { value, result_type }).instantiate(vec![])
    }

    pub fn create_copy(result_type: IrType, value: ValueTag) -> Instruction {
        Arc::new(InstructionPrototype::Copy { result_type }).instantiate(vec![value])
    }

    pub fn create_alloca(element_type: IrType) -> Instruction {
        Arc::new(InstructionPrototype::Alloca { element_type }).instantiate(vec![])
    }

    pub fn create_alloca_array(element_type: IrType, count: ValueTag) -> Instruction {
        Arc::new(InstructionPrototype::AllocaArray { element_type }).instantiate(vec![count])
    }

    pub fn create_load(result_type: IrType, pointer: ValueTag) -> Instruction {
        Arc::new(InstructionPrototype::Load { result_type }).instantiate(vec![pointer])
    }

    pub fn create_store(element_type: IrType, pointer: ValueTag, value: ValueTag) -> Instruction {
        Arc::new(InstructionPrototype::Store { element_type }).instantiate(vec![pointer, value])
    }

    pub fn create_get_field_pointer(field: FieldRef, base: ValueTag) -> Instruction {
        Arc::new(InstructionPrototype::GetFieldPointer { field }).instantiate(vec![base])
    }

    pub fn create_get_static_field_pointer(field: FieldRef) -> Instruction {
        Arc::new(InstructionPrototype::GetStaticFieldPointer { field }).instantiate(vec![])
    }

    pub fn create_call(callee: MethodRef, lookup: MethodLookup, arguments: Vec<ValueTag>) -> Instruction {
        Arc::new(InstructionPrototype::Call { callee, lookup }).instantiate(arguments)
    }

    pub fn create_indirect_call(
        return_type: IrType,
        parameter_types: Vec<IrType>,
        delegate: ValueTag,
        arguments: Vec<ValueTag>,
    ) -> Instruction {
        let mut all_arguments = Vec::with_capacity(arguments.len() + 1);
        all_arguments.push(delegate);
        all_arguments.extend(arguments);
        Arc::new(InstructionPrototype::IndirectCall {
            return_type,
            parameter_types: parameter_types.into(),
        })
        .instantiate(all_arguments)
    }

    pub fn create_new_object(constructor: MethodRef, arguments: Vec<ValueTag>) -> Instruction {
        Arc::new(InstructionPrototype::NewObject { constructor }).instantiate(arguments)
    }

    pub fn create_new_delegate(
        result_type: IrType,
        callee: MethodRef,
        this_argument: Option<ValueTag>,
        lookup: MethodLookup,
    ) -> Instruction {
        let has_this_argument = this_argument.is_some();
        Arc::new(InstructionPrototype::NewDelegate {
            result_type,
            callee,
            has_this_argument,
            lookup,
        })
        .instantiate(this_argument.into_iter().collect())
    }

    pub fn create_box(element_type: IrType, value: ValueTag) -> Instruction {
        Arc::new(InstructionPrototype::Box { element_type }).instantiate(vec![value])
    }

    pub fn create_unbox(element_type: IrType, value: ValueTag) -> Instruction {
        Arc::new(InstructionPrototype::Unbox { element_type }).instantiate(vec![value])
    }

    pub fn create_reinterpret_cast(target_type: IrType, value: ValueTag) -> Instruction {
        Arc::new(InstructionPrototype::ReinterpretCast { target_type }).instantiate(vec![value])
    }

    // --------------------------------------------------------
    // Queries used by passes
    // --------------------------------------------------------

    pub fn as_constant(&self) -> Option<&Constant> {
        match &*self.prototype {
            InstructionPrototype::Constant { value, .. } => Some(value),
            _ => None,
        }
    }

    /// The copied value, if this is a copy.
    pub fn as_copy_source(&self) -> Option<&ValueTag> {
        match &*self.prototype {
            InstructionPrototype::Copy { .. } => self.arguments.first(),
            _ => None,
        }
    }

    pub fn as_intrinsic(&self) -> Option<&IntrinsicPrototype> {
        match &*self.prototype {
            InstructionPrototype::Intrinsic(intrinsic) => Some(intrinsic),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.prototype)?;
        for (i, arg) in self.arguments.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ") : {}", self.result_type())
    }
}
