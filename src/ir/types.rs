//! The type and member model that instructions refer to.
//!
//! The graph never resolves types itself. Front ends hand it fully formed
//! `IrType`, `MethodRef` and `FieldRef` values and backends read them back.
//! `MemberMapping` is the one place where the graph rewrites them, for example
//! when a generic body is specialized.

use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntSpec {
    pub bits: u8,
    pub signed: bool,
}

impl IntSpec {
    pub const I8: IntSpec = IntSpec::new(8, true);
    pub const I16: IntSpec = IntSpec::new(16, true);
    pub const I32: IntSpec = IntSpec::new(32, true);
    pub const I64: IntSpec = IntSpec::new(64, true);
    pub const U8: IntSpec = IntSpec::new(8, false);
    pub const U16: IntSpec = IntSpec::new(16, false);
    pub const U32: IntSpec = IntSpec::new(32, false);
    pub const U64: IntSpec = IntSpec::new(64, false);

    pub const fn new(bits: u8, signed: bool) -> IntSpec {
        IntSpec { bits, signed }
    }

    pub fn min_value(&self) -> i128 {
        if self.signed {
            -(1i128 << (self.bits - 1))
        } else {
            0
        }
    }

    pub fn max_value(&self) -> i128 {
        if self.signed {
            (1i128 << (self.bits - 1)) - 1
        } else {
            (1i128 << self.bits) - 1
        }
    }

    /// Wraps an arbitrary integer into this spec's range (two's complement).
    pub fn wrap(&self, value: i128) -> i128 {
        let modulus = 1i128 << self.bits;
        let truncated = value.rem_euclid(modulus);
        if self.signed && truncated > self.max_value() {
            truncated - modulus
        } else {
            truncated
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerKind {
    /// Points into memory the garbage collector does not track (stack slots, interior pointers).
    Transient,
    /// A by-reference pointer that may point into managed objects.
    Reference,
    /// A reference to a managed object on the heap.
    Box,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IrType {
    Void,
    Bool,
    Char,
    Int(IntSpec),
    Float32,
    Float64,
    Pointer(Arc<IrType>, PointerKind),
    Named(Arc<str>),
    GenericParameter(Arc<str>),
    GenericInstance {
        definition: Arc<str>,
        arguments: Arc<[IrType]>,
    },
}

impl IrType {
    pub fn int32() -> IrType {
        IrType::Int(IntSpec::I32)
    }

    pub fn int64() -> IrType {
        IrType::Int(IntSpec::I64)
    }

    pub fn named(name: &str) -> IrType {
        IrType::Named(Arc::from(name))
    }

    pub fn pointer_to(&self, kind: PointerKind) -> IrType {
        IrType::Pointer(Arc::new(self.clone()), kind)
    }

    pub fn pointee(&self) -> Option<&IrType> {
        match self {
            IrType::Pointer(element, _) => Some(element),
            _ => None,
        }
    }

    pub fn pointer_kind(&self) -> Option<PointerKind> {
        match self {
            IrType::Pointer(_, kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn int_spec(&self) -> Option<IntSpec> {
        match self {
            IrType::Int(spec) => Some(*spec),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, IrType::Int(_) | IrType::Float32 | IrType::Float64)
    }

    /// Rebuilds this type bottom-up, replacing every component for which
    /// `replace` returns a new type.
    pub fn substitute(&self, replace: &dyn Fn(&IrType) -> Option<IrType>) -> IrType {
        if let Some(replacement) = replace(self) {
            return replacement;
        }

        match self {
            IrType::Pointer(element, kind) => {
                IrType::Pointer(Arc::new(element.substitute(replace)), *kind)
            }
            IrType::GenericInstance {
                definition,
                arguments,
            } => IrType::GenericInstance {
                definition: definition.clone(),
                arguments: arguments.iter().map(|arg| arg.substitute(replace)).collect(),
            },
            _ => self.clone(),
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Void => write!(f, "void"),
            IrType::Bool => write!(f, "bool"),
            IrType::Char => write!(f, "char"),
            IrType::Int(spec) => {
                write!(f, "{}{}", if spec.signed { "int" } else { "uint" }, spec.bits)
            }
            IrType::Float32 => write!(f, "float32"),
            IrType::Float64 => write!(f, "float64"),
            IrType::Pointer(element, kind) => {
                let sigil = match kind {
                    PointerKind::Transient => "*",
                    PointerKind::Reference => "&",
                    PointerKind::Box => "box ",
                };
                write!(f, "{sigil}{element}")
            }
            IrType::Named(name) => write!(f, "{name}"),
            IrType::GenericParameter(name) => write!(f, "'{name}"),
            IrType::GenericInstance {
                definition,
                arguments,
            } => {
                write!(f, "{definition}<")?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ">")
            }
        }
    }
}

/// A reference to a method, resolved by the front end.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub name: Arc<str>,
    pub parent_type: IrType,
    pub is_static: bool,
    pub return_type: IrType,
    pub parameter_types: Arc<[IrType]>,
}

impl MethodRef {
    pub fn new_static(
        parent_type: IrType,
        name: &str,
        return_type: IrType,
        parameter_types: Vec<IrType>,
    ) -> MethodRef {
        MethodRef {
            name: Arc::from(name),
            parent_type,
            is_static: true,
            return_type,
            parameter_types: parameter_types.into(),
        }
    }

    pub fn new_instance(
        parent_type: IrType,
        name: &str,
        return_type: IrType,
        parameter_types: Vec<IrType>,
    ) -> MethodRef {
        MethodRef {
            is_static: false,
            ..MethodRef::new_static(parent_type, name, return_type, parameter_types)
        }
    }

    fn map_types(&self, map_type: &dyn Fn(&IrType) -> IrType) -> MethodRef {
        MethodRef {
            name: self.name.clone(),
            parent_type: map_type(&self.parent_type),
            is_static: self.is_static,
            return_type: map_type(&self.return_type),
            parameter_types: self.parameter_types.iter().map(map_type).collect(),
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.parent_type, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub name: Arc<str>,
    pub parent_type: IrType,
    pub field_type: IrType,
    pub is_static: bool,
}

impl FieldRef {
    pub fn new(parent_type: IrType, name: &str, field_type: IrType, is_static: bool) -> FieldRef {
        FieldRef {
            name: Arc::from(name),
            parent_type,
            field_type,
            is_static,
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.parent_type, self.name)
    }
}

/// A method-level parameter (return, `this`, or ordinary).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub ty: IrType,
    pub name: Arc<str>,
}

impl Parameter {
    pub fn new(ty: IrType, name: &str) -> Parameter {
        Parameter {
            ty,
            name: Arc::from(name),
        }
    }

    pub fn map(&self, mapping: &MemberMapping) -> Parameter {
        Parameter {
            ty: mapping.map_type(&self.ty),
            name: self.name.clone(),
        }
    }
}

type TypeFn = dyn Fn(&IrType) -> IrType + Send + Sync;
type MethodFn = dyn Fn(&MethodRef) -> MethodRef + Send + Sync;
type FieldFn = dyn Fn(&FieldRef) -> FieldRef + Send + Sync;

/// A substitution applied to every type, method and field in a graph.
#[derive(Clone)]
pub struct MemberMapping {
    map_type: Arc<TypeFn>,
    map_method: Arc<MethodFn>,
    map_field: Arc<FieldFn>,
}

impl MemberMapping {
    pub fn new(
        map_type: impl Fn(&IrType) -> IrType + Send + Sync + 'static,
        map_method: impl Fn(&MethodRef) -> MethodRef + Send + Sync + 'static,
        map_field: impl Fn(&FieldRef) -> FieldRef + Send + Sync + 'static,
    ) -> MemberMapping {
        MemberMapping {
            map_type: Arc::new(map_type),
            map_method: Arc::new(map_method),
            map_field: Arc::new(map_field),
        }
    }

    pub fn identity() -> MemberMapping {
        MemberMapping::new(IrType::clone, MethodRef::clone, FieldRef::clone)
    }

    /// Replaces types structurally, and rewrites the types inside method and
    /// field references to match. Used to specialize generic bodies.
    pub fn from_type_substitution(substitution: FxHashMap<IrType, IrType>) -> MemberMapping {
        let substitution = Arc::new(substitution);

        let types = substitution.clone();
        let map_type = move |ty: &IrType| ty.substitute(&|t| types.get(t).cloned());

        let methods = substitution.clone();
        let map_method = move |method: &MethodRef| {
            method.map_types(&|ty| ty.substitute(&|t| methods.get(t).cloned()))
        };

        let fields = substitution;
        let map_field = move |field: &FieldRef| FieldRef {
            name: field.name.clone(),
            parent_type: field.parent_type.substitute(&|t| fields.get(t).cloned()),
            field_type: field.field_type.substitute(&|t| fields.get(t).cloned()),
            is_static: field.is_static,
        };

        MemberMapping::new(map_type, map_method, map_field)
    }

    pub fn map_type(&self, ty: &IrType) -> IrType {
        (self.map_type)(ty)
    }

    pub fn map_method(&self, method: &MethodRef) -> MethodRef {
        (self.map_method)(method)
    }

    pub fn map_field(&self, field: &FieldRef) -> FieldRef {
        (self.map_field)(field)
    }
}

impl fmt::Debug for MemberMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MemberMapping")
    }
}
