use crate::ir::types::{IntSpec, IrType, PointerKind};
use std::fmt;
use std::sync::Arc;

/// A compile-time constant carried by a constant instruction.
///
/// Floats are stored as raw bits so constants can be hashed and compared
/// structurally (switch cases are keyed by constants).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    Bool(bool),
    Int { value: i128, spec: IntSpec },
    Float32(u32),
    Float64(u64),
    Char(char),
    String(Arc<str>),
    Null,
    /// The zero value of whatever type the instruction produces.
    Default,
}

impl Constant {
    pub fn int(value: i128, spec: IntSpec) -> Constant {
        Constant::Int {
            value: spec.wrap(value),
            spec,
        }
    }

    pub fn int32(value: i32) -> Constant {
        Constant::int(value as i128, IntSpec::I32)
    }

    pub fn float32(value: f32) -> Constant {
        Constant::Float32(value.to_bits())
    }

    pub fn float64(value: f64) -> Constant {
        Constant::Float64(value.to_bits())
    }

    pub fn as_int(&self) -> Option<(i128, IntSpec)> {
        match self {
            Constant::Int { value, spec } => Some((*value, *spec)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Constant::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Constant::Float32(bits) => Some(f32::from_bits(*bits) as f64),
            Constant::Float64(bits) => Some(f64::from_bits(*bits)),
            _ => None,
        }
    }

    /// The literal zero value of `ty`. Named and generic types have none.
    pub fn zero_of(ty: &IrType) -> Option<Constant> {
        match ty {
            IrType::Bool => Some(Constant::Bool(false)),
            IrType::Char => Some(Constant::Char('\0')),
            IrType::Int(spec) => Some(Constant::int(0, *spec)),
            IrType::Float32 => Some(Constant::float32(0.0)),
            IrType::Float64 => Some(Constant::float64(0.0)),
            IrType::Pointer(..) => Some(Constant::Null),
            IrType::Void
            | IrType::Named(_)
            | IrType::GenericParameter(_)
            | IrType::GenericInstance { .. } => None,
        }
    }

    /// This constant as a concrete literal of type `ty`, with `Default`
    /// replaced by the zero value of `ty`.
    pub fn resolve_for(&self, ty: &IrType) -> Option<Constant> {
        match self {
            Constant::Default => Constant::zero_of(ty),
            other => Some(other.clone()),
        }
    }

    /// The type a constant naturally has. `Null` and `Default` take theirs from context.
    pub fn natural_type(&self) -> Option<IrType> {
        match self {
            Constant::Bool(_) => Some(IrType::Bool),
            Constant::Int { spec, .. } => Some(IrType::Int(*spec)),
            Constant::Float32(_) => Some(IrType::Float32),
            Constant::Float64(_) => Some(IrType::Float64),
            Constant::Char(_) => Some(IrType::Char),
            Constant::String(_) => Some(IrType::named("string").pointer_to(PointerKind::Box)),
            Constant::Null | Constant::Default => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Bool(value) => write!(f, "{value}"),
            Constant::Int { value, .. } => write!(f, "{value}"),
            Constant::Float32(bits) => write!(f, "{:?}f", f32::from_bits(*bits)),
            Constant::Float64(bits) => write!(f, "{:?}", f64::from_bits(*bits)),
            Constant::Char(value) => write!(f, "{value:?}"),
            Constant::String(value) => write!(f, "{value:?}"),
            Constant::Null => write!(f, "null"),
            Constant::Default => write!(f, "default"),
        }
    }
}
