use rustc_hash::FxHashMap;
use std::fmt;

// The set of recoverable errors collected while configuring or running passes.
// Contract violations on the graph itself are not collected here, they panic.
#[derive(Debug, Default)]
pub struct IrMessages {
    pub errors: Vec<IrError>,
}

impl IrMessages {
    pub fn new() -> Self {
        IrMessages { errors: Vec::new() }
    }

    pub fn push(&mut self, error: IrError) {
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl fmt::Display for IrMessages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for error in &self.errors {
            writeln!(f, "{error}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorMetaDataKey {
    PassName,
    ConfigKey,
    CompilationStage,
    PrimarySuggestion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Config,
    File,
    Conformance,
    Intrinsic,
    Compiler,
}

#[derive(Debug, Clone)]
pub struct IrError {
    pub msg: String,
    pub error_type: ErrorType,

    // Structured details that tooling can read without parsing the message
    pub metadata: FxHashMap<ErrorMetaDataKey, &'static str>,
}

impl IrError {
    pub fn new(msg: impl Into<String>, error_type: ErrorType) -> IrError {
        IrError {
            msg: msg.into(),
            error_type,
            metadata: FxHashMap::default(),
        }
    }

    pub fn new_config_error(msg: impl Into<String>) -> IrError {
        IrError::new(msg, ErrorType::Config)
    }

    pub fn new_file_error(msg: impl Into<String>) -> IrError {
        IrError::new(msg, ErrorType::File)
    }

    pub fn conformance_error(msg: impl Into<String>, pass_name: &'static str) -> IrError {
        IrError::new(msg, ErrorType::Conformance).with_metadata(ErrorMetaDataKey::PassName, pass_name)
    }

    pub fn compiler_error(msg: impl Into<String>) -> IrError {
        IrError::new(msg, ErrorType::Compiler)
    }

    pub fn with_metadata(mut self, key: ErrorMetaDataKey, value: &'static str) -> IrError {
        self.metadata.insert(key, value);
        self
    }
}

impl fmt::Display for IrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", error_type_to_str(&self.error_type), self.msg)?;
        if let Some(pass) = self.metadata.get(&ErrorMetaDataKey::PassName) {
            write!(f, " (after pass '{pass}')")?;
        }
        if let Some(suggestion) = self.metadata.get(&ErrorMetaDataKey::PrimarySuggestion) {
            write!(f, "\n  help: {suggestion}")?;
        }
        Ok(())
    }
}

impl std::error::Error for IrError {}

pub fn error_type_to_str(e_type: &ErrorType) -> &'static str {
    match e_type {
        ErrorType::Config => "Malformed Config",
        ErrorType::File => "File Error",
        ErrorType::Conformance => "IR Conformance",
        ErrorType::Intrinsic => "Intrinsic Error",
        ErrorType::Compiler => "Compiler Bug",
    }
}

/// Returns a new IrError for malformed pipeline configuration.
///
/// Usage:
/// `return_config_error!("Unknown pass 'foo'", { ConfigKey => "pipeline.passes" })`;
#[macro_export]
macro_rules! return_config_error {
    ($msg:expr, { $( $key:ident => $value:expr ),* $(,)? }) => {
        return Err($crate::ir::ir_messages::ir_errors::IrError {
            msg: $msg.into(),
            error_type: $crate::ir::ir_messages::ir_errors::ErrorType::Config,
            metadata: {
                let mut map = rustc_hash::FxHashMap::default();
                $( map.insert($crate::ir::ir_messages::ir_errors::ErrorMetaDataKey::$key, $value); )*
                map
            },
        })
    };
    ($msg:expr) => {
        return Err($crate::ir::ir_messages::ir_errors::IrError::new_config_error($msg))
    };
}

/// Returns a new IrError for files that could not be read.
#[macro_export]
macro_rules! return_file_error {
    ($msg:expr) => {
        return Err($crate::ir::ir_messages::ir_errors::IrError::new_file_error($msg))
    };
}

/// Returns a new IrError for intrinsic names or signatures that cannot be resolved.
///
/// Usage:
/// `return_intrinsic_error!("Unknown operator", { CompilationStage => "intrinsic registration" })`;
#[macro_export]
macro_rules! return_intrinsic_error {
    ($msg:expr, { $( $key:ident => $value:expr ),* $(,)? }) => {
        return Err($crate::ir::ir_messages::ir_errors::IrError {
            msg: $msg.into(),
            error_type: $crate::ir::ir_messages::ir_errors::ErrorType::Intrinsic,
            metadata: {
                let mut map = rustc_hash::FxHashMap::default();
                $( map.insert($crate::ir::ir_messages::ir_errors::ErrorMetaDataKey::$key, $value); )*
                map
            },
        })
    };
    ($msg:expr) => {
        return Err($crate::ir::ir_messages::ir_errors::IrError::new(
            $msg,
            $crate::ir::ir_messages::ir_errors::ErrorType::Intrinsic,
        ))
    };
}

/// Panics with a uniform message when a graph precondition does not hold.
///
/// Graph operations treat a missing block, a missing instruction or a
/// duplicated value tag as a bug in the calling pass, never as input to recover from.
///
/// Usage:
/// `ir_contract!(graph.contains_basic_block(&tag), "no block {tag} in graph")`;
#[macro_export]
macro_rules! ir_contract {
    ($condition:expr, $($arg:tt)+) => {
        if !$condition {
            $crate::ir_contract_violation!($($arg)+);
        }
    };
}

#[macro_export]
macro_rules! ir_contract_violation {
    ($($arg:tt)+) => {
        panic!("IR contract violation: {}", format_args!($($arg)+))
    };
}
