//! Error types for compilation, registration, execution and field encoding.

use thiserror::Error;

/// Errors raised while compiling or installing contract source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Source could not be tokenized or parsed
    #[error("syntax error at {line}:{column}: {message}")]
    Syntax {
        /// 1-based line
        line: usize,
        /// 1-based column
        column: usize,
        /// Description of the problem
        message: String,
    },

    /// A name is declared twice, or collides with an object of another kind
    #[error("duplicate name: {name}")]
    DuplicateName {
        /// Qualified name
        name: String,
    },

    /// Call to a known function with the wrong number of arguments
    #[error("function {name} expects {expected} arguments, got {found}")]
    ArgumentCount {
        /// Called function
        name: String,
        /// Declared parameter count
        expected: usize,
        /// Arguments supplied
        found: usize,
    },

    /// Source or generated code exceeds a limit
    #[error("{what} too large: {size} exceeds limit {limit}")]
    TooLarge {
        /// What overflowed
        what: &'static str,
        /// Actual size
        size: usize,
        /// Configured limit
        limit: usize,
    },
}

impl CompileError {
    pub(crate) fn syntax(line: usize, column: usize, message: impl Into<String>) -> Self {
        CompileError::Syntax {
            line,
            column,
            message: message.into(),
        }
    }
}

/// Result type for compilation
pub type CompileResult<T> = Result<T, CompileError>;

/// Error reported by a host builtin.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct HostError(pub String);

impl HostError {
    /// Create a host error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        HostError(message.into())
    }
}

/// Errors raised while running compiled code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// Name not bound to any local, object or builtin
    #[error("unresolved name: {0}")]
    UnresolvedName(String),

    /// Operand of the wrong type
    #[error("type mismatch in {op}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Operation that failed
        op: String,
        /// Expected type
        expected: String,
        /// Actual type
        found: String,
    },

    /// Contract executed an `error` statement
    #[error("{0}")]
    Raised(String),

    /// Integer division or remainder by zero
    #[error("division by zero")]
    DivisionByZero,

    /// Integer arithmetic overflowed
    #[error("integer overflow in {0}")]
    Overflow(&'static str),

    /// Wrong number of arguments at a call
    #[error("{name} expects {expected} arguments, got {found}")]
    ArgumentCount {
        /// Called function
        name: String,
        /// Accepted argument count
        expected: String,
        /// Arguments supplied
        found: usize,
    },

    /// Instruction budget exhausted
    #[error("step limit of {0} exceeded")]
    StepLimitExceeded(u64),

    /// Call nesting too deep
    #[error("call depth limit of {0} exceeded")]
    CallDepthExceeded(usize),

    /// A host builtin failed
    #[error("builtin {name} failed: {source}")]
    Host {
        /// Builtin name
        name: String,
        /// Error reported by the builtin
        #[source]
        source: HostError,
    },

    /// Bytecode violated an invariant the compiler guarantees
    #[error("malformed bytecode: {0}")]
    Malformed(&'static str),
}

/// Result type for execution
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Errors raised while registering builtins.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtendError {
    /// Builtin name is not a valid identifier
    #[error("invalid builtin name: {0:?}")]
    InvalidName(String),
}

/// Errors raised while rendering a contract's transaction fields.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldEncodingError {
    /// Required field missing from the extend map
    #[error("missing required field {0}")]
    Missing(String),

    /// Field present with a value of the wrong type
    #[error("field {field} must be {expected}, found {found}")]
    WrongType {
        /// Field name
        field: String,
        /// Declared field type
        expected: &'static str,
        /// Actual value type
        found: &'static str,
    },
}
