//! Error taxonomy shared by the SDK and the engine

use std::fmt;

/// Result type for boundary operations
pub type BindResult<T> = Result<T, BindError>;

/// Error raised by script code (or converted into the script's error
/// channel) and returned to native code as a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}{}", .message, traceback_suffix(.traceback))]
pub struct ScriptError {
    /// Error message as raised by the script
    pub message: String,
    /// Script call stack at the point of the error, innermost first
    pub traceback: Option<String>,
}

impl ScriptError {
    /// Create a script error without a traceback
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            traceback: None,
        }
    }

    /// Attach a traceback, keeping an existing one if already present
    pub fn with_traceback(mut self, traceback: impl Into<String>) -> Self {
        if self.traceback.is_none() {
            self.traceback = Some(traceback.into());
        }
        self
    }
}

fn traceback_suffix(traceback: &Option<String>) -> String {
    match traceback {
        Some(tb) => format!("\nstack traceback:\n{}", tb),
        None => String::new(),
    }
}

impl From<BindError> for ScriptError {
    fn from(err: BindError) -> Self {
        err.into_script_error()
    }
}

/// Native-side failure surfaced to script code.
///
/// `function` is filled in by the engine with the dispatched path when the
/// native function left it empty (e.g. when it used `?` on a [`BindError`]).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{function}: {message}")]
pub struct NativeError {
    /// Dotted path of the native function that failed
    pub function: String,
    /// Failure description
    pub message: String,
}

impl NativeError {
    /// Create a native error for the given function path
    pub fn new(function: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            function: function.into(),
            message: message.to_string(),
        }
    }

    /// Fill in the function path if it is still unknown
    pub fn in_function(mut self, path: &str) -> Self {
        if self.function.is_empty() {
            self.function = path.to_string();
        }
        self
    }
}

impl From<BindError> for NativeError {
    fn from(err: BindError) -> Self {
        NativeError {
            function: String::new(),
            message: err.to_string(),
        }
    }
}

/// Boundary error taxonomy
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    /// Value has the wrong dynamic type (or the wrong native object type)
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual type name
        got: String,
    },

    /// Numeric value cannot be represented exactly in the target type
    #[error("Precision loss: {value} cannot be represented exactly as {target}")]
    PrecisionLoss {
        /// Offending value, formatted
        value: String,
        /// Target type name
        target: &'static str,
    },

    /// Unpin of an identity whose pin count is already zero
    #[error("Pin underflow: {identity} is not pinned")]
    Underflow {
        /// Identity that was unpinned once too often
        identity: String,
    },

    /// Vector index past the end
    #[error("Index out of range: index {index} but length is {len}")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Current length
        len: usize,
    },

    /// Error raised by script execution
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),

    /// Native function failure
    #[error("Native error: {0}")]
    Native(#[from] NativeError),

    /// Subsystem name already registered
    #[error("Duplicate subsystem: {0}")]
    DuplicateSubsystem(String),

    /// Handle resolution after finalization or engine shutdown
    #[error("Use after release: {0}")]
    UseAfterRelease(String),

    /// Lifecycle contract broken by the caller (e.g. shutdown during a call)
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// Call path does not resolve to a callable
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Nested native/script calls exceeded the configured depth
    #[error("Reentrancy limit of {0} nested calls exceeded")]
    ReentrancyLimit(usize),

    /// Table key is nil or NaN
    #[error("Invalid table key: {0}")]
    InvalidKey(String),
}

impl BindError {
    /// Shorthand for [`BindError::TypeMismatch`]
    pub fn type_mismatch(expected: impl Into<String>, got: impl fmt::Display) -> Self {
        BindError::TypeMismatch {
            expected: expected.into(),
            got: got.to_string(),
        }
    }

    /// Whether this error reports a broken pin/handle/lifecycle contract
    /// rather than a recoverable runtime condition.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            BindError::Underflow { .. }
                | BindError::UseAfterRelease(_)
                | BindError::ContractViolation(_)
        )
    }

    /// Convert into the error a script observes when this error crosses
    /// into the runtime's error channel.
    pub fn into_script_error(self) -> ScriptError {
        match self {
            BindError::Script(err) => err,
            other => ScriptError::new(other.to_string()),
        }
    }
}
