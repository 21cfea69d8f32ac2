//! Script runtime seam
//!
//! The engine drives an embedded runtime through [`ScriptRuntime`] and the
//! runtime calls back through [`ScriptHost`]. The runtime owns its global
//! namespace and its own reachability roots; the engine owns everything
//! native (objects, tables, vectors, pins, native functions).
//!
//! [`HostedRuntime`] is the bundled implementation. An interpreter for an
//! actual scripting language plugs in through the same trait.

mod hosted;

pub use hosted::{HostedRuntime, ScriptFn, ScriptScope};

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tether_sdk::{AnyHandle, DynamicValue, NativeContext, ScriptError};

/// Reference to a script-side function, issued by the runtime
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FunctionRef {
    id: u64,
    path: Arc<str>,
}

impl FunctionRef {
    /// Create a function reference (used by runtime implementations)
    pub fn new(id: u64, path: &str) -> Self {
        Self {
            id,
            path: Arc::from(path),
        }
    }

    /// Runtime-specific function id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Path the function was resolved from
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Debug for FunctionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionRef({}#{})", self.path, self.id)
    }
}

/// What the engine publishes at a global path
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalBinding {
    /// A native function; calls go back through [`ScriptHost::call_native`]
    Native,
    /// A plain value
    Value(DynamicValue),
}

/// Root set reported by a runtime at sweep time
#[derive(Debug, Default)]
pub struct RootSet {
    /// Handles held by globals
    global_roots: Vec<AnyHandle>,
    /// Handles held by the runtime's value registry
    registry_roots: Vec<AnyHandle>,
}

impl RootSet {
    /// Create an empty root set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a global root (ignored unless the value is a handle)
    pub fn add_global_root(&mut self, value: &DynamicValue) {
        if let Some(handle) = value.handle() {
            self.global_roots.push(handle);
        }
    }

    /// Add a registry root (ignored unless the value is a handle)
    pub fn add_registry_root(&mut self, value: &DynamicValue) {
        if let Some(handle) = value.handle() {
            self.registry_roots.push(handle);
        }
    }

    /// Iterate over all roots
    pub fn iter(&self) -> impl Iterator<Item = AnyHandle> + '_ {
        self.global_roots
            .iter()
            .chain(self.registry_roots.iter())
            .copied()
    }

    /// Get total number of roots
    pub fn len(&self) -> usize {
        self.global_roots.len() + self.registry_roots.len()
    }

    /// Check if the root set is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Engine services available to a running script
pub trait ScriptHost {
    /// Dispatch a native function by path; native failures arrive as
    /// script errors
    fn call_native(&self, path: &str, args: &[DynamicValue]) -> Result<Vec<DynamicValue>, ScriptError>;

    /// Native context for table, vector, object and pin operations
    fn context(&self) -> &dyn NativeContext;

    /// Ask for a collection sweep; deferred until no call is in flight
    fn request_collection(&self);
}

/// Embedded script runtime driven by the engine.
///
/// Methods take `&self` because calls nest: a script function can call a
/// native function that calls back into the runtime. Implementations keep
/// their mutable state behind short-lived interior borrows.
pub trait ScriptRuntime: Send {
    /// Runtime name for logs
    fn name(&self) -> &str;

    /// Publish a binding at a dotted global path
    fn publish(&self, path: &str, binding: GlobalBinding) -> Result<(), ScriptError>;

    /// Remove the binding at a dotted global path
    fn unpublish(&self, path: &str);

    /// Resolve a script function by dotted path
    fn resolve_function(&self, path: &str) -> Option<FunctionRef>;

    /// Run a script function
    fn invoke(
        &self,
        func: &FunctionRef,
        args: Vec<DynamicValue>,
        host: &dyn ScriptHost,
    ) -> Result<Vec<DynamicValue>, ScriptError>;

    /// Report every handle the runtime itself keeps reachable
    fn scan_roots(&self, roots: &mut RootSet);

    /// Release all runtime state; called once, at engine shutdown
    fn close(&self);

    /// Downcasting support for [`Engine::with_runtime`](crate::Engine::with_runtime)
    fn as_any(&self) -> &dyn Any;
}
