//! Native functions and subsystems
//!
//! A [`Subsystem`] groups native functions under a namespace. The engine
//! publishes each function as `<subsystem>.<function>` in the runtime's
//! global namespace; there is no indirection beyond the namespacing.

use crate::context::NativeContext;
use crate::error::NativeError;
use crate::value::DynamicValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Result of a native function
pub type NativeResult = Result<Vec<DynamicValue>, NativeError>;

/// A native function callable from script code.
///
/// Receives the engine context and the marshaled arguments; returns zero
/// or more results.
pub type NativeFn = Arc<dyn Fn(&dyn NativeContext, &[DynamicValue]) -> NativeResult + Send + Sync>;

/// A named group of native functions.
///
/// Function names are kept sorted so registration and diagnostics are
/// deterministic.
///
/// ```ignore
/// let mut math = Subsystem::new("math", "1.0.0");
/// math.register("abs", |ctx, args| {
///     let n: f64 = arg(ctx, args, 0)?;
///     Ok(vec![DynamicValue::Number(n.abs())])
/// });
/// engine.register_subsystem(math)?;
/// ```
#[derive(Clone)]
pub struct Subsystem {
    name: String,
    version: String,
    functions: BTreeMap<String, NativeFn>,
}

impl Subsystem {
    /// Create an empty subsystem.
    ///
    /// # Arguments
    /// * `name` - Namespace the functions are published under (e.g. "env")
    /// * `version` - Semantic version (e.g. "1.0.0")
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Subsystem {
            name: name.into(),
            version: version.into(),
            functions: BTreeMap::new(),
        }
    }

    /// Register a function, replacing any previous function of that name
    pub fn register(
        &mut self,
        name: impl Into<String>,
        func: impl Fn(&dyn NativeContext, &[DynamicValue]) -> NativeResult + Send + Sync + 'static,
    ) -> &mut Self {
        self.functions.insert(name.into(), Arc::new(func));
        self
    }

    /// Register an already shared function
    pub fn register_shared(&mut self, name: impl Into<String>, func: NativeFn) -> &mut Self {
        self.functions.insert(name.into(), func);
        self
    }

    /// Subsystem name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subsystem version
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Get a function by name
    pub fn get(&self, name: &str) -> Option<NativeFn> {
        self.functions.get(name).cloned()
    }

    /// All function names, sorted
    pub fn function_names(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).collect()
    }

    /// Iterate over `(name, function)` pairs in name order
    pub fn functions(&self) -> impl Iterator<Item = (&str, &NativeFn)> {
        self.functions.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether the subsystem has no functions
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subsystem")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("functions", &self.function_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subsystem_registration() {
        let mut sys = Subsystem::new("math", "1.0.0");
        sys.register("abs", |_ctx, args| {
            let n = args.first().and_then(DynamicValue::as_number).unwrap_or(0.0);
            Ok(vec![DynamicValue::Number(n.abs())])
        })
        .register("zero", |_ctx, _args| Ok(vec![DynamicValue::Number(0.0)]));

        assert_eq!(sys.name(), "math");
        assert_eq!(sys.version(), "1.0.0");
        assert_eq!(sys.len(), 2);
        assert_eq!(sys.function_names(), vec!["abs", "zero"]);
        assert!(sys.get("abs").is_some());
        assert!(sys.get("missing").is_none());
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut sys = Subsystem::new("s", "0.1.0");
        sys.register("f", |_ctx, _args| Ok(vec![]));
        sys.register("f", |_ctx, _args| Ok(vec![DynamicValue::Nil]));
        assert_eq!(sys.len(), 1);
    }

    #[test]
    fn test_debug_lists_functions() {
        let mut sys = Subsystem::new("env", "1.0.0");
        sys.register("get", |_ctx, _args| Ok(vec![]));
        let text = format!("{:?}", sys);
        assert!(text.contains("env"));
        assert!(text.contains("get"));
    }
}
