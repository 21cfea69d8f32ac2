//! Hosted script runtime
//!
//! Script functions are host closures that run against a [`ScriptScope`].
//! The runtime keeps a namespace tree of globals, a registry of retained
//! values and its own script call stack, from which it builds tracebacks
//! for errors raised inside it.

use super::{FunctionRef, GlobalBinding, RootSet, ScriptHost, ScriptRuntime};
use rustc_hash::FxHashMap;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::sync::Arc;
use tether_sdk::{DynamicValue, NativeContext, ScriptError, TableHandle, VectorHandle};

/// Body of a script function
pub type ScriptFn = Arc<
    dyn Fn(&mut ScriptScope<'_>, Vec<DynamicValue>) -> Result<Vec<DynamicValue>, ScriptError>
        + Send
        + Sync,
>;

#[derive(Debug)]
enum Global {
    Namespace(BTreeMap<String, Global>),
    Function(FunctionRef),
    Native,
    Value(DynamicValue),
}

type Namespace = BTreeMap<String, Global>;

fn split_path(path: &str) -> Result<Vec<&str>, ScriptError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ScriptError::new(format!("invalid global path '{}'", path)));
    }
    Ok(segments)
}

fn insert(root: &mut Namespace, path: &str, leaf: Global) -> Result<Option<Global>, ScriptError> {
    let segments = split_path(path)?;
    let Some((last, parents)) = segments.split_last() else {
        return Err(ScriptError::new(format!("invalid global path '{}'", path)));
    };
    let mut ns = root;
    for segment in parents {
        let entry = ns
            .entry(segment.to_string())
            .or_insert_with(|| Global::Namespace(BTreeMap::new()));
        ns = match entry {
            Global::Namespace(inner) => inner,
            _ => {
                return Err(ScriptError::new(format!(
                    "cannot define '{}': '{}' is not a namespace",
                    path, segment
                )))
            }
        };
    }
    if let Some(Global::Namespace(_)) = ns.get(*last) {
        return Err(ScriptError::new(format!(
            "cannot define '{}': it is a namespace",
            path
        )));
    }
    Ok(ns.insert(last.to_string(), leaf))
}

fn lookup<'g>(root: &'g Namespace, path: &str) -> Option<&'g Global> {
    let mut segments = path.split('.');
    let mut current = root.get(segments.next()?)?;
    for segment in segments {
        match current {
            Global::Namespace(inner) => current = inner.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}

fn remove(root: &mut Namespace, path: &str) -> Option<Global> {
    match path.split_once('.') {
        None => root.remove(path),
        Some((head, rest)) => match root.get_mut(head)? {
            Global::Namespace(inner) => {
                let removed = remove(inner, rest);
                if inner.is_empty() {
                    root.remove(head);
                }
                removed
            }
            _ => None,
        },
    }
}

fn scan(ns: &Namespace, roots: &mut RootSet) {
    for global in ns.values() {
        match global {
            Global::Namespace(inner) => scan(inner, roots),
            Global::Value(value) => roots.add_global_root(value),
            Global::Function(_) | Global::Native => {}
        }
    }
}

enum Target {
    Script(FunctionRef),
    Native,
}

/// Closure-backed [`ScriptRuntime`]
pub struct HostedRuntime {
    name: String,
    globals: RefCell<Namespace>,
    functions: RefCell<FxHashMap<u64, ScriptFn>>,
    next_function: Cell<u64>,
    registry: RefCell<FxHashMap<u64, DynamicValue>>,
    next_ref: Cell<u64>,
    stack: RefCell<Vec<Arc<str>>>,
    closed: Cell<bool>,
}

impl Default for HostedRuntime {
    fn default() -> Self {
        Self::new("hosted")
    }
}

impl HostedRuntime {
    /// Create an empty runtime
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            globals: RefCell::new(BTreeMap::new()),
            functions: RefCell::new(FxHashMap::default()),
            next_function: Cell::new(1),
            registry: RefCell::new(FxHashMap::default()),
            next_ref: Cell::new(1),
            stack: RefCell::new(Vec::new()),
            closed: Cell::new(false),
        }
    }

    /// Define a script function at a dotted global path.
    ///
    /// Redefining a path replaces the previous function; references to the
    /// old one stop resolving.
    pub fn define_function<F>(&self, path: &str, body: F) -> Result<FunctionRef, ScriptError>
    where
        F: Fn(&mut ScriptScope<'_>, Vec<DynamicValue>) -> Result<Vec<DynamicValue>, ScriptError>
            + Send
            + Sync
            + 'static,
    {
        if self.closed.get() {
            return Err(ScriptError::new("runtime is closed"));
        }
        let id = self.next_function.get();
        self.next_function.set(id + 1);
        let func = FunctionRef::new(id, path);
        let previous = insert(&mut self.globals.borrow_mut(), path, Global::Function(func.clone()))?;
        let mut functions = self.functions.borrow_mut();
        if let Some(Global::Function(old)) = previous {
            functions.remove(&old.id());
        }
        functions.insert(id, Arc::new(body));
        tracing::trace!(target: "tether::runtime", runtime = %self.name, path, "define function");
        Ok(func)
    }

    /// Read a global value (nil when absent or not a value)
    pub fn global(&self, path: &str) -> DynamicValue {
        match lookup(&self.globals.borrow(), path) {
            Some(Global::Value(value)) => value.clone(),
            _ => DynamicValue::Nil,
        }
    }

    /// Write a global value; nil removes it
    pub fn set_global(&self, path: &str, value: DynamicValue) -> Result<(), ScriptError> {
        let mut globals = self.globals.borrow_mut();
        if value.is_nil() {
            let is_value = matches!(lookup(&globals, path), Some(Global::Value(_)));
            if is_value {
                remove(&mut globals, path);
            }
            return Ok(());
        }
        insert(&mut globals, path, Global::Value(value)).map(|_| ())
    }

    /// Keep a value alive from the runtime side; returns a registry ref
    pub fn retain(&self, value: DynamicValue) -> u64 {
        let id = self.next_ref.get();
        self.next_ref.set(id + 1);
        self.registry.borrow_mut().insert(id, value);
        id
    }

    /// Drop a registry ref, returning the value it held
    pub fn release(&self, reference: u64) -> Option<DynamicValue> {
        self.registry.borrow_mut().remove(&reference)
    }

    /// Value held by a registry ref
    pub fn registry_get(&self, reference: u64) -> Option<DynamicValue> {
        self.registry.borrow().get(&reference).cloned()
    }

    /// Current script call depth
    pub fn depth(&self) -> usize {
        self.stack.borrow().len()
    }

    /// Whether `close` has run
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }

    fn traceback(&self) -> String {
        self.stack
            .borrow()
            .iter()
            .rev()
            .map(|path| format!("\tin function '{}'", path))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn call_path(
        &self,
        path: &str,
        args: Vec<DynamicValue>,
        host: &dyn ScriptHost,
    ) -> Result<Vec<DynamicValue>, ScriptError> {
        let target = match lookup(&self.globals.borrow(), path) {
            Some(Global::Function(func)) => Some(Target::Script(func.clone())),
            Some(Global::Native) => Some(Target::Native),
            _ => None,
        };
        match target {
            Some(Target::Script(func)) => self.invoke(&func, args, host),
            Some(Target::Native) => host.call_native(path, &args),
            None => Err(ScriptError::new(format!(
                "attempt to call a non-function value ('{}')",
                path
            ))),
        }
    }
}

/// Pops the script call stack on every exit path
struct StackGuard<'a> {
    stack: &'a RefCell<Vec<Arc<str>>>,
}

impl Drop for StackGuard<'_> {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop();
    }
}

impl ScriptRuntime for HostedRuntime {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish(&self, path: &str, binding: GlobalBinding) -> Result<(), ScriptError> {
        match binding {
            GlobalBinding::Native => {
                let previous = insert(&mut self.globals.borrow_mut(), path, Global::Native)?;
                if let Some(Global::Function(old)) = previous {
                    self.functions.borrow_mut().remove(&old.id());
                }
                Ok(())
            }
            GlobalBinding::Value(value) => self.set_global(path, value),
        }
    }

    fn unpublish(&self, path: &str) {
        let removed = remove(&mut self.globals.borrow_mut(), path);
        if let Some(Global::Function(old)) = removed {
            self.functions.borrow_mut().remove(&old.id());
        }
    }

    fn resolve_function(&self, path: &str) -> Option<FunctionRef> {
        match lookup(&self.globals.borrow(), path) {
            Some(Global::Function(func)) => Some(func.clone()),
            _ => None,
        }
    }

    fn invoke(
        &self,
        func: &FunctionRef,
        args: Vec<DynamicValue>,
        host: &dyn ScriptHost,
    ) -> Result<Vec<DynamicValue>, ScriptError> {
        if self.closed.get() {
            return Err(ScriptError::new("runtime is closed"));
        }
        let body = self
            .functions
            .borrow()
            .get(&func.id())
            .cloned()
            .ok_or_else(|| {
                ScriptError::new(format!("attempt to call undefined function '{}'", func.path()))
            })?;

        self.stack.borrow_mut().push(Arc::from(func.path()));
        let _guard = StackGuard { stack: &self.stack };
        let mut scope = ScriptScope {
            runtime: self,
            host,
        };
        body(&mut scope, args).map_err(|err| err.with_traceback(self.traceback()))
    }

    fn scan_roots(&self, roots: &mut RootSet) {
        scan(&self.globals.borrow(), roots);
        for value in self.registry.borrow().values() {
            roots.add_registry_root(value);
        }
    }

    fn close(&self) {
        self.closed.set(true);
        self.globals.borrow_mut().clear();
        self.functions.borrow_mut().clear();
        self.registry.borrow_mut().clear();
        tracing::debug!(target: "tether::runtime", runtime = %self.name, "closed");
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// What a running script function can do
pub struct ScriptScope<'a> {
    runtime: &'a HostedRuntime,
    host: &'a dyn ScriptHost,
}

impl ScriptScope<'_> {
    /// Call a script or native function by dotted path
    pub fn call(&mut self, path: &str, args: Vec<DynamicValue>) -> Result<Vec<DynamicValue>, ScriptError> {
        self.runtime.call_path(path, args, self.host)
    }

    /// Build an error to raise from the current function
    pub fn error(&self, message: impl Into<String>) -> ScriptError {
        ScriptError::new(message)
    }

    /// Read a global value
    pub fn global(&self, path: &str) -> DynamicValue {
        self.runtime.global(path)
    }

    /// Write a global value; nil removes it
    pub fn set_global(&mut self, path: &str, value: DynamicValue) -> Result<(), ScriptError> {
        self.runtime.set_global(path, value)
    }

    /// Retain a value in the runtime registry
    pub fn retain(&mut self, value: DynamicValue) -> u64 {
        self.runtime.retain(value)
    }

    /// Release a registry ref
    pub fn release(&mut self, reference: u64) -> Option<DynamicValue> {
        self.runtime.release(reference)
    }

    /// Native context of the hosting engine
    pub fn context(&self) -> &dyn NativeContext {
        self.host.context()
    }

    /// Request a collection sweep
    pub fn collect(&self) {
        self.host.request_collection();
    }

    /// Create a table
    pub fn new_table(&mut self) -> Result<TableHandle, ScriptError> {
        Ok(self.context().create_table()?)
    }

    /// Read a table field
    pub fn get(&self, table: TableHandle, key: impl Into<DynamicValue>) -> Result<DynamicValue, ScriptError> {
        Ok(self.context().table_get(table, &key.into())?)
    }

    /// Write a table field
    pub fn set(
        &mut self,
        table: TableHandle,
        key: impl Into<DynamicValue>,
        value: impl Into<DynamicValue>,
    ) -> Result<(), ScriptError> {
        Ok(self.context().table_set(table, key.into(), value.into())?)
    }

    /// Number of table entries
    pub fn table_len(&self, table: TableHandle) -> Result<usize, ScriptError> {
        Ok(self.context().table_len(table)?)
    }

    /// Snapshot of a table's entries
    pub fn entries(&self, table: TableHandle) -> Result<Vec<(DynamicValue, DynamicValue)>, ScriptError> {
        Ok(self.context().table_entries(table)?)
    }

    /// Create a vector
    pub fn new_vector(&mut self) -> Result<VectorHandle, ScriptError> {
        Ok(self.context().create_vector()?)
    }

    /// Append to a vector
    pub fn push(&mut self, vector: VectorHandle, value: impl Into<DynamicValue>) -> Result<(), ScriptError> {
        Ok(self.context().vector_push(vector, value.into())?)
    }

    /// Read a vector element
    pub fn index(&self, vector: VectorHandle, index: usize) -> Result<DynamicValue, ScriptError> {
        Ok(self.context().vector_get(vector, index)?)
    }

    /// Write a vector element
    pub fn set_index(
        &mut self,
        vector: VectorHandle,
        index: usize,
        value: impl Into<DynamicValue>,
    ) -> Result<(), ScriptError> {
        Ok(self.context().vector_set(vector, index, value.into())?)
    }

    /// Vector length
    pub fn vector_len(&self, vector: VectorHandle) -> Result<usize, ScriptError> {
        Ok(self.context().vector_len(vector)?)
    }

    /// Script call depth inside this runtime
    pub fn depth(&self) -> usize {
        self.runtime.depth()
    }
}
