//! Call dispatch in both directions
//!
//! Every call, native to script or script to native, runs inside a
//! [`Frame`]. The frame roots the handles that crossed the boundary and is
//! popped by a guard, so temporaries and scoped pins are released on every
//! exit path including errors. The frame count is the reentrancy depth.

use super::{Engine, EngineInner};
use crate::frame::Frame;
use crate::runtime::{FunctionRef, GlobalBinding, ScriptHost};
use std::sync::Arc;
use tether_sdk::{
    BindError, BindResult, DynamicValue, NativeContext, NativeError, NativeResult, ScriptError,
};

/// Join a namespace and a name into a dotted path
pub(crate) fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", namespace, name)
    }
}

/// Pops the innermost frame when dropped
pub(crate) struct FrameGuard<'a> {
    inner: &'a EngineInner,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.inner.exit_frame();
    }
}

impl EngineInner {
    /// Push a frame rooting `args`; fails past the configured depth
    pub(crate) fn enter_frame(&self, label: &str, args: &[DynamicValue]) -> BindResult<FrameGuard<'_>> {
        let max_depth = self.options.max_call_depth;
        let depth = self.with_state(|state| {
            if state.frames.len() >= max_depth {
                return Err(BindError::ReentrancyLimit(max_depth));
            }
            for arg in args {
                state.check_value(arg)?;
            }
            let mut frame = Frame::new(label);
            frame.root_values(args);
            state.frames.push(frame);
            Ok(state.frames.len())
        })?;
        tracing::trace!(target: "tether::engine", path = label, depth, "enter frame");
        Ok(FrameGuard { inner: self })
    }

    /// Root call results in the innermost frame
    pub(crate) fn root_results(&self, values: &[DynamicValue]) -> BindResult<()> {
        self.with_state(|state| {
            for value in values {
                state.check_value(value)?;
            }
            if let Some(frame) = state.frames.last_mut() {
                frame.root_values(values);
            }
            Ok(())
        })
    }

    /// Release the innermost frame's scoped pins, run a due sweep when the
    /// outermost frame exits, then pop the frame
    fn exit_frame(&self) {
        let core = self.lock();
        let run_sweep = {
            let mut state = core.state.borrow_mut();
            let depth = state.frames.len();
            let scoped = state
                .frames
                .last_mut()
                .map(Frame::take_scoped_pins)
                .unwrap_or_default();
            for handle in scoped {
                let released = state
                    .tracked_id(handle)
                    .and_then(|identity| state.pins.unpin(identity));
                if let Err(err) = released {
                    tracing::warn!(target: "tether::pin", %handle, error = %err, "scoped pin release failed");
                }
            }
            if depth == 1 {
                state.counters.calls += 1;
                state.calls_since_sweep = state.calls_since_sweep.saturating_add(1);
                let due = self
                    .options
                    .sweep_every_calls
                    .is_some_and(|every| state.calls_since_sweep >= every);
                state.sweep_pending || due
            } else {
                false
            }
        };
        // The exiting frame still roots its temporaries (including results)
        // while this sweep runs.
        if run_sweep {
            self.sweep();
        }
        let mut state = core.state.borrow_mut();
        state.frames.pop();
        tracing::trace!(target: "tether::engine", depth = state.frames.len(), "exit frame");
    }
}

impl Engine {
    /// Register a native function at `namespace.name` and publish it into
    /// the runtime's global namespace.
    ///
    /// Registering a path again replaces the function. When `namespace` is
    /// a registered subsystem the function joins that subsystem's group.
    pub fn register_function<F>(&self, namespace: &str, name: &str, func: F) -> BindResult<()>
    where
        F: Fn(&dyn NativeContext, &[DynamicValue]) -> NativeResult + Send + Sync + 'static,
    {
        let path = qualify(namespace, name);
        let _core = self.inner().lock();
        self.inner().ensure_live()?;
        self.inner().publish(&path, GlobalBinding::Native)?;
        self.inner().with_state(|state| {
            state.natives.insert(path.clone(), Arc::new(func));
            state.subsystems.note_function(namespace, name);
            Ok(())
        })?;
        tracing::debug!(target: "tether::engine", path = path.as_str(), "native function registered");
        Ok(())
    }

    /// Resolve a script function by dotted path
    pub fn resolve_function(&self, path: &str) -> BindResult<Option<FunctionRef>> {
        let core = self.inner().lock();
        self.inner().ensure_live()?;
        let runtime = core
            .runtime
            .try_borrow()
            .map_err(|_| BindError::ContractViolation("runtime is being torn down".to_string()))?;
        Ok(runtime.as_ref().and_then(|rt| rt.resolve_function(path)))
    }

    /// Whether `path` names a callable, script or native
    pub fn has_function(&self, path: &str) -> bool {
        let native = {
            let core = self.inner().lock();
            let state = core.state.borrow();
            !state.shut_down && state.natives.contains_key(path)
        };
        native || matches!(self.resolve_function(path), Ok(Some(_)))
    }

    /// Call a function by dotted path: script functions run in the runtime,
    /// native functions are dispatched directly
    pub fn call(&self, path: &str, args: &[DynamicValue]) -> BindResult<Vec<DynamicValue>> {
        if let Some(func) = self.resolve_function(path)? {
            return self.call_into_script(&func, args);
        }
        let is_native = self
            .inner()
            .with_state(|state| Ok(state.natives.contains_key(path)))?;
        if is_native {
            return self.on_script_call(path, args).map_err(BindError::Native);
        }
        Err(BindError::UnknownFunction(path.to_string()))
    }

    /// Run a script function.
    ///
    /// Errors raised by the script arrive as [`BindError::Script`] with the
    /// runtime's traceback.
    pub fn call_into_script(&self, func: &FunctionRef, args: &[DynamicValue]) -> BindResult<Vec<DynamicValue>> {
        let core = self.inner().lock();
        let _frame = self.inner().enter_frame(func.path(), args)?;
        let slot = core
            .runtime
            .try_borrow()
            .map_err(|_| BindError::ContractViolation("runtime is being torn down".to_string()))?;
        let Some(runtime) = slot.as_ref() else {
            return Err(BindError::UnknownFunction(func.path().to_string()));
        };
        match runtime.invoke(func, args.to_vec(), self) {
            Ok(values) => {
                self.inner().root_results(&values)?;
                Ok(values)
            }
            Err(err) => {
                tracing::debug!(
                    target: "tether::engine",
                    path = func.path(),
                    error = %err.message,
                    "script raised"
                );
                Err(BindError::Script(err))
            }
        }
    }

    /// Dispatch a native function on behalf of the runtime.
    ///
    /// A failing native function yields a [`NativeError`] naming the path;
    /// the runtime turns it into a script error instead of a native fault.
    pub fn on_script_call(&self, path: &str, args: &[DynamicValue]) -> Result<Vec<DynamicValue>, NativeError> {
        let _core = self.inner().lock();
        let func = self
            .inner()
            .with_state(|state| {
                state
                    .natives
                    .get(path)
                    .cloned()
                    .ok_or_else(|| BindError::UnknownFunction(path.to_string()))
            })
            .map_err(|err| NativeError::new(path, err))?;
        let _frame = self
            .inner()
            .enter_frame(path, args)
            .map_err(|err| NativeError::new(path, err))?;
        let values = func(self, args).map_err(|err| err.in_function(path))?;
        self.inner()
            .root_results(&values)
            .map_err(|err| NativeError::new(path, err))?;
        Ok(values)
    }
}

impl ScriptHost for Engine {
    fn call_native(&self, path: &str, args: &[DynamicValue]) -> Result<Vec<DynamicValue>, ScriptError> {
        self.on_script_call(path, args)
            .map_err(|err| ScriptError::new(err.to_string()))
    }

    fn context(&self) -> &dyn NativeContext {
        self
    }

    fn request_collection(&self) {
        if let Err(err) = self.collect_garbage() {
            tracing::debug!(target: "tether::engine", error = %err, "collection request ignored");
        }
    }
}
