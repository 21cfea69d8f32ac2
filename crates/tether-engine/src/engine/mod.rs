//! Binding engine
//!
//! An [`Engine`] owns one embedded runtime together with everything native
//! the runtime can reach: object, table and vector handle tables, the pin
//! registry, the native function table and the call frame stack.
//!
//! # Locking
//!
//! `Engine` is a cheap, cloneable handle to shared state behind a single
//! reentrant mutex. Calls from other threads block until the current call
//! finishes; calls made from inside a native function or script on the
//! owning thread re-enter without blocking. Internal state sits in a
//! `RefCell` whose borrows never span a call into native code, the runtime
//! or a destruction hook.
//!
//! # Lifecycle
//!
//! ```text
//! Engine::new ──► register / call / sweep ... ──► shutdown()
//!                                                   1. finalize every record (on_destroy)
//!                                                   2. invalidate every handle
//!                                                   3. close and free the runtime
//! ```
//!
//! Dropping the last handle without calling [`Engine::shutdown`] runs the
//! same sequence and logs a warning.

mod context;
mod dispatch;
mod sweep;

pub(crate) use dispatch::qualify;

use crate::frame::Frame;
use crate::handles::HandleTable;
use crate::options::{ContractPolicy, EngineOptions, OptionsError};
use crate::pin::PinRegistry;
use crate::reflect::{TableStore, VectorStore};
use crate::runtime::{GlobalBinding, HostedRuntime, ScriptRuntime};
use crate::stats::EngineStats;
use crate::subsystem::SubsystemRegistry;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tether_sdk::{
    AnyHandle, BindError, BindResult, DynamicValue, EngineId, NativeFn, NativeObject, ObjectHandle,
    ObjectId, TrackedId,
};

static NEXT_ENGINE_ID: AtomicU32 = AtomicU32::new(1);

/// Registered native object and the identity captured at registration
pub(crate) struct ObjectEntry {
    pub(crate) object: Arc<dyn NativeObject>,
    pub(crate) identity: ObjectId,
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Counters {
    pub(crate) calls: u64,
    pub(crate) sweeps: u64,
    pub(crate) finalized: u64,
}

/// Mutable engine state; only ever borrowed for short, callback-free spans
pub(crate) struct EngineState {
    pub(crate) objects: HandleTable<ObjectEntry>,
    pub(crate) object_handles: FxHashMap<ObjectId, ObjectHandle>,
    /// Identities whose record was finalized; they never register again
    pub(crate) finalized_objects: FxHashSet<ObjectId>,
    pub(crate) tables: HandleTable<TableStore>,
    pub(crate) vectors: HandleTable<VectorStore>,
    pub(crate) pins: PinRegistry,
    pub(crate) natives: FxHashMap<String, NativeFn>,
    pub(crate) subsystems: SubsystemRegistry,
    pub(crate) frames: Vec<Frame>,
    pub(crate) sweep_pending: bool,
    pub(crate) calls_since_sweep: u32,
    pub(crate) counters: Counters,
    pub(crate) shut_down: bool,
}

impl EngineState {
    fn new(id: EngineId) -> Self {
        Self {
            objects: HandleTable::new(id),
            object_handles: FxHashMap::default(),
            finalized_objects: FxHashSet::default(),
            tables: HandleTable::new(id),
            vectors: HandleTable::new(id),
            pins: PinRegistry::new(),
            natives: FxHashMap::default(),
            subsystems: SubsystemRegistry::default(),
            frames: Vec::new(),
            sweep_pending: false,
            calls_since_sweep: 0,
            counters: Counters::default(),
            shut_down: false,
        }
    }

    /// Whether a handle currently resolves
    pub(crate) fn resolves(&self, handle: AnyHandle) -> bool {
        match handle {
            AnyHandle::Object(h) => self.objects.contains(h.id()),
            AnyHandle::Table(h) => self.tables.contains(h.id()),
            AnyHandle::Vector(h) => self.vectors.contains(h.id()),
        }
    }

    /// Reject values that carry a handle which no longer resolves
    pub(crate) fn check_value(&self, value: &DynamicValue) -> BindResult<()> {
        match value.handle() {
            Some(handle) if !self.resolves(handle) => Err(use_after_release(handle)),
            _ => Ok(()),
        }
    }

    /// Pin registry identity of a live handle
    pub(crate) fn tracked_id(&self, handle: AnyHandle) -> BindResult<TrackedId> {
        match handle {
            AnyHandle::Object(h) => self
                .objects
                .get(h.id())
                .map(|entry| TrackedId::Object(entry.identity))
                .ok_or_else(|| use_after_release(handle)),
            AnyHandle::Table(h) if self.tables.contains(h.id()) => Ok(TrackedId::Table(h)),
            AnyHandle::Vector(h) if self.vectors.contains(h.id()) => Ok(TrackedId::Vector(h)),
            _ => Err(use_after_release(handle)),
        }
    }

    /// Root a handle in the innermost frame, if a call is in flight
    pub(crate) fn root_temp(&mut self, handle: AnyHandle) {
        if let Some(frame) = self.frames.last_mut() {
            frame.root(handle);
        }
    }
}

pub(crate) fn use_after_release(handle: impl fmt::Display) -> BindError {
    BindError::UseAfterRelease(format!("{} does not resolve", handle))
}

fn shut_down_error(id: EngineId) -> BindError {
    BindError::UseAfterRelease(format!("{} is shut down", id))
}

/// Lock-protected part of the engine
pub(crate) struct EngineCore {
    pub(crate) state: RefCell<EngineState>,
    pub(crate) runtime: RefCell<Option<Box<dyn ScriptRuntime>>>,
}

pub(crate) struct EngineInner {
    pub(crate) id: EngineId,
    pub(crate) options: EngineOptions,
    pub(crate) lock: ReentrantMutex<EngineCore>,
}

impl EngineInner {
    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, EngineCore> {
        self.lock.lock()
    }

    /// Apply the contract policy to an error on its way out
    pub(crate) fn checked(&self, err: BindError) -> BindError {
        if err.is_contract_violation() {
            tracing::error!(
                target: "tether::engine",
                engine = %self.options.name,
                id = %self.id,
                error = %err,
                "contract violation"
            );
            if self.options.contract_policy == ContractPolicy::Panic {
                panic!("tether contract violation: {}", err);
            }
        }
        err
    }

    /// Run `f` against the mutable state.
    ///
    /// `f` must not call native code or the runtime.
    pub(crate) fn with_state<T>(
        &self,
        f: impl FnOnce(&mut EngineState) -> BindResult<T>,
    ) -> BindResult<T> {
        let core = self.lock();
        let result = {
            let mut state = core.state.borrow_mut();
            if state.shut_down {
                Err(shut_down_error(self.id))
            } else {
                f(&mut state)
            }
        };
        result.map_err(|err| self.checked(err))
    }

    /// Fail with `UseAfterRelease` once the engine is shut down
    pub(crate) fn ensure_live(&self) -> BindResult<()> {
        self.with_state(|_| Ok(()))
    }

    /// Publish a binding into the runtime's global namespace
    pub(crate) fn publish(&self, path: &str, binding: GlobalBinding) -> BindResult<()> {
        let core = self.lock();
        let runtime = core
            .runtime
            .try_borrow()
            .map_err(|_| BindError::ContractViolation("runtime is being torn down".to_string()))?;
        match runtime.as_ref() {
            Some(rt) => rt.publish(path, binding).map_err(BindError::Script),
            None => Err(self.checked(shut_down_error(self.id))),
        }
    }

    /// Remove a binding from the runtime's global namespace
    pub(crate) fn unpublish(&self, path: &str) {
        let core = self.lock();
        let slot = core.runtime.try_borrow();
        if let Ok(Some(rt)) = slot.as_deref() {
            rt.unpublish(path);
        }
    }

    fn is_shut_down(&self) -> bool {
        self.lock().state.borrow().shut_down
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        if !self.is_shut_down() {
            tracing::warn!(
                target: "tether::engine",
                engine = %self.options.name,
                id = %self.id,
                "engine dropped without shutdown; shutting down now"
            );
            if let Err(err) = self.shutdown() {
                tracing::error!(target: "tether::engine", error = %err, "shutdown on drop failed");
            }
        }
    }
}

/// Binding engine handle.
///
/// Cloning is cheap and every clone refers to the same engine instance.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Create an engine driving `runtime`
    pub fn new<R: ScriptRuntime + 'static>(
        options: EngineOptions,
        runtime: R,
    ) -> Result<Self, OptionsError> {
        options.validate()?;
        let id = EngineId(NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed));
        tracing::info!(
            target: "tether::engine",
            engine = %options.name,
            %id,
            runtime = runtime.name(),
            "engine created"
        );
        let core = EngineCore {
            state: RefCell::new(EngineState::new(id)),
            runtime: RefCell::new(Some(Box::new(runtime))),
        };
        Ok(Self {
            inner: Arc::new(EngineInner {
                id,
                options,
                lock: ReentrantMutex::new(core),
            }),
        })
    }

    /// Create an engine driving a fresh [`HostedRuntime`]
    pub fn hosted(options: EngineOptions) -> Result<Self, OptionsError> {
        let runtime = HostedRuntime::new(options.name.clone());
        Self::new(options, runtime)
    }

    /// Engine id; embedded in every handle this engine issues
    pub fn id(&self) -> EngineId {
        self.inner.id
    }

    /// Engine label
    pub fn name(&self) -> &str {
        &self.inner.options.name
    }

    /// Engine options
    pub fn options(&self) -> &EngineOptions {
        &self.inner.options
    }

    /// Whether [`Engine::shutdown`] has completed
    pub fn is_shut_down(&self) -> bool {
        self.inner.is_shut_down()
    }

    /// Tear the engine down.
    ///
    /// Finalizes every tracked record (each `on_destroy` runs once), then
    /// invalidates all handles, then closes and frees the runtime. Calling
    /// it while a call is in flight is a contract violation. Calling it
    /// again after it completed is a no-op.
    pub fn shutdown(&self) -> BindResult<()> {
        self.inner.shutdown()
    }

    /// Borrow the runtime as its concrete type
    pub fn with_runtime<R: ScriptRuntime + 'static, T>(&self, f: impl FnOnce(&R) -> T) -> BindResult<T> {
        let core = self.inner.lock();
        let slot = core
            .runtime
            .try_borrow()
            .map_err(|_| BindError::ContractViolation("runtime is being torn down".to_string()))?;
        let runtime = slot
            .as_ref()
            .ok_or_else(|| self.inner.checked(shut_down_error(self.inner.id)))?;
        let concrete = runtime
            .as_any()
            .downcast_ref::<R>()
            .ok_or_else(|| BindError::type_mismatch(std::any::type_name::<R>(), runtime.name()))?;
        Ok(f(concrete))
    }

    /// Snapshot of engine counters
    pub fn stats(&self) -> EngineStats {
        let core = self.inner.lock();
        let state = core.state.borrow();
        EngineStats {
            live_objects: state.objects.len(),
            live_tables: state.tables.len(),
            live_vectors: state.vectors.len(),
            tracked_records: state.pins.len(),
            total_pins: state.pins.total_pins(),
            call_depth: state.frames.len(),
            rooted_temporaries: state.frames.iter().map(|f| f.temps().len()).sum(),
            native_functions: state.natives.len(),
            subsystems: state.subsystems.len(),
            calls: state.counters.calls,
            sweeps: state.counters.sweeps,
            finalized: state.counters.finalized,
        }
    }

    pub(crate) fn inner(&self) -> &EngineInner {
        &self.inner
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("id", &self.inner.id)
            .field("name", &self.inner.options.name)
            .finish()
    }
}
