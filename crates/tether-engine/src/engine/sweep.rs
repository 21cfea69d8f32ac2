//! Collection sweeps and shutdown
//!
//! A sweep computes what the runtime can still reach (its own roots, every
//! in-flight frame's temporaries, every pinned record) closed over table and
//! vector contents, then finalizes every unpinned record outside that set.
//! Slots are freed first and hooks run afterwards, with no state borrowed:
//!
//! ```text
//! scan roots ──► close over containers ──► remove doomed records
//!                                            │
//!                     free slots ◄───────────┘
//!                         │
//!                         ▼
//!               on_destroy, then on_observed_release
//! ```

use super::{Engine, EngineInner, EngineState};
use crate::pin::ObjectRecord;
use crate::runtime::RootSet;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tether_sdk::{AnyHandle, BindError, BindResult, NativeObject, TrackedId};

/// Hooks owed after a batch of records was released
#[derive(Default)]
pub(crate) struct Finalized {
    released: usize,
    destroyed: Vec<Arc<dyn NativeObject>>,
    notifications: Vec<(Arc<dyn NativeObject>, TrackedId)>,
}

impl Finalized {
    fn len(&self) -> usize {
        self.released
    }

    fn run_destroy_hooks(&mut self) {
        for object in self.destroyed.drain(..) {
            tracing::trace!(
                target: "tether::engine",
                identity = %object.identity(),
                type_tag = object.type_tag(),
                "on_destroy"
            );
            object.on_destroy();
        }
    }

    fn run(mut self) {
        self.run_destroy_hooks();
        for (observer, released) in self.notifications {
            observer.on_observed_release(released);
        }
    }
}

impl EngineState {
    /// Every handle reachable from `roots`, in-flight frames and pins
    fn reachable(&self, roots: impl Iterator<Item = AnyHandle>) -> FxHashSet<AnyHandle> {
        let mut seen = FxHashSet::default();
        let mut pending: Vec<AnyHandle> = roots
            .chain(self.frames.iter().flat_map(|f| f.temps().iter().copied()))
            .chain(self.pins.pinned_handles())
            .collect();
        while let Some(handle) = pending.pop() {
            if !seen.insert(handle) {
                continue;
            }
            match handle {
                AnyHandle::Table(table) => {
                    if let Some(store) = self.tables.get(table.id()) {
                        pending.extend(store.handles());
                    }
                }
                AnyHandle::Vector(vector) => {
                    if let Some(store) = self.vectors.get(vector.id()) {
                        pending.extend(store.handles());
                    }
                }
                AnyHandle::Object(_) => {}
            }
        }
        seen
    }

    /// Free the slots of `records`; returns the hooks still owed
    fn release_records(&mut self, records: Vec<ObjectRecord>) -> Finalized {
        let mut finalized = Finalized {
            released: records.len(),
            ..Finalized::default()
        };
        for record in &records {
            match record.identity {
                TrackedId::Object(identity) => {
                    self.finalized_objects.insert(identity);
                    let entry = self
                        .object_handles
                        .remove(&identity)
                        .and_then(|handle| self.objects.remove(handle.id()));
                    if let Some(entry) = entry {
                        finalized.destroyed.push(entry.object);
                    }
                }
                TrackedId::Table(table) => {
                    self.tables.remove(table.id());
                }
                TrackedId::Vector(vector) => {
                    self.vectors.remove(vector.id());
                }
            }
        }
        // Observers finalized in the same batch are already gone.
        for record in &records {
            for observer in &record.weak_observers {
                let TrackedId::Object(identity) = observer else {
                    continue;
                };
                let live = self
                    .object_handles
                    .get(identity)
                    .and_then(|handle| self.objects.get(handle.id()));
                if let Some(entry) = live {
                    finalized
                        .notifications
                        .push((Arc::clone(&entry.object), record.identity));
                }
            }
        }
        finalized
    }
}

impl EngineInner {
    /// Run a sweep now; returns the number of finalized records
    pub(crate) fn sweep(&self) -> usize {
        let core = self.lock();
        let mut roots = RootSet::new();
        match core.runtime.try_borrow() {
            Ok(slot) => {
                if let Some(runtime) = slot.as_ref() {
                    runtime.scan_roots(&mut roots);
                }
            }
            Err(_) => return 0,
        }
        let finalized = {
            let mut state = core.state.borrow_mut();
            if state.shut_down {
                return 0;
            }
            let reachable = state.reachable(roots.iter());
            let doomed = state.pins.on_collection_sweep(&reachable);
            let finalized = state.release_records(doomed);
            state.sweep_pending = false;
            state.calls_since_sweep = 0;
            state.counters.sweeps += 1;
            state.counters.finalized += finalized.len() as u64;
            finalized
        };
        let count = finalized.len();
        finalized.run();
        tracing::debug!(
            target: "tether::engine",
            engine = %self.options.name,
            roots = roots.len(),
            finalized = count,
            "sweep"
        );
        count
    }

    /// Finalize every record, invalidate every handle, then close the runtime
    pub(crate) fn shutdown(&self) -> BindResult<()> {
        let core = self.lock();
        {
            let state = core.state.borrow();
            if state.shut_down {
                return Ok(());
            }
            if !state.frames.is_empty() {
                return Err(self.checked(BindError::ContractViolation(format!(
                    "shutdown with {} call(s) in flight",
                    state.frames.len()
                ))));
            }
        }
        if core.runtime.try_borrow_mut().is_err() {
            return Err(self.checked(BindError::ContractViolation(
                "shutdown while the runtime is in use".to_string(),
            )));
        }

        let mut finalized = {
            let mut state = core.state.borrow_mut();
            let records = state.pins.drain();
            let finalized = state.release_records(records);
            state.counters.finalized += finalized.len() as u64;
            finalized
        };
        let count = finalized.len();
        finalized.run_destroy_hooks();

        {
            let mut state = core.state.borrow_mut();
            state.objects.drain();
            state.object_handles.clear();
            state.tables.drain();
            state.vectors.drain();
            state.natives.clear();
            state.subsystems.clear();
            state.shut_down = true;
        }

        let runtime = core
            .runtime
            .try_borrow_mut()
            .map_err(|_| {
                self.checked(BindError::ContractViolation(
                    "shutdown while the runtime is in use".to_string(),
                ))
            })?
            .take();
        if let Some(runtime) = runtime {
            runtime.close();
        }
        tracing::info!(
            target: "tether::engine",
            engine = %self.options.name,
            id = %self.id,
            finalized = count,
            "engine shut down"
        );
        Ok(())
    }
}

impl Engine {
    /// Request a collection sweep.
    ///
    /// With no call in flight the sweep runs immediately and the number of
    /// finalized records is returned. Inside a call it is deferred to the
    /// exit of the outermost frame and `0` is returned.
    pub fn collect_garbage(&self) -> BindResult<usize> {
        let _core = self.inner().lock();
        let deferred = self.inner().with_state(|state| {
            if state.frames.is_empty() {
                Ok(false)
            } else {
                state.sweep_pending = true;
                Ok(true)
            }
        })?;
        if deferred {
            tracing::debug!(target: "tether::engine", "sweep deferred until the outermost call returns");
            return Ok(0);
        }
        Ok(self.inner().sweep())
    }
}
