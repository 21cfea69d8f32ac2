//! Engine registry
//!
//! Hands out engines by id for hosts that run more than one instance (one
//! per test, one per plugin sandbox). Every engine stays independently
//! constructible without a registry; the registry only indexes them.

use crate::engine::Engine;
use crate::options::{EngineOptions, OptionsError};
use crate::runtime::ScriptRuntime;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tether_sdk::{BindResult, EngineId};

/// Thread-safe id -> engine index
#[derive(Default)]
pub struct EngineRegistry {
    engines: RwLock<FxHashMap<EngineId, Engine>>,
}

impl EngineRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine driving `runtime` and index it
    pub fn create<R: ScriptRuntime + 'static>(
        &self,
        options: EngineOptions,
        runtime: R,
    ) -> Result<Engine, OptionsError> {
        let engine = Engine::new(options, runtime)?;
        self.engines.write().insert(engine.id(), engine.clone());
        Ok(engine)
    }

    /// Create an engine driving a fresh hosted runtime and index it
    pub fn create_hosted(&self, options: EngineOptions) -> Result<Engine, OptionsError> {
        let engine = Engine::hosted(options)?;
        self.engines.write().insert(engine.id(), engine.clone());
        Ok(engine)
    }

    /// Look up an engine
    pub fn get(&self, id: EngineId) -> Option<Engine> {
        self.engines.read().get(&id).cloned()
    }

    /// Whether `id` names an indexed engine that has not been shut down
    pub fn is_valid(&self, id: EngineId) -> bool {
        self.engines
            .read()
            .get(&id)
            .is_some_and(|engine| !engine.is_shut_down())
    }

    /// Shut an engine down and drop it from the index.
    ///
    /// Returns `Ok(false)` for an unknown id.
    pub fn remove(&self, id: EngineId) -> BindResult<bool> {
        // Release the index lock before shutdown runs destruction hooks.
        let engine = self.engines.write().remove(&id);
        match engine {
            Some(engine) => engine.shutdown().map(|()| true),
            None => Ok(false),
        }
    }

    /// Shut down every indexed engine; returns how many were shut down
    pub fn shutdown_all(&self) -> usize {
        let engines: Vec<Engine> = self.engines.write().drain().map(|(_, e)| e).collect();
        let mut count = 0;
        for engine in engines {
            match engine.shutdown() {
                Ok(()) => count += 1,
                Err(err) => tracing::error!(
                    target: "tether::engine",
                    id = %engine.id(),
                    error = %err,
                    "engine shutdown failed"
                ),
            }
        }
        count
    }

    /// Number of indexed engines
    pub fn len(&self) -> usize {
        self.engines.read().len()
    }

    /// Whether no engine is indexed
    pub fn is_empty(&self) -> bool {
        self.engines.read().is_empty()
    }

    /// Ids of every indexed engine, ascending
    pub fn ids(&self) -> Vec<EngineId> {
        let mut ids: Vec<EngineId> = self.engines.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
