//! Subsystem registry
//!
//! A subsystem is a named group of native functions published under one
//! namespace (`env.get`, `env.set`, ...). Its functions are ordinary entries
//! in the engine's native function table; the registry only remembers which
//! paths belong to which group so a group can be replaced or removed as a
//! whole.
//!
//! Registering a name that is already present follows the engine's
//! [`DuplicatePolicy`]: `Reject` fails with `DuplicateSubsystem`, `Replace`
//! swaps the whole group so callers never observe a mix of old and new
//! functions.

use crate::engine::{qualify, Engine};
use crate::options::DuplicatePolicy;
use crate::runtime::GlobalBinding;
use std::collections::BTreeMap;
use std::sync::Arc;
use tether_sdk::{BindError, BindResult, Subsystem};

/// Registered subsystem as the engine sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubsystemInfo {
    /// Namespace the functions live under
    pub name: String,
    /// Version string supplied at registration
    pub version: String,
    /// Function names within the namespace, sorted
    pub functions: Vec<String>,
}

impl SubsystemInfo {
    fn of(subsystem: &Subsystem) -> Self {
        Self {
            name: subsystem.name().to_string(),
            version: subsystem.version().to_string(),
            functions: subsystem
                .function_names()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    /// Fully qualified paths of the group's functions
    pub fn paths(&self) -> impl Iterator<Item = String> + '_ {
        self.functions.iter().map(|f| qualify(&self.name, f))
    }
}

/// Name -> subsystem map of one engine
#[derive(Debug, Default)]
pub(crate) struct SubsystemRegistry {
    groups: BTreeMap<String, SubsystemInfo>,
}

impl SubsystemRegistry {
    pub(crate) fn get(&self, name: &str) -> Option<&SubsystemInfo> {
        self.groups.get(name)
    }

    pub(crate) fn insert(&mut self, info: SubsystemInfo) -> Option<SubsystemInfo> {
        self.groups.insert(info.name.clone(), info)
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<SubsystemInfo> {
        self.groups.remove(name)
    }

    pub(crate) fn clear(&mut self) {
        self.groups.clear();
    }

    /// A function registered one by one under a subsystem's namespace
    /// joins that group
    pub(crate) fn note_function(&mut self, namespace: &str, name: &str) {
        if let Some(info) = self.groups.get_mut(namespace) {
            if let Err(position) = info.functions.binary_search_by(|f| f.as_str().cmp(name)) {
                info.functions.insert(position, name.to_string());
            }
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &SubsystemInfo> {
        self.groups.values()
    }

    pub(crate) fn len(&self) -> usize {
        self.groups.len()
    }
}

impl Engine {
    /// Publish a subsystem's functions under its name.
    ///
    /// A name that is already registered is rejected or replaced according
    /// to [`EngineOptions::duplicate_subsystem`](crate::EngineOptions).
    pub fn register_subsystem(&self, subsystem: Subsystem) -> BindResult<()> {
        let name = subsystem.name().to_string();
        let policy = self.options().duplicate_subsystem;
        let _core = self.inner().lock();
        let previous = self.inner().with_state(|state| match state.subsystems.get(&name) {
            Some(_) if policy == DuplicatePolicy::Reject => {
                Err(BindError::DuplicateSubsystem(name.clone()))
            }
            existing => Ok(existing.cloned()),
        })?;

        let info = SubsystemInfo::of(&subsystem);
        let mut published: Vec<String> = Vec::with_capacity(info.functions.len());
        for path in info.paths() {
            if let Err(err) = self.inner().publish(&path, GlobalBinding::Native) {
                for path in &published {
                    self.inner().unpublish(path);
                }
                if let Some(old) = &previous {
                    for path in old.paths() {
                        if let Err(restore) = self.inner().publish(&path, GlobalBinding::Native) {
                            tracing::error!(
                                target: "tether::subsystem",
                                subsystem = name.as_str(),
                                path = path.as_str(),
                                error = %restore,
                                "failed to restore previous binding"
                            );
                        }
                    }
                }
                return Err(err);
            }
            published.push(path);
        }

        let stale: Vec<String> = previous
            .iter()
            .flat_map(SubsystemInfo::paths)
            .filter(|path| !published.contains(path))
            .collect();
        let function_count = info.functions.len();
        self.inner().with_state(|state| {
            for path in previous.iter().flat_map(SubsystemInfo::paths) {
                state.natives.remove(&path);
            }
            for (function, func) in subsystem.functions() {
                state.natives.insert(qualify(&name, function), Arc::clone(func));
            }
            state.subsystems.insert(info);
            Ok(())
        })?;
        for path in &stale {
            self.inner().unpublish(path);
        }

        tracing::info!(
            target: "tether::subsystem",
            subsystem = name.as_str(),
            version = subsystem.version(),
            functions = function_count,
            replaced = previous.is_some(),
            "subsystem registered"
        );
        Ok(())
    }

    /// Remove a subsystem and all of its functions.
    ///
    /// Returns `false` when no subsystem of that name is registered.
    pub fn unregister_subsystem(&self, name: &str) -> BindResult<bool> {
        let _core = self.inner().lock();
        let removed = self.inner().with_state(|state| {
            let removed = state.subsystems.remove(name);
            if let Some(info) = &removed {
                for path in info.paths() {
                    state.natives.remove(&path);
                }
            }
            Ok(removed)
        })?;
        let Some(info) = removed else {
            return Ok(false);
        };
        for path in info.paths() {
            self.inner().unpublish(&path);
        }
        tracing::info!(target: "tether::subsystem", subsystem = name, "subsystem unregistered");
        Ok(true)
    }

    /// Look up a registered subsystem
    pub fn subsystem(&self, name: &str) -> Option<SubsystemInfo> {
        let core = self.inner().lock();
        let state = core.state.borrow();
        state.subsystems.get(name).cloned()
    }

    /// Every registered subsystem, ordered by name
    pub fn subsystems(&self) -> Vec<SubsystemInfo> {
        let core = self.inner().lock();
        let state = core.state.borrow();
        state.subsystems.iter().cloned().collect()
    }
}
