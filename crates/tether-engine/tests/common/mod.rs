//! Shared helpers for engine integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use tether_engine::sdk::{NativeObject, ObjectId, TrackedId};
use tether_engine::{ContractPolicy, Engine, EngineOptions};
use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber once; `RUST_LOG` selects the level
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Engine with contract violations returned as errors
pub fn engine() -> Engine {
    engine_with(EngineOptions::default())
}

/// Engine from custom options, contract violations returned as errors
pub fn engine_with(options: EngineOptions) -> Engine {
    init_tracing();
    Engine::hosted(options.with_contract_policy(ContractPolicy::LogAndReject))
        .expect("valid options")
}

/// Ordered record of lifecycle events
#[derive(Debug, Default, Clone)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.0.lock().iter().filter(|e| e.as_str() == event).count()
    }
}

/// Native object that logs its hooks
#[derive(Debug)]
pub struct Tracked {
    pub id: ObjectId,
    pub label: String,
    pub log: EventLog,
}

impl Tracked {
    pub fn new(label: &str, log: &EventLog) -> Arc<Self> {
        Arc::new(Self {
            id: ObjectId::next(),
            label: label.to_string(),
            log: log.clone(),
        })
    }
}

impl NativeObject for Tracked {
    fn type_tag(&self) -> &str {
        "Tracked"
    }

    fn identity(&self) -> ObjectId {
        self.id
    }

    fn on_destroy(&self) {
        self.log.push(format!("destroy {}", self.label));
    }

    fn on_observed_release(&self, released: TrackedId) {
        self.log.push(format!("{} saw {}", self.label, released));
    }
}
