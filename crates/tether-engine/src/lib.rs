//! Tether binding engine
//!
//! Connects native Rust code to an embedded script runtime:
//! - **Handles**: generational handle tables for objects, tables and vectors
//!   (`handles` module)
//! - **Pins**: the registry that overrides collector reachability (`pin`)
//! - **Reflectors**: table and vector backing stores (`reflect`)
//! - **Runtime seam**: the [`ScriptRuntime`] trait and the bundled
//!   [`HostedRuntime`] (`runtime`)
//! - **Engine**: call dispatch in both directions, call frames, collection
//!   sweeps, subsystems and shutdown ([`Engine`])
//!
//! # Example
//!
//! ```rust,ignore
//! use tether_engine::{Engine, EngineOptions, HostedRuntime};
//! use tether_engine::sdk::{arg, DynamicValue, Subsystem};
//!
//! let engine = Engine::hosted(EngineOptions::default())?;
//!
//! let mut math = Subsystem::new("math", "1.0.0");
//! math.register("add", |ctx, args| {
//!     let a: f64 = arg(ctx, args, 0)?;
//!     let b: f64 = arg(ctx, args, 1)?;
//!     Ok(vec![DynamicValue::Number(a + b)])
//! });
//! engine.register_subsystem(math)?;
//!
//! engine.with_runtime(|rt: &HostedRuntime| {
//!     rt.define_function("main", |scope, _args| {
//!         scope.call("math.add", vec![1.0.into(), 2.0.into()])
//!     })
//! })??;
//!
//! let out = engine.call("main", &[])?;
//! engine.shutdown()?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod diag;
pub mod frame;
pub mod handles;
pub mod options;
pub mod pin;
pub mod reflect;
pub mod runtime;

mod engine;
mod registry;
mod stats;
mod subsystem;

pub use engine::Engine;
pub use options::{ContractPolicy, DuplicatePolicy, EngineOptions, OptionsError, VectorGrowth};
pub use registry::EngineRegistry;
pub use runtime::{
    FunctionRef, GlobalBinding, HostedRuntime, RootSet, ScriptFn, ScriptHost, ScriptRuntime,
    ScriptScope,
};
pub use stats::EngineStats;
pub use subsystem::SubsystemInfo;

/// Re-export of the SDK so embedders need a single dependency
pub use tether_sdk as sdk;
pub use tether_sdk::{BindError, BindResult, DynamicValue, NativeContext};

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
