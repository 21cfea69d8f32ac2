//! Tether POSIX collaborators
//!
//! Native functions for environment variables and subprocesses, grouped
//! into the `env` and `process` subsystems. [`register_posix`] publishes
//! both into an engine:
//!
//! ```ignore
//! let engine = Engine::hosted(EngineOptions::default())?;
//! tether_stdlib_posix::register_posix(&engine)?;
//! let home = engine.call("env.get", &[DynamicValue::string("HOME")])?;
//! ```
//!
//! All functions are synchronous. Process handles are plain numbers that
//! stay valid until `process.release`; they are shared by every engine in
//! the process.

#![warn(missing_docs)]

pub mod handles;
pub mod registry;

pub mod env;
pub mod process;

pub use registry::register_posix;
