//! Tether SDK - types shared by native code and the binding engine
//!
//! This crate provides what native collaborators need to expose objects and
//! functions to a script runtime without depending on the full
//! `tether-engine`:
//!
//! - [`DynamicValue`], the closed value union exchanged across the boundary
//! - handle types ([`ObjectHandle`], [`TableHandle`], [`VectorHandle`])
//! - the error taxonomy ([`BindError`], [`ScriptError`], [`NativeError`])
//! - marshaling traits ([`IntoScript`], [`FromScript`])
//! - the [`NativeObject`] base capability
//! - the [`NativeContext`] trait the engine implements
//! - [`Subsystem`], a named group of native functions
//!
//! # Example
//!
//! ```ignore
//! use tether_sdk::{arg, DynamicValue, Subsystem};
//!
//! pub fn math() -> Subsystem {
//!     let mut sys = Subsystem::new("math", "1.0.0");
//!     sys.register("add", |ctx, args| {
//!         let a: f64 = arg(ctx, args, 0)?;
//!         let b: f64 = arg(ctx, args, 1)?;
//!         Ok(vec![DynamicValue::Number(a + b)])
//!     });
//!     sys
//! }
//! ```

#![warn(missing_docs)]

pub mod context;
pub mod convert;
pub mod error;
pub mod handler;
pub mod object;
pub mod value;

pub use context::NativeContext;
pub use convert::{arg, from_script, to_script, FromScript, IntoScript, Lossy};
pub use error::{BindError, BindResult, NativeError, ScriptError};
pub use handler::{NativeFn, NativeResult, Subsystem};
pub use object::{NativeObject, ObjectId, TrackedId};
pub use value::{
    AnyHandle, DynamicValue, EngineId, HandleId, ObjectHandle, TableHandle, TableKey, ValueKind,
    VectorHandle, MAX_SAFE_INTEGER,
};

/// SDK version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
