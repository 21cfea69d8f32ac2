//! NativeContext trait: abstract engine operations
//!
//! Defines the interface the binding engine implements. Native functions
//! and marshaling code program against this trait without depending on
//! engine internals.

use crate::error::BindResult;
use crate::object::NativeObject;
use crate::value::{AnyHandle, DynamicValue, EngineId, ObjectHandle, TableHandle, VectorHandle};
use std::sync::Arc;

/// Abstract engine context handed to native functions.
///
/// Every method serializes on the engine's lock; calls made from inside a
/// native function re-enter on the same thread without blocking.
pub trait NativeContext {
    /// Id of the engine behind this context
    fn engine_id(&self) -> EngineId;

    // ========================================================================
    // Objects
    // ========================================================================

    /// Register a native object, or return its existing handle if its
    /// identity is already registered
    fn register_object(&self, object: Arc<dyn NativeObject>) -> BindResult<ObjectHandle>;

    /// Resolve an object handle
    fn resolve_object(&self, handle: ObjectHandle) -> BindResult<Arc<dyn NativeObject>>;

    // ========================================================================
    // Tables
    // ========================================================================

    /// Create an empty table
    fn create_table(&self) -> BindResult<TableHandle>;

    /// Read a table entry (nil if absent)
    fn table_get(&self, table: TableHandle, key: &DynamicValue) -> BindResult<DynamicValue>;

    /// Write a table entry (nil removes the key)
    fn table_set(&self, table: TableHandle, key: DynamicValue, value: DynamicValue)
        -> BindResult<()>;

    /// Number of entries
    fn table_len(&self, table: TableHandle) -> BindResult<usize>;

    /// Snapshot of all entries, in unspecified order
    fn table_entries(&self, table: TableHandle) -> BindResult<Vec<(DynamicValue, DynamicValue)>>;

    // ========================================================================
    // Vectors
    // ========================================================================

    /// Create an empty vector
    fn create_vector(&self) -> BindResult<VectorHandle>;

    /// Read the element at `index`
    fn vector_get(&self, vector: VectorHandle, index: usize) -> BindResult<DynamicValue>;

    /// Write the element at `index` (growth follows the engine's policy)
    fn vector_set(&self, vector: VectorHandle, index: usize, value: DynamicValue)
        -> BindResult<()>;

    /// Append an element
    fn vector_push(&self, vector: VectorHandle, value: DynamicValue) -> BindResult<()>;

    /// Current length
    fn vector_len(&self, vector: VectorHandle) -> BindResult<usize>;

    /// Snapshot of all elements in order
    fn vector_items(&self, vector: VectorHandle) -> BindResult<Vec<DynamicValue>>;

    // ========================================================================
    // Lifetimes
    // ========================================================================

    /// Pin a handle so collection sweeps keep it alive
    fn pin(&self, handle: AnyHandle) -> BindResult<()>;

    /// Release one pin
    fn unpin(&self, handle: AnyHandle) -> BindResult<()>;

    /// Pin a handle until the current call frame exits
    fn pin_scoped(&self, handle: AnyHandle) -> BindResult<()>;

    // ========================================================================
    // Calls
    // ========================================================================

    /// Call a script-visible function by dotted path
    fn call_script(&self, path: &str, args: &[DynamicValue]) -> BindResult<Vec<DynamicValue>>;

    /// Current native/script nesting depth
    fn call_depth(&self) -> usize;
}
