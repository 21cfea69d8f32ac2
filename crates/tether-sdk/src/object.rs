//! Native object base capability
//!
//! Every native type exposed to a script runtime implements [`NativeObject`].
//! The engine stores objects as `Arc<dyn NativeObject>` behind an
//! [`ObjectHandle`](crate::ObjectHandle); scripts only ever see the handle.

use crate::context::NativeContext;
use crate::error::BindResult;
use crate::value::{DynamicValue, TableHandle, VectorHandle};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Stable identity of a native object
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

impl ObjectId {
    /// Allocate a fresh process-wide identity
    pub fn next() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// Identity of anything the pin registry tracks.
///
/// Native objects carry their own identity; tables and vectors are
/// identified by the handle the engine issued for them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrackedId {
    /// Native object
    Object(ObjectId),
    /// Reflected table
    Table(TableHandle),
    /// Reflected vector
    Vector(VectorHandle),
}

impl fmt::Display for TrackedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackedId::Object(id) => id.fmt(f),
            TrackedId::Table(h) => h.fmt(f),
            TrackedId::Vector(h) => h.fmt(f),
        }
    }
}

impl From<ObjectId> for TrackedId {
    fn from(id: ObjectId) -> Self {
        TrackedId::Object(id)
    }
}

/// Capability every native type implements to be exposed to scripts.
///
/// # Lifetime
///
/// `on_destroy` is called exactly once, when the engine finalizes the
/// object: either a collection sweep found it unreachable and unpinned,
/// or the engine is shutting down. After the hook runs the object's handle
/// no longer resolves.
///
/// # Custom marshaling
///
/// By default an `Arc<T>` crosses into a script as an object handle and
/// comes back by resolving that handle. A type that has a natural script
/// form (a string, a number, a table) overrides [`to_script_value`] and
/// [`from_script_value`]; returning `None` falls back to the handle.
///
/// [`to_script_value`]: NativeObject::to_script_value
/// [`from_script_value`]: NativeObject::from_script_value
///
/// # Example
///
/// ```ignore
/// struct Sprite { id: ObjectId, name: String }
///
/// impl NativeObject for Sprite {
///     fn type_tag(&self) -> &str { "Sprite" }
///     fn identity(&self) -> ObjectId { self.id }
/// }
/// ```
pub trait NativeObject: Any + Send + Sync {
    /// Type name shown to scripts and used in type-mismatch errors
    fn type_tag(&self) -> &str;

    /// Identity, stable for the object's whole life
    fn identity(&self) -> ObjectId;

    /// Finalization hook
    fn on_destroy(&self) {}

    /// Called when an object this one observes (weakly) is finalized
    fn on_observed_release(&self, _released: TrackedId) {}

    /// Script representation to use instead of an object handle
    fn to_script_value(&self, _ctx: &dyn NativeContext) -> Option<BindResult<DynamicValue>> {
        None
    }

    /// Rebuild the object from a value that is not an object handle
    fn from_script_value(
        _value: &DynamicValue,
        _ctx: &dyn NativeContext,
    ) -> Option<BindResult<Arc<Self>>>
    where
        Self: Sized,
    {
        None
    }
}

impl fmt::Debug for dyn NativeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeObject")
            .field("type_tag", &self.type_tag())
            .field("identity", &self.identity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_ids_are_unique() {
        let a = ObjectId::next();
        let b = ObjectId::next();
        assert_ne!(a, b);
        assert!(b.0 > a.0);
    }

    #[test]
    fn test_tracked_id_display() {
        assert_eq!(TrackedId::Object(ObjectId(9)).to_string(), "obj#9");
    }
}
