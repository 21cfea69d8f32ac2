//! DynamicValue: the closed value union exchanged across the boundary
//!
//! A `DynamicValue` never embeds a native pointer. Native objects, tables
//! and vectors are referenced through handles that the issuing engine
//! resolves through its handle tables.
//!
//! # Handle layout
//!
//! ```text
//! HandleId = { engine: u32, slot: u32, generation: u32 }
//! ```
//!
//! A handle is valid while its slot in the issuing engine still carries the
//! same generation. Freed slots bump their generation, so stale handles
//! fail to resolve instead of aliasing a newer value.

use crate::error::{BindError, BindResult};
use std::fmt;
use std::sync::Arc;

/// Largest integer magnitude that survives a round-trip through `f64`.
pub const MAX_SAFE_INTEGER: i64 = 1 << 53;

// ============================================================================
// Handles
// ============================================================================

/// Identifier of an engine instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineId(pub u32);

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine#{}", self.0)
    }
}

/// Raw handle id: issuing engine, slot index and slot generation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandleId {
    engine: EngineId,
    slot: u32,
    generation: u32,
}

impl HandleId {
    /// Create a handle id (used by handle tables)
    pub const fn new(engine: EngineId, slot: u32, generation: u32) -> Self {
        Self {
            engine,
            slot,
            generation,
        }
    }

    /// Engine that issued this handle
    pub fn engine(&self) -> EngineId {
        self.engine
    }

    /// Slot index inside the issuing table
    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// Generation of the slot when the handle was issued
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.engine.0, self.slot, self.generation)
    }
}

macro_rules! handle_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(transparent)]
        pub struct $name(HandleId);

        impl $name {
            /// Wrap a raw handle id
            pub const fn from_id(id: HandleId) -> Self {
                Self(id)
            }

            /// Raw handle id
            pub fn id(self) -> HandleId {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "<{}>"), self.0)
            }
        }
    };
}

handle_type!(ObjectHandle, "object", "Handle to a native object registered with an engine");
handle_type!(TableHandle, "table", "Handle to a reflected associative container");
handle_type!(VectorHandle, "vector", "Handle to a reflected sequential container");

/// Any handle, tagged with its kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnyHandle {
    /// Native object
    Object(ObjectHandle),
    /// Table
    Table(TableHandle),
    /// Vector
    Vector(VectorHandle),
}

impl AnyHandle {
    /// Raw handle id
    pub fn id(&self) -> HandleId {
        match self {
            AnyHandle::Object(h) => h.id(),
            AnyHandle::Table(h) => h.id(),
            AnyHandle::Vector(h) => h.id(),
        }
    }

    /// Kind of value this handle refers to
    pub fn kind(&self) -> ValueKind {
        match self {
            AnyHandle::Object(_) => ValueKind::Object,
            AnyHandle::Table(_) => ValueKind::Table,
            AnyHandle::Vector(_) => ValueKind::Vector,
        }
    }
}

impl fmt::Display for AnyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnyHandle::Object(h) => h.fmt(f),
            AnyHandle::Table(h) => h.fmt(f),
            AnyHandle::Vector(h) => h.fmt(f),
        }
    }
}

impl From<ObjectHandle> for AnyHandle {
    fn from(h: ObjectHandle) -> Self {
        AnyHandle::Object(h)
    }
}

impl From<TableHandle> for AnyHandle {
    fn from(h: TableHandle) -> Self {
        AnyHandle::Table(h)
    }
}

impl From<VectorHandle> for AnyHandle {
    fn from(h: VectorHandle) -> Self {
        AnyHandle::Vector(h)
    }
}

// ============================================================================
// Dynamic Value
// ============================================================================

/// Dynamic type of a value
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// nil
    Nil,
    /// boolean
    Bool,
    /// number (f64)
    Number,
    /// string
    String,
    /// native object handle
    Object,
    /// table handle
    Table,
    /// vector handle
    Vector,
}

impl ValueKind {
    /// Script-facing type name
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Nil => "nil",
            ValueKind::Bool => "boolean",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Object => "object",
            ValueKind::Table => "table",
            ValueKind::Vector => "vector",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Value exchanged between native code and the script runtime.
///
/// Strings are immutable buffers owned by the value; building one from a
/// native `&str` or `String` copies the bytes, so no native buffer is ever
/// aliased by the script side.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum DynamicValue {
    /// nil
    #[default]
    Nil,
    /// boolean
    Bool(bool),
    /// number; the only numeric representation on the script side
    Number(f64),
    /// immutable string buffer
    String(Arc<str>),
    /// native object handle
    Object(ObjectHandle),
    /// table handle
    Table(TableHandle),
    /// vector handle
    Vector(VectorHandle),
}

impl DynamicValue {
    /// Create a string value (copies `s`)
    pub fn string(s: &str) -> Self {
        DynamicValue::String(Arc::from(s))
    }

    /// Create a number from an integer, failing if it is not exactly
    /// representable as `f64`.
    pub fn integer(i: i64) -> BindResult<Self> {
        if i.unsigned_abs() > MAX_SAFE_INTEGER as u64 {
            return Err(BindError::PrecisionLoss {
                value: i.to_string(),
                target: "number",
            });
        }
        Ok(DynamicValue::Number(i as f64))
    }

    /// Dynamic type of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            DynamicValue::Nil => ValueKind::Nil,
            DynamicValue::Bool(_) => ValueKind::Bool,
            DynamicValue::Number(_) => ValueKind::Number,
            DynamicValue::String(_) => ValueKind::String,
            DynamicValue::Object(_) => ValueKind::Object,
            DynamicValue::Table(_) => ValueKind::Table,
            DynamicValue::Vector(_) => ValueKind::Vector,
        }
    }

    /// Script-facing type name
    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    /// Check if this is nil
    pub fn is_nil(&self) -> bool {
        matches!(self, DynamicValue::Nil)
    }

    /// Script truthiness: everything except nil and false is true
    pub fn is_truthy(&self) -> bool {
        !matches!(self, DynamicValue::Nil | DynamicValue::Bool(false))
    }

    /// Get as bool if this is a bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DynamicValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as f64 if this is a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            DynamicValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as str if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DynamicValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the object handle if this is an object
    pub fn as_object(&self) -> Option<ObjectHandle> {
        match self {
            DynamicValue::Object(h) => Some(*h),
            _ => None,
        }
    }

    /// Get the table handle if this is a table
    pub fn as_table(&self) -> Option<TableHandle> {
        match self {
            DynamicValue::Table(h) => Some(*h),
            _ => None,
        }
    }

    /// Get the vector handle if this is a vector
    pub fn as_vector(&self) -> Option<VectorHandle> {
        match self {
            DynamicValue::Vector(h) => Some(*h),
            _ => None,
        }
    }

    /// Get the handle of any handle variant
    pub fn handle(&self) -> Option<AnyHandle> {
        match self {
            DynamicValue::Object(h) => Some(AnyHandle::Object(*h)),
            DynamicValue::Table(h) => Some(AnyHandle::Table(*h)),
            DynamicValue::Vector(h) => Some(AnyHandle::Vector(*h)),
            _ => None,
        }
    }
}

impl fmt::Display for DynamicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DynamicValue::Nil => write!(f, "nil"),
            DynamicValue::Bool(b) => write!(f, "{}", b),
            DynamicValue::Number(n) => write!(f, "{}", n),
            DynamicValue::String(s) => write!(f, "{:?}", s),
            DynamicValue::Object(h) => h.fmt(f),
            DynamicValue::Table(h) => h.fmt(f),
            DynamicValue::Vector(h) => h.fmt(f),
        }
    }
}

impl From<bool> for DynamicValue {
    fn from(b: bool) -> Self {
        DynamicValue::Bool(b)
    }
}

impl From<f64> for DynamicValue {
    fn from(n: f64) -> Self {
        DynamicValue::Number(n)
    }
}

impl From<i32> for DynamicValue {
    fn from(i: i32) -> Self {
        DynamicValue::Number(i as f64)
    }
}

impl From<&str> for DynamicValue {
    fn from(s: &str) -> Self {
        DynamicValue::string(s)
    }
}

impl From<String> for DynamicValue {
    fn from(s: String) -> Self {
        DynamicValue::String(Arc::from(s))
    }
}

impl From<ObjectHandle> for DynamicValue {
    fn from(h: ObjectHandle) -> Self {
        DynamicValue::Object(h)
    }
}

impl From<TableHandle> for DynamicValue {
    fn from(h: TableHandle) -> Self {
        DynamicValue::Table(h)
    }
}

impl From<VectorHandle> for DynamicValue {
    fn from(h: VectorHandle) -> Self {
        DynamicValue::Vector(h)
    }
}

impl From<AnyHandle> for DynamicValue {
    fn from(h: AnyHandle) -> Self {
        match h {
            AnyHandle::Object(h) => DynamicValue::Object(h),
            AnyHandle::Table(h) => DynamicValue::Table(h),
            AnyHandle::Vector(h) => DynamicValue::Vector(h),
        }
    }
}

// ============================================================================
// Table keys
// ============================================================================

/// Hashable form of a [`DynamicValue`] used as a table key.
///
/// Numbers are keyed by their bit pattern with `-0.0` folded into `0.0`.
/// Nil and NaN cannot be keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TableKey {
    /// boolean key
    Bool(bool),
    /// number key (normalized f64 bits)
    Number(u64),
    /// string key
    String(Arc<str>),
    /// object handle key
    Object(ObjectHandle),
    /// table handle key
    Table(TableHandle),
    /// vector handle key
    Vector(VectorHandle),
}

impl TableKey {
    /// Build a key from a value, rejecting nil and NaN
    pub fn from_value(value: &DynamicValue) -> BindResult<Self> {
        Ok(match value {
            DynamicValue::Nil => return Err(BindError::InvalidKey("nil".to_string())),
            DynamicValue::Number(n) if n.is_nan() => {
                return Err(BindError::InvalidKey("NaN".to_string()))
            }
            DynamicValue::Bool(b) => TableKey::Bool(*b),
            DynamicValue::Number(n) => {
                let n = if *n == 0.0 { 0.0 } else { *n };
                TableKey::Number(n.to_bits())
            }
            DynamicValue::String(s) => TableKey::String(Arc::clone(s)),
            DynamicValue::Object(h) => TableKey::Object(*h),
            DynamicValue::Table(h) => TableKey::Table(*h),
            DynamicValue::Vector(h) => TableKey::Vector(*h),
        })
    }

    /// Convert back into a value
    pub fn to_value(&self) -> DynamicValue {
        match self {
            TableKey::Bool(b) => DynamicValue::Bool(*b),
            TableKey::Number(bits) => DynamicValue::Number(f64::from_bits(*bits)),
            TableKey::String(s) => DynamicValue::String(Arc::clone(s)),
            TableKey::Object(h) => DynamicValue::Object(*h),
            TableKey::Table(h) => DynamicValue::Table(*h),
            TableKey::Vector(h) => DynamicValue::Vector(*h),
        }
    }

    /// Handle carried by this key, if any
    pub fn handle(&self) -> Option<AnyHandle> {
        match self {
            TableKey::Object(h) => Some(AnyHandle::Object(*h)),
            TableKey::Table(h) => Some(AnyHandle::Table(*h)),
            TableKey::Vector(h) => Some(AnyHandle::Vector(*h)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(slot: u32) -> TableHandle {
        TableHandle::from_id(HandleId::new(EngineId(1), slot, 0))
    }

    #[test]
    fn test_value_kinds() {
        assert_eq!(DynamicValue::Nil.kind(), ValueKind::Nil);
        assert_eq!(DynamicValue::from(true).kind(), ValueKind::Bool);
        assert_eq!(DynamicValue::from(1.5).kind(), ValueKind::Number);
        assert_eq!(DynamicValue::from("hi").kind(), ValueKind::String);
        assert_eq!(DynamicValue::from(table(0)).kind(), ValueKind::Table);
        assert_eq!(DynamicValue::from(table(0)).type_name(), "table");
    }

    #[test]
    fn test_truthiness() {
        assert!(!DynamicValue::Nil.is_truthy());
        assert!(!DynamicValue::Bool(false).is_truthy());
        assert!(DynamicValue::Number(0.0).is_truthy());
        assert!(DynamicValue::string("").is_truthy());
    }

    #[test]
    fn test_integer_precision_boundary() {
        assert_eq!(
            DynamicValue::integer(MAX_SAFE_INTEGER).unwrap(),
            DynamicValue::Number(9007199254740992.0)
        );
        assert_eq!(
            DynamicValue::integer(-MAX_SAFE_INTEGER).unwrap(),
            DynamicValue::Number(-9007199254740992.0)
        );
        assert!(matches!(
            DynamicValue::integer(MAX_SAFE_INTEGER + 1),
            Err(BindError::PrecisionLoss { .. })
        ));
        assert!(matches!(
            DynamicValue::integer(i64::MIN),
            Err(BindError::PrecisionLoss { .. })
        ));
    }

    #[test]
    fn test_strings_are_copied() {
        let native = String::from("payload");
        let value = DynamicValue::string(&native);
        drop(native);
        assert_eq!(value.as_str(), Some("payload"));
    }

    #[test]
    fn test_table_key_rejects_nil_and_nan() {
        assert!(matches!(
            TableKey::from_value(&DynamicValue::Nil),
            Err(BindError::InvalidKey(_))
        ));
        assert!(matches!(
            TableKey::from_value(&DynamicValue::Number(f64::NAN)),
            Err(BindError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_table_key_folds_negative_zero() {
        let pos = TableKey::from_value(&DynamicValue::Number(0.0)).unwrap();
        let neg = TableKey::from_value(&DynamicValue::Number(-0.0)).unwrap();
        assert_eq!(pos, neg);
    }

    #[test]
    fn test_table_key_round_trip() {
        let values = [
            DynamicValue::Bool(true),
            DynamicValue::Number(42.5),
            DynamicValue::string("name"),
            DynamicValue::Table(table(7)),
        ];
        for value in values {
            let key = TableKey::from_value(&value).unwrap();
            assert_eq!(key.to_value(), value);
        }
    }

    #[test]
    fn test_handle_accessors() {
        let h = table(3);
        let value = DynamicValue::from(h);
        assert_eq!(value.as_table(), Some(h));
        assert_eq!(value.as_object(), None);
        assert_eq!(value.handle(), Some(AnyHandle::Table(h)));
        assert_eq!(AnyHandle::from(h).kind(), ValueKind::Table);
        assert_eq!(h.id().slot(), 3);
    }
}
