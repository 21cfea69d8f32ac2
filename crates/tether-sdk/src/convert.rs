//! Marshaling between native types and [`DynamicValue`]
//!
//! `IntoScript` and `FromScript` are total over the supported native set:
//! bool, integers, floats, strings, native objects, containers and handles.
//! Conversions never coerce silently:
//!
//! - integers outside `±2^53` fail with `PrecisionLoss` on the way in, and
//!   numbers with a fractional part fail with `PrecisionLoss` on the way
//!   out; [`Lossy`] is the explicit escape hatch
//! - object handles are checked against the expected concrete type and fail
//!   with `TypeMismatch` instead of being reinterpreted
//! - strings are copied in both directions

use crate::context::NativeContext;
use crate::error::{BindError, BindResult};
use crate::object::NativeObject;
use crate::value::{
    AnyHandle, DynamicValue, ObjectHandle, TableHandle, VectorHandle, MAX_SAFE_INTEGER,
};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::Arc;

/// Convert a native value into a [`DynamicValue`].
pub trait IntoScript {
    /// Marshal into the script representation
    fn into_script(self, ctx: &dyn NativeContext) -> BindResult<DynamicValue>;
}

/// Convert a [`DynamicValue`] back into a native value.
pub trait FromScript: Sized {
    /// Unmarshal, failing if the dynamic type does not match
    fn from_script(value: &DynamicValue, ctx: &dyn NativeContext) -> BindResult<Self>;
}

/// Marshal `value` into a [`DynamicValue`]
pub fn to_script<T: IntoScript>(value: T, ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
    value.into_script(ctx)
}

/// Unmarshal `value` as a `T`
pub fn from_script<T: FromScript>(value: &DynamicValue, ctx: &dyn NativeContext) -> BindResult<T> {
    T::from_script(value, ctx)
}

/// Unmarshal argument `index`; a missing argument reads as nil
pub fn arg<T: FromScript>(
    ctx: &dyn NativeContext,
    args: &[DynamicValue],
    index: usize,
) -> BindResult<T> {
    match args.get(index) {
        Some(value) => T::from_script(value, ctx),
        None => T::from_script(&DynamicValue::Nil, ctx),
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

fn mismatch(expected: &str, value: &DynamicValue) -> BindError {
    BindError::type_mismatch(expected, value.type_name())
}

/// Read a number that must be integral
fn integral(value: &DynamicValue, target: &'static str) -> BindResult<f64> {
    let n = match value {
        DynamicValue::Number(n) => *n,
        other => return Err(mismatch(target, other)),
    };
    if !n.is_finite() || n.fract() != 0.0 {
        return Err(BindError::PrecisionLoss {
            value: n.to_string(),
            target,
        });
    }
    Ok(n)
}

fn out_of_range(n: f64, target: &'static str) -> BindError {
    BindError::PrecisionLoss {
        value: n.to_string(),
        target,
    }
}

// ============================================================================
// Primitives
// ============================================================================

impl IntoScript for DynamicValue {
    fn into_script(self, _ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
        Ok(self)
    }
}

impl FromScript for DynamicValue {
    fn from_script(value: &DynamicValue, _ctx: &dyn NativeContext) -> BindResult<Self> {
        Ok(value.clone())
    }
}

impl IntoScript for () {
    fn into_script(self, _ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
        Ok(DynamicValue::Nil)
    }
}

impl IntoScript for bool {
    fn into_script(self, _ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
        Ok(DynamicValue::Bool(self))
    }
}

impl FromScript for bool {
    fn from_script(value: &DynamicValue, _ctx: &dyn NativeContext) -> BindResult<Self> {
        value.as_bool().ok_or_else(|| mismatch("boolean", value))
    }
}

impl IntoScript for f64 {
    fn into_script(self, _ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
        Ok(DynamicValue::Number(self))
    }
}

impl FromScript for f64 {
    fn from_script(value: &DynamicValue, _ctx: &dyn NativeContext) -> BindResult<Self> {
        value.as_number().ok_or_else(|| mismatch("number", value))
    }
}

impl IntoScript for f32 {
    fn into_script(self, _ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
        Ok(DynamicValue::Number(self as f64))
    }
}

impl FromScript for f32 {
    fn from_script(value: &DynamicValue, _ctx: &dyn NativeContext) -> BindResult<Self> {
        let n = value.as_number().ok_or_else(|| mismatch("f32", value))?;
        let narrowed = n as f32;
        if n.is_finite() && narrowed as f64 != n {
            return Err(BindError::PrecisionLoss {
                value: n.to_string(),
                target: "f32",
            });
        }
        Ok(narrowed)
    }
}

macro_rules! small_int {
    ($($t:ty),*) => {
        $(
            impl IntoScript for $t {
                fn into_script(self, _ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
                    Ok(DynamicValue::Number(self as f64))
                }
            }

            impl FromScript for $t {
                fn from_script(value: &DynamicValue, _ctx: &dyn NativeContext) -> BindResult<Self> {
                    let n = integral(value, stringify!($t))?;
                    if n < <$t>::MIN as f64 || n > <$t>::MAX as f64 {
                        return Err(out_of_range(n, stringify!($t)));
                    }
                    Ok(n as $t)
                }
            }
        )*
    };
}

small_int!(i8, i16, i32, u8, u16, u32);

// 2^63 and 2^64 are exact in f64, so the range checks below are exact too.
const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

impl IntoScript for i64 {
    fn into_script(self, _ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
        DynamicValue::integer(self)
    }
}

impl FromScript for i64 {
    fn from_script(value: &DynamicValue, _ctx: &dyn NativeContext) -> BindResult<Self> {
        let n = integral(value, "i64")?;
        if n < -TWO_POW_63 || n >= TWO_POW_63 {
            return Err(out_of_range(n, "i64"));
        }
        Ok(n as i64)
    }
}

impl IntoScript for u64 {
    fn into_script(self, _ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
        if self > MAX_SAFE_INTEGER as u64 {
            return Err(BindError::PrecisionLoss {
                value: self.to_string(),
                target: "number",
            });
        }
        Ok(DynamicValue::Number(self as f64))
    }
}

impl FromScript for u64 {
    fn from_script(value: &DynamicValue, _ctx: &dyn NativeContext) -> BindResult<Self> {
        let n = integral(value, "u64")?;
        if n < 0.0 || n >= TWO_POW_64 {
            return Err(out_of_range(n, "u64"));
        }
        Ok(n as u64)
    }
}

impl IntoScript for isize {
    fn into_script(self, ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
        (self as i64).into_script(ctx)
    }
}

impl FromScript for isize {
    fn from_script(value: &DynamicValue, ctx: &dyn NativeContext) -> BindResult<Self> {
        let n = i64::from_script(value, ctx)?;
        isize::try_from(n).map_err(|_| out_of_range(n as f64, "isize"))
    }
}

impl IntoScript for usize {
    fn into_script(self, ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
        (self as u64).into_script(ctx)
    }
}

impl FromScript for usize {
    fn from_script(value: &DynamicValue, ctx: &dyn NativeContext) -> BindResult<Self> {
        let n = u64::from_script(value, ctx)?;
        usize::try_from(n).map_err(|_| out_of_range(n as f64, "usize"))
    }
}

/// Explicit lossy integer path.
///
/// `Lossy<i64>` and `Lossy<u64>` marshal through `f64` with rounding on the
/// way in and truncating, saturating casts on the way out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lossy<T>(pub T);

impl IntoScript for Lossy<i64> {
    fn into_script(self, _ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
        Ok(DynamicValue::Number(self.0 as f64))
    }
}

impl FromScript for Lossy<i64> {
    fn from_script(value: &DynamicValue, _ctx: &dyn NativeContext) -> BindResult<Self> {
        let n = value.as_number().ok_or_else(|| mismatch("number", value))?;
        Ok(Lossy(n as i64))
    }
}

impl IntoScript for Lossy<u64> {
    fn into_script(self, _ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
        Ok(DynamicValue::Number(self.0 as f64))
    }
}

impl FromScript for Lossy<u64> {
    fn from_script(value: &DynamicValue, _ctx: &dyn NativeContext) -> BindResult<Self> {
        let n = value.as_number().ok_or_else(|| mismatch("number", value))?;
        Ok(Lossy(n as u64))
    }
}

// ============================================================================
// Strings
// ============================================================================

impl IntoScript for String {
    fn into_script(self, _ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
        Ok(DynamicValue::from(self))
    }
}

impl IntoScript for &str {
    fn into_script(self, _ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
        Ok(DynamicValue::string(self))
    }
}

impl FromScript for String {
    fn from_script(value: &DynamicValue, _ctx: &dyn NativeContext) -> BindResult<Self> {
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| mismatch("string", value))
    }
}

// ============================================================================
// Handles and objects
// ============================================================================

impl IntoScript for ObjectHandle {
    fn into_script(self, _ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
        Ok(DynamicValue::Object(self))
    }
}

impl FromScript for ObjectHandle {
    fn from_script(value: &DynamicValue, _ctx: &dyn NativeContext) -> BindResult<Self> {
        value.as_object().ok_or_else(|| mismatch("object", value))
    }
}

impl IntoScript for TableHandle {
    fn into_script(self, _ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
        Ok(DynamicValue::Table(self))
    }
}

impl FromScript for TableHandle {
    fn from_script(value: &DynamicValue, _ctx: &dyn NativeContext) -> BindResult<Self> {
        value.as_table().ok_or_else(|| mismatch("table", value))
    }
}

impl IntoScript for VectorHandle {
    fn into_script(self, _ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
        Ok(DynamicValue::Vector(self))
    }
}

impl FromScript for VectorHandle {
    fn from_script(value: &DynamicValue, _ctx: &dyn NativeContext) -> BindResult<Self> {
        value.as_vector().ok_or_else(|| mismatch("vector", value))
    }
}

impl IntoScript for AnyHandle {
    fn into_script(self, _ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
        Ok(DynamicValue::from(self))
    }
}

impl FromScript for AnyHandle {
    fn from_script(value: &DynamicValue, _ctx: &dyn NativeContext) -> BindResult<Self> {
        value.handle().ok_or_else(|| mismatch("handle", value))
    }
}

impl<T: NativeObject> IntoScript for Arc<T> {
    fn into_script(self, ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
        if let Some(custom) = self.to_script_value(ctx) {
            return custom;
        }
        let object: Arc<dyn NativeObject> = self;
        Ok(DynamicValue::Object(ctx.register_object(object)?))
    }
}

impl<T: NativeObject> FromScript for Arc<T> {
    fn from_script(value: &DynamicValue, ctx: &dyn NativeContext) -> BindResult<Self> {
        let Some(handle) = value.as_object() else {
            return T::from_script_value(value, ctx)
                .unwrap_or_else(|| Err(mismatch(short_type_name::<T>(), value)));
        };
        let object = ctx.resolve_object(handle)?;
        let type_tag = object.type_tag().to_string();
        let any: Arc<dyn Any + Send + Sync> = object;
        any.downcast::<T>()
            .map_err(|_| BindError::type_mismatch(short_type_name::<T>(), type_tag))
    }
}

// ============================================================================
// Containers
// ============================================================================

impl<T: IntoScript> IntoScript for Option<T> {
    fn into_script(self, ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
        match self {
            Some(value) => value.into_script(ctx),
            None => Ok(DynamicValue::Nil),
        }
    }
}

impl<T: FromScript> FromScript for Option<T> {
    fn from_script(value: &DynamicValue, ctx: &dyn NativeContext) -> BindResult<Self> {
        if value.is_nil() {
            Ok(None)
        } else {
            T::from_script(value, ctx).map(Some)
        }
    }
}

impl<T: IntoScript> IntoScript for Vec<T> {
    fn into_script(self, ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
        let vector = ctx.create_vector()?;
        for item in self {
            let value = item.into_script(ctx)?;
            ctx.vector_push(vector, value)?;
        }
        Ok(DynamicValue::Vector(vector))
    }
}

impl<T: FromScript> FromScript for Vec<T> {
    fn from_script(value: &DynamicValue, ctx: &dyn NativeContext) -> BindResult<Self> {
        let vector = value.as_vector().ok_or_else(|| mismatch("vector", value))?;
        ctx.vector_items(vector)?
            .iter()
            .map(|item| T::from_script(item, ctx))
            .collect()
    }
}

fn table_from_pairs<K, V, I>(pairs: I, ctx: &dyn NativeContext) -> BindResult<DynamicValue>
where
    K: IntoScript,
    V: IntoScript,
    I: IntoIterator<Item = (K, V)>,
{
    let table = ctx.create_table()?;
    for (k, v) in pairs {
        let key = k.into_script(ctx)?;
        let value = v.into_script(ctx)?;
        ctx.table_set(table, key, value)?;
    }
    Ok(DynamicValue::Table(table))
}

impl<K: IntoScript, V: IntoScript, S> IntoScript for HashMap<K, V, S> {
    fn into_script(self, ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
        table_from_pairs(self, ctx)
    }
}

impl<K, V, S> FromScript for HashMap<K, V, S>
where
    K: FromScript + Eq + Hash,
    V: FromScript,
    S: std::hash::BuildHasher + Default,
{
    fn from_script(value: &DynamicValue, ctx: &dyn NativeContext) -> BindResult<Self> {
        let table = value.as_table().ok_or_else(|| mismatch("table", value))?;
        ctx.table_entries(table)?
            .iter()
            .map(|(k, v)| Ok((K::from_script(k, ctx)?, V::from_script(v, ctx)?)))
            .collect()
    }
}

impl<K: IntoScript, V: IntoScript> IntoScript for BTreeMap<K, V> {
    fn into_script(self, ctx: &dyn NativeContext) -> BindResult<DynamicValue> {
        table_from_pairs(self, ctx)
    }
}

impl<K: FromScript + Ord, V: FromScript> FromScript for BTreeMap<K, V> {
    fn from_script(value: &DynamicValue, ctx: &dyn NativeContext) -> BindResult<Self> {
        let table = value.as_table().ok_or_else(|| mismatch("table", value))?;
        ctx.table_entries(table)?
            .iter()
            .map(|(k, v)| Ok((K::from_script(k, ctx)?, V::from_script(v, ctx)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectId;
    use crate::value::{EngineId, HandleId, TableKey};
    use std::cell::RefCell;

    /// Minimal in-memory context: objects, tables and vectors in plain vecs
    #[derive(Default)]
    struct MockContext {
        objects: RefCell<Vec<Arc<dyn NativeObject>>>,
        tables: RefCell<Vec<Vec<(TableKey, DynamicValue)>>>,
        vectors: RefCell<Vec<Vec<DynamicValue>>>,
    }

    fn id(slot: usize) -> HandleId {
        HandleId::new(EngineId(0), slot as u32, 0)
    }

    impl NativeContext for MockContext {
        fn engine_id(&self) -> EngineId {
            EngineId(0)
        }

        fn register_object(&self, object: Arc<dyn NativeObject>) -> BindResult<ObjectHandle> {
            let mut objects = self.objects.borrow_mut();
            objects.push(object);
            Ok(ObjectHandle::from_id(id(objects.len() - 1)))
        }

        fn resolve_object(&self, handle: ObjectHandle) -> BindResult<Arc<dyn NativeObject>> {
            self.objects
                .borrow()
                .get(handle.id().slot() as usize)
                .cloned()
                .ok_or_else(|| BindError::UseAfterRelease(handle.to_string()))
        }

        fn create_table(&self) -> BindResult<TableHandle> {
            let mut tables = self.tables.borrow_mut();
            tables.push(Vec::new());
            Ok(TableHandle::from_id(id(tables.len() - 1)))
        }

        fn table_get(&self, table: TableHandle, key: &DynamicValue) -> BindResult<DynamicValue> {
            let key = TableKey::from_value(key)?;
            Ok(self.tables.borrow()[table.id().slot() as usize]
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
                .unwrap_or_default())
        }

        fn table_set(
            &self,
            table: TableHandle,
            key: DynamicValue,
            value: DynamicValue,
        ) -> BindResult<()> {
            let key = TableKey::from_value(&key)?;
            let mut tables = self.tables.borrow_mut();
            let entries = &mut tables[table.id().slot() as usize];
            entries.retain(|(k, _)| *k != key);
            if !value.is_nil() {
                entries.push((key, value));
            }
            Ok(())
        }

        fn table_len(&self, table: TableHandle) -> BindResult<usize> {
            Ok(self.tables.borrow()[table.id().slot() as usize].len())
        }

        fn table_entries(
            &self,
            table: TableHandle,
        ) -> BindResult<Vec<(DynamicValue, DynamicValue)>> {
            Ok(self.tables.borrow()[table.id().slot() as usize]
                .iter()
                .map(|(k, v)| (k.to_value(), v.clone()))
                .collect())
        }

        fn create_vector(&self) -> BindResult<VectorHandle> {
            let mut vectors = self.vectors.borrow_mut();
            vectors.push(Vec::new());
            Ok(VectorHandle::from_id(id(vectors.len() - 1)))
        }

        fn vector_get(&self, vector: VectorHandle, index: usize) -> BindResult<DynamicValue> {
            let vectors = self.vectors.borrow();
            let items = &vectors[vector.id().slot() as usize];
            items.get(index).cloned().ok_or(BindError::IndexOutOfRange {
                index,
                len: items.len(),
            })
        }

        fn vector_set(
            &self,
            vector: VectorHandle,
            index: usize,
            value: DynamicValue,
        ) -> BindResult<()> {
            let mut vectors = self.vectors.borrow_mut();
            let items = &mut vectors[vector.id().slot() as usize];
            match index.cmp(&items.len()) {
                std::cmp::Ordering::Less => items[index] = value,
                std::cmp::Ordering::Equal => items.push(value),
                std::cmp::Ordering::Greater => {
                    return Err(BindError::IndexOutOfRange {
                        index,
                        len: items.len(),
                    })
                }
            }
            Ok(())
        }

        fn vector_push(&self, vector: VectorHandle, value: DynamicValue) -> BindResult<()> {
            self.vectors.borrow_mut()[vector.id().slot() as usize].push(value);
            Ok(())
        }

        fn vector_len(&self, vector: VectorHandle) -> BindResult<usize> {
            Ok(self.vectors.borrow()[vector.id().slot() as usize].len())
        }

        fn vector_items(&self, vector: VectorHandle) -> BindResult<Vec<DynamicValue>> {
            Ok(self.vectors.borrow()[vector.id().slot() as usize].clone())
        }

        fn pin(&self, _handle: AnyHandle) -> BindResult<()> {
            Ok(())
        }

        fn unpin(&self, _handle: AnyHandle) -> BindResult<()> {
            Ok(())
        }

        fn pin_scoped(&self, _handle: AnyHandle) -> BindResult<()> {
            Ok(())
        }

        fn call_script(&self, path: &str, _args: &[DynamicValue]) -> BindResult<Vec<DynamicValue>> {
            Err(BindError::UnknownFunction(path.to_string()))
        }

        fn call_depth(&self) -> usize {
            0
        }
    }

    #[derive(Debug)]
    struct Sprite {
        id: ObjectId,
        name: String,
    }

    impl NativeObject for Sprite {
        fn type_tag(&self) -> &str {
            "Sprite"
        }

        fn identity(&self) -> ObjectId {
            self.id
        }
    }

    #[derive(Debug)]
    struct Sound {
        id: ObjectId,
    }

    impl NativeObject for Sound {
        fn type_tag(&self) -> &str {
            "Sound"
        }

        fn identity(&self) -> ObjectId {
            self.id
        }
    }

    /// Crosses into scripts as its plain text instead of a handle
    #[derive(Debug)]
    struct Label {
        id: ObjectId,
        text: String,
    }

    impl NativeObject for Label {
        fn type_tag(&self) -> &str {
            "Label"
        }

        fn identity(&self) -> ObjectId {
            self.id
        }

        fn to_script_value(&self, _ctx: &dyn NativeContext) -> Option<BindResult<DynamicValue>> {
            Some(Ok(DynamicValue::string(self.text.as_str())))
        }

        fn from_script_value(
            value: &DynamicValue,
            _ctx: &dyn NativeContext,
        ) -> Option<BindResult<Arc<Self>>> {
            let text = value.as_str()?;
            Some(Ok(Arc::new(Label {
                id: ObjectId::next(),
                text: text.to_string(),
            })))
        }
    }

    fn round_trip<T>(ctx: &MockContext, v: T) -> T
    where
        T: IntoScript + FromScript,
    {
        let value = to_script(v, ctx).unwrap();
        from_script(&value, ctx).unwrap()
    }

    #[test]
    fn test_primitive_round_trips() {
        let ctx = MockContext::default();
        assert!(round_trip(&ctx, true));
        assert_eq!(round_trip(&ctx, -17i32), -17);
        assert_eq!(round_trip(&ctx, 255u8), 255);
        assert_eq!(round_trip(&ctx, MAX_SAFE_INTEGER), MAX_SAFE_INTEGER);
        assert_eq!(round_trip(&ctx, -MAX_SAFE_INTEGER), -MAX_SAFE_INTEGER);
        assert_eq!(round_trip(&ctx, 3.25f64), 3.25);
        assert_eq!(round_trip(&ctx, 0.5f32), 0.5);
        assert_eq!(round_trip(&ctx, String::from("héllo")), "héllo");
        assert_eq!(round_trip(&ctx, 42usize), 42);
    }

    #[test]
    fn test_integer_outside_safe_range_is_precision_loss() {
        let ctx = MockContext::default();
        assert!(matches!(
            to_script(MAX_SAFE_INTEGER + 1, &ctx),
            Err(BindError::PrecisionLoss { .. })
        ));
        assert!(matches!(
            to_script(u64::MAX, &ctx),
            Err(BindError::PrecisionLoss { .. })
        ));
    }

    #[test]
    fn test_fractional_number_to_integer_is_precision_loss() {
        let ctx = MockContext::default();
        let value = DynamicValue::Number(1.5);
        assert!(matches!(
            from_script::<i32>(&value, &ctx),
            Err(BindError::PrecisionLoss { target: "i32", .. })
        ));
        assert!(matches!(
            from_script::<i64>(&DynamicValue::Number(f64::INFINITY), &ctx),
            Err(BindError::PrecisionLoss { .. })
        ));
    }

    #[test]
    fn test_out_of_range_small_integer_fails() {
        let ctx = MockContext::default();
        assert!(from_script::<u8>(&DynamicValue::Number(256.0), &ctx).is_err());
        assert!(from_script::<u32>(&DynamicValue::Number(-1.0), &ctx).is_err());
        assert_eq!(from_script::<i8>(&DynamicValue::Number(-128.0), &ctx).unwrap(), -128);
    }

    #[test]
    fn test_lossy_path_does_not_fail() {
        let ctx = MockContext::default();
        let big = i64::MAX;
        let value = to_script(Lossy(big), &ctx).unwrap();
        assert_eq!(value, DynamicValue::Number(big as f64));
        let back: Lossy<i64> = from_script(&DynamicValue::Number(2.75), &ctx).unwrap();
        assert_eq!(back, Lossy(2));
    }

    #[test]
    fn test_wrong_dynamic_type_is_type_mismatch() {
        let ctx = MockContext::default();
        let err = from_script::<bool>(&DynamicValue::string("yes"), &ctx).unwrap_err();
        assert_eq!(err, BindError::type_mismatch("boolean", "string"));
        assert!(from_script::<String>(&DynamicValue::Number(1.0), &ctx).is_err());
    }

    #[test]
    fn test_object_round_trip_preserves_identity() {
        let ctx = MockContext::default();
        let sprite = Arc::new(Sprite {
            id: ObjectId::next(),
            name: "hero".into(),
        });
        let value = to_script(Arc::clone(&sprite), &ctx).unwrap();
        let back: Arc<Sprite> = from_script(&value, &ctx).unwrap();
        assert!(Arc::ptr_eq(&sprite, &back));
        assert_eq!(back.name, "hero");
    }

    #[test]
    fn test_object_of_other_type_is_type_mismatch() {
        let ctx = MockContext::default();
        let sound = Arc::new(Sound { id: ObjectId::next() });
        let value = to_script(sound, &ctx).unwrap();
        let err = from_script::<Arc<Sprite>>(&value, &ctx).unwrap_err();
        assert_eq!(err, BindError::type_mismatch("Sprite", "Sound"));
    }

    #[test]
    fn test_custom_marshaling_hooks_bypass_handles() {
        let ctx = MockContext::default();
        let label = Arc::new(Label {
            id: ObjectId::next(),
            text: "score".into(),
        });
        let value = to_script(label, &ctx).unwrap();
        assert_eq!(value, DynamicValue::string("score"));
        assert!(ctx.objects.borrow().is_empty());

        let back: Arc<Label> = from_script(&DynamicValue::string("lives"), &ctx).unwrap();
        assert_eq!(back.text, "lives");

        let err = from_script::<Arc<Label>>(&DynamicValue::Number(3.0), &ctx).unwrap_err();
        assert_eq!(err, BindError::type_mismatch("Label", "number"));
    }

    #[test]
    fn test_custom_marshaling_still_accepts_handles() {
        let ctx = MockContext::default();
        let label = Arc::new(Label {
            id: ObjectId::next(),
            text: "hud".into(),
        });
        let handle = ctx.register_object(label.clone()).unwrap();
        let back: Arc<Label> = from_script(&DynamicValue::Object(handle), &ctx).unwrap();
        assert!(Arc::ptr_eq(&label, &back));
    }

    #[test]
    fn test_default_hooks_reject_plain_values_for_objects() {
        let ctx = MockContext::default();
        let err = from_script::<Arc<Sprite>>(&DynamicValue::string("hero"), &ctx).unwrap_err();
        assert_eq!(err, BindError::type_mismatch("Sprite", "string"));
    }

    #[test]
    fn test_option_maps_nil() {
        let ctx = MockContext::default();
        assert_eq!(to_script(None::<i32>, &ctx).unwrap(), DynamicValue::Nil);
        assert_eq!(from_script::<Option<i32>>(&DynamicValue::Nil, &ctx).unwrap(), None);
        assert_eq!(
            from_script::<Option<i32>>(&DynamicValue::Number(4.0), &ctx).unwrap(),
            Some(4)
        );
    }

    #[test]
    fn test_vec_reflects_as_vector() {
        let ctx = MockContext::default();
        let value = to_script(vec![1i32, 2, 3], &ctx).unwrap();
        let handle = value.as_vector().unwrap();
        assert_eq!(ctx.vector_len(handle).unwrap(), 3);
        let back: Vec<i32> = from_script(&value, &ctx).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn test_maps_reflect_as_tables() {
        let ctx = MockContext::default();
        let mut map = HashMap::new();
        map.insert(String::from("a"), 1i32);
        map.insert(String::from("b"), 2i32);
        let value = to_script(map.clone(), &ctx).unwrap();
        assert_eq!(ctx.table_len(value.as_table().unwrap()).unwrap(), 2);
        let back: HashMap<String, i32> = from_script(&value, &ctx).unwrap();
        assert_eq!(back, map);

        let ordered: BTreeMap<i32, bool> = [(1, true), (2, false)].into_iter().collect();
        let value = to_script(ordered.clone(), &ctx).unwrap();
        let back: BTreeMap<i32, bool> = from_script(&value, &ctx).unwrap();
        assert_eq!(back, ordered);
    }

    #[test]
    fn test_arg_reads_missing_as_nil() {
        let ctx = MockContext::default();
        let args = [DynamicValue::Number(7.0)];
        assert_eq!(arg::<i32>(&ctx, &args, 0).unwrap(), 7);
        assert_eq!(arg::<Option<i32>>(&ctx, &args, 1).unwrap(), None);
        assert!(arg::<i32>(&ctx, &args, 1).is_err());
    }
}
