//! Object, table, vector and pin operations
//!
//! These are the engine's [`NativeContext`] implementation plus the few
//! operations that only make sense with a concrete engine (typed resolution,
//! weak observation, lazy iteration).

use super::{use_after_release, Engine, ObjectEntry};
use crate::reflect::{TableIter, TableStore, VectorIter, VectorStore};
use std::sync::Arc;
use tether_sdk::{
    AnyHandle, BindError, BindResult, DynamicValue, EngineId, FromScript, NativeContext,
    NativeObject, ObjectHandle, TableHandle, TrackedId, VectorHandle,
};

impl Engine {
    /// Resolve an object handle as a concrete native type
    pub fn resolve<T: NativeObject>(&self, handle: ObjectHandle) -> BindResult<Arc<T>> {
        Arc::<T>::from_script(&DynamicValue::Object(handle), self)
    }

    /// Current pin count of a live handle
    pub fn pin_count(&self, handle: impl Into<AnyHandle>) -> BindResult<u32> {
        let handle = handle.into();
        self.inner()
            .with_state(|state| Ok(state.pins.pin_count(state.tracked_id(handle)?)))
    }

    /// Register `observer` for a weak notification when `target` is
    /// finalized. Observing never keeps `target` alive.
    pub fn observe(&self, target: impl Into<AnyHandle>, observer: ObjectHandle) -> BindResult<()> {
        let target = target.into();
        self.inner().with_state(|state| {
            let target_id = state.tracked_id(target)?;
            let observer_id = state.tracked_id(AnyHandle::Object(observer))?;
            state.pins.observe(target_id, observer_id);
            Ok(())
        })
    }

    /// Whether a handle currently resolves (false after shutdown)
    pub fn is_live(&self, handle: impl Into<AnyHandle>) -> bool {
        let handle = handle.into();
        let core = self.inner().lock();
        let state = core.state.borrow();
        !state.shut_down && state.resolves(handle)
    }

    /// Start a fresh lazy traversal of a table
    pub fn iterate_table(&self, table: TableHandle) -> BindResult<TableIter> {
        self.inner().with_state(|state| {
            if state.tables.contains(table.id()) {
                Ok(())
            } else {
                Err(use_after_release(table))
            }
        })?;
        Ok(TableIter::new(self.clone(), table))
    }

    /// Start a fresh lazy traversal of a vector
    pub fn iterate_vector(&self, vector: VectorHandle) -> BindResult<VectorIter> {
        self.inner().with_state(|state| {
            if state.vectors.contains(vector.id()) {
                Ok(())
            } else {
                Err(use_after_release(vector))
            }
        })?;
        Ok(VectorIter::new(self.clone(), vector))
    }

    /// Build a vector from existing values
    pub fn vector_from(&self, items: Vec<DynamicValue>) -> BindResult<VectorHandle> {
        self.inner().with_state(|state| {
            for item in &items {
                state.check_value(item)?;
            }
            let handle = VectorHandle::from_id(state.vectors.insert(VectorStore::from_items(items)));
            state.pins.track(TrackedId::Vector(handle), handle.into());
            state.root_temp(handle.into());
            Ok(handle)
        })
    }

    pub(crate) fn table_entry_at(
        &self,
        table: TableHandle,
        position: usize,
    ) -> BindResult<Option<(DynamicValue, DynamicValue)>> {
        self.inner().with_state(|state| {
            let store = state.tables.get(table.id()).ok_or_else(|| use_after_release(table))?;
            Ok(store.entry_at(position))
        })
    }

    pub(crate) fn vector_item_at(
        &self,
        vector: VectorHandle,
        index: usize,
    ) -> BindResult<Option<DynamicValue>> {
        self.inner().with_state(|state| {
            let store = state.vectors.get(vector.id()).ok_or_else(|| use_after_release(vector))?;
            Ok(store.items().get(index).cloned())
        })
    }
}

impl NativeContext for Engine {
    fn engine_id(&self) -> EngineId {
        self.id()
    }

    fn register_object(&self, object: Arc<dyn NativeObject>) -> BindResult<ObjectHandle> {
        let identity = object.identity();
        let type_tag = object.type_tag().to_string();
        let handle = self.inner().with_state(|state| {
            if state.finalized_objects.contains(&identity) {
                return Err(use_after_release(identity));
            }
            if let Some(existing) = state.object_handles.get(&identity) {
                if state.objects.contains(existing.id()) {
                    return Ok(*existing);
                }
            }
            let handle = ObjectHandle::from_id(state.objects.insert(ObjectEntry { object, identity }));
            state.object_handles.insert(identity, handle);
            state.pins.track(TrackedId::Object(identity), handle.into());
            state.root_temp(handle.into());
            Ok(handle)
        })?;
        tracing::trace!(
            target: "tether::engine",
            %identity,
            %handle,
            type_tag = type_tag.as_str(),
            "object registered"
        );
        Ok(handle)
    }

    fn resolve_object(&self, handle: ObjectHandle) -> BindResult<Arc<dyn NativeObject>> {
        self.inner().with_state(|state| {
            state
                .objects
                .get(handle.id())
                .map(|entry| Arc::clone(&entry.object))
                .ok_or_else(|| use_after_release(handle))
        })
    }

    fn create_table(&self) -> BindResult<TableHandle> {
        self.inner().with_state(|state| {
            let handle = TableHandle::from_id(state.tables.insert(TableStore::new()));
            state.pins.track(TrackedId::Table(handle), handle.into());
            state.root_temp(handle.into());
            Ok(handle)
        })
    }

    fn table_get(&self, table: TableHandle, key: &DynamicValue) -> BindResult<DynamicValue> {
        self.inner().with_state(|state| {
            state
                .tables
                .get(table.id())
                .ok_or_else(|| use_after_release(table))?
                .get(key)
        })
    }

    fn table_set(&self, table: TableHandle, key: DynamicValue, value: DynamicValue) -> BindResult<()> {
        self.inner().with_state(|state| {
            state.check_value(&key)?;
            state.check_value(&value)?;
            state
                .tables
                .get_mut(table.id())
                .ok_or_else(|| use_after_release(table))?
                .set(key, value)
        })
    }

    fn table_len(&self, table: TableHandle) -> BindResult<usize> {
        self.inner().with_state(|state| {
            state
                .tables
                .get(table.id())
                .map(TableStore::len)
                .ok_or_else(|| use_after_release(table))
        })
    }

    fn table_entries(&self, table: TableHandle) -> BindResult<Vec<(DynamicValue, DynamicValue)>> {
        self.inner().with_state(|state| {
            state
                .tables
                .get(table.id())
                .map(TableStore::entries)
                .ok_or_else(|| use_after_release(table))
        })
    }

    fn create_vector(&self) -> BindResult<VectorHandle> {
        self.vector_from(Vec::new())
    }

    fn vector_get(&self, vector: VectorHandle, index: usize) -> BindResult<DynamicValue> {
        self.inner().with_state(|state| {
            state
                .vectors
                .get(vector.id())
                .ok_or_else(|| use_after_release(vector))?
                .get(index)
        })
    }

    fn vector_set(&self, vector: VectorHandle, index: usize, value: DynamicValue) -> BindResult<()> {
        let growth = self.options().vector_growth;
        self.inner().with_state(|state| {
            state.check_value(&value)?;
            state
                .vectors
                .get_mut(vector.id())
                .ok_or_else(|| use_after_release(vector))?
                .set(index, value, growth)
        })
    }

    fn vector_push(&self, vector: VectorHandle, value: DynamicValue) -> BindResult<()> {
        self.inner().with_state(|state| {
            state.check_value(&value)?;
            state
                .vectors
                .get_mut(vector.id())
                .ok_or_else(|| use_after_release(vector))?
                .push(value);
            Ok(())
        })
    }

    fn vector_len(&self, vector: VectorHandle) -> BindResult<usize> {
        self.inner().with_state(|state| {
            state
                .vectors
                .get(vector.id())
                .map(VectorStore::len)
                .ok_or_else(|| use_after_release(vector))
        })
    }

    fn vector_items(&self, vector: VectorHandle) -> BindResult<Vec<DynamicValue>> {
        self.inner().with_state(|state| {
            state
                .vectors
                .get(vector.id())
                .map(|store| store.items().to_vec())
                .ok_or_else(|| use_after_release(vector))
        })
    }

    fn pin(&self, handle: AnyHandle) -> BindResult<()> {
        self.inner().with_state(|state| {
            let identity = state.tracked_id(handle)?;
            state.pins.pin(identity);
            Ok(())
        })
    }

    fn unpin(&self, handle: AnyHandle) -> BindResult<()> {
        self.inner().with_state(|state| {
            let identity = state.tracked_id(handle)?;
            state.pins.unpin(identity).map(|_| ())
        })
    }

    fn pin_scoped(&self, handle: AnyHandle) -> BindResult<()> {
        self.inner().with_state(|state| {
            let identity = state.tracked_id(handle)?;
            if state.frames.is_empty() {
                return Err(BindError::ContractViolation(format!(
                    "scoped pin of {} outside a call frame",
                    handle
                )));
            }
            state.pins.pin(identity);
            if let Some(frame) = state.frames.last_mut() {
                frame.add_scoped_pin(handle);
            }
            Ok(())
        })
    }

    fn call_script(&self, path: &str, args: &[DynamicValue]) -> BindResult<Vec<DynamicValue>> {
        self.call(path, args)
    }

    fn call_depth(&self) -> usize {
        let core = self.inner().lock();
        let depth = core.state.borrow().frames.len();
        depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{ContractPolicy, EngineOptions, VectorGrowth};
    use tether_sdk::ObjectId;

    struct Sentinel {
        id: ObjectId,
    }

    impl NativeObject for Sentinel {
        fn type_tag(&self) -> &str {
            "Sentinel"
        }

        fn identity(&self) -> ObjectId {
            self.id
        }
    }

    fn engine() -> Engine {
        Engine::hosted(EngineOptions::default().with_contract_policy(ContractPolicy::LogAndReject))
            .unwrap()
    }

    #[test]
    fn test_register_same_identity_returns_same_handle() {
        let e = engine();
        let probe = Arc::new(Sentinel { id: ObjectId::next() });
        let a = e.register_object(probe.clone()).unwrap();
        let b = e.register_object(probe).unwrap();
        assert_eq!(a, b);
        assert_eq!(e.stats().live_objects, 1);
    }

    #[test]
    fn test_typed_resolve() {
        let e = engine();
        let probe = Arc::new(Sentinel { id: ObjectId::next() });
        let handle = e.register_object(probe.clone()).unwrap();
        let back: Arc<Sentinel> = e.resolve(handle).unwrap();
        assert!(Arc::ptr_eq(&probe, &back));
    }

    #[test]
    fn test_table_rejects_stale_handle_values() {
        let e = engine();
        let outer = e.create_table().unwrap();
        e.pin(outer.into()).unwrap();
        let dead = e.create_table().unwrap();
        assert_eq!(e.collect_garbage().unwrap(), 1);
        assert!(e.is_live(outer));
        assert!(!e.is_live(dead));
        let err = e
            .table_set(outer, "child".into(), DynamicValue::Table(dead))
            .unwrap_err();
        assert!(matches!(err, BindError::UseAfterRelease(_)));
    }

    #[test]
    fn test_vector_growth_policy_from_options() {
        let e = Engine::hosted(
            EngineOptions::default()
                .with_vector_growth(VectorGrowth::Fixed)
                .with_contract_policy(ContractPolicy::LogAndReject),
        )
        .unwrap();
        let v = e.create_vector().unwrap();
        assert!(matches!(
            e.vector_set(v, 0, DynamicValue::Bool(true)),
            Err(BindError::IndexOutOfRange { index: 0, len: 0 })
        ));
        e.vector_push(v, DynamicValue::Bool(true)).unwrap();
        e.vector_set(v, 0, DynamicValue::Bool(false)).unwrap();
        assert_eq!(e.vector_get(v, 0).unwrap(), DynamicValue::Bool(false));
    }

    #[test]
    fn test_scoped_pin_outside_frame_is_rejected() {
        let e = engine();
        let t = e.create_table().unwrap();
        assert!(matches!(
            e.pin_scoped(t.into()),
            Err(BindError::ContractViolation(_))
        ));
        assert_eq!(e.pin_count(t).unwrap(), 0);
    }

    #[test]
    fn test_lazy_iteration_is_restartable() {
        let e = engine();
        let t = e.create_table().unwrap();
        for i in 0..5 {
            e.table_set(t, DynamicValue::Number(i as f64), DynamicValue::Bool(true))
                .unwrap();
        }
        assert_eq!(e.iterate_table(t).unwrap().count(), 5);
        assert_eq!(e.iterate_table(t).unwrap().count(), 5);

        let v = e.vector_from(vec![DynamicValue::Number(1.0), DynamicValue::Number(2.0)]).unwrap();
        let items: Vec<_> = e.iterate_vector(v).unwrap().map(Result::unwrap).collect();
        assert_eq!(items, vec![(0, DynamicValue::Number(1.0)), (1, DynamicValue::Number(2.0))]);
    }

    #[test]
    fn test_mutation_during_iteration_is_safe() {
        let e = engine();
        let t = e.create_table().unwrap();
        for i in 0..10 {
            e.table_set(t, DynamicValue::Number(i as f64), DynamicValue::Number(i as f64))
                .unwrap();
        }
        let mut seen = 0;
        for entry in e.iterate_table(t).unwrap() {
            let (key, _) = entry.unwrap();
            e.table_set(t, key, DynamicValue::Nil).unwrap();
            seen += 1;
        }
        assert!(seen <= 10);
        assert!(e.table_len(t).unwrap() < 10);
    }
}
