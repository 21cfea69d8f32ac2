use indexmap::IndexMap;
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;
use tether_sdk::{AnyHandle, BindResult, DynamicValue, TableKey};

type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

/// Backing store of a reflected table.
///
/// Reading a missing key yields nil and writing nil removes the key, so a
/// table never stores a nil value. Entries are addressable by position,
/// which is what lets iteration proceed with a plain cursor that tolerates
/// mutation between steps.
#[derive(Debug, Default, Clone)]
pub struct TableStore {
    entries: FxIndexMap<TableKey, DynamicValue>,
}

impl TableStore {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Read an entry (nil when absent)
    pub fn get(&self, key: &DynamicValue) -> BindResult<DynamicValue> {
        let key = TableKey::from_value(key)?;
        Ok(self.entries.get(&key).cloned().unwrap_or_default())
    }

    /// Write an entry; a nil value removes the key
    pub fn set(&mut self, key: DynamicValue, value: DynamicValue) -> BindResult<()> {
        let key = TableKey::from_value(&key)?;
        if value.is_nil() {
            self.entries.swap_remove(&key);
        } else {
            self.entries.insert(key, value);
        }
        Ok(())
    }

    /// Whether a key is present
    pub fn contains(&self, key: &DynamicValue) -> BindResult<bool> {
        Ok(self.entries.contains_key(&TableKey::from_value(key)?))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at a cursor position, if still in range
    pub fn entry_at(&self, position: usize) -> Option<(DynamicValue, DynamicValue)> {
        self.entries
            .get_index(position)
            .map(|(k, v)| (k.to_value(), v.clone()))
    }

    /// Snapshot of all entries
    pub fn entries(&self) -> Vec<(DynamicValue, DynamicValue)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.to_value(), v.clone()))
            .collect()
    }

    /// Every handle held by a key or value
    pub fn handles(&self) -> impl Iterator<Item = AnyHandle> + '_ {
        self.entries
            .iter()
            .flat_map(|(k, v)| k.handle().into_iter().chain(v.handle()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_sdk::BindError;

    #[test]
    fn test_set_then_get() {
        let mut table = TableStore::new();
        table.set("name".into(), "tether".into()).unwrap();
        table.set(DynamicValue::Number(1.0), true.into()).unwrap();
        assert_eq!(table.get(&"name".into()).unwrap(), DynamicValue::from("tether"));
        assert_eq!(table.get(&DynamicValue::Number(1.0)).unwrap(), DynamicValue::Bool(true));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_missing_key_reads_nil() {
        let table = TableStore::new();
        assert_eq!(table.get(&"absent".into()).unwrap(), DynamicValue::Nil);
    }

    #[test]
    fn test_nil_value_removes_key() {
        let mut table = TableStore::new();
        table.set("k".into(), DynamicValue::Number(5.0)).unwrap();
        table.set("k".into(), DynamicValue::Nil).unwrap();
        assert!(table.is_empty());
        assert!(!table.contains(&"k".into()).unwrap());
    }

    #[test]
    fn test_overwrite_keeps_single_entry() {
        let mut table = TableStore::new();
        table.set("k".into(), DynamicValue::Number(1.0)).unwrap();
        table.set("k".into(), DynamicValue::Number(2.0)).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&"k".into()).unwrap(), DynamicValue::Number(2.0));
    }

    #[test]
    fn test_invalid_keys_rejected() {
        let mut table = TableStore::new();
        assert!(matches!(
            table.set(DynamicValue::Nil, DynamicValue::Number(1.0)),
            Err(BindError::InvalidKey(_))
        ));
        assert!(matches!(
            table.get(&DynamicValue::Number(f64::NAN)),
            Err(BindError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_cursor_survives_removal() {
        let mut table = TableStore::new();
        for i in 0..4 {
            table.set(DynamicValue::Number(i as f64), DynamicValue::Number(i as f64)).unwrap();
        }
        let first = table.entry_at(0).unwrap();
        table.set(first.0, DynamicValue::Nil).unwrap();
        // Positions past the end are simply exhausted
        assert!(table.entry_at(3).is_none());
        assert!(table.entry_at(2).is_some());
    }
}
