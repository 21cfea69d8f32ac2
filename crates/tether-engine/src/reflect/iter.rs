use crate::engine::Engine;
use std::iter::FusedIterator;
use tether_sdk::{BindResult, DynamicValue, TableHandle, VectorHandle};

/// Lazy traversal of a table.
///
/// Each step re-resolves the handle and reads the entry at the cursor, so
/// the table may be mutated between steps: ordering is then unspecified
/// but the traversal stays finite and never touches freed storage. A
/// resolution failure is yielded once and ends the traversal.
pub struct TableIter {
    engine: Engine,
    table: TableHandle,
    cursor: usize,
    done: bool,
}

impl TableIter {
    pub(crate) fn new(engine: Engine, table: TableHandle) -> Self {
        Self {
            engine,
            table,
            cursor: 0,
            done: false,
        }
    }
}

impl Iterator for TableIter {
    type Item = BindResult<(DynamicValue, DynamicValue)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.engine.table_entry_at(self.table, self.cursor) {
            Ok(Some(entry)) => {
                self.cursor += 1;
                Some(Ok(entry))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl FusedIterator for TableIter {}

/// Lazy in-order traversal of a vector, yielding `(index, value)`
pub struct VectorIter {
    engine: Engine,
    vector: VectorHandle,
    cursor: usize,
    done: bool,
}

impl VectorIter {
    pub(crate) fn new(engine: Engine, vector: VectorHandle) -> Self {
        Self {
            engine,
            vector,
            cursor: 0,
            done: false,
        }
    }
}

impl Iterator for VectorIter {
    type Item = BindResult<(usize, DynamicValue)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.engine.vector_item_at(self.vector, self.cursor) {
            Ok(Some(value)) => {
                let index = self.cursor;
                self.cursor += 1;
                Some(Ok((index, value)))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl FusedIterator for VectorIter {}
