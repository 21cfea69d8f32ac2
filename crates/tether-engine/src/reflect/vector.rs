use crate::options::VectorGrowth;
use tether_sdk::{AnyHandle, BindError, BindResult, DynamicValue};

/// Backing store of a reflected vector: dense, zero-based, no holes
#[derive(Debug, Default, Clone)]
pub struct VectorStore {
    items: Vec<DynamicValue>,
}

impl VectorStore {
    /// Create an empty vector
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from existing items
    pub fn from_items(items: Vec<DynamicValue>) -> Self {
        Self { items }
    }

    /// Read the element at `index`
    pub fn get(&self, index: usize) -> BindResult<DynamicValue> {
        self.items
            .get(index)
            .cloned()
            .ok_or(BindError::IndexOutOfRange {
                index,
                len: self.items.len(),
            })
    }

    /// Write the element at `index`.
    ///
    /// Under [`VectorGrowth::AppendOnly`] writing at `len` appends; under
    /// [`VectorGrowth::Fixed`] only existing elements can be written.
    pub fn set(&mut self, index: usize, value: DynamicValue, growth: VectorGrowth) -> BindResult<()> {
        let len = self.items.len();
        if index < len {
            self.items[index] = value;
            Ok(())
        } else if index == len && growth == VectorGrowth::AppendOnly {
            self.items.push(value);
            Ok(())
        } else {
            Err(BindError::IndexOutOfRange { index, len })
        }
    }

    /// Append an element
    pub fn push(&mut self, value: DynamicValue) {
        self.items.push(value);
    }

    /// Current length
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the vector is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Borrow all elements
    pub fn items(&self) -> &[DynamicValue] {
        &self.items
    }

    /// Every handle held by an element
    pub fn handles(&self) -> impl Iterator<Item = AnyHandle> + '_ {
        self.items.iter().filter_map(DynamicValue::handle)
    }
}
