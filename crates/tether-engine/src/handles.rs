//! Generational handle tables
//!
//! Each table hands out [`HandleId`]s for the values it owns. A slot keeps a
//! generation counter that is bumped whenever its value is removed, so a
//! handle issued before the removal no longer matches and fails to resolve.
//! Handles issued by another engine never match either.

use tether_sdk::{EngineId, HandleId};

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot arena indexed by generational handle ids
pub struct HandleTable<T> {
    engine: EngineId,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> HandleTable<T> {
    /// Create an empty table for the given engine
    pub fn new(engine: EngineId) -> Self {
        Self {
            engine,
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Store a value and return its handle id
    pub fn insert(&mut self, value: T) -> HandleId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return HandleId::new(self.engine, index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        HandleId::new(self.engine, index, 0)
    }

    fn slot_index(&self, id: HandleId) -> Option<usize> {
        if id.engine() != self.engine {
            return None;
        }
        let index = id.slot() as usize;
        let slot = self.slots.get(index)?;
        (slot.generation == id.generation() && slot.value.is_some()).then_some(index)
    }

    /// Resolve a handle id
    pub fn get(&self, id: HandleId) -> Option<&T> {
        let index = self.slot_index(id)?;
        self.slots[index].value.as_ref()
    }

    /// Resolve a handle id mutably
    pub fn get_mut(&mut self, id: HandleId) -> Option<&mut T> {
        let index = self.slot_index(id)?;
        self.slots[index].value.as_mut()
    }

    /// Whether the handle id still resolves
    pub fn contains(&self, id: HandleId) -> bool {
        self.slot_index(id).is_some()
    }

    /// Remove a value; the slot's generation is bumped so `id` goes stale
    pub fn remove(&mut self, id: HandleId) -> Option<T> {
        let index = self.slot_index(id)?;
        let slot = &mut self.slots[index];
        let value = slot.value.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index as u32);
        self.live -= 1;
        value
    }

    /// Remove every value, invalidating all issued handles
    pub fn drain(&mut self) -> Vec<(HandleId, T)> {
        let mut out = Vec::with_capacity(self.live);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot.value.take() {
                out.push((HandleId::new(self.engine, index as u32, slot.generation), value));
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.live = 0;
        out
    }

    /// Iterate over live `(id, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (HandleId, &T)> + '_ {
        let engine = self.engine;
        self.slots.iter().enumerate().filter_map(move |(index, slot)| {
            slot.value
                .as_ref()
                .map(|v| (HandleId::new(engine, index as u32, slot.generation), v))
        })
    }

    /// Number of live values
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether there are no live values
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}
