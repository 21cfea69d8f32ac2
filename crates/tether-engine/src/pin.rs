//! Pin registry
//!
//! Tracks one [`ObjectRecord`] per native object, table or vector known to an
//! engine. A record's pin count is the only thing that can override the
//! collector's reachability verdict: a record with `pin_count > 0` is kept
//! no matter what, and a record with `pin_count == 0` is finalized by the
//! first sweep that does not find its script handle reachable.
//!
//! The registry itself never calls into native code. Sweeps return the
//! removed records and the engine runs the destruction hooks afterwards,
//! outside its internal borrows.

use rustc_hash::{FxHashMap, FxHashSet};
use tether_sdk::{AnyHandle, BindError, BindResult, TrackedId};

/// Reference record of one tracked identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRecord {
    /// Tracked identity
    pub identity: TrackedId,
    /// Outstanding native pins
    pub pin_count: u32,
    /// Handle the runtime knows this identity by, if any
    pub script_handle: Option<AnyHandle>,
    /// Identities notified (weakly) when this record is finalized
    pub weak_observers: FxHashSet<TrackedId>,
}

impl ObjectRecord {
    fn new(identity: TrackedId) -> Self {
        Self {
            identity,
            pin_count: 0,
            script_handle: None,
            weak_observers: FxHashSet::default(),
        }
    }

    /// Eligible for finalization when no pin remains and the runtime no
    /// longer reaches the script handle
    pub fn is_collectable(&self, reachable: &FxHashSet<AnyHandle>) -> bool {
        self.pin_count == 0
            && self
                .script_handle
                .map_or(true, |handle| !reachable.contains(&handle))
    }
}

/// Identity -> record map for one engine
#[derive(Debug, Default)]
pub struct PinRegistry {
    records: FxHashMap<TrackedId, ObjectRecord>,
}

impl PinRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking an identity under its script handle
    pub fn track(&mut self, identity: TrackedId, handle: AnyHandle) {
        self.records
            .entry(identity)
            .or_insert_with(|| ObjectRecord::new(identity))
            .script_handle = Some(handle);
    }

    /// Increment the pin count, creating the record if absent.
    ///
    /// Returns the new count.
    pub fn pin(&mut self, identity: TrackedId) -> u32 {
        let record = self
            .records
            .entry(identity)
            .or_insert_with(|| ObjectRecord::new(identity));
        record.pin_count += 1;
        tracing::trace!(target: "tether::pin", %identity, count = record.pin_count, "pin");
        record.pin_count
    }

    /// Decrement the pin count.
    ///
    /// Fails with `Underflow` if the count is already zero (or the identity
    /// is not tracked); the count is never clamped.
    pub fn unpin(&mut self, identity: TrackedId) -> BindResult<u32> {
        match self.records.get_mut(&identity) {
            Some(record) if record.pin_count > 0 => {
                record.pin_count -= 1;
                tracing::trace!(target: "tether::pin", %identity, count = record.pin_count, "unpin");
                Ok(record.pin_count)
            }
            _ => Err(BindError::Underflow {
                identity: identity.to_string(),
            }),
        }
    }

    /// Current pin count (zero when untracked)
    pub fn pin_count(&self, identity: TrackedId) -> u32 {
        self.records.get(&identity).map_or(0, |r| r.pin_count)
    }

    /// Record that `observer` wants to hear about `target`'s finalization
    pub fn observe(&mut self, target: TrackedId, observer: TrackedId) {
        self.records
            .entry(target)
            .or_insert_with(|| ObjectRecord::new(target))
            .weak_observers
            .insert(observer);
    }

    /// Look up a record
    pub fn record(&self, identity: TrackedId) -> Option<&ObjectRecord> {
        self.records.get(&identity)
    }

    /// Whether an identity is tracked
    pub fn contains(&self, identity: TrackedId) -> bool {
        self.records.contains_key(&identity)
    }

    /// Handles of every pinned record
    pub fn pinned_handles(&self) -> impl Iterator<Item = AnyHandle> + '_ {
        self.records
            .values()
            .filter(|r| r.pin_count > 0)
            .filter_map(|r| r.script_handle)
    }

    /// Remove and return every record that is unpinned and whose script
    /// handle is not in `reachable`
    pub fn on_collection_sweep(&mut self, reachable: &FxHashSet<AnyHandle>) -> Vec<ObjectRecord> {
        let doomed: Vec<TrackedId> = self
            .records
            .values()
            .filter(|r| r.is_collectable(reachable))
            .map(|r| r.identity)
            .collect();
        doomed
            .into_iter()
            .filter_map(|id| self.records.remove(&id))
            .collect()
    }

    /// Remove and return every record regardless of pins
    pub fn drain(&mut self) -> Vec<ObjectRecord> {
        self.records.drain().map(|(_, r)| r).collect()
    }

    /// Number of tracked records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of all pin counts
    pub fn total_pins(&self) -> u64 {
        self.records.values().map(|r| r.pin_count as u64).sum()
    }
}
