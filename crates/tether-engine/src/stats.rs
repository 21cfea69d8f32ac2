//! Engine statistics

use std::fmt;

/// Point-in-time counters of one engine, from [`Engine::stats`](crate::Engine::stats)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Registered native objects whose handles still resolve
    pub live_objects: usize,
    /// Live tables
    pub live_tables: usize,
    /// Live vectors
    pub live_vectors: usize,
    /// Records in the pin registry
    pub tracked_records: usize,
    /// Sum of all pin counts
    pub total_pins: u64,
    /// Calls currently in flight
    pub call_depth: usize,
    /// Handles rooted by in-flight frames
    pub rooted_temporaries: usize,
    /// Entries in the native function table
    pub native_functions: usize,
    /// Registered subsystems
    pub subsystems: usize,
    /// Completed outermost calls
    pub calls: u64,
    /// Collection sweeps run
    pub sweeps: u64,
    /// Records finalized by sweeps and shutdown
    pub finalized: u64,
}

impl EngineStats {
    /// Live handles of every kind
    pub fn live_handles(&self) -> usize {
        self.live_objects + self.live_tables + self.live_vectors
    }
}

impl fmt::Display for EngineStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "handles: {} objects, {} tables, {} vectors",
            self.live_objects, self.live_tables, self.live_vectors
        )?;
        writeln!(
            f,
            "pins: {} records, {} pins",
            self.tracked_records, self.total_pins
        )?;
        writeln!(
            f,
            "calls: depth {}, {} rooted, {} completed",
            self.call_depth, self.rooted_temporaries, self.calls
        )?;
        writeln!(
            f,
            "functions: {} native, {} subsystems",
            self.native_functions, self.subsystems
        )?;
        write!(f, "sweeps: {} run, {} finalized", self.sweeps, self.finalized)
    }
}
