//! Call frames
//!
//! One frame per native/script call in flight. A frame roots the handles
//! that crossed the boundary during the call (arguments, results, values
//! created inside it) and owns the pins taken with `pin_scoped`. Both are
//! released when the frame is popped, on success and on error alike.

use tether_sdk::{AnyHandle, DynamicValue};

/// Call frame of one native or script call
#[derive(Debug)]
pub struct Frame {
    label: String,
    temps: Vec<AnyHandle>,
    scoped_pins: Vec<AnyHandle>,
}

impl Frame {
    /// Create an empty frame labelled with the called path
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            temps: Vec::new(),
            scoped_pins: Vec::new(),
        }
    }

    /// Called path
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Root a temporary handle for the rest of the frame
    pub fn root(&mut self, handle: AnyHandle) {
        self.temps.push(handle);
    }

    /// Root every handle among `values`
    pub fn root_values(&mut self, values: &[DynamicValue]) {
        self.temps.extend(values.iter().filter_map(DynamicValue::handle));
    }

    /// Record a pin to be released at frame exit
    pub fn add_scoped_pin(&mut self, handle: AnyHandle) {
        self.scoped_pins.push(handle);
    }

    /// Take the scoped pins out of the frame
    pub fn take_scoped_pins(&mut self) -> Vec<AnyHandle> {
        std::mem::take(&mut self.scoped_pins)
    }

    /// Handles rooted by this frame
    pub fn temps(&self) -> &[AnyHandle] {
        &self.temps
    }
}
