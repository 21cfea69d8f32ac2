//! Table and vector reflectors
//!
//! Backing stores for script-visible composite values. The engine owns the
//! stores in its handle tables; scripts and native code both reach them
//! through [`TableHandle`](tether_sdk::TableHandle) and
//! [`VectorHandle`](tether_sdk::VectorHandle), so there is only ever one
//! copy of the data and both views stay consistent.

mod iter;
mod table;
mod vector;

pub use iter::{TableIter, VectorIter};
pub use table::TableStore;
pub use vector::VectorStore;
