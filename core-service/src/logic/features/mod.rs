//! Features Module - Schema and feature vector assembly
//!
//! - `layout` - ordered training schema + layout hash
//! - `vector` - attribute map → assembled row with explicit missing slots

pub mod layout;
pub mod vector;


// Re-export common types
pub use layout::{FeatureSchema, LayoutInfo, LayoutMismatchError, SCHEMA_FORMAT_VERSION};
pub use vector::{assemble, unknown_keys, AssembledRow, AttributeMap, AttributeValue, Slot};
