//! Result entities and their output formats
//!
//! Lookups borrow the database; the types here are owned copies that can be
//! printed, serialized or exported after the lookup is gone.

pub mod formatter;
pub mod types;

pub use types::*;
