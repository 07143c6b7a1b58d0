//! Report exports built from already-fetched data.

pub mod csv;
