//! Data structures for unit configuration.
//!
//! Pure data types designed to be deserialized from RON files.
//! This module performs no IO itself.

mod unit_stats;

pub use unit_stats::UnitStats;
