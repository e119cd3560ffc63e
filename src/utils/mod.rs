//! Utilities for Atlas.
//!
//! Submodules:
//! - `interpolation`: `${var}` substitution against the execution's variable store.
//! - `duration`: parsing of `wait` arguments (`3s`, `500ms`, `2`).

pub mod duration;
pub mod interpolation;
