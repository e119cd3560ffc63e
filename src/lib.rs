#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Atlas: an interpreter for indented UI-automation scripts, built on Enigo.
//!
//! A script is parsed into a command tree, then walked by an executor that drives
//! pointer/keyboard input, shell commands, application launches and a visual element
//! locator. The crate is organized into:
//! - `dsl`: the command model and the script parser.
//! - `executor`: the runtime, handler registry, variable store and results.
//! - `actuators`: side-effecting collaborators (input, shell, launcher, browser) and a recorder.
//! - `locator`: template matching of reference images against screen captures.
//! - `config`: settings models, loader and schema helpers.
//! - `error`: error types for parsing, locating and aborting.
//! - `utils`: interpolation and duration parsing.
//!
//! Use `atlas::prelude::*` to bring commonly used items into scope quickly.

/// Public module: side-effecting actuators and the recording stand-in.
pub mod actuators;
/// Public module: configuration (models, loader, schema helpers).
pub mod config;
/// Public module: script model and parser.
pub mod dsl;
/// Public module: error taxonomy.
pub mod error;
/// Public module: execution engine.
pub mod executor;
/// Public module: on-screen element locator.
pub mod locator;
/// Public module: utilities (interpolation, durations).
pub mod utils;

/// Crate-level constants for consumers that want to inspect package metadata at runtime.
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version (e.g., "0.1.0").
#[inline]
pub const fn version() -> &'static str {
    PKG_VERSION
}

/// Parse a log level name (`trace|debug|info|warn|error`), case-insensitively.
pub fn parse_level(name: &str) -> Option<tracing::Level> {
    use tracing::Level;
    match name.trim().to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize tracing (logging) with a reasonable default.
/// - Honors the `RUST_LOG` environment variable if set (as a plain level).
/// - Falls back to `info` level.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init_tracing() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| parse_level(&s))
        .unwrap_or(tracing::Level::INFO);
    init_tracing_with(level);
}

/// Initialize tracing at an explicit level. Later calls are no-ops.
pub fn init_tracing_with(level: tracing::Level) {
    // Ignore the error if the global subscriber was already set.
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();
}

/// A convenient set of exports for most consumers.
///
/// Bring this into scope with:
/// `use atlas::prelude::*;`
pub mod prelude {
    // Common result/error handling
    pub use anyhow::{Context, Error, Result, anyhow, bail, ensure};

    // Serialization
    pub use serde::{Deserialize, Serialize};

    // Tracing macros
    pub use tracing::{debug, error, info, instrument, trace, warn};

    pub use std::time::Duration;

    // External crates (namespaced) if callers want direct access
    pub use crate as atlas;
    pub use enigo;
    pub use image;

    // Frequently used items
    pub use crate::actuators::{Actuators, Recorder};
    pub use crate::config::Settings;
    pub use crate::dsl::{Macro, parse, parse_file};
    pub use crate::executor::{ExecutionResult, Executor};
    pub use crate::locator::{Locator, LocatorMatch, ScreenSource};
    pub use crate::{actuators, config, dsl, executor, locator, utils};
}
