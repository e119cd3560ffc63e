//! Configuration module for Atlas.
//!
//! Runtime settings (template directory, locator policy, app aliases, shell) plus
//! loading/validation helpers. Import from here for a stable API.
//!
//! Example:
//! use atlas::config::{Settings, load_from_path};
//!
//! let cfg = load_from_path("atlas.json")?;

pub mod loader;
pub mod models;

pub use models::{AppAliases, LocatorSettings, Settings};

pub use loader::{
    MAX_LOCATOR_TIMEOUT_MS, generate_schema, load_from_path, load_from_path_async,
    load_from_reader, load_from_str, validate_config, write_schema_to_writer,
};
