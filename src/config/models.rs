use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root runtime configuration for Atlas.
///
/// Deserialized from a JSON file. Every field is optional:
/// - `templates_dir`: where reference images for `click <name>` live
/// - `locator`: confidence/timeout policy for on-screen matching
/// - `apps`: aliases applied by `open <app>`
/// - `shell`: program used for `system_command`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Settings {
    /// Root directory searched for reference images.
    pub templates_dir: PathBuf,

    /// Element locator policy.
    pub locator: LocatorSettings,

    /// Application aliases: script name -> name handed to the launcher.
    /// Example: `{ "ChromeApp": "Google Chrome" }`.
    pub apps: AppAliases,

    /// Override the shell used by `system_command` (defaults to `sh`, or `cmd` on Windows).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
}

/// Alias map for `open`.
pub type AppAliases = BTreeMap<String, String>;

impl Default for Settings {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("templates"),
            locator: LocatorSettings::default(),
            apps: default_apps(),
            shell: None,
        }
    }
}

impl Settings {
    /// Resolve an application alias, falling back to the name itself.
    pub fn app_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.apps.get(name).map(String::as_str).unwrap_or(name)
    }
}

/// Threshold/timeout policy for template matching.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct LocatorSettings {
    /// Minimum normalized cross-correlation score in [0, 1] (default: 0.8).
    pub confidence_threshold: f32,
    /// Give up locating after this many milliseconds (default: 5000).
    pub timeout_ms: u64,
    /// Pause between capture attempts in milliseconds (default: 100).
    pub retry_interval_ms: u64,
    /// Maximum number of decoded reference images kept in memory (default: 32).
    pub cache_capacity: usize,
}

impl Default for LocatorSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.8,
            timeout_ms: 5000,
            retry_interval_ms: 100,
            cache_capacity: 32,
        }
    }
}

impl LocatorSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }
}

fn default_apps() -> AppAliases {
    BTreeMap::from_iter([
        ("ChromeApp".to_string(), "Google Chrome".to_string()),
        ("Chrome".to_string(), "Google Chrome".to_string()),
    ])
}
