#![allow(clippy::missing_errors_doc)]

/*!
Side-effecting collaborators of the executor.

Each concern sits behind a trait so the executor never touches the desktop directly:
- `InputActuator`: pointer and keyboard injection (`EnigoInput`)
- `ShellActuator`: synchronous shell commands (`ProcessShell`)
- `AppLauncher`: opening applications by name (`SystemLauncher`)
- `BrowserActuator`: browser pass-through (`LoggingBrowser`)

`Recorder` implements all four without side effects; it backs `--dry-run` and tests.
*/

pub mod browser;
pub mod input;
pub mod launcher;
pub mod recording;
pub mod shell;

use anyhow::Result;
use serde::Serialize;
use std::fmt;

use crate::config::Settings;

pub use browser::LoggingBrowser;
pub use input::EnigoInput;
pub use launcher::SystemLauncher;
pub use recording::{Call, Recorder};
pub use shell::ProcessShell;

/// Which pointer action a click performs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickKind {
    Single,
    Double,
    Right,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        })
    }
}

/// Pointer and keyboard injection. Coordinates are logical (pointer) units.
pub trait InputActuator {
    fn click(&mut self, x: i32, y: i32) -> Result<()>;
    fn double_click(&mut self, x: i32, y: i32) -> Result<()>;
    fn right_click(&mut self, x: i32, y: i32) -> Result<()>;
    fn type_text(&mut self, text: &str) -> Result<()>;
    /// Press and release a single named key (`enter`, `a`, `f5`, ...).
    fn press_key(&mut self, key: &str) -> Result<()>;
    /// Hold every key but the last, tap the last, release in reverse order.
    fn press_combo(&mut self, keys: &[&str]) -> Result<()>;
    fn scroll(&mut self, direction: ScrollDirection, amount: i32) -> Result<()>;

    /// Dispatch on `kind`.
    fn click_with(&mut self, kind: ClickKind, x: i32, y: i32) -> Result<()> {
        match kind {
            ClickKind::Single => self.click(x, y),
            ClickKind::Double => self.double_click(x, y),
            ClickKind::Right => self.right_click(x, y),
        }
    }
}

/// Captured result of a shell command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShellOutput {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub trait ShellActuator {
    /// Run `command` to completion. `Err` only when the process cannot be spawned.
    fn run(&mut self, command: &str) -> Result<ShellOutput>;
}

pub trait AppLauncher {
    fn launch(&mut self, app: &str) -> Result<()>;
}

pub trait BrowserActuator {
    fn init(&mut self, url: &str) -> Result<()>;
    fn click(&mut self, selector: &str) -> Result<()>;
    fn type_text(&mut self, selector: &str, text: &str) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// The full set of actuators handed to an `Executor`.
pub struct Actuators {
    pub input: Box<dyn InputActuator>,
    pub shell: Box<dyn ShellActuator>,
    pub launcher: Box<dyn AppLauncher>,
    pub browser: Box<dyn BrowserActuator>,
}

impl Actuators {
    /// Real desktop actuators.
    pub fn system(settings: &Settings) -> Self {
        Self {
            input: Box::new(EnigoInput::new()),
            shell: Box::new(ProcessShell::new(settings.shell.as_deref())),
            launcher: Box::new(SystemLauncher),
            browser: Box::new(LoggingBrowser::default()),
        }
    }

    /// Every concern routed to clones of `recorder`.
    pub fn recording(recorder: &Recorder) -> Self {
        Self {
            input: Box::new(recorder.clone()),
            shell: Box::new(recorder.clone()),
            launcher: Box::new(recorder.clone()),
            browser: Box::new(recorder.clone()),
        }
    }
}
