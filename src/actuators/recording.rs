use anyhow::Result;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

use super::{
    AppLauncher, BrowserActuator, ClickKind, InputActuator, ScrollDirection, ShellActuator,
    ShellOutput,
};

/// One recorded actuator call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum Call {
    Click { kind: ClickKind, x: i32, y: i32 },
    TypeText { text: String },
    PressKey { key: String },
    PressCombo { keys: Vec<String> },
    Scroll {
        direction: ScrollDirection,
        amount: i32,
    },
    Shell { command: String },
    Launch { app: String },
    BrowserInit { url: String },
    BrowserClick { selector: String },
    BrowserType {
        selector: String,
        text: String,
    },
    BrowserClose,
}

/// Side-effect-free actuator. Clones share one call log.
///
/// Every call is logged at `info` with a `DRY-RUN` prefix and appended to the log.
/// Shell commands "exit" with the configured code (default 0) and no output.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
    shell_exit_code: i32,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make recorded shell commands report `code`.
    pub fn with_shell_exit_code(mut self, code: i32) -> Self {
        self.shell_exit_code = code;
        self
    }

    /// Snapshot of every call so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.log().clone()
    }

    pub fn clear(&self) {
        self.log().clear();
    }

    fn log(&self) -> MutexGuard<'_, Vec<Call>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: Call) {
        info!(target: "atlas::actuators", ?call, "DRY-RUN");
        self.log().push(call);
    }
}

impl InputActuator for Recorder {
    fn click(&mut self, x: i32, y: i32) -> Result<()> {
        self.record(Call::Click {
            kind: ClickKind::Single,
            x,
            y,
        });
        Ok(())
    }

    fn double_click(&mut self, x: i32, y: i32) -> Result<()> {
        self.record(Call::Click {
            kind: ClickKind::Double,
            x,
            y,
        });
        Ok(())
    }

    fn right_click(&mut self, x: i32, y: i32) -> Result<()> {
        self.record(Call::Click {
            kind: ClickKind::Right,
            x,
            y,
        });
        Ok(())
    }

    fn type_text(&mut self, text: &str) -> Result<()> {
        self.record(Call::TypeText {
            text: text.to_string(),
        });
        Ok(())
    }

    fn press_key(&mut self, key: &str) -> Result<()> {
        self.record(Call::PressKey {
            key: key.to_string(),
        });
        Ok(())
    }

    fn press_combo(&mut self, keys: &[&str]) -> Result<()> {
        self.record(Call::PressCombo {
            keys: keys.iter().map(|k| k.to_string()).collect(),
        });
        Ok(())
    }

    fn scroll(&mut self, direction: ScrollDirection, amount: i32) -> Result<()> {
        self.record(Call::Scroll { direction, amount });
        Ok(())
    }
}

impl ShellActuator for Recorder {
    fn run(&mut self, command: &str) -> Result<ShellOutput> {
        self.record(Call::Shell {
            command: command.to_string(),
        });
        Ok(ShellOutput {
            exit_code: Some(self.shell_exit_code),
            ..ShellOutput::default()
        })
    }
}

impl AppLauncher for Recorder {
    fn launch(&mut self, app: &str) -> Result<()> {
        self.record(Call::Launch {
            app: app.to_string(),
        });
        Ok(())
    }
}

impl BrowserActuator for Recorder {
    fn init(&mut self, url: &str) -> Result<()> {
        self.record(Call::BrowserInit {
            url: url.to_string(),
        });
        Ok(())
    }

    fn click(&mut self, selector: &str) -> Result<()> {
        self.record(Call::BrowserClick {
            selector: selector.to_string(),
        });
        Ok(())
    }

    fn type_text(&mut self, selector: &str, text: &str) -> Result<()> {
        self.record(Call::BrowserType {
            selector: selector.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.record(Call::BrowserClose);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_log() {
        let recorder = Recorder::new();
        let mut input = recorder.clone();
        let mut launcher = recorder.clone();
        launcher.launch("Calculator").unwrap();
        InputActuator::press_key(&mut input, "5").unwrap();
        assert_eq!(
            recorder.calls(),
            vec![
                Call::Launch {
                    app: "Calculator".into(),
                },
                Call::PressKey { key: "5".into() },
            ]
        );
        recorder.clear();
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn shell_exit_code_is_configurable() {
        let mut recorder = Recorder::new().with_shell_exit_code(2);
        let out = recorder.run("false").unwrap();
        assert_eq!(out.exit_code, Some(2));
        assert_eq!(
            recorder.calls(),
            vec![Call::Shell {
                command: "false".into(),
            }]
        );
    }
}
