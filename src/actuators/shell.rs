use anyhow::{Context, Result};
use std::process::Command;
use tracing::debug;

use super::{ShellActuator, ShellOutput};

/// Runs `system_command` lines through the platform shell.
#[derive(Debug, Clone)]
pub struct ProcessShell {
    program: String,
    flag: &'static str,
}

impl ProcessShell {
    /// `program` overrides the default (`sh -c`, or `cmd /C` on Windows).
    pub fn new(program: Option<&str>) -> Self {
        match program {
            Some(program) => Self {
                program: program.to_string(),
                flag: flag_for(program),
            },
            None if cfg!(windows) => Self {
                program: "cmd".into(),
                flag: "/C",
            },
            None => Self {
                program: "sh".into(),
                flag: "-c",
            },
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for ProcessShell {
    fn default() -> Self {
        Self::new(None)
    }
}

fn flag_for(program: &str) -> &'static str {
    let name = program
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(program)
        .to_ascii_lowercase();
    if name == "cmd" || name == "cmd.exe" {
        "/C"
    } else if name.starts_with("powershell") || name.starts_with("pwsh") {
        "-Command"
    } else {
        "-c"
    }
}

impl ShellActuator for ProcessShell {
    fn run(&mut self, command: &str) -> Result<ShellOutput> {
        debug!(
            target: "atlas::actuators",
            program = %self.program, %command,
            "Running shell command"
        );
        let output = Command::new(&self.program)
            .arg(self.flag)
            .arg(command)
            .output()
            .with_context(|| format!("Failed to spawn {} for '{command}'", self.program))?;
        let result = ShellOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(target: "atlas::actuators", exit_code = ?result.exit_code, "Shell command finished");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_follows_program() {
        assert_eq!(flag_for("/bin/bash"), "-c");
        assert_eq!(flag_for("C:\\Windows\\System32\\cmd.exe"), "/C");
        assert_eq!(flag_for("pwsh"), "-Command");
    }

    #[cfg(unix)]
    #[test]
    fn captures_output_and_exit_code() {
        let mut shell = ProcessShell::default();
        let ok = shell.run("echo hello; echo oops 1>&2").unwrap();
        assert!(ok.success());
        assert_eq!(ok.stdout.trim(), "hello");
        assert_eq!(ok.stderr.trim(), "oops");

        let failed = shell.run("exit 3").unwrap();
        assert_eq!(failed.exit_code, Some(3));
        assert!(!failed.success());
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let mut shell = ProcessShell::new(Some("/definitely/not/a/shell"));
        assert!(shell.run("true").is_err());
    }
}
