use anyhow::{Context, Result, bail};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

use super::AppLauncher;

/// Opens applications with the platform's native mechanism:
/// `open -a` on macOS, `cmd /C start` on Windows, a detached spawn elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl AppLauncher for SystemLauncher {
    fn launch(&mut self, app: &str) -> Result<()> {
        debug!(target: "atlas::actuators", %app, "Launching application");
        if cfg!(target_os = "macos") {
            let status = Command::new("open")
                .args(["-a", app])
                .status()
                .with_context(|| format!("Failed to run 'open -a {app}'"))?;
            if !status.success() {
                bail!("'open -a {app}' exited with {status}");
            }
        } else if cfg!(windows) {
            let status = Command::new("cmd")
                .args(["/C", "start", "", app])
                .status()
                .with_context(|| format!("Failed to start {app}"))?;
            if !status.success() {
                bail!("'start {app}' exited with {status}");
            }
        } else {
            spawn_detached(app)?;
        }
        Ok(())
    }
}

/// Spawn `app` without waiting for it. A named thread waits on the child so it is
/// reaped on exit.
fn spawn_detached(app: &str) -> Result<JoinHandle<()>> {
    let mut child = Command::new(app)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("Failed to launch {app}"))?;
    let name = app.to_string();
    thread::Builder::new()
        .name("atlas-reaper".to_string())
        .spawn(move || match child.wait() {
            Ok(status) => debug!(
                target: "atlas::actuators",
                app = %name, %status,
                "Application exited"
            ),
            Err(err) => warn!(
                target: "atlas::actuators",
                app = %name, error = %err,
                "Lost track of application"
            ),
        })
        .context("Failed to start the process reaper thread")
}
