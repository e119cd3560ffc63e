//! Built-in command handlers. Each one substitutes variables into its arguments,
//! drives one actuator, and reports an `ExecutionResult`.

use serde_json::json;
use std::thread;
use tracing::{debug, info};

use crate::actuators::{ClickKind, ScrollDirection};
use crate::dsl::Command;
use crate::error::AbortSignal;
use crate::executor::result::ExecutionResult;
use crate::executor::runtime::{Executor, NodeOutcome};
use crate::utils::duration::parse_wait;

/// Map an actuator result onto success with `done`, or a failure naming `done`.
fn act(result: anyhow::Result<()>, done: String) -> NodeOutcome {
    Ok(match result {
        Ok(()) => ExecutionResult::ok(done),
        Err(err) => ExecutionResult::fail(format!("{done} failed: {err:#}")),
    })
}

fn missing(cmd: &Command, what: &str) -> NodeOutcome {
    Ok(ExecutionResult::fail(format!(
        "'{}' at line {} has no {what}",
        cmd.kind, cmd.source_line
    )))
}

fn target(ex: &Executor, cmd: &Command) -> Option<String> {
    cmd.target.as_deref().map(|t| ex.variables.substitute(t))
}

fn value(ex: &Executor, cmd: &Command) -> Option<String> {
    cmd.value.as_deref().map(|v| ex.variables.substitute(v))
}

pub(super) fn open(ex: &mut Executor, cmd: &Command) -> NodeOutcome {
    let Some(name) = target(ex, cmd) else {
        return missing(cmd, "application");
    };
    let app = ex.settings.app_name(&name).to_string();
    if app != name {
        debug!(target: "atlas::runtime", alias = %name, %app, "Resolved application alias");
    }
    let result = ex.actuators.launcher.launch(&app);
    act(result, format!("Open {app}"))
}

pub(super) fn click(ex: &mut Executor, cmd: &Command) -> NodeOutcome {
    click_as(ex, cmd, ClickKind::Single)
}

pub(super) fn double_click(ex: &mut Executor, cmd: &Command) -> NodeOutcome {
    click_as(ex, cmd, ClickKind::Double)
}

pub(super) fn right_click(ex: &mut Executor, cmd: &Command) -> NodeOutcome {
    click_as(ex, cmd, ClickKind::Right)
}

/// Coordinate clicks go straight to the input actuator; template clicks locate first.
fn click_as(ex: &mut Executor, cmd: &Command, kind: ClickKind) -> NodeOutcome {
    let (x, y, located) = if let Some((x, y)) = cmd.coordinates() {
        (x, y, None)
    } else if cmd.is_template_click() {
        let Some(name) = target(ex, cmd) else {
            return missing(cmd, "template name");
        };
        match ex.locate_template(&name) {
            Ok(found) => (found.center.x, found.center.y, Some(found)),
            Err(failed) => return Ok(failed),
        }
    } else {
        return missing(cmd, "coordinates or template name");
    };

    let result = ex.actuators.input.click_with(kind, x, y);
    let outcome = act(result, format!("{} at ({x}, {y})", cmd.kind))?;
    Ok(match located {
        Some(found) if outcome.success => outcome.with_data(json!({
            "confidence": found.confidence,
            "center": found.center,
            "bounding_box": found.bounding_box,
            "attempts": found.attempts,
        })),
        _ => outcome,
    })
}

pub(super) fn type_text(ex: &mut Executor, cmd: &Command) -> NodeOutcome {
    let Some(text) = value(ex, cmd) else {
        return missing(cmd, "text");
    };
    let result = ex.actuators.input.type_text(&text);
    act(result, format!("Type {} character(s)", text.chars().count()))
}

pub(super) fn press(ex: &mut Executor, cmd: &Command) -> NodeOutcome {
    let Some(key) = target(ex, cmd) else {
        return missing(cmd, "key");
    };
    let result = ex.actuators.input.press_key(&key);
    act(result, format!("Press {key}"))
}

pub(super) fn hotkey(ex: &mut Executor, cmd: &Command) -> NodeOutcome {
    let Some(combo) = target(ex, cmd) else {
        return missing(cmd, "key combination");
    };
    let keys: Vec<&str> = combo
        .split('+')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .collect();
    if keys.is_empty() {
        return missing(cmd, "keys");
    }
    let result = ex.actuators.input.press_combo(&keys);
    act(result, format!("Hotkey {combo}"))
}

pub(super) fn scroll(ex: &mut Executor, cmd: &Command) -> NodeOutcome {
    let raw = cmd.param_str("direction").unwrap_or("down");
    let Some(direction) = ScrollDirection::parse(raw) else {
        return Ok(ExecutionResult::fail(format!("Invalid scroll direction '{raw}'")));
    };
    let Ok(amount) = i32::try_from(cmd.param_i64("amount").unwrap_or(3)) else {
        return Ok(ExecutionResult::fail("Scroll amount out of range"));
    };
    let result = ex.actuators.input.scroll(direction, amount);
    act(result, format!("Scroll {direction} {amount}"))
}

/// Shared by `wait` and `sleep`.
pub(super) fn wait(ex: &mut Executor, cmd: &Command) -> NodeOutcome {
    let Some(text) = value(ex, cmd) else {
        return missing(cmd, "duration");
    };
    let duration = match parse_wait(&text) {
        Ok(d) => d,
        Err(err) => return Ok(ExecutionResult::fail(format!("{err:#}"))),
    };
    if ex.dry_run {
        info!(target: "atlas::runtime", ms = duration.as_millis() as u64, "DRY-RUN wait");
        return Ok(ExecutionResult::ok(format!("Skipped wait of {duration:?}")));
    }
    debug!(target: "atlas::runtime", ms = duration.as_millis() as u64, "Waiting");
    thread::sleep(duration);
    Ok(ExecutionResult::ok(format!("Waited {duration:?}")))
}

pub(super) fn set_variable(ex: &mut Executor, cmd: &Command) -> NodeOutcome {
    let Some(name) = cmd.target.clone() else {
        return missing(cmd, "variable name");
    };
    let assigned = value(ex, cmd).unwrap_or_default();
    debug!(target: "atlas::runtime", %name, value = %assigned, "set_variable");
    let message = format!("{name} = {assigned}");
    ex.variables.set(name, assigned);
    Ok(ExecutionResult::ok(message))
}

pub(super) fn system_command(ex: &mut Executor, cmd: &Command) -> NodeOutcome {
    let Some(line) = value(ex, cmd) else {
        return missing(cmd, "command");
    };
    let output = match ex.actuators.shell.run(&line) {
        Ok(output) => output,
        Err(err) => return Ok(ExecutionResult::fail(format!("Failed to run '{line}': {err:#}"))),
    };
    let data = json!({
        "exit_code": output.exit_code,
        "stdout": output.stdout,
        "stderr": output.stderr,
    });
    let result = if output.success() {
        ExecutionResult::ok(format!("Command succeeded: {line}"))
    } else {
        let code = output
            .exit_code
            .map_or_else(|| "a signal".to_string(), |c| format!("code {c}"));
        ExecutionResult::fail(format!(
            "Command '{line}' exited with {code}: {}",
            output.stderr.trim()
        ))
    };
    Ok(result.with_data(data))
}

pub(super) fn log(ex: &mut Executor, cmd: &Command) -> NodeOutcome {
    let message = value(ex, cmd).unwrap_or_default();
    info!(target: "atlas::script", line = cmd.source_line, "{message}");
    Ok(ExecutionResult::ok(message))
}

pub(super) fn abort(_: &mut Executor, cmd: &Command) -> NodeOutcome {
    Err(AbortSignal {
        line: cmd.source_line,
    })
}

pub(super) fn comment(_: &mut Executor, cmd: &Command) -> NodeOutcome {
    debug!(
        target: "atlas::runtime",
        line = cmd.source_line, raw = %cmd.raw_line,
        "Skipping comment"
    );
    Ok(ExecutionResult::ok("Skipped"))
}

pub(super) fn selenium_init(ex: &mut Executor, cmd: &Command) -> NodeOutcome {
    let Some(url) = target(ex, cmd) else {
        return missing(cmd, "url");
    };
    let result = ex.actuators.browser.init(&url);
    act(result, format!("Browser init {url}"))
}

pub(super) fn selenium_click(ex: &mut Executor, cmd: &Command) -> NodeOutcome {
    let Some(selector) = target(ex, cmd) else {
        return missing(cmd, "selector");
    };
    let result = ex.actuators.browser.click(&selector);
    act(result, format!("Browser click {selector}"))
}

pub(super) fn selenium_type(ex: &mut Executor, cmd: &Command) -> NodeOutcome {
    let Some(selector) = target(ex, cmd) else {
        return missing(cmd, "selector");
    };
    let text = value(ex, cmd).unwrap_or_default();
    let result = ex.actuators.browser.type_text(&selector, &text);
    act(result, format!("Browser type into {selector}"))
}

pub(super) fn selenium_close(ex: &mut Executor, _: &Command) -> NodeOutcome {
    let result = ex.actuators.browser.close();
    act(result, "Browser close".to_string())
}
