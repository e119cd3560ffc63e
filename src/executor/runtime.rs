use serde_json::{Value, json};
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::actuators::Actuators;
use crate::config::Settings;
use crate::dsl::{Block, BlockKind, Command, CommandKind, Macro, Node};
use crate::error::AbortSignal;
use crate::executor::registry::{Handler, HandlerRegistry};
use crate::executor::result::ExecutionResult;
use crate::executor::variables::VariableStore;
use crate::locator::{Locator, LocatorMatch, TemplateLibrary};

/// Result of running one node. `Err` only for a script-authored `abort`.
pub type NodeOutcome = Result<ExecutionResult, AbortSignal>;

/// Walks a parsed `Macro` and dispatches each command to its handler.
///
/// - Top-level nodes run in order; the first failure stops the script.
/// - `repeat N` runs its body N times and stops at the first failing child.
/// - `try` logs failing children and keeps going; it always succeeds.
/// - `abort` ends the whole execution from any depth.
pub struct Executor {
    pub(super) settings: Settings,
    pub(super) actuators: Actuators,
    pub(super) locator: Option<Locator>,
    pub(super) templates: TemplateLibrary,
    pub(super) variables: VariableStore,
    pub(super) dry_run: bool,
    registry: HandlerRegistry,
}

impl Executor {
    pub fn new(settings: Settings, actuators: Actuators) -> Self {
        let templates = TemplateLibrary::new(settings.templates_dir.clone());
        Self {
            settings,
            actuators,
            locator: None,
            templates,
            variables: VariableStore::new(),
            dry_run: false,
            registry: HandlerRegistry::builtin(),
        }
    }

    /// Enable template clicks through `locator`.
    pub fn with_locator(mut self, locator: Locator) -> Self {
        self.locator = Some(locator);
        self
    }

    /// In dry-run mode `wait`/`sleep` do not block.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Variables of the current (or most recent) execution.
    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    pub fn templates(&self) -> &TemplateLibrary {
        &self.templates
    }

    /// Replace the handler for `kind`, returning the previous one.
    pub fn register_handler(&mut self, kind: CommandKind, handler: Handler) -> Option<Handler> {
        self.registry.register(kind, handler)
    }

    /// Run `script` with its own `set_variable` seeds only.
    pub fn execute(&mut self, script: &Macro) -> ExecutionResult {
        self.execute_with_vars(script, std::iter::empty::<(String, String)>())
    }

    /// Run `script`, overlaying `overrides` on the script's seeded variables.
    pub fn execute_with_vars<I, K, V>(&mut self, script: &Macro, overrides: I) -> ExecutionResult
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let started = Instant::now();
        self.variables.clear();
        self.variables.seed(&script.variables);
        self.variables.seed(overrides);

        info!(
            target: "atlas::runtime",
            title = %script.title,
            nodes = script.commands.len(),
            dry_run = self.dry_run,
            "Starting macro"
        );

        let mut executed = 0_usize;
        for (idx, node) in script.commands.iter().enumerate() {
            trace!(
                target: "atlas::runtime",
                index = idx, line = node.source_line(),
                "Executing node"
            );
            match self.execute_node(node) {
                Ok(result) if result.success => executed += 1,
                Ok(result) => {
                    executed += 1;
                    let message = format!("Error at command {}: {}", idx + 1, result.message);
                    error!(target: "atlas::runtime", line = node.source_line(), "{message}");
                    return ExecutionResult::fail(message)
                        .with_data(json!({
                            "executed": executed,
                            "line": node.source_line(),
                            "cause": result.data,
                        }))
                        .with_elapsed(started.elapsed());
                }
                Err(abort) => {
                    executed += 1;
                    warn!(target: "atlas::runtime", line = abort.line, "Macro aborted");
                    return ExecutionResult::fail(abort.to_string())
                        .with_data(json!({
                            "executed": executed,
                            "line": abort.line,
                            "aborted": true,
                        }))
                        .with_elapsed(started.elapsed());
                }
            }
        }

        let elapsed = started.elapsed();
        info!(
            target: "atlas::runtime",
            title = %script.title,
            executed,
            elapsed_ms = elapsed.as_millis() as u64,
            "Macro completed"
        );
        ExecutionResult::ok("Macro executed successfully")
            .with_data(json!({ "executed": executed }))
            .with_elapsed(elapsed)
    }

    /// Run one node (command or block) and time it.
    pub fn execute_node(&mut self, node: &Node) -> NodeOutcome {
        let started = Instant::now();
        let result = match node {
            Node::Command(cmd) => self.execute_command(cmd)?,
            Node::Block(block) => self.execute_block(block)?,
        };
        Ok(result.with_elapsed(started.elapsed()))
    }

    pub fn execute_command(&mut self, cmd: &Command) -> NodeOutcome {
        let Some(handler) = self.registry.get(cmd.kind) else {
            return Ok(ExecutionResult::fail(format!(
                "No handler registered for '{}'",
                cmd.kind
            )));
        };
        trace!(
            target: "atlas::runtime",
            kind = %cmd.kind, line = cmd.source_line,
            "Dispatching command"
        );
        let result = handler(self, cmd)?;
        if !result.success {
            debug!(
                target: "atlas::runtime",
                kind = %cmd.kind, line = cmd.source_line, message = %result.message,
                "Command failed"
            );
        }
        Ok(result)
    }

    fn execute_block(&mut self, block: &Block) -> NodeOutcome {
        match block.kind {
            BlockKind::Repeat => self.run_repeat(block),
            BlockKind::Try => self.run_try(block),
            BlockKind::If => {
                warn!(
                    target: "atlas::runtime",
                    line = block.source_line, condition = ?block.condition,
                    "Conditions are not evaluated; skipping if block"
                );
                Ok(ExecutionResult::ok("If block skipped"))
            }
            BlockKind::While | BlockKind::ForEach => Ok(ExecutionResult::fail(format!(
                "Unsupported block type '{}' at line {}",
                block.kind, block.source_line
            ))),
        }
    }

    fn run_repeat(&mut self, block: &Block) -> NodeOutcome {
        let raw = block.condition.as_deref().unwrap_or_default();
        let text = self.variables.substitute(raw);
        let Ok(count) = text.trim().parse::<u32>() else {
            return Ok(ExecutionResult::fail(format!(
                "Invalid repeat count '{text}' at line {}",
                block.source_line
            )));
        };

        debug!(target: "atlas::runtime", count, line = block.source_line, "Repeat block");
        for iteration in 1..=count {
            for child in &block.children {
                let result = self.execute_node(child)?;
                if !result.success {
                    return Ok(ExecutionResult::fail(format!(
                        "Repeat failed on iteration {iteration} at line {}: {}",
                        child.source_line(),
                        result.message
                    ))
                    .with_data(json!({
                        "iteration": iteration,
                        "line": child.source_line(),
                        "cause": result.data,
                    })));
                }
            }
        }
        Ok(ExecutionResult::ok(format!("Repeat block executed {count} times")))
    }

    fn run_try(&mut self, block: &Block) -> NodeOutcome {
        let mut failures = Vec::new();
        self.run_best_effort(&block.children, &mut failures)?;

        let catch_ran = !failures.is_empty() && !block.alternate.is_empty();
        if catch_ran {
            debug!(target: "atlas::runtime", line = block.source_line, "Running catch body");
            self.run_best_effort(&block.alternate, &mut failures)?;
        }

        let message = if failures.is_empty() {
            "Try block executed".to_string()
        } else {
            format!("Try block executed with {} failure(s)", failures.len())
        };
        Ok(ExecutionResult::ok(message).with_data(json!({
            "failures": failures,
            "catch_ran": catch_ran,
        })))
    }

    /// Run `nodes` in order, recording failures instead of stopping.
    fn run_best_effort(
        &mut self,
        nodes: &[Node],
        failures: &mut Vec<Value>,
    ) -> Result<(), AbortSignal> {
        for node in nodes {
            let result = self.execute_node(node)?;
            if !result.success {
                warn!(
                    target: "atlas::runtime",
                    line = node.source_line(), message = %result.message,
                    "Failure inside try block; continuing"
                );
                failures.push(json!({ "line": node.source_line(), "message": result.message }));
            }
        }
        Ok(())
    }

    /// Resolve and locate a template, for the click handlers.
    /// `Err` carries the failed result to report.
    pub(super) fn locate_template(&mut self, name: &str) -> Result<LocatorMatch, ExecutionResult> {
        let Some(path) = self.templates.resolve(name) else {
            return Err(ExecutionResult::fail(format!(
                "Template '{name}' not found under {}",
                self.templates.root().display()
            )));
        };
        let Some(locator) = self.locator.as_mut() else {
            return Err(ExecutionResult::fail(format!(
                "No screen source available to locate '{name}'"
            )));
        };

        let policy = self.settings.locator;
        match locator.locate(&path, policy.confidence_threshold, policy.timeout()) {
            Ok(found) if found.found => Ok(found),
            Ok(missed) => Err(ExecutionResult::fail(format!(
                "Element '{name}' not found within {}ms (best confidence {:.2}, threshold {:.2})",
                policy.timeout_ms, missed.confidence, policy.confidence_threshold
            ))
            .with_data(json!({
                "best_confidence": missed.confidence,
                "attempts": missed.attempts,
                "reference": missed.reference_path,
            }))),
            Err(err) => Err(ExecutionResult::fail(format!("Cannot locate '{name}': {err}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuators::{Call, ClickKind, Recorder, ScrollDirection};
    use crate::dsl::parse;

    fn recording_executor() -> (Executor, Recorder) {
        let recorder = Recorder::new();
        let executor =
            Executor::new(Settings::default(), Actuators::recording(&recorder)).dry_run(true);
        (executor, recorder)
    }

    #[test]
    fn calculator_sequence_dispatches_in_order() {
        let (mut ex, rec) = recording_executor();
        let script = parse("open Calculator\nwait 2s\npress 5\npress +\npress 3\npress enter\n");
        let result = ex.execute(&script);
        assert!(result.success, "{}", result.message);
        assert_eq!(
            rec.calls(),
            vec![
                Call::Launch {
                    app: "Calculator".into(),
                },
                Call::PressKey { key: "5".into() },
                Call::PressKey { key: "+".into() },
                Call::PressKey { key: "3".into() },
                Call::PressKey {
                    key: "enter".into(),
                },
            ]
        );
        assert_eq!(result.data.unwrap()["executed"], 6);
    }

    #[test]
    fn first_top_level_failure_stops_execution() {
        let (mut ex, rec) = recording_executor();
        let script = parse("press a\nwait soon\npress b\n");
        let result = ex.execute(&script);
        assert!(!result.success);
        assert!(result.message.starts_with("Error at command 2: "), "{}", result.message);
        assert_eq!(rec.calls(), vec![Call::PressKey { key: "a".into() }]);
    }

    #[test]
    fn repeat_zero_runs_nothing() {
        let (mut ex, rec) = recording_executor();
        let result = ex.execute(&parse("repeat 0:\n  press a\nend\n"));
        assert!(result.success);
        assert!(rec.calls().is_empty());
    }

    #[test]
    fn repeat_runs_children_in_order_and_substitutes_count() {
        let (mut ex, rec) = recording_executor();
        let script = parse("set_variable n=\"2\"\nrepeat ${n}:\n  press a\n  press b\nend\n");
        assert!(ex.execute(&script).success);
        let keys: Vec<_> = rec
            .calls()
            .into_iter()
            .map(|c| match c {
                Call::PressKey { key } => key,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(keys, ["a", "b", "a", "b"]);
    }

    #[test]
    fn bad_repeat_count_fails() {
        let (mut ex, _) = recording_executor();
        let result = ex.execute(&parse("repeat lots:\n  press a\nend\n"));
        assert!(!result.success);
        assert!(result.message.contains("Invalid repeat count 'lots'"));
    }

    #[test]
    fn repeat_stops_at_first_failing_child() {
        let (mut ex, rec) = recording_executor();
        let result = ex.execute(&parse("repeat 3:\n  press a\n  wait never\n  press b\nend\n"));
        assert!(!result.success);
        assert!(result.message.contains("iteration 1"), "{}", result.message);
        assert_eq!(rec.calls(), vec![Call::PressKey { key: "a".into() }]);
    }

    #[test]
    fn try_continues_and_runs_catch_once() {
        let (mut ex, rec) = recording_executor();
        let script =
            parse("try:\n  wait x\n  wait y\n  press a\ncatch:\n  press z\nend\npress b\n");
        let result = ex.execute(&script);
        assert!(result.success, "{}", result.message);
        assert_eq!(
            rec.calls(),
            vec![
                Call::PressKey { key: "a".into() },
                Call::PressKey { key: "z".into() },
                Call::PressKey { key: "b".into() },
            ]
        );
    }

    #[test]
    fn try_records_failures_in_data() {
        let (mut ex, _) = recording_executor();
        let block = parse("try:\n  wait x\nend\n");
        let outcome = ex.execute_node(&block.commands[0]).unwrap();
        assert!(outcome.success);
        let data = outcome.data.unwrap();
        assert_eq!(data["failures"].as_array().unwrap().len(), 1);
        assert_eq!(data["failures"][0]["line"], 2);
        assert_eq!(data["catch_ran"], false);
    }

    #[test]
    fn catch_after_nested_block_skipped_when_nothing_fails() {
        let (mut ex, rec) = recording_executor();
        let script = parse("try:\n  repeat 1:\n    press a\ncatch:\n  press z\nend\n");
        let outcome = ex.execute_node(&script.commands[0]).unwrap();
        assert!(outcome.success, "{}", outcome.message);
        assert_eq!(outcome.data.unwrap()["catch_ran"], false);
        assert_eq!(rec.calls(), vec![Call::PressKey { key: "a".into() }]);
    }

    #[test]
    fn catch_after_nested_block_runs_when_it_fails() {
        let (mut ex, rec) = recording_executor();
        let script = parse("try:\n  repeat 1:\n    wait never\ncatch:\n  press z\nend\n");
        let outcome = ex.execute_node(&script.commands[0]).unwrap();
        let data = outcome.data.unwrap();
        assert_eq!(data["failures"].as_array().unwrap().len(), 1);
        assert_eq!(data["catch_ran"], true);
        assert_eq!(rec.calls(), vec![Call::PressKey { key: "z".into() }]);
    }

    #[test]
    fn abort_inside_try_is_fatal() {
        let (mut ex, rec) = recording_executor();
        let result = ex.execute(&parse("try:\n  abort\n  press a\nend\npress b\n"));
        assert!(!result.success);
        assert_eq!(result.message, "Execution aborted by abort command at line 2");
        assert_eq!(result.data.unwrap()["aborted"], true);
        assert!(rec.calls().is_empty());
    }

    #[test]
    fn if_is_a_successful_no_op() {
        let (mut ex, rec) = recording_executor();
        let result = ex.execute(&parse("if ready:\n  press a\nelse:\n  press b\nend\n"));
        assert!(result.success);
        assert!(rec.calls().is_empty());
    }

    #[test]
    fn while_and_for_each_are_unsupported() {
        let (mut ex, _) = recording_executor();
        let result = ex.execute(&parse("while true:\n  press a\nend\n"));
        assert!(!result.success);
        assert!(result.message.contains("Unsupported block type 'while'"));
        let result = ex.execute(&parse("for_each item in list:\n  press a\nend\n"));
        assert!(result.message.contains("Unsupported block type 'for_each'"));
    }

    #[test]
    fn substitution_is_single_pass() {
        let (mut ex, rec) = recording_executor();
        let script = parse("set_variable y=\"boom\"\ntype \"${x}\"\n");
        assert!(ex.execute_with_vars(&script, [("x", "${y}")]).success);
        assert_eq!(
            rec.calls(),
            vec![Call::TypeText {
                text: "${y}".into(),
            }]
        );
        assert_eq!(ex.variables().get("y"), Some("boom"));
    }

    #[test]
    fn caller_variables_overlay_seeds_until_reassigned() {
        let (mut ex, rec) = recording_executor();
        let script = parse("type \"${who}\"\nset_variable who=\"script\"\ntype \"${who}\"\n");
        assert!(ex.execute_with_vars(&script, [("who", "cli")]).success);
        assert_eq!(
            rec.calls(),
            vec![
                Call::TypeText { text: "cli".into() },
                Call::TypeText {
                    text: "script".into(),
                },
            ]
        );
    }

    #[test]
    fn template_click_without_screen_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Save.png"), b"x").unwrap();
        let recorder = Recorder::new();
        let settings = Settings {
            templates_dir: dir.path().to_path_buf(),
            ..Settings::default()
        };
        let mut ex = Executor::new(settings, Actuators::recording(&recorder));
        let result = ex.execute(&parse("click Save\n"));
        assert!(!result.success);
        assert!(result.message.contains("No screen source"), "{}", result.message);
    }

    #[test]
    fn coordinate_clicks_and_scroll() {
        let (mut ex, rec) = recording_executor();
        let script = parse("click (10, 20)\nright_click (1,2)\nscroll up 5\nhotkey cmd+shift+t\n");
        assert!(ex.execute(&script).success);
        assert_eq!(
            rec.calls(),
            vec![
                Call::Click {
                    kind: ClickKind::Single,
                    x: 10,
                    y: 20,
                },
                Call::Click {
                    kind: ClickKind::Right,
                    x: 1,
                    y: 2,
                },
                Call::Scroll {
                    direction: ScrollDirection::Up,
                    amount: 5,
                },
                Call::PressCombo {
                    keys: vec!["cmd".into(), "shift".into(), "t".into()],
                },
            ]
        );
    }

    #[test]
    fn custom_handler_replaces_builtin() {
        fn refuse(_: &mut Executor, cmd: &Command) -> NodeOutcome {
            Ok(ExecutionResult::fail(format!("refused line {}", cmd.source_line)))
        }
        let (mut ex, _) = recording_executor();
        assert!(ex.register_handler(CommandKind::Press, refuse).is_some());
        let result = ex.execute(&parse("press a\n"));
        assert_eq!(result.message, "Error at command 1: refused line 1");
    }
}
