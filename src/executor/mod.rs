#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

/*!
Executor module for Atlas.

This module wires together:
- `runtime`: the `Executor`, which walks a parsed script and applies block semantics
- `registry`: the `CommandKind` -> handler table, built once per executor
- `handlers`: the built-in command handlers
- `variables`: the execution-scoped `${name}` store
- `result`: `ExecutionResult`

Example (dry run against the recording actuators):
```
use atlas::actuators::{Actuators, Recorder};
use atlas::config::Settings;
use atlas::executor::Executor;

let recorder = Recorder::new();
let mut executor =
    Executor::new(Settings::default(), Actuators::recording(&recorder)).dry_run(true);
let result = executor.execute(&atlas::dsl::parse("press enter\nwait 1s\n"));
assert!(result.success);
assert_eq!(recorder.calls().len(), 1);
```
*/

mod handlers;
pub mod registry;
pub mod result;
pub mod runtime;
pub mod variables;

pub use registry::{Handler, HandlerRegistry};
pub use result::ExecutionResult;
pub use runtime::{Executor, NodeOutcome};
pub use variables::VariableStore;
