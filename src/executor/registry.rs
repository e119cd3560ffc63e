use std::collections::HashMap;

use crate::dsl::{Command, CommandKind};
use crate::executor::handlers;
use crate::executor::runtime::{Executor, NodeOutcome};

/// Executes one command against the executor's actuators and variables.
pub type Handler = fn(&mut Executor, &Command) -> NodeOutcome;

/// Maps every `CommandKind` to exactly one handler. Built once per `Executor`.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<CommandKind, Handler>,
}

impl HandlerRegistry {
    /// The standard handler table.
    pub fn builtin() -> Self {
        let table: [(CommandKind, Handler); 19] = [
            (CommandKind::Open, handlers::open),
            (CommandKind::Click, handlers::click),
            (CommandKind::DoubleClick, handlers::double_click),
            (CommandKind::RightClick, handlers::right_click),
            (CommandKind::Type, handlers::type_text),
            (CommandKind::Press, handlers::press),
            (CommandKind::Hotkey, handlers::hotkey),
            (CommandKind::Scroll, handlers::scroll),
            (CommandKind::Wait, handlers::wait),
            (CommandKind::Sleep, handlers::wait),
            (CommandKind::SeleniumInit, handlers::selenium_init),
            (CommandKind::SeleniumClick, handlers::selenium_click),
            (CommandKind::SeleniumType, handlers::selenium_type),
            (CommandKind::SeleniumClose, handlers::selenium_close),
            (CommandKind::SystemCommand, handlers::system_command),
            (CommandKind::SetVariable, handlers::set_variable),
            (CommandKind::Log, handlers::log),
            (CommandKind::Abort, handlers::abort),
            (CommandKind::Comment, handlers::comment),
        ];
        Self {
            handlers: table.into_iter().collect(),
        }
    }

    pub fn get(&self, kind: CommandKind) -> Option<Handler> {
        self.handlers.get(&kind).copied()
    }

    /// Install `handler` for `kind`, returning the one it replaces.
    pub fn register(&mut self, kind: CommandKind, handler: Handler) -> Option<Handler> {
        self.handlers.insert(kind, handler)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
