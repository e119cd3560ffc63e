use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Kind of a single (non-block) script instruction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    Open,
    Click,
    DoubleClick,
    RightClick,
    Type,
    Press,
    Hotkey,
    Scroll,
    Wait,
    Sleep,
    SeleniumInit,
    SeleniumClick,
    SeleniumType,
    SeleniumClose,
    SystemCommand,
    SetVariable,
    Log,
    Abort,
    /// Unrecognized line, kept verbatim in `value`.
    Comment,
}

impl CommandKind {
    /// Every kind, in declaration order.
    pub const ALL: [CommandKind; 19] = [
        CommandKind::Open,
        CommandKind::Click,
        CommandKind::DoubleClick,
        CommandKind::RightClick,
        CommandKind::Type,
        CommandKind::Press,
        CommandKind::Hotkey,
        CommandKind::Scroll,
        CommandKind::Wait,
        CommandKind::Sleep,
        CommandKind::SeleniumInit,
        CommandKind::SeleniumClick,
        CommandKind::SeleniumType,
        CommandKind::SeleniumClose,
        CommandKind::SystemCommand,
        CommandKind::SetVariable,
        CommandKind::Log,
        CommandKind::Abort,
        CommandKind::Comment,
    ];

    /// Script keyword for this kind (e.g. `system_command`).
    pub fn keyword(self) -> &'static str {
        match self {
            CommandKind::Open => "open",
            CommandKind::Click => "click",
            CommandKind::DoubleClick => "double_click",
            CommandKind::RightClick => "right_click",
            CommandKind::Type => "type",
            CommandKind::Press => "press",
            CommandKind::Hotkey => "hotkey",
            CommandKind::Scroll => "scroll",
            CommandKind::Wait => "wait",
            CommandKind::Sleep => "sleep",
            CommandKind::SeleniumInit => "selenium_init",
            CommandKind::SeleniumClick => "selenium_click",
            CommandKind::SeleniumType => "selenium_type",
            CommandKind::SeleniumClose => "selenium_close",
            CommandKind::SystemCommand => "system_command",
            CommandKind::SetVariable => "set_variable",
            CommandKind::Log => "log",
            CommandKind::Abort => "abort",
            CommandKind::Comment => "comment",
        }
    }

    /// Kinds whose execution can never fail.
    pub fn always_succeeds(self) -> bool {
        matches!(self, CommandKind::Comment)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A parsed instruction. Immutable once the parser has produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Value>,
    /// 1-based line number in the script.
    pub source_line: usize,
    pub indent_level: usize,
    /// The line exactly as written (without the trailing newline).
    pub raw_line: String,
}

impl Command {
    pub(crate) fn new(kind: CommandKind, source_line: usize, raw_line: &str) -> Self {
        Self {
            kind,
            target: None,
            value: None,
            parameters: BTreeMap::new(),
            source_line,
            indent_level: indent_of(raw_line),
            raw_line: raw_line.to_string(),
        }
    }

    pub(crate) fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub(crate) fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub(crate) fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    /// Explicit `(x, y)` for coordinate clicks.
    pub fn coordinates(&self) -> Option<(i32, i32)> {
        let x = self.parameters.get("x")?.as_i64()?;
        let y = self.parameters.get("y")?.as_i64()?;
        Some((i32::try_from(x).ok()?, i32::try_from(y).ok()?))
    }

    /// True for clicks that must go through the element locator.
    pub fn is_template_click(&self) -> bool {
        matches!(
            self.kind,
            CommandKind::Click | CommandKind::DoubleClick | CommandKind::RightClick
        ) && self.parameters.get("type").and_then(Value::as_str) == Some("template")
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }

    pub fn param_i64(&self, key: &str) -> Option<i64> {
        self.parameters.get(key).and_then(Value::as_i64)
    }
}

/// Control-flow block keyword.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Repeat,
    If,
    Try,
    While,
    ForEach,
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BlockKind::Repeat => "repeat",
            BlockKind::If => "if",
            BlockKind::Try => "try",
            BlockKind::While => "while",
            BlockKind::ForEach => "for_each",
        })
    }
}

/// A block of nested nodes (`repeat`, `try`, `if`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    pub children: Vec<Node>,
    /// Body following a `catch:` / `else:` separator.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternate: Vec<Node>,
    pub source_line: usize,
    pub indent_level: usize,
}

/// One element of the command tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Command(Command),
    Block(Block),
}

impl Node {
    pub fn source_line(&self) -> usize {
        match self {
            Node::Command(c) => c.source_line,
            Node::Block(b) => b.source_line,
        }
    }

    pub fn as_command(&self) -> Option<&Command> {
        match self {
            Node::Command(c) => Some(c),
            Node::Block(_) => None,
        }
    }

    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Node::Block(b) => Some(b),
            Node::Command(_) => None,
        }
    }
}

/// A parsed Atlas script, ready for execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Macro {
    pub title: String,
    pub description: String,
    pub commands: Vec<Node>,
    /// Variables pre-seeded by `set_variable` lines.
    pub variables: BTreeMap<String, String>,
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
}

impl Macro {
    /// Visit every command in the tree, depth-first in source order
    /// (alternate bodies included).
    pub fn walk_commands<'a>(&'a self, mut f: impl FnMut(&'a Command)) {
        fn walk<'a>(nodes: &'a [Node], f: &mut impl FnMut(&'a Command)) {
            for node in nodes {
                match node {
                    Node::Command(c) => f(c),
                    Node::Block(b) => {
                        walk(&b.children, f);
                        walk(&b.alternate, f);
                    }
                }
            }
        }
        walk(&self.commands, &mut f);
    }

    /// Total number of commands at any depth.
    pub fn command_count(&self) -> usize {
        let mut n = 0;
        self.walk_commands(|_| n += 1);
        n
    }
}

/// Leading whitespace width, counted in characters.
pub(crate) fn indent_of(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}
