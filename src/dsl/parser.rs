use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, trace, warn};

use super::model::{Block, BlockKind, Command, CommandKind, Macro, Node, indent_of};
use crate::error::ParseError;
use crate::locator::TemplateLibrary;

static COORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\(\s*(\d+)\s*,\s*(\d+)\s*\)").expect("coordinate pattern is valid")
});
static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^"([^"]*)""#).expect("quoted pattern is valid"));
static ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\w+)\s*=\s*"([^"]*)""#).expect("assignment pattern is valid")
});
static URL_ARG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^url="([^"]*)""#).expect("url pattern is valid"));
static SELECTOR_ARG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^selector="([^"]*)""#).expect("selector pattern is valid"));
static SELECTOR_TEXT_ARGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^selector="([^"]*)"\s+text="([^"]*)""#).expect("selector/text pattern is valid")
});

const BLOCK_OPENERS: [&str; 4] = ["if ", "repeat ", "while ", "for_each "];
const DEFAULT_TITLE: &str = "Untitled Macro";

/// Parse script text into a [`Macro`]. Never fails: unrecognized lines become comments.
pub fn parse(text: &str) -> Macro {
    let lines: Vec<&str> = text.lines().collect();
    let metadata = extract_metadata(&lines);

    let mut parser = LineParser {
        lines: &lines,
        pos: 0,
        variables: BTreeMap::new(),
    };
    let (commands, _) = parser.parse_nodes(None);
    let variables = parser.variables;

    let title = metadata
        .get("title")
        .cloned()
        .unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let description = metadata.get("description").cloned().unwrap_or_default();

    let parsed = Macro {
        title,
        description,
        commands,
        variables,
        metadata,
        source_path: None,
    };
    debug!(
        target: "atlas::parser",
        title = %parsed.title,
        nodes = parsed.commands.len(),
        commands = parsed.command_count(),
        variables = parsed.variables.len(),
        "Parsed script"
    );
    parsed
}

/// Parse raw bytes, failing only if they are not UTF-8.
pub fn parse_bytes(bytes: &[u8]) -> Result<Macro, ParseError> {
    let text = std::str::from_utf8(bytes)?;
    Ok(parse(text))
}

/// Read and parse a `.atlas` file.
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Macro, ParseError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut parsed = parse_bytes(&bytes)?;
    parsed.source_path = Some(path.to_path_buf());
    Ok(parsed)
}

/// Report template clicks whose reference image cannot be resolved.
pub fn validate(script: &Macro, templates: &TemplateLibrary) -> Vec<String> {
    let mut problems = Vec::new();
    script.walk_commands(|cmd| {
        if !cmd.is_template_click() {
            return;
        }
        if let Some(name) = cmd.target.as_deref() {
            if name.contains("${") {
                // Resolved only at run time.
                return;
            }
            if templates.resolve(name).is_none() {
                problems.push(format!(
                    "Template '{}' not found (line {})",
                    name, cmd.source_line
                ));
            }
        }
    });
    problems
}

/// Mine `Title:` / `Description:` / `Date:` / `Platform:` from the leading comment block.
fn extract_metadata(lines: &[&str]) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    metadata.insert("version".to_string(), "1.0".to_string());
    metadata.insert("platform".to_string(), std::env::consts::OS.to_string());

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !line.starts_with('#') {
            break;
        }
        for (marker, key) in [
            ("Title:", "title"),
            ("Description:", "description"),
            ("Date:", "date"),
            ("Platform:", "platform"),
        ] {
            if let Some((_, rest)) = line.split_once(marker) {
                metadata.insert(key.to_string(), rest.trim().to_string());
                break;
            }
        }
    }
    metadata
}

/// How a nested node list ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Terminator {
    /// `end` at the header level (consumed).
    End,
    /// `catch:` / `else:` at the header level (consumed).
    Branch,
    /// Any other line at the header level, or any line shallower than it (left for the caller).
    Dedent,
    Eof,
}

struct LineParser<'a> {
    lines: &'a [&'a str],
    pos: usize,
    variables: BTreeMap<String, String>,
}

impl<'a> LineParser<'a> {
    /// Parse consecutive nodes. With `parent = Some(indent)`, stop at the first line
    /// indented at or below `indent`.
    fn parse_nodes(&mut self, parent: Option<usize>) -> (Vec<Node>, Terminator) {
        let mut nodes = Vec::new();

        while self.pos < self.lines.len() {
            let raw = self.lines[self.pos].trim_end();
            let clean = raw.trim();
            if clean.is_empty() || clean.starts_with('#') {
                self.pos += 1;
                continue;
            }

            // Only the block whose header sits at this indent may claim `end` or a branch;
            // a shallower line closes every nested block on the way out.
            if let Some(header_indent) = parent {
                let indent = indent_of(raw);
                if indent < header_indent {
                    return (nodes, Terminator::Dedent);
                }
                if indent == header_indent {
                    return match clean {
                        "end" => {
                            self.pos += 1;
                            (nodes, Terminator::End)
                        }
                        "catch:" | "else:" => {
                            self.pos += 1;
                            (nodes, Terminator::Branch)
                        }
                        _ => (nodes, Terminator::Dedent),
                    };
                }
            }

            if is_block_opener(clean) {
                nodes.push(Node::Block(self.parse_block()));
            } else {
                let line_no = self.pos + 1;
                nodes.push(Node::Command(self.parse_command(clean, line_no, raw)));
                self.pos += 1;
            }
        }

        (nodes, Terminator::Eof)
    }

    fn parse_block(&mut self) -> Block {
        let raw = self.lines[self.pos].trim_end();
        let header = raw.trim();
        let indent_level = indent_of(raw);
        let source_line = self.pos + 1;
        let (kind, condition) = block_header(header);
        self.pos += 1;

        let (children, terminator) = self.parse_nodes(Some(indent_level));
        let alternate = if terminator == Terminator::Branch {
            let (alternate, after) = self.parse_nodes(Some(indent_level));
            if after == Terminator::Branch {
                warn!(
                    target: "atlas::parser",
                    line = source_line,
                    "Only one catch/else branch per block is supported; extra branch ignored"
                );
                // Drain the extra branch so it does not leak into the enclosing sequence.
                let _ = self.parse_nodes(Some(indent_level));
            }
            alternate
        } else {
            Vec::new()
        };

        if matches!(terminator, Terminator::Dedent | Terminator::Eof) {
            trace!(
                target: "atlas::parser",
                line = source_line, ?terminator,
                "Block closed without explicit end"
            );
        }

        Block {
            kind,
            condition,
            children,
            alternate,
            source_line,
            indent_level,
        }
    }

    fn parse_command(&mut self, line: &str, line_no: usize, raw: &str) -> Command {
        match self.recognize(line, line_no, raw) {
            Some(cmd) => cmd,
            None => {
                warn!(
                    target: "atlas::parser",
                    line = line_no, text = %line,
                    "Unknown command; treating as comment"
                );
                Command::new(CommandKind::Comment, line_no, raw).with_value(line)
            }
        }
    }

    /// Match one line against each command grammar; first match wins.
    fn recognize(&mut self, line: &str, line_no: usize, raw: &str) -> Option<Command> {
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((w, r)) => (w, r.trim()),
            None => (line, ""),
        };
        let new = |kind| Command::new(kind, line_no, raw);

        match word {
            "open" => non_empty(rest).map(|app| new(CommandKind::Open).with_target(app)),

            "click" => click(new(CommandKind::Click), rest),
            "double_click" => click(new(CommandKind::DoubleClick), rest),
            "right_click" => click(new(CommandKind::RightClick), rest),

            "type" => quoted(rest).map(|text| new(CommandKind::Type).with_value(text)),
            "wait" => non_empty(rest).map(|d| new(CommandKind::Wait).with_value(d)),
            "sleep" => non_empty(rest).map(|d| new(CommandKind::Sleep).with_value(d)),
            "press" => non_empty(rest).map(|key| new(CommandKind::Press).with_target(key)),
            "hotkey" => non_empty(rest).map(|keys| new(CommandKind::Hotkey).with_target(keys)),
            "scroll" => scroll(new(CommandKind::Scroll), rest),

            "selenium_init" => URL_ARG
                .captures(rest)
                .map(|c| new(CommandKind::SeleniumInit).with_target(&c[1])),
            "selenium_click" => SELECTOR_ARG
                .captures(rest)
                .map(|c| new(CommandKind::SeleniumClick).with_target(&c[1])),
            "selenium_type" => SELECTOR_TEXT_ARGS.captures(rest).map(|c| {
                new(CommandKind::SeleniumType)
                    .with_target(&c[1])
                    .with_value(&c[2])
            }),
            "selenium_close" if rest.is_empty() => Some(new(CommandKind::SeleniumClose)),

            "set_variable" => {
                let caps = ASSIGNMENT.captures(rest)?;
                let (name, value) = (caps[1].to_string(), caps[2].to_string());
                self.variables.insert(name.clone(), value.clone());
                Some(
                    new(CommandKind::SetVariable)
                        .with_target(name)
                        .with_value(value),
                )
            }
            "system_command" => {
                quoted(rest).map(|cmd| new(CommandKind::SystemCommand).with_value(cmd))
            }
            "log" => quoted(rest).map(|msg| new(CommandKind::Log).with_value(msg)),
            "abort" if rest.is_empty() => Some(new(CommandKind::Abort)),

            _ => None,
        }
    }
}

fn is_block_opener(line: &str) -> bool {
    line.starts_with("try:") || BLOCK_OPENERS.iter().any(|p| line.starts_with(p))
}

fn block_header(header: &str) -> (BlockKind, Option<String>) {
    let condition = |prefix: &str| {
        let c = header[prefix.len()..].trim().trim_end_matches(':').trim();
        Some(c.to_string())
    };
    if header.starts_with("try:") {
        (BlockKind::Try, None)
    } else if header.starts_with("if ") {
        (BlockKind::If, condition("if "))
    } else if header.starts_with("repeat ") {
        (BlockKind::Repeat, condition("repeat "))
    } else if header.starts_with("while ") {
        (BlockKind::While, condition("while "))
    } else {
        (BlockKind::ForEach, condition("for_each "))
    }
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

fn quoted(s: &str) -> Option<String> {
    QUOTED.captures(s).map(|c| c[1].to_string())
}

fn click(cmd: Command, rest: &str) -> Option<Command> {
    if let Some(caps) = COORDS.captures(rest) {
        let x: i32 = caps[1].parse().ok()?;
        let y: i32 = caps[2].parse().ok()?;
        return Some(
            cmd.with_param("x", x)
                .with_param("y", y)
                .with_param("type", "coordinates"),
        );
    }
    non_empty(rest).map(|target| cmd.with_target(target).with_param("type", "template"))
}

fn scroll(cmd: Command, rest: &str) -> Option<Command> {
    let mut parts = rest.split_whitespace();
    let direction = parts.next().unwrap_or("down");
    if !matches!(direction, "up" | "down" | "left" | "right") {
        return None;
    }
    let amount = match parts.next() {
        Some(n) => n.parse::<i64>().ok()?,
        None => 3,
    };
    if parts.next().is_some() {
        return None;
    }
    Some(
        cmd.with_param("direction", direction)
            .with_param("amount", amount),
    )
}
