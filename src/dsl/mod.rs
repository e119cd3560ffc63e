/*!
Atlas script front-end.

- `model`: the immutable command tree (`Command`, `Block`, `Node`, `Macro`)
- `parser`: line-oriented parser with leading-comment metadata extraction

Parsing is best-effort: a line that matches no grammar becomes a `comment`
command instead of failing the whole script.

```
let script = atlas::dsl::parse("open Calculator\nwait 2s\npress enter\n");
assert_eq!(script.commands.len(), 3);
```
*/

pub mod model;
pub mod parser;

pub use model::{Block, BlockKind, Command, CommandKind, Macro, Node};
pub use parser::{parse, parse_bytes, parse_file, validate};
