//! 脚本层：参数转换、字面量、数据模型与解析器

pub mod cast;
pub mod command;
pub mod literal;
pub mod parser;

pub use cast::{ArityPolicy, CastKind, CastTable, Value};
pub use command::{Command, Definitions, QueueEntry, SetupOptions, Statement};
pub use literal::parse_literal;
pub use parser::{Comment, Script, ScriptParser, DEFAULT_SEPARATOR, END_DEFINITIONS, END_OPTIONS};
