//! 脚本解析器
//!
//! 脚本分三段，按固定顺序：
//! 1. 启动选项段，以 `::END_OPTIONS::` 结束
//! 2. 宏定义段，以 `::END_DEFINITIONS::` 结束
//! 3. 绘图命令队列
//!
//! 某段的结束标记未出现时该段为空，其内容归入下一段。`#` 开头为注释，不执行不入队，
//! 但记录其在队列中的位置，绘图时在该位置回显。
//! 解析是全量的：队列中的行一律保留为 Statement，是否有效留到执行时判断；
//! 只有选项与宏定义在解析期转换，失败时记录诊断并跳过。

use std::collections::VecDeque;
use std::path::Path;

use crate::core::PlotError;
use crate::device::DeviceOption;
use crate::script::{
    ArityPolicy, CastTable, Command, Definitions, QueueEntry, SetupOptions, Statement, Value,
};

pub const END_OPTIONS: &str = "::END_OPTIONS::";
pub const END_DEFINITIONS: &str = "::END_DEFINITIONS::";
pub const DEFAULT_SEPARATOR: &str = "|";

const DEF_KEYWORD: &str = "def";
const OPTIONS_KEYWORD: &str = "options";
const PAUSE_KEYWORD: &str = "pause";

/// 脚本注释及其位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    /// 注释出现前已入队的项数
    pub position: usize,
    pub text: String,
}

/// 解析结果
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub options: SetupOptions,
    pub definitions: Definitions,
    pub queue: VecDeque<QueueEntry>,
    pub comments: Vec<Comment>,
    /// 被跳过的选项/宏定义说明
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Options,
    Definitions,
    Queue,
}

/// 脚本解析器，持有转换表引用与宏分隔符
#[derive(Debug, Clone)]
pub struct ScriptParser<'a> {
    table: &'a CastTable,
    policy: ArityPolicy,
    separator: String,
}

impl<'a> ScriptParser<'a> {
    pub fn new(table: &'a CastTable) -> Self {
        Self {
            table,
            policy: ArityPolicy::default(),
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }

    pub fn with_policy(mut self, policy: ArityPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        let separator = separator.into();
        if !separator.is_empty() {
            self.separator = separator;
        }
        self
    }

    pub fn policy(&self) -> ArityPolicy {
        self.policy
    }

    pub fn parse_file(&self, path: &Path) -> Result<Script, PlotError> {
        let text = std::fs::read_to_string(path)?;
        Ok(self.parse_str(&text))
    }

    pub fn parse_str(&self, text: &str) -> Script {
        self.parse_lines(text.lines())
    }

    pub fn parse_lines<I, S>(&self, lines: I) -> Script
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let lines: Vec<String> = lines
            .into_iter()
            .map(|l| l.as_ref().trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();

        let has_options = lines.iter().any(|l| l == END_OPTIONS);
        let has_definitions = lines.iter().any(|l| l == END_DEFINITIONS);
        let mut section = if has_options {
            Section::Options
        } else if has_definitions {
            Section::Definitions
        } else {
            Section::Queue
        };

        let mut script = Script::default();
        for line in &lines {
            if line.starts_with('#') {
                script.comments.push(Comment {
                    position: script.queue.len(),
                    text: line.clone(),
                });
                continue;
            }
            if line == END_OPTIONS {
                if section == Section::Options {
                    section = if has_definitions {
                        Section::Definitions
                    } else {
                        Section::Queue
                    };
                } else {
                    script
                        .diagnostics
                        .push(format!("Ignoring misplaced {}", END_OPTIONS));
                }
                continue;
            }
            if line == END_DEFINITIONS {
                if section == Section::Queue {
                    script
                        .diagnostics
                        .push(format!("Ignoring misplaced {}", END_DEFINITIONS));
                }
                section = Section::Queue;
                continue;
            }

            if first_word(line) == DEF_KEYWORD {
                self.register_definition(line, &mut script);
                continue;
            }

            match section {
                Section::Options => match self.parse_option_line(line) {
                    Ok((option, value)) => script.options.set(option, value),
                    Err(e) => {
                        tracing::warn!(line = %line, error = %e, "skipping setup option");
                        script.diagnostics.push(format!("Skipped option '{}': {}", line, e));
                    }
                },
                Section::Definitions => self.register_definition(line, &mut script),
                Section::Queue => {
                    if let Some(entry) = queue_entry(line) {
                        script.queue.push_back(entry);
                    }
                }
            }
        }

        tracing::debug!(
            options = script.options.len(),
            definitions = script.definitions.len(),
            queued = script.queue.len(),
            diagnostics = script.diagnostics.len(),
            "script parsed"
        );
        script
    }

    fn register_definition(&self, line: &str, script: &mut Script) {
        match self.parse_definition_line(line, &script.definitions) {
            Ok((name, body)) => {
                if script.definitions.contains(&name) {
                    script
                        .diagnostics
                        .push(format!("Definition '{}' redefined", name));
                }
                script.definitions.insert(name, body);
            }
            Err(e) => {
                tracing::warn!(line = %line, error = %e, "rejecting definition");
                script.diagnostics.push(e.to_string());
            }
        }
    }

    /// 解析一行宏定义：`def <name> <body>` 或 `<name> <body>`。
    ///
    /// 子命令在此处即转换；任一子命令转换失败、引用宏（含自身）或为控制关键字时整条定义被拒绝。
    pub fn parse_definition_line(
        &self,
        line: &str,
        existing: &Definitions,
    ) -> Result<(String, Vec<Command>), PlotError> {
        let line = line.trim();
        let rest = match split_first(line) {
            (DEF_KEYWORD, rest) => rest,
            _ => line,
        };
        let (name, body) = split_first(rest);
        if name.is_empty() {
            return Err(PlotError::Script("Definition is missing a name".to_string()));
        }
        if body.is_empty() {
            return Err(PlotError::Script(format!("Definition '{}' has an empty body", name)));
        }

        let mut commands = Vec::new();
        for part in body.split(self.separator.as_str()) {
            let Some(statement) = Statement::from_line(part) else {
                continue;
            };
            let sub = statement.name.as_str();
            if sub == name || existing.contains(sub) {
                return Err(PlotError::Script(format!(
                    "Definition '{}' may not reference macro '{}'",
                    name, sub
                )));
            }
            if matches!(sub, DEF_KEYWORD | PAUSE_KEYWORD | OPTIONS_KEYWORD) {
                return Err(PlotError::Script(format!(
                    "Definition '{}' may not contain '{}'",
                    name, sub
                )));
            }
            let command = self.table.cast_statement(&statement, self.policy).map_err(|e| {
                PlotError::Script(format!("Definition '{}' rejected: {}", name, e))
            })?;
            commands.push(command);
        }

        if commands.is_empty() {
            return Err(PlotError::Script(format!("Definition '{}' has an empty body", name)));
        }
        Ok((name.to_string(), commands))
    }

    /// 解析一行启动选项：`[options] <name> <value>`
    pub fn parse_option_line(&self, line: &str) -> Result<(DeviceOption, Value), PlotError> {
        let statement = Statement::from_line(line)
            .ok_or_else(|| PlotError::Script("Empty option line".to_string()))?;
        let statement = if statement.name == OPTIONS_KEYWORD {
            let mut params = statement.raw_params.into_iter();
            let name = params
                .next()
                .ok_or_else(|| PlotError::Script("Option line is missing a name".to_string()))?;
            Statement::new(name, params.collect())
        } else {
            statement
        };
        self.parse_option(&statement.name, &statement.raw_params)
    }

    /// 转换单个选项值（RPC InitializePlot 也使用此入口）
    pub fn parse_option(
        &self,
        name: &str,
        raw_params: &[String],
    ) -> Result<(DeviceOption, Value), PlotError> {
        let option = DeviceOption::from_name(name)
            .ok_or_else(|| PlotError::UnknownCommand(name.to_string()))?;
        let value = self
            .table
            .cast(name, raw_params, self.policy)?
            .into_iter()
            .next()
            .ok_or_else(|| PlotError::Arity {
                command: name.to_string(),
                expected: 1,
                found: 0,
            })?;
        Ok((option, value))
    }
}

/// 队列行 -> 队列项；`options` 前缀被剥离，`pause` 保留原样消息
fn queue_entry(line: &str) -> Option<QueueEntry> {
    match split_first(line) {
        (PAUSE_KEYWORD, "") => Some(QueueEntry::Pause(None)),
        (PAUSE_KEYWORD, message) => Some(QueueEntry::Pause(Some(message.to_string()))),
        (OPTIONS_KEYWORD, rest) => Statement::from_line(rest).map(QueueEntry::Statement),
        _ => Statement::from_line(line).map(QueueEntry::Statement),
    }
}

fn first_word(line: &str) -> &str {
    split_first(line).0
}

/// 拆出首个单词与剩余部分（已去除首尾空白）
fn split_first(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn statement(entry: &QueueEntry) -> &Statement {
        match entry {
            QueueEntry::Statement(s) => s,
            other => panic!("Expected statement, got {other:?}"),
        }
    }

    #[test]
    fn test_options_then_queue() {
        let table = CastTable::standard();
        let script = ScriptParser::new(&table)
            .parse_str("options units 2\n::END_OPTIONS::\nmoveto 10 10\npenup\n");

        assert_eq!(script.options.len(), 1);
        assert_eq!(script.options.get(DeviceOption::Units), Some(&Value::Int(2)));
        assert!(script.definitions.is_empty());
        assert_eq!(script.queue.len(), 2);
        assert_eq!(
            statement(&script.queue[0]),
            &Statement::new("moveto", vec!["10".to_string(), "10".to_string()])
        );
        assert_eq!(statement(&script.queue[1]), &Statement::new("penup", vec![]));
        assert!(script.diagnostics.is_empty());
    }

    #[test]
    fn test_queue_order_skips_comments() {
        let table = CastTable::standard();
        let script = ScriptParser::new(&table)
            .parse_str("# header\nmoveto 1 1\n\n# mid\nlineto 2 2\nwiggle 3\npenup");
        let names: Vec<_> = script.queue.iter().map(|e| statement(e).name.clone()).collect();
        assert_eq!(names, vec!["moveto", "lineto", "wiggle", "penup"]);
        let comments: Vec<_> = script
            .comments
            .iter()
            .map(|c| (c.position, c.text.as_str()))
            .collect();
        assert_eq!(comments, vec![(0, "# header"), (1, "# mid")]);
    }

    #[test]
    fn test_all_three_sections() {
        let table = CastTable::standard();
        let text = "\
speed_penup 40
homing false
::END_OPTIONS::
go_home moveto 0 0|penup
::END_DEFINITIONS::
go_home
";
        let script = ScriptParser::new(&table).parse_str(text);
        assert_eq!(script.options.get(DeviceOption::Homing), Some(&Value::Bool(false)));
        let body = script.definitions.get("go_home").unwrap();
        assert_eq!(body.len(), 2);
        assert_eq!(body[0].typed_params(), &[Value::Float(0.0), Value::Float(0.0)]);
        assert_eq!(body[1].name(), "penup");
        assert_eq!(script.queue.len(), 1);
    }

    #[test]
    fn test_missing_options_sentinel_means_no_options_section() {
        let table = CastTable::standard();
        let script = ScriptParser::new(&table).parse_str("units 2\nmoveto 1 1");
        assert!(script.options.is_empty());
        assert_eq!(script.queue.len(), 2);
    }

    #[test]
    fn test_def_anywhere_and_separator_without_spaces() {
        let table = CastTable::standard();
        let script = ScriptParser::new(&table)
            .parse_str("def sq moveto 0 0|lineto 10 0|lineto 10 10\nsq");
        let body = script.definitions.get("sq").unwrap();
        let names: Vec<_> = body.iter().map(Command::name).collect();
        assert_eq!(names, vec!["moveto", "lineto", "lineto"]);
        assert_eq!(script.queue.len(), 1);
        assert_eq!(statement(&script.queue[0]).name, "sq");
    }

    #[test]
    fn test_broken_definition_rejected_whole() {
        let table = CastTable::standard();
        let script = ScriptParser::new(&table)
            .parse_str("def bad moveto 0 0|lineto ten 0\nbad");
        assert!(!script.definitions.contains("bad"));
        assert_eq!(script.diagnostics.len(), 1);
        assert!(script.diagnostics[0].contains("bad"));
    }

    #[test]
    fn test_definition_cannot_reference_macros() {
        let table = CastTable::standard();
        let script = ScriptParser::new(&table)
            .parse_str("def a penup\ndef b a|pendown\ndef c c");
        assert!(script.definitions.contains("a"));
        assert!(!script.definitions.contains("b"));
        assert!(!script.definitions.contains("c"));
        assert_eq!(script.diagnostics.len(), 2);
    }

    #[test]
    fn test_pause_message_verbatim() {
        let table = CastTable::standard();
        let script = ScriptParser::new(&table)
            .parse_str("pause resuming   later\npause\nmoveto 1 1");
        assert_eq!(
            script.queue[0],
            QueueEntry::Pause(Some("resuming   later".to_string()))
        );
        assert_eq!(script.queue[1], QueueEntry::Pause(None));
    }

    #[test]
    fn test_queue_options_keyword_is_stripped() {
        let table = CastTable::standard();
        let script = ScriptParser::new(&table).parse_str("options speed_penup 30");
        assert_eq!(
            statement(&script.queue[0]),
            &Statement::new("speed_penup", vec!["30".to_string()])
        );
    }

    #[test]
    fn test_invalid_options_skipped_with_diagnostic() {
        let table = CastTable::standard();
        let script = ScriptParser::new(&table)
            .parse_str("speed_penup fast\nwarp 9\naccel 80\n::END_OPTIONS::");
        assert_eq!(script.options.len(), 1);
        assert_eq!(script.options.get(DeviceOption::Accel), Some(&Value::Int(80)));
        assert_eq!(script.diagnostics.len(), 2);
    }

    #[test]
    fn test_custom_separator() {
        let table = CastTable::standard();
        let script = ScriptParser::new(&table)
            .with_separator(";")
            .parse_str("def up penup; moveto 0 0");
        assert_eq!(script.definitions.get("up").map(<[Command]>::len), Some(2));
    }

    #[test]
    fn test_parse_file_missing_is_io_error() {
        let table = CastTable::standard();
        let err = ScriptParser::new(&table)
            .parse_file(Path::new("/nonexistent/plot.txt"))
            .unwrap_err();
        assert!(matches!(err, PlotError::Io(_)));
    }

    #[test]
    fn test_unknown_sub_command_is_kept_in_definition() {
        let table = CastTable::standard();
        let script = ScriptParser::new(&table).parse_str("def x wiggle 1|penup");
        let body = script.definitions.get("x").unwrap();
        assert_eq!(body.len(), 2);
        assert_eq!(body[0].name(), "wiggle");
        assert_eq!(body[0].typed_params(), &[Value::Text("1".to_string())]);
        assert!(script.diagnostics.is_empty());
    }
}
