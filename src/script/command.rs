//! 脚本数据模型：语句、已转换命令、队列项、启动选项与宏定义

use std::collections::HashMap;
use std::fmt;

use crate::device::DeviceOption;
use crate::script::Value;

/// 未转换的 (命令名, 原始参数)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub name: String,
    pub raw_params: Vec<String>,
}

impl Statement {
    pub fn new(name: impl Into<String>, raw_params: Vec<String>) -> Self {
        Self {
            name: name.into(),
            raw_params,
        }
    }

    /// 按空白拆分一行；空行返回 None
    pub fn from_line(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace().map(str::to_string);
        let name = tokens.next()?;
        Some(Self::new(name, tokens.collect()))
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for p in &self.raw_params {
            write!(f, " {p}")?;
        }
        Ok(())
    }
}

/// 已转换的命令，构造后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: String,
    raw_params: Vec<String>,
    typed_params: Vec<Value>,
}

impl Command {
    pub fn new(name: String, raw_params: Vec<String>, typed_params: Vec<Value>) -> Self {
        Self {
            name,
            raw_params,
            typed_params,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn raw_params(&self) -> &[String] {
        &self.raw_params
    }

    pub fn typed_params(&self) -> &[Value] {
        &self.typed_params
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for p in &self.raw_params {
            write!(f, " {p}")?;
        }
        Ok(())
    }
}

/// 绘图队列中的一项
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEntry {
    Statement(Statement),
    /// 脚本内暂停，携带原样消息
    Pause(Option<String>),
}

/// 启动选项：保持脚本中的出现顺序，同名选项后者覆盖前者
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetupOptions {
    entries: Vec<(DeviceOption, Value)>,
}

impl SetupOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, option: DeviceOption, value: Value) {
        match self.entries.iter_mut().find(|(o, _)| *o == option) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((option, value)),
        }
    }

    pub fn get(&self, option: DeviceOption) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(o, _)| *o == option)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(DeviceOption, Value)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 宏定义表：宏名 -> 子命令序列
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Definitions {
    macros: HashMap<String, Vec<Command>>,
}

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, body: Vec<Command>) {
        self.macros.insert(name.into(), body);
    }

    pub fn get(&self, name: &str) -> Option<&[Command]> {
        self.macros.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.macros.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }
}
