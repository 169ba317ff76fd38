//! 参数转换：按命令名把位置参数（字符串）转为类型化的值
//!
//! CastTable 记录每个命令名对应的转换序列；未登记的命令名原样透传（不是错误）。
//! 参数不足一律报 Arity 错误；多余参数默认忽略，严格模式下同样报错。

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::core::PlotError;
use crate::script::literal::parse_literal;
use crate::script::{Command, Statement};

/// 转换后的参数值
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    /// 数值（Int 或 Float）转 f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// 单个参数的转换方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    Int,
    Float,
    Bool,
    /// 列表/元组字面量
    Literal,
    /// 原样保留
    Text,
}

impl CastKind {
    pub fn type_name(self) -> &'static str {
        match self {
            CastKind::Int => "integer",
            CastKind::Float => "float",
            CastKind::Bool => "boolean",
            CastKind::Literal => "literal",
            CastKind::Text => "text",
        }
    }

    /// 转换第 index 个参数；失败时返回带命令名、位置与原值的 Cast 错误
    pub fn apply(self, command: &str, index: usize, raw: &str) -> Result<Value, PlotError> {
        let cast_error = || PlotError::Cast {
            command: command.to_string(),
            index,
            value: raw.to_string(),
            expected: self.type_name(),
        };
        match self {
            CastKind::Int => raw.parse::<i64>().map(Value::Int).map_err(|_| cast_error()),
            CastKind::Float => raw.parse::<f64>().map(Value::Float).map_err(|_| cast_error()),
            CastKind::Bool => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
                "false" | "0" | "no" | "off" => Ok(Value::Bool(false)),
                _ => Err(cast_error()),
            },
            CastKind::Literal => parse_literal(raw).map_err(|_| cast_error()),
            CastKind::Text => Ok(Value::Text(raw.to_string())),
        }
    }
}

/// 多余参数的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArityPolicy {
    /// 多余参数静默忽略（兼容旧脚本）
    #[default]
    Permissive,
    /// 参数个数必须与转换表一致
    Strict,
}

/// 命令名 -> 转换序列
#[derive(Debug, Clone, Default)]
pub struct CastTable {
    casts: HashMap<String, Vec<CastKind>>,
}

impl CastTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 绘图仪选项与函数的标准转换表
    pub fn standard() -> Self {
        use CastKind::*;
        let mut table = Self::new();
        for name in [
            "handling",
            "speed_pendown",
            "speed_penup",
            "accel",
            "pen_pos_down",
            "pen_pos_up",
            "pen_rate_lower",
            "pen_rate_raise",
            "model",
            "penlift",
            "port_config",
            "units",
        ] {
            table.insert(name, vec![Int]);
        }
        table.insert("homing", vec![Bool]);
        table.insert("port", vec![Text]);

        for name in ["goto", "moveto", "lineto", "go", "move", "line"] {
            table.insert(name, vec![Float, Float]);
        }
        for name in ["update", "penup", "pendown", "block"] {
            table.insert(name, vec![]);
        }
        table.insert("draw_path", vec![Literal]);
        table.insert("delay", vec![Int]);
        for name in ["load_config", "usb_command", "usb_query"] {
            table.insert(name, vec![Text]);
        }
        table
    }

    pub fn insert(&mut self, name: &str, casts: Vec<CastKind>) {
        self.casts.insert(name.to_string(), casts);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.casts.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&[CastKind]> {
        self.casts.get(name).map(Vec::as_slice)
    }

    /// 按命令名转换参数。
    ///
    /// 末位为 Literal 时，剩余参数重新以空格拼接（字面量内部可以含空格）。
    pub fn cast(
        &self,
        name: &str,
        raw: &[String],
        policy: ArityPolicy,
    ) -> Result<Vec<Value>, PlotError> {
        let Some(casts) = self.get(name) else {
            return Ok(raw.iter().cloned().map(Value::Text).collect());
        };

        let mut raw: Vec<String> = raw.to_vec();
        if casts.last() == Some(&CastKind::Literal) && raw.len() > casts.len() {
            let tail = raw.split_off(casts.len() - 1).join(" ");
            raw.push(tail);
        }

        let too_many = policy == ArityPolicy::Strict && raw.len() > casts.len();
        if raw.len() < casts.len() || too_many {
            return Err(PlotError::Arity {
                command: name.to_string(),
                expected: casts.len(),
                found: raw.len(),
            });
        }

        casts
            .iter()
            .zip(raw.iter())
            .enumerate()
            .map(|(i, (cast, value))| cast.apply(name, i, value))
            .collect()
    }

    /// 转换一条语句，得到不可变的 Command
    pub fn cast_statement(
        &self,
        statement: &Statement,
        policy: ArityPolicy,
    ) -> Result<Command, PlotError> {
        let typed = self.cast(&statement.name, &statement.raw_params, policy)?;
        Ok(Command::new(
            statement.name.clone(),
            statement.raw_params.clone(),
            typed,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cast_unknown_name_passes_through() {
        let table = CastTable::standard();
        let out = table
            .cast("wiggle", &raw(&["1", "abc"]), ArityPolicy::Permissive)
            .unwrap();
        assert_eq!(
            out,
            vec![Value::Text("1".to_string()), Value::Text("abc".to_string())]
        );
        let empty = table.cast("f_no_params", &[], ArityPolicy::Permissive).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_cast_types_follow_table() {
        let mut table = CastTable::new();
        table.insert("f1", vec![CastKind::Int, CastKind::Float]);
        table.insert("f2", vec![CastKind::Int, CastKind::Literal]);
        table.insert("f3", vec![CastKind::Text]);

        assert_eq!(
            table.cast("f1", &raw(&["1", "5.896"]), ArityPolicy::Permissive).unwrap(),
            vec![Value::Int(1), Value::Float(5.896)]
        );
        assert_eq!(
            table
                .cast("f2", &raw(&["10", "[1.33,4,True]"]), ArityPolicy::Permissive)
                .unwrap(),
            vec![
                Value::Int(10),
                Value::List(vec![Value::Float(1.33), Value::Int(4), Value::Bool(true)])
            ]
        );
        assert_eq!(
            table.cast("f3", &raw(&["abcd"]), ArityPolicy::Permissive).unwrap(),
            vec![Value::Text("abcd".to_string())]
        );
    }

    #[test]
    fn test_cast_too_few_is_arity_error() {
        let table = CastTable::standard();
        let err = table
            .cast("moveto", &raw(&["10"]), ArityPolicy::Permissive)
            .unwrap_err();
        match err {
            PlotError::Arity { command, expected, found } => {
                assert_eq!(command, "moveto");
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("Expected Arity, got {other:?}"),
        }
    }

    #[test]
    fn test_cast_surplus_ignored_unless_strict() {
        let table = CastTable::standard();
        let out = table
            .cast("moveto", &raw(&["1", "2", "3"]), ArityPolicy::Permissive)
            .unwrap();
        assert_eq!(out, vec![Value::Float(1.0), Value::Float(2.0)]);

        let err = table
            .cast("moveto", &raw(&["1", "2", "3"]), ArityPolicy::Strict)
            .unwrap_err();
        assert!(matches!(err, PlotError::Arity { found: 3, .. }));
    }

    #[test]
    fn test_cast_error_reports_index_and_value() {
        let table = CastTable::standard();
        let err = table
            .cast("lineto", &raw(&["1", "north"]), ArityPolicy::Permissive)
            .unwrap_err();
        match err {
            PlotError::Cast { command, index, value, expected } => {
                assert_eq!(command, "lineto");
                assert_eq!(index, 1);
                assert_eq!(value, "north");
                assert_eq!(expected, "float");
            }
            other => panic!("Expected Cast, got {other:?}"),
        }
    }

    #[test]
    fn test_cast_bool_words() {
        let table = CastTable::standard();
        assert_eq!(
            table.cast("homing", &raw(&["False"]), ArityPolicy::Permissive).unwrap(),
            vec![Value::Bool(false)]
        );
        assert!(table.cast("homing", &raw(&["maybe"]), ArityPolicy::Permissive).is_err());
    }

    #[test]
    fn test_cast_literal_rejoins_spaced_tokens() {
        let table = CastTable::standard();
        let out = table
            .cast("draw_path", &raw(&["[[2,", "2],", "[3,", "2]]"]), ArityPolicy::Strict)
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].as_list().map(<[Value]>::len), Some(2));
    }
}
