//! 字面量解析：draw_path 等命令的列表/元组参数
//!
//! 支持嵌套 `[...]` / `(...)`、整数、浮点、`True`/`False`（大小写不敏感）与单/双引号字符串，
//! 例如 `[[2,2],[3,2],(3,3)]`。不支持表达式求值。

use crate::script::Value;

/// 列表最大嵌套层数
pub const MAX_LITERAL_DEPTH: usize = 64;

/// 解析完整字面量；尾部有多余字符视为错误
pub fn parse_literal(input: &str) -> Result<Value, String> {
    let mut parser = LiteralParser {
        chars: input.chars().collect(),
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos < parser.chars.len() {
        return Err(format!(
            "unexpected '{}' at position {}",
            parser.chars[parser.pos], parser.pos
        ));
    }
    Ok(value)
}

struct LiteralParser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl LiteralParser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn value(&mut self) -> Result<Value, String> {
        self.skip_ws();
        match self.peek() {
            Some('[') => self.sequence(']'),
            Some('(') => self.sequence(')'),
            Some(q @ ('\'' | '"')) => self.string(q),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
            Some(c) if c.is_alphabetic() => self.word(),
            Some(c) => Err(format!("unexpected '{}' at position {}", c, self.pos)),
            None => Err("unexpected end of literal".to_string()),
        }
    }

    fn sequence(&mut self, close: char) -> Result<Value, String> {
        if self.depth >= MAX_LITERAL_DEPTH {
            return Err("literal nested too deeply".to_string());
        }
        self.depth += 1;
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                self.depth -= 1;
                return Ok(Value::List(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(c) if c == close => {}
                Some(c) => return Err(format!("expected ',' or '{}', found '{}'", close, c)),
                None => return Err(format!("missing closing '{}'", close)),
            }
        }
    }

    fn string(&mut self, quote: char) -> Result<Value, String> {
        self.pos += 1;
        let mut s = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == quote {
                return Ok(Value::Text(s));
            }
            s.push(c);
        }
        Err("unterminated string".to_string())
    }

    fn number(&mut self) -> Result<Value, String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if let Ok(i) = text.parse::<i64>() {
            return Ok(Value::Int(i));
        }
        text.parse::<f64>()
            .map(Value::Float)
            .map_err(|_| format!("invalid number '{}'", text))
    }

    fn word(&mut self) -> Result<Value, String> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(format!("unsupported literal '{}'", word)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_path() {
        let v = parse_literal("[[2,2],[3,2],[3,3]]").unwrap();
        assert_eq!(
            v,
            Value::List(vec![
                Value::List(vec![Value::Int(2), Value::Int(2)]),
                Value::List(vec![Value::Int(3), Value::Int(2)]),
                Value::List(vec![Value::Int(3), Value::Int(3)]),
            ])
        );
    }

    #[test]
    fn test_parse_mixed_with_spaces_and_bool() {
        let v = parse_literal("[1.33, 4 , True]").unwrap();
        assert_eq!(
            v,
            Value::List(vec![Value::Float(1.33), Value::Int(4), Value::Bool(true)])
        );
    }

    #[test]
    fn test_parse_tuple_and_string() {
        let v = parse_literal("(1, 'a b')").unwrap();
        assert_eq!(
            v,
            Value::List(vec![Value::Int(1), Value::Text("a b".to_string())])
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_literal("[1, 2").is_err());
        assert!(parse_literal("[1 2]").is_err());
        assert!(parse_literal("os.system").is_err());
        assert!(parse_literal("[1] x").is_err());
    }

    #[test]
    fn test_parse_deep_nesting_is_error() {
        let err = parse_literal(&"[".repeat(20_000)).unwrap_err();
        assert_eq!(err, "literal nested too deeply");

        let ok = format!("{}{}", "[".repeat(MAX_LITERAL_DEPTH), "]".repeat(MAX_LITERAL_DEPTH));
        assert!(parse_literal(&ok).is_ok());
        let too_deep = format!(
            "{}{}",
            "[".repeat(MAX_LITERAL_DEPTH + 1),
            "]".repeat(MAX_LITERAL_DEPTH + 1)
        );
        assert!(parse_literal(&too_deep).is_err());
    }

    #[test]
    fn test_deep_draw_path_is_cast_error() {
        use crate::core::PlotError;
        use crate::script::{ArityPolicy, CastTable};

        let err = CastTable::standard()
            .cast("draw_path", &["[".repeat(10_000)], ArityPolicy::Permissive)
            .unwrap_err();
        assert!(matches!(err, PlotError::Cast { .. }));
    }
}
