//! 命令解析与执行
//!
//! 命令名按固定顺序解析：宏 -> 设备选项 -> 设备函数 -> 未知。
//! Dispatcher 对每次执行输出结构化审计日志（JSON），结果统一为 DispatchReport，错误不向外传播。

pub mod dispatcher;

use serde::Serialize;

use crate::core::PlotError;

pub use dispatcher::Dispatcher;

/// 单次执行结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    Failed,
    Unknown,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Succeeded => "succeeded",
            Outcome::Failed => "failed",
            Outcome::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub outcome: Outcome,
    pub message: String,
}

impl DispatchReport {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Succeeded,
            message: message.into(),
        }
    }

    /// UnknownCommand 映射为 Unknown，其余错误为 Failed
    pub fn from_error(err: &PlotError) -> Self {
        let outcome = match err {
            PlotError::UnknownCommand(_) => Outcome::Unknown,
            _ => Outcome::Failed,
        };
        Self {
            outcome,
            message: err.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Succeeded
    }
}
