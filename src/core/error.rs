//! 绘图运行错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 PlotError 决定 SkipCommand / EndRun / Abort。
//! 单条命令的错误（参数、转换、未知命令、设备拒绝）只降级为提示消息，不会中断绘图。

use thiserror::Error;

use crate::device::DeviceError;

/// 脚本解析、参数转换与命令执行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum PlotError {
    /// 参数个数少于转换表要求（严格模式下多于也算）
    #[error("{command} expects {expected} parameter(s), got {found}")]
    Arity {
        command: String,
        expected: usize,
        found: usize,
    },

    /// 第 index 个参数无法转换为目标类型
    #[error("{command}: parameter {index} '{value}' is not a valid {expected}")]
    Cast {
        command: String,
        index: usize,
        value: String,
        expected: &'static str,
    },

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Error executing {command}: {reason}")]
    DispatchFailure { command: String, reason: String },

    #[error("Failed to connect to plotter")]
    ConnectFailure,

    #[error("Plotter power supply appears to be off (reading {reading:?})")]
    LowPower { reading: Option<i64> },

    /// 宏定义等脚本结构错误
    #[error("Script error: {0}")]
    Script(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlotError {
    /// 设备调用失败统一包装为 DispatchFailure，保留命令名
    pub fn dispatch(command: &str, err: DeviceError) -> Self {
        PlotError::DispatchFailure {
            command: command.to_string(),
            reason: err.to_string(),
        }
    }
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 记录提示后继续下一条命令
    SkipCommand(String),
    /// 经 Finishing 正常结束本次运行（归位、断开）
    EndRun(String),
    /// 运行尚未开始，直接终止
    Abort(String),
}
