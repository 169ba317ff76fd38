//! 错误恢复引擎
//!
//! 根据 PlotError 类型返回 RecoveryAction，供状态机与 RPC 服务决定跳过命令、结束运行还是直接终止。

use crate::core::{PlotError, RecoveryAction};

/// 将错误映射为可执行动作（跳过 / 结束运行 / 终止）
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &PlotError) -> RecoveryAction {
        match err {
            PlotError::Arity { .. }
            | PlotError::Cast { .. }
            | PlotError::UnknownCommand(_)
            | PlotError::DispatchFailure { .. } => RecoveryAction::SkipCommand(err.to_string()),
            PlotError::ConnectFailure => {
                RecoveryAction::EndRun("Failed to connect to plotter".to_string())
            }
            PlotError::LowPower { .. } => {
                RecoveryAction::EndRun("Plotter power supply appears to be off.".to_string())
            }
            PlotError::Script(_) | PlotError::Io(_) => RecoveryAction::Abort(err.to_string()),
        }
    }
}
