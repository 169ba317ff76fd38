//! 运行状态、输入事件与 UI 投影
//!
//! UI 只持有轻量的 PlotSnapshot；完整状态由 PlotMachine 维护并投影。

use chrono::{DateTime, Local};
use serde::Serialize;

/// 控制循环状态，同一时刻只有一个处于活动
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum RunState {
    Initializing,
    Paused,
    Plotting,
    Calibrating,
    Finishing,
    Quit,
}

impl RunState {
    pub fn label(self) -> &'static str {
        match self {
            RunState::Initializing => "Initializing",
            RunState::Paused => "Paused",
            RunState::Plotting => "Plotting",
            RunState::Calibrating => "Calibrating",
            RunState::Finishing => "Finishing",
            RunState::Quit => "Quit",
        }
    }

    /// 当前状态下的按键说明
    pub fn help(self) -> &'static [&'static str] {
        match self {
            RunState::Initializing => &["Connecting to plotter...", "Quit: q"],
            RunState::Paused => &["Plot: p", "Calibrate: k", "Quit: q"],
            RunState::Plotting => &["Pause: s / <space>", "Abort: q"],
            RunState::Calibrating => &[
                "Plot offset test SVG: F2 / a",
                "Decrement x axis: Left",
                "Increment x axis: Right",
                "Increment y axis: Up",
                "Decrement y axis: Down",
                "Continue: c",
                "Quit: q",
            ],
            RunState::Finishing => &["Exit: <enter>"],
            RunState::Quit => &[],
        }
    }
}

/// 校准微调方向
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
    Up,
    Down,
}

/// 控制循环的离散输入
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunEvent {
    /// 无按键时注入
    Tick,
    BeginPlot,
    BeginCalibration,
    Pause,
    Quit,
    Confirm,
    Nudge(Direction),
    PlotAlignment,
    Continue,
}

/// 一次状态转换的结果；message 与 echo 仅供显示
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transition {
    pub next: Option<RunState>,
    pub message: Option<String>,
    pub echo: Option<String>,
}

impl Transition {
    pub fn stay() -> Self {
        Self::default()
    }

    pub fn to(next: RunState, message: impl Into<String>) -> Self {
        Self {
            next: Some(next),
            message: Some(message.into()),
            echo: None,
        }
    }

    pub fn with_echo(mut self, echo: impl Into<String>) -> Self {
        self.echo = Some(echo.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// 带时间戳的提示消息
#[derive(Clone, Debug)]
pub struct LogLine {
    pub at: DateTime<Local>,
    pub text: String,
}

impl LogLine {
    pub fn now(text: impl Into<String>) -> Self {
        Self {
            at: Local::now(),
            text: text.into(),
        }
    }
}

/// UI 看到的投影状态
#[derive(Clone, Debug)]
pub struct PlotSnapshot {
    pub state: RunState,
    pub help: Vec<String>,
    pub total: usize,
    pub processed: usize,
    pub percent: f64,
    pub last_echo: Option<String>,
    pub messages: Vec<LogLine>,
    pub options: Vec<(String, String)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_live_state_has_help() {
        for state in [
            RunState::Initializing,
            RunState::Paused,
            RunState::Plotting,
            RunState::Calibrating,
            RunState::Finishing,
        ] {
            assert!(!state.help().is_empty(), "{}", state.label());
        }
        assert!(RunState::Quit.help().is_empty());
    }

    #[test]
    fn test_transition_builders() {
        let t = Transition::to(RunState::Paused, "Ready to plot").with_echo("pause");
        assert_eq!(t.next, Some(RunState::Paused));
        assert_eq!(t.message.as_deref(), Some("Ready to plot"));
        assert_eq!(t.echo.as_deref(), Some("pause"));
        assert_eq!(Transition::stay().next, None);
    }
}
