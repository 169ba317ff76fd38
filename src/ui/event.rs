//! 事件处理
//!
//! 轮询 crossterm 键盘事件，按当前状态映射为 RunEvent；超时内无按键时注入 Tick。

use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::core::{Direction, RunEvent, RunState};

/// 事件处理器：poll 时读键盘并返回 RunEvent
pub struct EventHandler {
    tick: Duration,
    idle: Duration,
}

impl EventHandler {
    pub fn new(tick_ms: u64, idle_ms: u64) -> Self {
        Self {
            tick: Duration::from_millis(tick_ms),
            idle: Duration::from_millis(idle_ms),
        }
    }

    /// 等待输入的状态用较长的超时，绘图中用短超时
    pub fn poll(&self, state: RunState, waits_for_input: bool) -> anyhow::Result<RunEvent> {
        let timeout = if waits_for_input { self.idle } else { self.tick };
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(map_key(state, key).unwrap_or(RunEvent::Tick));
                }
            }
        }
        Ok(RunEvent::Tick)
    }
}

/// 按键 -> 事件；与当前状态无关的按键返回 None
pub fn map_key(state: RunState, key: KeyEvent) -> Option<RunEvent> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(RunEvent::Quit);
    }
    match (state, key.code) {
        (RunState::Finishing, KeyCode::Enter) => Some(RunEvent::Confirm),
        (RunState::Finishing, _) => None,
        (_, KeyCode::Char('q')) => Some(RunEvent::Quit),
        (RunState::Paused, KeyCode::Char('p')) => Some(RunEvent::BeginPlot),
        (RunState::Paused, KeyCode::Char('k')) => Some(RunEvent::BeginCalibration),
        (RunState::Plotting, KeyCode::Char('s') | KeyCode::Char(' ')) => Some(RunEvent::Pause),
        (RunState::Calibrating, KeyCode::Left) => Some(RunEvent::Nudge(Direction::Left)),
        (RunState::Calibrating, KeyCode::Right) => Some(RunEvent::Nudge(Direction::Right)),
        (RunState::Calibrating, KeyCode::Up) => Some(RunEvent::Nudge(Direction::Up)),
        (RunState::Calibrating, KeyCode::Down) => Some(RunEvent::Nudge(Direction::Down)),
        (RunState::Calibrating, KeyCode::F(2) | KeyCode::Char('a')) => Some(RunEvent::PlotAlignment),
        (RunState::Calibrating, KeyCode::Char('c')) => Some(RunEvent::Continue),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_keys_depend_on_state() {
        assert_eq!(
            map_key(RunState::Paused, key(KeyCode::Char('p'))),
            Some(RunEvent::BeginPlot)
        );
        assert_eq!(map_key(RunState::Plotting, key(KeyCode::Char('p'))), None);
        assert_eq!(
            map_key(RunState::Calibrating, key(KeyCode::Left)),
            Some(RunEvent::Nudge(Direction::Left))
        );
        assert_eq!(
            map_key(RunState::Calibrating, key(KeyCode::F(2))),
            Some(RunEvent::PlotAlignment)
        );
    }

    #[test]
    fn test_finishing_only_confirms_on_enter() {
        assert_eq!(
            map_key(RunState::Finishing, key(KeyCode::Enter)),
            Some(RunEvent::Confirm)
        );
        assert_eq!(map_key(RunState::Finishing, key(KeyCode::Char('q'))), None);
    }

    #[test]
    fn test_ctrl_c_quits_everywhere() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(map_key(RunState::Calibrating, ctrl_c), Some(RunEvent::Quit));
    }
}
