//! TUI 应用主循环
//!
//! 进入全屏/原始模式，每轮 poll 一次按键（无按键即 Tick），交给状态机执行一次转换，
//! 队列进度或状态变化时重绘。状态机进入 Quit 后恢复终端。

use std::io::{self, Stdout};

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::core::PlotMachine;
use crate::ui::event::EventHandler;
use crate::ui::render::draw;

/// 运行 TUI：启用原始模式与全屏，循环 poll + 转换 + 渲染，退出时恢复终端
pub fn run_app(machine: &mut PlotMachine, events: &EventHandler) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = drive(&mut terminal, machine, events);
    restore_terminal(&mut terminal)?;
    result
}

fn drive(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    machine: &mut PlotMachine,
    events: &EventHandler,
) -> anyhow::Result<()> {
    let mut dirty = true;
    while !machine.is_finished() {
        if dirty || machine.progress().changed() {
            let snapshot = machine.snapshot();
            terminal.draw(|f| draw(f, &snapshot))?;
        }

        let event = events.poll(machine.state(), machine.waits_for_input())?;
        let transition = machine.on_event(event);
        dirty = transition.next.is_some() || transition.message.is_some() || transition.echo.is_some();
    }
    Ok(())
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
