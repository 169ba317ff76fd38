//! 界面渲染
//!
//! 根据 PlotSnapshot 绘制四个面板：左上为状态与按键说明，右上为队列统计与启动选项，
//! 中部为提示消息（失败、警告、暂停原因），底部为进度条与最近执行的命令。

use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
    Frame,
};

use crate::core::{PlotSnapshot, RunState};

fn state_color(state: RunState) -> Color {
    match state {
        RunState::Initializing => Color::Yellow,
        RunState::Paused => Color::Cyan,
        RunState::Plotting => Color::Green,
        RunState::Calibrating => Color::Magenta,
        RunState::Finishing | RunState::Quit => Color::Gray,
    }
}

/// 失败类消息标红
fn message_color(text: &str) -> Color {
    let lower = text.to_ascii_lowercase();
    if lower.contains("error") || lower.contains("failed") || lower.starts_with("unknown") {
        Color::Red
    } else if lower.contains("skipped") || lower.contains("not supported") {
        Color::Yellow
    } else {
        Color::White
    }
}

pub fn draw(f: &mut Frame, snapshot: &PlotSnapshot) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(10),
            Constraint::Min(5),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .split(f.area());

    let top = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[0]);

    draw_state(f, snapshot, top[0]);
    draw_stats(f, snapshot, top[1]);
    draw_messages(f, snapshot, rows[1]);

    let gauge = Gauge::default()
        .block(Block::default().title(" 进度 ").borders(Borders::ALL))
        .gauge_style(Style::default().fg(state_color(snapshot.state)))
        .ratio((snapshot.percent / 100.0).clamp(0.0, 1.0))
        .label(format!(
            "{}/{} ({:.0}%)",
            snapshot.processed, snapshot.total, snapshot.percent
        ));
    f.render_widget(gauge, rows[2]);

    let echo = snapshot.last_echo.as_deref().unwrap_or("");
    let hint = Paragraph::new(Line::from(vec![
        Span::styled(" > ", Style::default().fg(Color::DarkGray)),
        Span::raw(echo),
    ]));
    f.render_widget(hint, rows[3]);
}

fn draw_state(f: &mut Frame, snapshot: &PlotSnapshot, area: ratatui::layout::Rect) {
    let mut lines = vec![
        Line::from(Span::styled(
            snapshot.state.label(),
            Style::default()
                .fg(state_color(snapshot.state))
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    lines.extend(snapshot.help.iter().map(|h| Line::from(h.as_str())));
    let block = Block::default()
        .title(" 状态 ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(state_color(snapshot.state)));
    f.render_widget(Paragraph::new(Text::from(lines)).block(block), area);
}

fn draw_stats(f: &mut Frame, snapshot: &PlotSnapshot, area: ratatui::layout::Rect) {
    let mut lines = vec![
        Line::from(format!("Commands: {}", snapshot.total)),
        Line::from(format!("Processed: {}", snapshot.processed)),
        Line::from(format!(
            "Remaining: {}",
            snapshot.total.saturating_sub(snapshot.processed)
        )),
    ];
    if !snapshot.options.is_empty() {
        lines.push(Line::from(""));
        lines.extend(
            snapshot
                .options
                .iter()
                .map(|(name, value)| Line::from(format!("{name} = {value}"))),
        );
    }
    let block = Block::default().title(" 统计 ").borders(Borders::ALL);
    f.render_widget(Paragraph::new(Text::from(lines)).block(block), area);
}

fn draw_messages(f: &mut Frame, snapshot: &PlotSnapshot, area: ratatui::layout::Rect) {
    let visible = area.height.saturating_sub(2) as usize;
    let skip = snapshot.messages.len().saturating_sub(visible);
    let lines: Vec<Line> = snapshot
        .messages
        .iter()
        .skip(skip)
        .map(|m| {
            Line::from(vec![
                Span::styled(
                    m.at.format("%H:%M:%S ").to_string(),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(m.text.as_str(), Style::default().fg(message_color(&m.text))),
            ])
        })
        .collect();
    let block = Block::default()
        .title(" 消息 ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));
    f.render_widget(
        Paragraph::new(Text::from(lines))
            .block(block)
            .wrap(Wrap { trim: false }),
        area,
    );
}
