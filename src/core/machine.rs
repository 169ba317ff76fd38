//! 控制状态机
//!
//! PlotMachine 独占设备、宏定义、启动选项与命令队列，每次 on_event 最多执行一次状态转换：
//! - **Initializing**：进入交互模式、暂存启动选项、连接并检测电源
//! - **Paused**：等待开始绘图或进入校准
//! - **Plotting**：每个 Tick 弹出并执行一条命令，pause 指令回到 Paused
//! - **Calibrating**：以 utility 模式微调原点、绘制对位图案
//! - **Finishing**：确认后归位、断开并发送通知
//! - **Quit**：终态，所有事件无操作
//!
//! 任何非终态下的 Quit 都经由 Finishing 结束，保证设备被归位和断开。

use std::collections::VecDeque;

use crate::core::progress::ProgressTracker;
use crate::core::state::{Direction, LogLine, PlotSnapshot, RunEvent, RunState, Transition};
use crate::core::{PlotError, RecoveryAction, RecoveryEngine};
use crate::device::{
    read_power, stage_setup_option, stage_setup_options, Axis, DeviceError, DeviceOption,
    PlotDevice, ALIGNMENT_SVG,
};
use crate::dispatch::Dispatcher;
use crate::notify::Notifier;
use crate::script::{Comment, Definitions, QueueEntry, Script, SetupOptions, Statement, Value};

pub const DEFAULT_PAUSE_MESSAGE: &str = "Paused in script";

/// 校准时绘制对位图案前重新应用的选项
pub const ALIGNMENT_OPTIONS: [DeviceOption; 4] = [
    DeviceOption::Model,
    DeviceOption::Penlift,
    DeviceOption::PenPosUp,
    DeviceOption::PenPosDown,
];

/// 状态机运行参数（来自配置 [plot] 段）
#[derive(Debug, Clone)]
pub struct MachineSettings {
    /// 电源读数需严格大于此值
    pub power_threshold: i64,
    /// Initializing 强制的 units 值（2 = 毫米）
    pub forced_units: i64,
    pub walk_step_mm: f64,
    /// 归位时优先调用的宏名
    pub home_macro: String,
    pub message_history: usize,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            power_threshold: 276,
            forced_units: 2,
            walk_step_mm: 0.1,
            home_macro: "go_home".to_string(),
            message_history: 200,
        }
    }
}

pub struct PlotMachine {
    state: RunState,
    device: Box<dyn PlotDevice>,
    dispatcher: Dispatcher,
    options: SetupOptions,
    definitions: Definitions,
    queue: VecDeque<QueueEntry>,
    comments: VecDeque<Comment>,
    /// 已出队的项数，用于定位注释
    dequeued: usize,
    progress: ProgressTracker,
    notifier: Box<dyn Notifier>,
    recovery: RecoveryEngine,
    settings: MachineSettings,
    messages: VecDeque<LogLine>,
    last_echo: Option<String>,
    end_reason: Option<String>,
    completed: bool,
}

impl PlotMachine {
    pub fn new(
        device: Box<dyn PlotDevice>,
        script: Script,
        dispatcher: Dispatcher,
        notifier: Box<dyn Notifier>,
        settings: MachineSettings,
    ) -> Self {
        let mut options = script.options;
        options.set(DeviceOption::Units, Value::Int(settings.forced_units));
        let progress = ProgressTracker::new(script.queue.len());

        let mut machine = Self {
            state: RunState::Initializing,
            device,
            dispatcher,
            options,
            definitions: script.definitions,
            queue: script.queue,
            comments: script.comments.into(),
            dequeued: 0,
            progress,
            notifier,
            recovery: RecoveryEngine::new(),
            settings,
            messages: VecDeque::new(),
            last_echo: None,
            end_reason: None,
            completed: false,
        };
        for diagnostic in script.diagnostics {
            machine.log(diagnostic);
        }
        machine
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state == RunState::Quit
    }

    /// 等待用户输入的状态下前端应放慢轮询
    pub fn waits_for_input(&self) -> bool {
        matches!(
            self.state,
            RunState::Paused | RunState::Calibrating | RunState::Finishing
        )
    }

    pub fn help(&self) -> &'static [&'static str] {
        self.state.help()
    }

    pub fn messages(&self) -> impl Iterator<Item = &LogLine> {
        self.messages.iter()
    }

    pub fn last_echo(&self) -> Option<&str> {
        self.last_echo.as_deref()
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// 处理一个事件并应用得到的转换
    pub fn on_event(&mut self, event: RunEvent) -> Transition {
        let transition = match self.state {
            RunState::Initializing => self.on_initializing(event),
            RunState::Paused => self.on_paused(event),
            RunState::Plotting => self.on_plotting(event),
            RunState::Calibrating => self.on_calibrating(event),
            RunState::Finishing => self.on_finishing(event),
            RunState::Quit => Transition::stay(),
        };

        if let Some(next) = transition.next {
            tracing::info!(from = self.state.label(), to = next.label(), "state transition");
            self.state = next;
        }
        if let Some(message) = &transition.message {
            self.log(message.clone());
        }
        if let Some(echo) = &transition.echo {
            self.last_echo = Some(echo.clone());
        }
        self.progress.update(self.queue.len());
        transition
    }

    pub fn snapshot(&self) -> PlotSnapshot {
        PlotSnapshot {
            state: self.state,
            help: self.help().iter().map(|s| s.to_string()).collect(),
            total: self.progress.total(),
            processed: self.progress.processed(),
            percent: self.progress.percent(),
            last_echo: self.last_echo.clone(),
            messages: self.messages.iter().cloned().collect(),
            options: self
                .options
                .iter()
                .map(|(o, v)| (o.name().to_string(), v.to_string()))
                .collect(),
        }
    }

    fn log(&mut self, text: impl Into<String>) {
        self.messages.push_back(LogLine::now(text));
        while self.messages.len() > self.settings.message_history.max(1) {
            self.messages.pop_front();
        }
    }

    fn on_initializing(&mut self, event: RunEvent) -> Transition {
        if event == RunEvent::Quit {
            return self.end_with("Forced quit");
        }

        self.device.interactive();
        let warnings = stage_setup_options(self.device.as_mut(), &self.options);
        for warning in warnings {
            tracing::warn!("{}", warning);
            self.log(warning);
        }

        match self.device.connect() {
            Ok(true) => {}
            Ok(false) => return self.fail(PlotError::ConnectFailure),
            Err(e) => {
                tracing::warn!(error = %e, "connect failed");
                return self.fail(PlotError::ConnectFailure);
            }
        }

        match self.check_power() {
            Ok(reading) => {
                tracing::info!(reading, "plotter powered");
                Transition::to(RunState::Paused, "Ready to plot")
            }
            Err(e) => self.fail(e),
        }
    }

    /// QC 查询的第二字段须大于阈值
    fn check_power(&mut self) -> Result<i64, PlotError> {
        let reading = read_power(self.device.as_mut()).map_err(|e| {
            tracing::warn!(error = %e, "power query failed");
            PlotError::LowPower { reading: None }
        })?;
        if reading > self.settings.power_threshold {
            Ok(reading)
        } else {
            Err(PlotError::LowPower {
                reading: Some(reading),
            })
        }
    }

    fn on_paused(&mut self, event: RunEvent) -> Transition {
        match event {
            RunEvent::BeginPlot => Transition::to(RunState::Plotting, "Plot started"),
            RunEvent::BeginCalibration => {
                self.end_interactive();
                if let Err(e) = self.device.plot_setup(None) {
                    self.log(format!("Plot setup failed: {}", e));
                }
                Transition::to(RunState::Calibrating, "Calibrating")
            }
            RunEvent::Quit => self.end_with("Forced quit"),
            _ => Transition::stay(),
        }
    }

    fn on_plotting(&mut self, event: RunEvent) -> Transition {
        match event {
            RunEvent::Quit => {
                self.return_home();
                return self.end_with("Plot aborted");
            }
            RunEvent::Pause => {
                self.return_home();
                return Transition::to(RunState::Paused, "Manually paused");
            }
            _ => {}
        }

        if !self.device.is_connected() {
            return self.end_with("Plotter disconnected");
        }

        self.echo_comments();
        let entry = self.queue.pop_front();
        if entry.is_some() {
            self.dequeued += 1;
        }
        match entry {
            None => {
                self.return_home();
                self.completed = true;
                Transition::to(RunState::Finishing, "Plot completed")
            }
            Some(QueueEntry::Pause(message)) => {
                self.return_home();
                let message = message.unwrap_or_else(|| DEFAULT_PAUSE_MESSAGE.to_string());
                self.notifier.notify(&format!("Plot paused: {}", message));
                let echo = format!("pause \"{}\"", message);
                Transition::to(RunState::Paused, message).with_echo(echo)
            }
            Some(QueueEntry::Statement(statement)) => {
                let report = self.dispatcher.dispatch_statement(
                    self.device.as_mut(),
                    &self.definitions,
                    &statement,
                );
                let mut transition = Transition::stay().with_echo(statement.to_string());
                if !report.is_success() {
                    transition = transition.with_message(report.message);
                }
                transition
            }
        }
    }

    fn on_calibrating(&mut self, event: RunEvent) -> Transition {
        match event {
            RunEvent::Nudge(direction) => {
                let step = self.settings.walk_step_mm;
                let (axis, distance) = match direction {
                    Direction::Left => (Axis::X, -step),
                    Direction::Right => (Axis::X, step),
                    Direction::Up => (Axis::Y, step),
                    Direction::Down => (Axis::Y, -step),
                };
                let message = match self.device.walk(axis, distance) {
                    Ok(()) => format!("Offsetting home {} position by {}mm", axis.name(), distance),
                    Err(e) => format!("Failed to walk home position: {}", e),
                };
                Transition::stay().with_message(message)
            }
            RunEvent::PlotAlignment => {
                let message = match self.plot_alignment() {
                    Ok(()) => "Plotting alignment SVG".to_string(),
                    Err(e) => format!("Alignment plot failed: {}", e),
                };
                Transition::stay().with_message(message)
            }
            RunEvent::Continue => {
                if let Err(e) = self.reset_home_position() {
                    self.log(format!("Home reset failed: {}", e));
                }
                Transition {
                    next: Some(RunState::Initializing),
                    message: None,
                    echo: None,
                }
            }
            RunEvent::Quit => self.end_with("Forced quit"),
            _ => Transition::stay(),
        }
    }

    fn on_finishing(&mut self, event: RunEvent) -> Transition {
        if event != RunEvent::Confirm {
            return Transition::stay();
        }
        if self.device.is_connected() {
            self.return_home();
            if let Err(e) = self.device.disconnect() {
                tracing::warn!(error = %e, "disconnect failed");
            }
        }
        let notice = match (&self.end_reason, self.completed) {
            (_, true) | (None, false) => "Plot completed".to_string(),
            (Some(reason), false) => format!("Plot ended: {}", reason),
        };
        self.notifier.notify(&notice);
        Transition {
            next: Some(RunState::Quit),
            message: None,
            echo: None,
        }
    }

    /// 回显位于当前队列位置之前的注释
    fn echo_comments(&mut self) {
        while self
            .comments
            .front()
            .is_some_and(|c| c.position <= self.dequeued)
        {
            if let Some(comment) = self.comments.pop_front() {
                self.log(comment.text);
            }
        }
    }

    /// 按恢复策略结束本次运行
    fn fail(&mut self, err: PlotError) -> Transition {
        let reason = match self.recovery.handle(&err) {
            RecoveryAction::EndRun(msg)
            | RecoveryAction::SkipCommand(msg)
            | RecoveryAction::Abort(msg) => msg,
        };
        tracing::warn!(error = %err, "run ending");
        self.end_with(&reason)
    }

    fn end_with(&mut self, reason: &str) -> Transition {
        self.end_reason = Some(reason.to_string());
        Transition::to(RunState::Finishing, reason)
    }

    /// 有 home 宏时执行宏，否则抬笔移动到原点
    fn return_home(&mut self) {
        let statement = if self.definitions.contains(&self.settings.home_macro) {
            Statement::new(self.settings.home_macro.clone(), Vec::new())
        } else {
            Statement::new("moveto", vec!["0".to_string(), "0".to_string()])
        };
        let report =
            self.dispatcher
                .dispatch_statement(self.device.as_mut(), &self.definitions, &statement);
        if !report.is_success() {
            self.log(format!("Return home failed: {}", report.message));
        }
    }

    /// 退出交互上下文：抬笔、归位、等待完成、断开
    fn end_interactive(&mut self) {
        let steps = [
            self.device.penup(),
            self.device.moveto(0.0, 0.0),
            self.device.block(),
            self.device.disconnect(),
        ];
        for err in steps.into_iter().filter_map(Result::err) {
            tracing::warn!(error = %err, "leaving interactive context");
        }
    }

    fn reset_home_position(&mut self) -> Result<(), DeviceError> {
        self.device.plot_setup(None)?;
        stage_setup_option(self.device.as_mut(), &self.options, DeviceOption::Model)?;
        self.device.plot_run()
    }

    fn plot_alignment(&mut self) -> Result<(), DeviceError> {
        self.reset_home_position()?;
        self.device.plot_setup(Some(ALIGNMENT_SVG))?;
        for option in ALIGNMENT_OPTIONS {
            stage_setup_option(self.device.as_mut(), &self.options, option)?;
        }
        self.device.plot_run()
    }
}
