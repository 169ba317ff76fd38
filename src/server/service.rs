//! 远程绘图服务
//!
//! 与 TUI 共用同一套脚本解析与命令执行核心。会话（设备、启动选项、宏定义）保存在单个
//! tokio Mutex 中，并发请求按到达顺序串行执行。所有操作都返回响应结构，错误不会越过此边界。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::core::MachineSettings;
use crate::core::machine::ALIGNMENT_OPTIONS;
use crate::device::{
    read_power, stage_setup_option, stage_setup_options, Axis, DeviceError, DeviceOption,
    PlotDevice, ALIGNMENT_SVG,
};
use crate::dispatch::Dispatcher;
use crate::script::{Definitions, ScriptParser, SetupOptions, Statement, Value, DEFAULT_SEPARATOR};

pub const NOT_INITIALIZED: &str = "Plotter is not initialized. Call InitializePlot first.";

/// WalkHome 单次允许的最大距离（毫米）
pub const MAX_WALK_MM: f64 = 0.1;

pub type DeviceFactory = Box<dyn Fn() -> Box<dyn PlotDevice> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    pub message: String,
}

impl CommandResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasPowerResponse {
    pub has_power: bool,
}

struct Session {
    device: Box<dyn PlotDevice>,
    options: SetupOptions,
    definitions: Definitions,
}

impl Session {
    /// 进入交互模式、暂存启动选项并连接
    fn setup_interactive(&mut self) -> Result<bool, DeviceError> {
        self.device.interactive();
        for warning in stage_setup_options(self.device.as_mut(), &self.options) {
            tracing::warn!("{}", warning);
        }
        self.device.connect()
    }

    fn reset_home(&mut self) -> Result<(), DeviceError> {
        self.device.plot_setup(None)?;
        stage_setup_option(self.device.as_mut(), &self.options, DeviceOption::Model)?;
        self.device.plot_run()
    }
}

pub struct PlotService {
    session: Mutex<Option<Session>>,
    factory: Arc<dyn Fn() -> Box<dyn PlotDevice> + Send + Sync>,
    dispatcher: Arc<Dispatcher>,
    separator: String,
    settings: MachineSettings,
}

impl PlotService {
    pub fn new(factory: DeviceFactory, dispatcher: Dispatcher, settings: MachineSettings) -> Self {
        Self {
            session: Mutex::new(None),
            factory: Arc::from(factory),
            dispatcher: Arc::new(dispatcher),
            separator: DEFAULT_SEPARATOR.to_string(),
            settings,
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    fn parser(&self) -> ScriptParser<'_> {
        ScriptParser::new(self.dispatcher.table())
            .with_policy(self.dispatcher.policy())
            .with_separator(self.separator.clone())
    }

    /// 在阻塞线程池上操作会话，整个调用期间持有会话锁。
    ///
    /// 设备调用是同步 IO，不能占用 async worker。任务 panic 时会话被丢弃。
    async fn with_session<T, F>(&self, f: F) -> Result<T, CommandResponse>
    where
        F: FnOnce(&mut Session, &Dispatcher) -> T + Send + 'static,
        T: Send + 'static,
    {
        let mut guard = self.session.lock().await;
        let Some(mut session) = guard.take() else {
            return Err(CommandResponse::err(NOT_INITIALIZED));
        };
        let dispatcher = Arc::clone(&self.dispatcher);
        let task = tokio::task::spawn_blocking(move || {
            let out = f(&mut session, &dispatcher);
            (session, out)
        });
        match task.await {
            Ok((session, out)) => {
                *guard = Some(session);
                Ok(out)
            }
            Err(e) => {
                tracing::error!(error = %e, "device task failed, session dropped");
                Err(CommandResponse::err(format!("Device task failed: {}", e)))
            }
        }
    }

    /// 新建设备会话：解析选项（强制 units）与宏定义，断开旧会话后再连接新设备
    pub async fn initialize_plot(
        &self,
        options: &[String],
        definitions: &[String],
    ) -> CommandResponse {
        let parser = self.parser();

        let mut setup = SetupOptions::new();
        for line in options.iter().filter(|l| !l.trim().is_empty()) {
            match parser.parse_option_line(line) {
                Ok((option, value)) => setup.set(option, value),
                Err(e) => tracing::warn!(option = %line, error = %e, "attempt to set invalid option"),
            }
        }
        setup.set(DeviceOption::Units, Value::Int(self.settings.forced_units));

        let mut macros = Definitions::new();
        for line in definitions.iter().filter(|l| !l.trim().is_empty()) {
            match parser.parse_definition_line(line, &macros) {
                Ok((name, body)) => macros.insert(name, body),
                Err(e) => tracing::warn!(definition = %line, error = %e, "definition rejected"),
            }
        }

        let mut guard = self.session.lock().await;
        let previous = guard.take();
        let factory = Arc::clone(&self.factory);
        let task = tokio::task::spawn_blocking(move || {
            if let Some(mut previous) = previous {
                if previous.device.is_connected() {
                    if let Err(e) = previous.device.disconnect() {
                        tracing::warn!(error = %e, "disconnecting previous session");
                    }
                }
            }
            let mut session = Session {
                device: factory(),
                options: setup,
                definitions: macros,
            };
            let connected = session.setup_interactive();
            (session, connected)
        });
        let (session, connected) = match task.await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!(error = %e, "device task failed during initialize");
                return CommandResponse::err(format!("Failed to initialize plotter: {}", e));
            }
        };
        *guard = Some(session);

        match connected {
            Ok(true) => {
                tracing::info!("plotter initialized and connected");
                CommandResponse::ok("Plotter initialized successfully")
            }
            Ok(false) => CommandResponse::err("Failed to connect to plotter"),
            Err(e) => CommandResponse::err(format!("Failed to initialize plotter: {}", e)),
        }
    }

    /// 执行一条命令；`def <name> <body>` 在运行时注册宏
    pub async fn process_command(&self, command: &str) -> CommandResponse {
        let command = command.to_string();
        let separator = self.separator.clone();
        self.with_session(move |session, dispatcher| {
            let Some(statement) = Statement::from_line(&command) else {
                return CommandResponse::err("Empty command");
            };
            if statement.name == "def" {
                let parser = ScriptParser::new(dispatcher.table())
                    .with_policy(dispatcher.policy())
                    .with_separator(separator);
                return match parser.parse_definition_line(&command, &session.definitions) {
                    Ok((name, body)) => {
                        let message = format!("Definition {} registered", name);
                        session.definitions.insert(name, body);
                        CommandResponse::ok(message)
                    }
                    Err(e) => CommandResponse::err(e.to_string()),
                };
            }

            let report = dispatcher.dispatch_statement(
                session.device.as_mut(),
                &session.definitions,
                &statement,
            );
            CommandResponse {
                success: report.is_success(),
                message: report.message,
            }
        })
        .await
        .unwrap_or_else(|response| response)
    }

    pub async fn disconnect(&self) -> CommandResponse {
        let mut guard = self.session.lock().await;
        let Some(mut session) = guard.take() else {
            return CommandResponse::err(NOT_INITIALIZED);
        };
        let task = tokio::task::spawn_blocking(move || session.device.disconnect());
        match task.await {
            Ok(Ok(())) => CommandResponse::ok("Successfully disconnected from plotter"),
            Ok(Err(e)) => {
                CommandResponse::err(format!("Failed to disconnect from plotter: {}", e))
            }
            Err(e) => CommandResponse::err(format!("Failed to disconnect from plotter: {}", e)),
        }
    }

    /// 无会话或查询失败时视为无电
    pub async fn has_power(&self) -> HasPowerResponse {
        let threshold = self.settings.power_threshold;
        let has_power = self
            .with_session(move |session, _| match read_power(session.device.as_mut()) {
                Ok(reading) => reading > threshold,
                Err(e) => {
                    tracing::warn!(error = %e, "error checking power status");
                    false
                }
            })
            .await
            .unwrap_or(false);
        HasPowerResponse { has_power }
    }

    pub async fn plot_alignment_svg(&self) -> CommandResponse {
        self.with_session(|session, _| {
            let result = (|| {
                session.device.plot_setup(Some(ALIGNMENT_SVG))?;
                for option in ALIGNMENT_OPTIONS {
                    stage_setup_option(session.device.as_mut(), &session.options, option)?;
                }
                session.device.plot_run()
            })();
            match result {
                Ok(()) => CommandResponse::ok("Alignment SVG plotted successfully"),
                Err(e) => CommandResponse::err(format!("Failed to plot alignment SVG: {}", e)),
            }
        })
        .await
        .unwrap_or_else(|response| response)
    }

    /// 沿 x/y 轴微调原点；距离四舍五入到两位小数且不超过 ±0.1mm
    pub async fn walk_home(&self, axis: &str, distance: f64) -> CommandResponse {
        let axis = Axis::from_name(axis);
        self.with_session(move |session, _| {
            let Some(axis) = axis else {
                return CommandResponse::err("Invalid axis. Must be 'x' or 'y'.");
            };
            let distance = (distance * 100.0).round() / 100.0;
            if !(-MAX_WALK_MM..=MAX_WALK_MM).contains(&distance) {
                return CommandResponse::err(format!(
                    "Invalid distance of {}. Must be in range plus or minus {}mm.",
                    distance, MAX_WALK_MM
                ));
            }

            let result = session
                .device
                .plot_setup(None)
                .and_then(|()| session.device.walk(axis, distance));
            match result {
                Ok(()) => {
                    CommandResponse::ok(format!("Walked {} axis by {}mm", axis.name(), distance))
                }
                Err(e) => CommandResponse::err(format!("Failed to walk home position: {}", e)),
            }
        })
        .await
        .unwrap_or_else(|response| response)
    }

    pub async fn reset_home_position(&self) -> CommandResponse {
        self.with_session(|session, _| match session.reset_home() {
            Ok(()) => CommandResponse::ok("Successfully reset home position"),
            Err(e) => CommandResponse::err(format!("Failed to reset home position: {}", e)),
        })
        .await
        .unwrap_or_else(|response| response)
    }

    pub async fn restore_interactive_context(&self) -> CommandResponse {
        self.with_session(|session, _| match session.setup_interactive() {
            Ok(true) => CommandResponse::ok("Successfully restored interactive context"),
            Ok(false) => CommandResponse::err("Failed to connect to plotter"),
            Err(e) => {
                CommandResponse::err(format!("Failed to restore interactive context: {}", e))
            }
        })
        .await
        .unwrap_or_else(|response| response)
    }

    /// 退出交互上下文并进入绘图上下文：抬笔、归位、等待、断开、plot_setup
    pub async fn end_interactive_context(&self) -> CommandResponse {
        self.with_session(|session, _| {
            let device = session.device.as_mut();
            let result = device
                .penup()
                .and_then(|()| device.moveto(0.0, 0.0))
                .and_then(|()| device.block())
                .and_then(|()| device.disconnect())
                .and_then(|()| device.plot_setup(None));
            match result {
                Ok(()) => CommandResponse::ok("Successfully ended interactive context"),
                Err(e) => {
                    CommandResponse::err(format!("Failed to end interactive context: {}", e))
                }
            }
        })
        .await
        .unwrap_or_else(|response| response)
    }
}
