//! Plot Director - 笔式绘图仪脚本解释器与控制循环
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误与恢复、运行状态、进度统计、控制状态机
//! - **device**: 绘图仪能力接口、选项记录、模拟设备
//! - **dispatch**: 命令解析顺序（宏 / 选项 / 函数）与执行审计
//! - **notify**: webhook 通知
//! - **observability**: tracing 初始化
//! - **script**: 参数转换、字面量、脚本解析
//! - **server**: 远程 RPC 服务（路由需 `server` feature）
//! - **ui**: Ratatui TUI 界面

pub mod config;
pub mod core;
pub mod device;
pub mod dispatch;
pub mod notify;
pub mod observability;
pub mod script;
pub mod server;
pub mod ui;

pub use crate::core::{PlotError, PlotMachine, RunEvent, RunState};
pub use device::{MockDevice, PlotDevice};
pub use dispatch::{DispatchReport, Dispatcher, Outcome};
pub use script::{CastTable, Script, ScriptParser};
